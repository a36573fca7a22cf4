// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device configuration.

use std::collections::HashMap;

use serde::Deserialize;

use crate::catalog::{CodeBank, CodeCatalog};
use crate::error::ConfigError;

/// Configuration for one IR-controlled appliance.
///
/// Every field is optional at the JSON level so that a broken device entry
/// is reported as a [`ConfigError`] for that device alone, instead of
/// failing the whole configuration file. Keys may also be given in the
/// `PascalCase` form (`ProtocolName`, `StateRemoteCodes`, ...).
///
/// # Examples
///
/// ```
/// use ir_bridge::device::DeviceConfig;
///
/// let config = DeviceConfig::new("tv")
///     .with_name("Lounge TV")
///     .with_model("sony_bravia")
///     .with_friendly_name("HDMI1", "Blu-ray");
///
/// let catalog = config.catalog().unwrap();
/// assert_eq!(catalog.protocol_name, "SONY");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Topic segment for this device (`<base>/<short_name>/...`).
    #[serde(alias = "ShortName")]
    pub short_name: String,
    /// Display name used in logs and transmit requests.
    #[serde(alias = "Name", alias = "DeviceName")]
    pub name: Option<String>,
    /// Built-in catalog to start from.
    #[serde(alias = "Model")]
    pub model: Option<String>,
    /// IR protocol; overrides the model's protocol.
    #[serde(alias = "ProtocolName")]
    pub protocol_name: Option<String>,
    /// Command sent before selecting an input while the device is off.
    #[serde(alias = "PowerOnBeforeInputSelect")]
    pub power_on_before_input_select: Option<String>,
    /// Send the state's code even if the device is already in that state.
    #[serde(alias = "SendIREvenIfSameState")]
    pub send_ir_even_if_same_state: Option<bool>,
    /// State name to user-facing alias.
    #[serde(alias = "InputFriendlyNames")]
    pub input_friendly_names: HashMap<String, String>,
    /// State name to the command selecting it; merged over the model's.
    #[serde(alias = "StateRemoteCodes")]
    pub state_codes: HashMap<String, Option<String>>,
    /// Extra code banks, searched before the model's banks.
    #[serde(alias = "RemoteCodes")]
    pub remote_codes: Vec<CodeBank>,
}

impl DeviceConfig {
    /// Creates a configuration with only a short name set.
    #[must_use]
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Starts from a built-in catalog.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the IR protocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol_name: impl Into<String>) -> Self {
        self.protocol_name = Some(protocol_name.into());
        self
    }

    /// Sets the power-on command.
    #[must_use]
    pub fn with_power_on(mut self, command: impl Into<String>) -> Self {
        self.power_on_before_input_select = Some(command.into());
        self
    }

    /// Re-sends state codes even when the state does not change.
    #[must_use]
    pub fn with_send_even_if_same_state(mut self, enabled: bool) -> Self {
        self.send_ir_even_if_same_state = Some(enabled);
        self
    }

    /// Adds a user-facing alias for a state.
    #[must_use]
    pub fn with_friendly_name(
        mut self,
        state: impl Into<String>,
        friendly_name: impl Into<String>,
    ) -> Self {
        self.input_friendly_names
            .insert(state.into(), friendly_name.into());
        self
    }

    /// Adds a state and the command that selects it.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>, command: Option<&str>) -> Self {
        self.state_codes
            .insert(state.into(), command.map(str::to_string));
        self
    }

    /// Adds a code bank.
    #[must_use]
    pub fn with_bank(mut self, bank: CodeBank) -> Self {
        self.remote_codes.push(bank);
        self
    }

    /// Display name, falling back to the short name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.short_name)
    }

    /// Builds the effective code catalog for this device.
    ///
    /// # Errors
    ///
    /// Returns error if the model is unknown, or if the protocol, states, or
    /// code banks end up missing.
    pub fn catalog(&self) -> Result<CodeCatalog, ConfigError> {
        let device = self.short_name.clone();

        let mut catalog = match &self.model {
            Some(model) => {
                CodeCatalog::builtin(model).ok_or_else(|| ConfigError::UnknownModel {
                    device: device.clone(),
                    model: model.clone(),
                })?
            }
            None => CodeCatalog::default(),
        };

        if let Some(protocol_name) = &self.protocol_name {
            catalog.protocol_name.clone_from(protocol_name);
        }
        if self.power_on_before_input_select.is_some() {
            catalog
                .power_on_before_input_select
                .clone_from(&self.power_on_before_input_select);
        }
        catalog.state_codes.extend(
            self.state_codes
                .iter()
                .map(|(state, command)| (state.clone(), command.clone())),
        );
        let mut banks = self.remote_codes.clone();
        banks.append(&mut catalog.banks);
        catalog.banks = banks;

        if catalog.protocol_name.is_empty() {
            return Err(ConfigError::MissingField {
                device,
                field: "protocol_name",
            });
        }
        if catalog.state_codes.is_empty() {
            return Err(ConfigError::MissingField {
                device,
                field: "state_codes",
            });
        }
        if catalog.banks.is_empty() {
            return Err(ConfigError::MissingField {
                device,
                field: "remote_codes",
            });
        }

        Ok(catalog)
    }
}
