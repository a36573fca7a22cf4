// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON payloads for the gateway's `MQTTtoIR` command topic.
//!
//! Every protocol is sent as `{"bits":..,"hex":"..","protocol_name":".."}`.
//! Some protocols need extra fields; OpenMQTTGateway only emits SONY codes
//! reliably when an explicit `"repeat":3` is included.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::IrCode;

/// Per-protocol adjustments to the default payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFormat {
    /// Explicit repeat count, omitted from the payload when `None`.
    #[serde(default)]
    pub repeat: Option<u32>,
}

/// Immutable table of wire formats keyed by protocol name.
///
/// # Examples
///
/// ```
/// use ir_bridge::scheduler::WireTemplates;
/// use ir_bridge::types::IrCode;
///
/// let templates = WireTemplates::default();
/// let json = templates.render(&IrCode::new("NEC", 32, "0x20DF10EF")).unwrap();
/// assert_eq!(json, r#"{"bits":32,"hex":"0x20DF10EF","protocol_name":"NEC"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTemplates {
    formats: HashMap<String, WireFormat>,
}

#[derive(Serialize)]
struct GatewayCommand<'a> {
    bits: u16,
    hex: &'a str,
    protocol_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat: Option<u32>,
}

impl WireTemplates {
    /// Creates a table with no protocol overrides.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// Adds or replaces the format for `protocol_name`.
    #[must_use]
    pub fn with(mut self, protocol_name: impl Into<String>, format: WireFormat) -> Self {
        self.formats.insert(protocol_name.into(), format);
        self
    }

    /// Returns the format used for `protocol_name`.
    #[must_use]
    pub fn format_for(&self, protocol_name: &str) -> WireFormat {
        self.formats.get(protocol_name).copied().unwrap_or_default()
    }

    /// Serializes `code` as a gateway command payload.
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails.
    pub fn render(&self, code: &IrCode) -> Result<String, serde_json::Error> {
        let format = self.format_for(&code.protocol_name);
        serde_json::to_string(&GatewayCommand {
            bits: code.bits,
            hex: &code.hex,
            protocol_name: &code.protocol_name,
            repeat: format.repeat,
        })
    }
}

impl Default for WireTemplates {
    fn default() -> Self {
        Self::empty().with("SONY", WireFormat { repeat: Some(3) })
    }
}
