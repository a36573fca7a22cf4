// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.

use serde::Serialize;

/// Name of the state every device starts in.
pub const OFF_STATE: &str = "Off";

/// The state an appliance is believed to be in.
///
/// Two states are equal when their internal names match; the friendly name
/// is presentation only.
///
/// # Examples
///
/// ```
/// use ir_bridge::device::DeviceState;
///
/// let a = DeviceState::new("HDMI1", "Blu-ray");
/// let b = DeviceState::new("HDMI1", "HDMI1");
/// assert_eq!(a, b);
/// assert!(!a.is_off());
/// ```
#[derive(Debug, Clone, Eq, Serialize)]
pub struct DeviceState {
    #[serde(rename = "state")]
    name: String,
    friendly_name: String,
}

impl DeviceState {
    /// Creates a state.
    #[must_use]
    pub fn new(name: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: friendly_name.into(),
        }
    }

    /// Internal state name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// User-facing name.
    #[must_use]
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Returns `true` for the [`OFF_STATE`].
    #[must_use]
    pub fn is_off(&self) -> bool {
        self.name == OFF_STATE
    }

    /// JSON snapshot published on the status topic.
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails.
    pub fn to_status_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl PartialEq for DeviceState {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Outcome of resolving a user-supplied state key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateResolution {
    /// The key is a state name.
    Canonical(String),
    /// The key is a friendly name for `state`.
    Alias {
        /// The state the alias stands for.
        state: String,
        /// The alias as given.
        alias: String,
    },
    /// The key matches neither.
    Unresolved,
}
