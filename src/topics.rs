// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic naming.
//!
//! ```text
//! <base>/<device>/remote                  → send a remote button
//! <base>/<device>/set-state               → select a state (input, power)
//! <base>/<device>/status                  ← retained state snapshot
//! <base>/ir-gateway/commands/MQTTtoIR     ← IR transmit requests
//! <base>/ir-gateway/IRtoMQTT              → IR codes seen by the gateway
//! ```

/// Topic segment the gateway lives under.
pub const GATEWAY_SEGMENT: &str = "ir-gateway";

/// Topic the gateway listens on for codes to transmit.
#[must_use]
pub fn gateway_command(base: &str) -> String {
    format!("{base}/{GATEWAY_SEGMENT}/commands/MQTTtoIR")
}

/// Topic the gateway reports received codes on.
#[must_use]
pub fn gateway_report(base: &str) -> String {
    format!("{base}/{GATEWAY_SEGMENT}/IRtoMQTT")
}

/// The topics belonging to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    /// `<base>/<device>`
    pub prefix: String,
    /// `<base>/<device>/remote`
    pub remote: String,
    /// `<base>/<device>/set-state`
    pub set_state: String,
    /// `<base>/<device>/status`
    pub status: String,
    /// `<base>/<device>/#`
    pub filter: String,
}

impl DeviceTopics {
    /// Builds the topic set for `short_name` under `base`.
    #[must_use]
    pub fn new(base: &str, short_name: &str) -> Self {
        let prefix = format!("{base}/{short_name}");
        Self {
            remote: format!("{prefix}/remote"),
            set_state: format!("{prefix}/set-state"),
            status: format!("{prefix}/status"),
            filter: format!("{prefix}/#"),
            prefix,
        }
    }
}
