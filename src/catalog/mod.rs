// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-model IR code tables.
//!
//! A [`CodeCatalog`] maps symbolic command names (`"Mute"`, `"HDMI1"`) to
//! IR codes. Codes are grouped in [`CodeBank`]s because a single remote
//! often mixes several bit widths. A catalog also names which command
//! selects each device state.
//!
//! Catalogs can be loaded from JSON or taken from the built-in presets:
//!
//! ```
//! use ir_bridge::catalog::CodeCatalog;
//!
//! let catalog = CodeCatalog::builtin("sony_bravia").unwrap();
//! let code = catalog.lookup("Mute").unwrap();
//! assert_eq!(code.bits, 15);
//! assert_eq!(code.hex, "0x140C");
//! ```

mod sony_bravia;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::IrCode;

/// Codes sharing one bit width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBank {
    /// Bit width of every code in this bank.
    #[serde(alias = "Bits")]
    pub bits: u16,
    /// Command name to hex code.
    #[serde(alias = "Codes")]
    pub codes: HashMap<String, String>,
}

impl CodeBank {
    /// Creates a bank from `(command, hex)` pairs.
    #[must_use]
    pub fn new<I, K, V>(bits: u16, codes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            bits,
            codes: codes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// IR tables for one appliance model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodeCatalog {
    /// Protocol every code in the catalog is sent with.
    pub protocol_name: String,
    /// Command sent before selecting a state when the device is off.
    pub power_on_before_input_select: Option<String>,
    /// State name to the command that selects it, if any.
    pub state_codes: HashMap<String, Option<String>>,
    /// Code banks, searched in order.
    pub banks: Vec<CodeBank>,
}

impl CodeCatalog {
    /// Returns a built-in catalog by model name.
    ///
    /// Known models: `sony_bravia`.
    #[must_use]
    pub fn builtin(model: &str) -> Option<Self> {
        match model.to_ascii_lowercase().replace('-', "_").as_str() {
            "sony_bravia" | "sonybravia" => Some(sony_bravia::catalog()),
            _ => None,
        }
    }

    /// Looks up a command across all banks.
    ///
    /// Banks are scanned in declaration order and the first match wins.
    #[must_use]
    pub fn lookup(&self, command: &str) -> Option<IrCode> {
        self.banks.iter().find_map(|bank| {
            bank.codes
                .get(command)
                .map(|hex| IrCode::new(self.protocol_name.clone(), bank.bits, hex.clone()))
        })
    }

    /// Returns `true` if `state` is a canonical state of this model.
    #[must_use]
    pub fn has_state(&self, state: &str) -> bool {
        self.state_codes.contains_key(state)
    }

    /// Returns the command that selects `state`.
    ///
    /// `None` if the state is unknown or has no command attached.
    #[must_use]
    pub fn state_command(&self, state: &str) -> Option<&str> {
        self.state_codes.get(state).and_then(Option::as_deref)
    }
}
