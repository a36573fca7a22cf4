// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A resolved infrared code.

use std::fmt;

/// One IR code as the gateway understands it.
///
/// # Examples
///
/// ```
/// use ir_bridge::types::IrCode;
///
/// let code = IrCode::new("SONY", 12, "0xA90");
/// assert_eq!(code.to_string(), "SONY/12/0xA90");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrCode {
    /// Protocol name as used by the gateway (e.g. `SONY`, `NEC`).
    pub protocol_name: String,
    /// Number of significant bits in `hex`.
    pub bits: u16,
    /// The code in hexadecimal, verbatim from the code tables.
    pub hex: String,
}

impl IrCode {
    /// Creates a new IR code.
    #[must_use]
    pub fn new(protocol_name: impl Into<String>, bits: u16, hex: impl Into<String>) -> Self {
        Self {
            protocol_name: protocol_name.into(),
            bits,
            hex: hex.into(),
        }
    }
}

impl fmt::Display for IrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.protocol_name, self.bits, self.hex)
    }
}
