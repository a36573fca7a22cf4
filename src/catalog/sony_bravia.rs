// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sony Bravia televisions (SIRC protocol).

use std::collections::HashMap;

use super::{CodeBank, CodeCatalog};

pub(super) fn catalog() -> CodeCatalog {
    let state_codes = [
        ("Off", "PowerOff"),
        ("HDMI1", "HDMI1"),
        ("HDMI2", "HDMI2"),
        ("HDMI3", "HDMI3"),
        ("HDMI4", "HDMI4"),
    ];

    CodeCatalog {
        protocol_name: "SONY".to_string(),
        power_on_before_input_select: Some("PowerOn".to_string()),
        state_codes: state_codes
            .into_iter()
            .map(|(state, command)| (state.to_string(), Some(command.to_string())))
            .collect::<HashMap<_, _>>(),
        banks: vec![
            CodeBank::new(
                12,
                [
                    ("Input", "0xA50"),
                    ("Power", "0xA90"),
                    // Scart
                    ("AV1", "0x30"),
                    // Component
                    ("AV2", "0x830"),
                    ("PowerOn", "0x750"),
                    ("PowerOff", "0xF50"),
                ],
            ),
            CodeBank::new(
                15,
                [
                    ("Sync", "0xD58"),
                    ("Play", "0x2CE9"),
                    ("Pause", "0x4CE9"),
                    ("HDMI1", "0x2D58"),
                    ("HDMI2", "0x6D58"),
                    ("HDMI3", "0x1D58"),
                    ("HDMI4", "0x5D58"),
                    ("Back", "0x62E9"),
                    ("Stop", "0xCE9"),
                    ("Rewind", "0x6CE9"),
                    ("FastForward", "0x1CE9"),
                    ("Previous", "0x1EE9"),
                    ("Next", "0x5EE9"),
                    ("Volume+", "0x240C"),
                    ("Volume-", "0x640C"),
                    ("Mute", "0x140C"),
                ],
            ),
        ],
    }
}
