// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of IR codes seen by the gateway.
//!
//! The gateway reports every code it receives on `IRtoMQTT`. The
//! [`InboundDecoder`] looks each one up in a [`DecoderTable`] and republishes
//! the configured messages, so a physical remote can drive bus topics:
//!
//! ```text
//! IRtoMQTT {"protocol_name":"NEC","hex":"0x20DF10EF"}
//!          ↓ table["NEC"]["0x20DF10EF"]
//! home/amp/set-state  "Off"
//! ```
//!
//! Remotes repeat a code for as long as a button is held. A code that
//! resolves to the same actions as the previous one within
//! [`DEBOUNCE_WINDOW`] is dropped, and the window restarts on every repeat.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::bus::Publisher;
use crate::clock::SharedClock;
use crate::error::ParseError;

/// Window in which an identical decoded code is suppressed.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// A message to publish when a code is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepublishAction {
    /// Destination topic.
    pub topic: String,
    /// Message body (empty by default).
    #[serde(default)]
    pub payload: String,
    /// Retain flag (off by default).
    #[serde(default)]
    pub retain: bool,
}

impl RepublishAction {
    /// Creates an action with an empty payload and no retain flag.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: String::new(),
            retain: false,
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sets the retain flag.
    #[must_use]
    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(RepublishAction),
    Many(Vec<RepublishAction>),
}

/// The actions configured for one code, in publish order.
///
/// Deserializes from either a single action object or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct ActionSet(Vec<RepublishAction>);

impl ActionSet {
    /// Creates a set from actions in publish order.
    #[must_use]
    pub fn new(actions: Vec<RepublishAction>) -> Self {
        Self(actions)
    }

    /// The actions in publish order.
    #[must_use]
    pub fn actions(&self) -> &[RepublishAction] {
        &self.0
    }
}

impl From<OneOrMany> for ActionSet {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(action) => Self(vec![action]),
            OneOrMany::Many(actions) => Self(actions),
        }
    }
}

impl From<RepublishAction> for ActionSet {
    fn from(action: RepublishAction) -> Self {
        Self(vec![action])
    }
}

/// Protocol name → hex code → actions.
///
/// # Examples
///
/// ```
/// use ir_bridge::decoder::{DecoderTable, RepublishAction};
///
/// let table = DecoderTable::default().with(
///     "NEC",
///     "0x20DF10EF",
///     RepublishAction::new("home/amp/set-state").with_payload("Off"),
/// );
/// assert!(table.lookup("NEC", "0x20DF10EF").is_some());
/// assert!(table.lookup("NEC", "0x0").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct DecoderTable(HashMap<String, HashMap<String, ActionSet>>);

impl DecoderTable {
    /// Adds or replaces the actions for a code.
    #[must_use]
    pub fn with(
        mut self,
        protocol_name: impl Into<String>,
        hex: impl Into<String>,
        actions: impl Into<ActionSet>,
    ) -> Self {
        self.0
            .entry(protocol_name.into())
            .or_default()
            .insert(hex.into(), actions.into());
        self
    }

    /// Looks up the actions for a code.
    #[must_use]
    pub fn lookup(&self, protocol_name: &str, hex: &str) -> Option<&ActionSet> {
        self.0.get(protocol_name)?.get(hex)
    }

    /// Returns `true` if no codes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(HashMap::is_empty)
    }
}

/// A code report published by the gateway.
#[derive(Debug, Deserialize)]
struct IrReport {
    protocol_name: String,
    hex: String,
}

/// Republishes decoded IR codes with duplicate suppression.
#[derive(Debug)]
pub struct InboundDecoder {
    table: DecoderTable,
    clock: SharedClock,
    last: Option<(ActionSet, Instant)>,
}

impl InboundDecoder {
    /// Creates a decoder for `table`.
    #[must_use]
    pub fn new(table: DecoderTable, clock: SharedClock) -> Self {
        Self {
            table,
            clock,
            last: None,
        }
    }

    /// Decodes one gateway report and publishes its actions.
    ///
    /// Returns the number of messages published. Codes missing from the
    /// table are dropped silently, since other remotes share the same IR
    /// space.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the payload is not a valid report.
    pub fn handle_report(
        &mut self,
        payload: &str,
        publisher: &mut dyn Publisher,
    ) -> Result<usize, ParseError> {
        let report: IrReport = serde_json::from_str(payload)?;
        tracing::debug!(
            protocol = %report.protocol_name,
            hex = %report.hex,
            "Attempting to decode IR"
        );

        let Some(actions) = self.table.lookup(&report.protocol_name, &report.hex) else {
            return Ok(0);
        };

        let now = self.clock.now();
        if let Some((last_actions, last_time)) = &mut self.last
            && last_actions == actions
            && now.duration_since(*last_time) < DEBOUNCE_WINDOW
        {
            *last_time = now;
            tracing::debug!(hex = %report.hex, "Suppressing repeated IR code");
            return Ok(0);
        }
        self.last = Some((actions.clone(), now));

        let mut published = 0;
        for action in actions.actions() {
            tracing::debug!(topic = %action.topic, payload = %action.payload, "Republishing IR code");
            match publisher.publish(&action.topic, &action.payload, action.retain) {
                Ok(()) => published += 1,
                Err(e) => {
                    tracing::warn!(topic = %action.topic, error = %e, "Failed to republish IR code");
                }
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryPublisher;
    use crate::clock::ManualClock;

    const POWER: &str = r#"{"protocol_name":"NEC","hex":"0x20DF10EF"}"#;
    const MUTE: &str = r#"{"protocol_name":"NEC","hex":"0x20DF906F"}"#;

    fn table() -> DecoderTable {
        DecoderTable::default()
            .with(
                "NEC",
                "0x20DF10EF",
                ActionSet::new(vec![
                    RepublishAction::new("home/amp/set-state").with_payload("Off"),
                    RepublishAction::new("home/lights/scene")
                        .with_payload("movie")
                        .retained(),
                ]),
            )
            .with(
                "NEC",
                "0x20DF906F",
                RepublishAction::new("home/amp/remote").with_payload("Mute"),
            )
    }

    fn setup() -> (ManualClock, InboundDecoder, MemoryPublisher) {
        let clock = ManualClock::new();
        let decoder = InboundDecoder::new(table(), clock.shared());
        (clock, decoder, MemoryPublisher::new())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn publishes_actions_in_order() {
        let (_, mut decoder, mut bus) = setup();

        assert_eq!(decoder.handle_report(POWER, &mut bus).unwrap(), 2);

        let messages = bus.messages();
        assert_eq!(messages[0].topic, "home/amp/set-state");
        assert_eq!(messages[0].payload, "Off");
        assert!(!messages[0].retain);
        assert_eq!(messages[1].topic, "home/lights/scene");
        assert!(messages[1].retain);
    }

    #[test]
    fn unknown_code_is_dropped() {
        let (_, mut decoder, mut bus) = setup();

        let report = r#"{"protocol_name":"NEC","hex":"0xDEADBEEF"}"#;
        assert_eq!(decoder.handle_report(report, &mut bus).unwrap(), 0);

        let report = r#"{"protocol_name":"RC5","hex":"0x20DF10EF"}"#;
        assert_eq!(decoder.handle_report(report, &mut bus).unwrap(), 0);
        assert!(bus.messages().is_empty());
    }

    #[test]
    fn malformed_payload_is_parse_error() {
        let (_, mut decoder, mut bus) = setup();

        assert!(decoder.handle_report("not json", &mut bus).is_err());
        assert!(decoder.handle_report(r#"{"hex":"0x1"}"#, &mut bus).is_err());
        assert!(bus.messages().is_empty());
    }

    #[test]
    fn extra_report_fields_are_ignored() {
        let (_, mut decoder, mut bus) = setup();

        let report = r#"{"value":551489775,"protocol":3,"bits":32,"protocol_name":"NEC","hex":"0x20DF906F"}"#;
        assert_eq!(decoder.handle_report(report, &mut bus).unwrap(), 1);
    }

    #[test]
    fn repeat_within_window_is_suppressed() {
        let (clock, mut decoder, mut bus) = setup();

        assert_eq!(decoder.handle_report(MUTE, &mut bus).unwrap(), 1);
        clock.advance(ms(300));
        assert_eq!(decoder.handle_report(MUTE, &mut bus).unwrap(), 0);

        clock.advance(ms(300));
        assert_eq!(decoder.handle_report(MUTE, &mut bus).unwrap(), 0);
        assert_eq!(bus.messages().len(), 1);
    }

    #[test]
    fn repeat_after_window_is_published() {
        let (clock, mut decoder, mut bus) = setup();

        decoder.handle_report(MUTE, &mut bus).unwrap();
        clock.advance(ms(600));

        assert_eq!(decoder.handle_report(MUTE, &mut bus).unwrap(), 1);
        assert_eq!(bus.messages().len(), 2);
    }

    #[test]
    fn held_button_collapses_to_one() {
        let (clock, mut decoder, mut bus) = setup();

        for _ in 0..20 {
            decoder.handle_report(MUTE, &mut bus).unwrap();
            clock.advance(ms(110));
        }

        assert_eq!(bus.messages().len(), 1);
    }

    #[test]
    fn alternating_codes_are_not_suppressed() {
        let (clock, mut decoder, mut bus) = setup();

        for report in [MUTE, POWER, MUTE, POWER] {
            decoder.handle_report(report, &mut bus).unwrap();
            clock.advance(ms(50));
        }

        assert_eq!(bus.on_topic("home/amp/remote").len(), 2);
        assert_eq!(bus.on_topic("home/amp/set-state").len(), 2);
    }

    #[test]
    fn identical_actions_from_different_codes_are_suppressed() {
        let clock = ManualClock::new();
        let action = RepublishAction::new("home/amp/remote").with_payload("Mute");
        let table = DecoderTable::default()
            .with("NEC", "0x1", action.clone())
            .with("SONY", "0x2", action);
        let mut decoder = InboundDecoder::new(table, clock.shared());
        let mut bus = MemoryPublisher::new();

        decoder
            .handle_report(r#"{"protocol_name":"NEC","hex":"0x1"}"#, &mut bus)
            .unwrap();
        decoder
            .handle_report(r#"{"protocol_name":"SONY","hex":"0x2"}"#, &mut bus)
            .unwrap();

        assert_eq!(bus.messages().len(), 1);
    }

    #[test]
    fn table_deserializes_single_and_list() {
        let json = r#"{
            "NEC": {
                "0x20DF10EF": {"topic": "home/amp/set-state", "payload": "Off"},
                "0x20DF906F": [
                    {"topic": "home/amp/remote", "payload": "Mute"},
                    {"topic": "home/lights/scene", "payload": "dim", "retain": true}
                ]
            }
        }"#;
        let table: DecoderTable = serde_json::from_str(json).unwrap();

        assert_eq!(table.lookup("NEC", "0x20DF10EF").unwrap().actions().len(), 1);
        let many = table.lookup("NEC", "0x20DF906F").unwrap();
        assert_eq!(many.actions().len(), 2);
        assert!(many.actions()[1].retain);
    }

    #[test]
    fn action_defaults() {
        let action: RepublishAction = serde_json::from_str(r#"{"topic":"a/b"}"#).unwrap();
        assert_eq!(action, RepublishAction::new("a/b"));
    }
}
