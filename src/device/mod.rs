// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IR-controlled appliances.
//!
//! A [`DeviceAdapter`] turns messages on its device topics into IR
//! transmissions:
//!
//! - `<base>/<device>/remote` with payload `Mute` sends the `Mute` code.
//! - `<base>/<device>/set-state` with payload `HDMI1` (or its friendly name)
//!   switches to that state, powering the device on first if needed, and
//!   publishes the new state on `<base>/<device>/status`.
//!
//! There is no feedback from the appliance, so the tracked state is only
//! what the bridge last asked for.

mod config;
mod state;

use std::collections::HashMap;

pub use config::DeviceConfig;
pub use state::{DeviceState, OFF_STATE, StateResolution};

use crate::bus::Publisher;
use crate::catalog::CodeCatalog;
use crate::error::{ConfigError, LookupError};
use crate::scheduler::{Scheduler, TransmitRequest};
use crate::topics::DeviceTopics;
use crate::types::IrCode;

/// One appliance driven through the IR gateway.
#[derive(Debug)]
pub struct DeviceAdapter {
    short_name: String,
    name: String,
    topics: DeviceTopics,
    catalog: CodeCatalog,
    send_even_if_same_state: bool,
    input_to_friendly_name: HashMap<String, String>,
    friendly_name_to_input: HashMap<String, String>,
    state: DeviceState,
}

impl DeviceAdapter {
    /// Builds an adapter from its configuration.
    ///
    /// The device starts in the [`OFF_STATE`]; nothing is transmitted.
    ///
    /// # Errors
    ///
    /// Returns error if a required field is missing or if the power-on or a
    /// state entry names a command that no code bank defines.
    pub fn new(base_topic: &str, config: &DeviceConfig) -> Result<Self, ConfigError> {
        if config.short_name.is_empty() {
            return Err(ConfigError::MissingField {
                device: config.display_name().to_string(),
                field: "short_name",
            });
        }

        let catalog = config.catalog()?;
        validate_references(&config.short_name, &catalog)?;

        let input_to_friendly_name = config.input_friendly_names.clone();
        let friendly_name_to_input = input_to_friendly_name
            .iter()
            .map(|(input, friendly)| (friendly.clone(), input.clone()))
            .collect();

        let topics = DeviceTopics::new(base_topic, &config.short_name);
        tracing::info!(
            device = %config.display_name(),
            topic = %topics.prefix,
            protocol = %catalog.protocol_name,
            "Creating IR device"
        );

        let initial_friendly = input_to_friendly_name
            .get(OFF_STATE)
            .map_or(OFF_STATE, String::as_str)
            .to_string();

        Ok(Self {
            short_name: config.short_name.clone(),
            name: config.display_name().to_string(),
            topics,
            catalog,
            send_even_if_same_state: config.send_ir_even_if_same_state.unwrap_or(false),
            input_to_friendly_name,
            friendly_name_to_input,
            state: DeviceState::new(OFF_STATE, initial_friendly),
        })
    }

    /// Topic segment of this device.
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Display name of this device.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topics this device uses.
    #[must_use]
    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    /// The state the device is believed to be in.
    #[must_use]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Resolves a command name against the code banks.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnknownCommand` if no bank defines it.
    pub fn resolve_command(&self, command: &str) -> Result<IrCode, LookupError> {
        self.catalog
            .lookup(command)
            .ok_or_else(|| LookupError::UnknownCommand {
                device: self.name.clone(),
                command: command.to_string(),
            })
    }

    /// Resolves a state name or friendly name.
    ///
    /// State names take precedence over friendly names.
    #[must_use]
    pub fn resolve_state(&self, key: &str) -> StateResolution {
        if self.catalog.has_state(key) {
            return StateResolution::Canonical(key.to_string());
        }
        match self.friendly_name_to_input.get(key) {
            Some(state) => StateResolution::Alias {
                state: state.clone(),
                alias: key.to_string(),
            },
            None => StateResolution::Unresolved,
        }
    }

    /// Queues the IR code for `command`.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnknownCommand` if no bank defines it; nothing
    /// is queued in that case.
    pub fn handle_remote_command(
        &self,
        command: &str,
        scheduler: &mut Scheduler,
    ) -> Result<(), LookupError> {
        let code = self.resolve_command(command)?;
        scheduler.enqueue(TransmitRequest::new(&self.name, command, code));
        Ok(())
    }

    /// Switches the device to the state named by `key`.
    ///
    /// When the device is off and a power-on command is configured, that
    /// command is queued before the state's own code. Returns `false` if the
    /// device was already in the requested state and nothing was sent.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnknownState` if `key` is neither a state nor a
    /// friendly name.
    pub fn set_state(
        &mut self,
        key: &str,
        scheduler: &mut Scheduler,
        publisher: &mut dyn Publisher,
    ) -> Result<bool, LookupError> {
        let next = match self.resolve_state(key) {
            StateResolution::Canonical(state) => {
                let friendly = self.friendly_name_for(&state);
                DeviceState::new(state, friendly)
            }
            StateResolution::Alias { state, alias } => DeviceState::new(state, alias),
            StateResolution::Unresolved => {
                return Err(LookupError::UnknownState {
                    device: self.name.clone(),
                    state: key.to_string(),
                });
            }
        };

        if next == self.state && !self.send_even_if_same_state {
            tracing::debug!(device = %self.name, state = %next.name(), "State unchanged");
            return Ok(false);
        }

        tracing::info!(
            device = %self.name,
            from = %self.state.friendly_name(),
            to = %next.friendly_name(),
            "Switching state"
        );

        if self.state.is_off()
            && let Some(power_on) = &self.catalog.power_on_before_input_select
        {
            self.queue_or_warn(power_on, scheduler);
        }
        if let Some(command) = self.catalog.state_command(next.name()) {
            self.queue_or_warn(command, scheduler);
        }

        self.state = next;
        self.publish_status(publisher);
        Ok(true)
    }

    /// Republishes the status snapshot after a (re)connect.
    pub fn on_reconnect(&self, publisher: &mut dyn Publisher) {
        self.publish_status(publisher);
    }

    /// Handles a message published under this device's prefix.
    ///
    /// Returns `Ok(false)` if the topic is not one this device acts on.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` if the command or state is unknown.
    pub fn handle_message(
        &mut self,
        topic: &str,
        payload: &str,
        scheduler: &mut Scheduler,
        publisher: &mut dyn Publisher,
    ) -> Result<bool, LookupError> {
        let payload = payload.trim();
        if topic == self.topics.remote {
            self.handle_remote_command(payload, scheduler)?;
            Ok(true)
        } else if topic == self.topics.set_state {
            self.set_state(payload, scheduler, publisher)?;
            Ok(true)
        } else if topic == self.topics.status {
            // Our own retained snapshot coming back.
            Ok(false)
        } else {
            tracing::warn!(device = %self.name, topic = %topic, "Unknown device topic");
            Ok(false)
        }
    }

    fn friendly_name_for(&self, state: &str) -> String {
        self.input_to_friendly_name
            .get(state)
            .cloned()
            .unwrap_or_else(|| state.to_string())
    }

    fn queue_or_warn(&self, command: &str, scheduler: &mut Scheduler) {
        if let Err(e) = self.handle_remote_command(command, scheduler) {
            tracing::warn!(error = %e, "Skipping state transition code");
        }
    }

    fn publish_status(&self, publisher: &mut dyn Publisher) {
        let payload = match self.state.to_status_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(device = %self.name, error = %e, "Failed to encode status");
                return;
            }
        };
        tracing::debug!(topic = %self.topics.status, payload = %payload, "Publishing status");
        if let Err(e) = publisher.publish(&self.topics.status, &payload, true) {
            tracing::warn!(device = %self.name, error = %e, "Failed to publish status");
        }
    }
}

fn validate_references(device: &str, catalog: &CodeCatalog) -> Result<(), ConfigError> {
    if let Some(power_on) = &catalog.power_on_before_input_select
        && catalog.lookup(power_on).is_none()
    {
        return Err(ConfigError::UnknownCommand {
            device: device.to_string(),
            context: "power_on_before_input_select".to_string(),
            command: power_on.clone(),
        });
    }
    for (state, command) in &catalog.state_codes {
        if let Some(command) = command
            && catalog.lookup(command).is_none()
        {
            return Err(ConfigError::UnknownCommand {
                device: device.to_string(),
                context: format!("state {state}"),
                command: command.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryPublisher;
    use crate::catalog::CodeBank;
    use crate::clock::ManualClock;
    use std::time::Duration;

    const BASE: &str = "home";

    fn bravia() -> DeviceConfig {
        DeviceConfig::new("tv")
            .with_name("Lounge TV")
            .with_model("sony_bravia")
            .with_friendly_name("HDMI1", "Blu-ray")
    }

    struct Harness {
        clock: ManualClock,
        scheduler: Scheduler,
        bus: MemoryPublisher,
    }

    impl Harness {
        fn new() -> Self {
            let clock = ManualClock::new();
            let scheduler = Scheduler::new("home/ir-gateway/commands/MQTTtoIR", clock.shared());
            Self {
                clock,
                scheduler,
                bus: MemoryPublisher::new(),
            }
        }

        /// Drains the scheduler, returning the commands sent.
        fn drain(&mut self) -> Vec<String> {
            let mut sent = Vec::new();
            while !self.scheduler.is_empty() {
                if let Some(r) = self.scheduler.tick(&mut self.bus) {
                    sent.push(r.command().to_string());
                }
                self.clock.advance(Duration::from_millis(100));
            }
            sent
        }

        fn statuses(&self) -> Vec<String> {
            self.bus
                .on_topic("home/tv/status")
                .into_iter()
                .map(|m| m.payload.clone())
                .collect()
        }
    }

    #[test]
    fn starts_off_without_transmitting() {
        let device = DeviceAdapter::new(BASE, &bravia()).unwrap();
        assert_eq!(device.state().name(), OFF_STATE);
        assert_eq!(device.state().friendly_name(), OFF_STATE);
    }

    #[test]
    fn off_state_uses_friendly_name() {
        let config = bravia().with_friendly_name("Off", "Standby");
        let device = DeviceAdapter::new(BASE, &config).unwrap();
        assert_eq!(device.state().friendly_name(), "Standby");
    }

    #[test]
    fn resolve_command_scans_banks() {
        let device = DeviceAdapter::new(BASE, &bravia()).unwrap();
        let code = device.resolve_command("Volume+").unwrap();
        assert_eq!(code, IrCode::new("SONY", 15, "0x240C"));
    }

    #[test]
    fn resolve_unknown_command() {
        let device = DeviceAdapter::new(BASE, &bravia()).unwrap();
        let err = device.resolve_command("Eject").unwrap_err();
        assert!(matches!(err, LookupError::UnknownCommand { .. }));
    }

    #[test]
    fn resolve_state_variants() {
        let device = DeviceAdapter::new(BASE, &bravia()).unwrap();
        assert_eq!(
            device.resolve_state("HDMI1"),
            StateResolution::Canonical("HDMI1".to_string())
        );
        assert_eq!(
            device.resolve_state("Blu-ray"),
            StateResolution::Alias {
                state: "HDMI1".to_string(),
                alias: "Blu-ray".to_string()
            }
        );
        assert_eq!(device.resolve_state("VHS"), StateResolution::Unresolved);
    }

    #[test]
    fn power_on_precedes_input_select() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        let changed = device
            .set_state("HDMI1", &mut h.scheduler, &mut h.bus)
            .unwrap();

        assert!(changed);
        assert_eq!(h.drain(), ["PowerOn", "HDMI1"]);
        let payloads: Vec<_> = h
            .bus
            .on_topic("home/ir-gateway/commands/MQTTtoIR")
            .into_iter()
            .map(|m| m.payload.clone())
            .collect();
        assert_eq!(
            payloads,
            [
                r#"{"bits":12,"hex":"0x750","protocol_name":"SONY","repeat":3}"#,
                r#"{"bits":15,"hex":"0x2D58","protocol_name":"SONY","repeat":3}"#,
            ]
        );
    }

    #[test]
    fn no_power_on_when_already_on() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        device.set_state("HDMI1", &mut h.scheduler, &mut h.bus).unwrap();
        h.drain();
        device.set_state("HDMI2", &mut h.scheduler, &mut h.bus).unwrap();

        assert_eq!(h.drain(), ["HDMI2"]);
    }

    #[test]
    fn switching_off_sends_power_off_only() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        device.set_state("HDMI3", &mut h.scheduler, &mut h.bus).unwrap();
        h.drain();
        device.set_state("Off", &mut h.scheduler, &mut h.bus).unwrap();

        assert_eq!(h.drain(), ["PowerOff"]);
        assert!(device.state().is_off());
    }

    #[test]
    fn same_state_is_a_no_op() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        assert!(device.set_state("HDMI1", &mut h.scheduler, &mut h.bus).unwrap());
        h.drain();
        let before = h.bus.messages().len();

        assert!(!device.set_state("HDMI1", &mut h.scheduler, &mut h.bus).unwrap());
        assert!(h.scheduler.is_empty());
        assert_eq!(h.bus.messages().len(), before);
    }

    #[test]
    fn alias_and_canonical_converge() {
        let mut h = Harness::new();
        let mut by_alias = DeviceAdapter::new(BASE, &bravia()).unwrap();
        let mut by_name = DeviceAdapter::new(BASE, &bravia()).unwrap();

        by_alias.set_state("Blu-ray", &mut h.scheduler, &mut h.bus).unwrap();
        by_name.set_state("HDMI1", &mut h.scheduler, &mut h.bus).unwrap();

        assert_eq!(by_alias.state(), by_name.state());
        assert_eq!(by_alias.state().friendly_name(), "Blu-ray");
        assert_eq!(by_name.state().friendly_name(), "Blu-ray");
    }

    #[test]
    fn alias_after_canonical_is_a_no_op() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        device.set_state("HDMI1", &mut h.scheduler, &mut h.bus).unwrap();
        h.drain();

        assert!(!device.set_state("Blu-ray", &mut h.scheduler, &mut h.bus).unwrap());
        assert!(h.scheduler.is_empty());
    }

    #[test]
    fn resend_always_transmits_again() {
        let mut h = Harness::new();
        let config = bravia().with_send_even_if_same_state(true);
        let mut device = DeviceAdapter::new(BASE, &config).unwrap();

        device.set_state("HDMI1", &mut h.scheduler, &mut h.bus).unwrap();
        h.drain();
        assert!(device.set_state("HDMI1", &mut h.scheduler, &mut h.bus).unwrap());

        assert_eq!(h.drain(), ["HDMI1"]);
        assert_eq!(h.statuses().len(), 2);
    }

    #[test]
    fn resend_from_off_powers_on_first() {
        let mut h = Harness::new();
        let config = bravia().with_send_even_if_same_state(true);
        let mut device = DeviceAdapter::new(BASE, &config).unwrap();

        assert!(device.set_state("Off", &mut h.scheduler, &mut h.bus).unwrap());

        assert_eq!(h.drain(), ["PowerOn", "PowerOff"]);
        assert!(device.state().is_off());
        assert_eq!(h.statuses().len(), 1);
    }

    #[test]
    fn unknown_state_is_reported() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        let err = device
            .set_state("Teletext", &mut h.scheduler, &mut h.bus)
            .unwrap_err();

        assert!(matches!(err, LookupError::UnknownState { .. }));
        assert!(h.scheduler.is_empty());
        assert!(h.bus.messages().is_empty());
    }

    #[test]
    fn state_change_publishes_retained_status() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        device.set_state("Blu-ray", &mut h.scheduler, &mut h.bus).unwrap();

        let status = h.bus.on_topic("home/tv/status");
        assert_eq!(status.len(), 1);
        assert!(status[0].retain);
        assert_eq!(
            status[0].payload,
            r#"{"state":"HDMI1","friendly_name":"Blu-ray"}"#
        );
    }

    #[test]
    fn state_without_code_still_transitions() {
        let mut h = Harness::new();
        let config = DeviceConfig::new("amp")
            .with_protocol("NEC")
            .with_state("Off", Some("Standby"))
            .with_state("Tuner", None)
            .with_bank(CodeBank::new(32, [("Standby", "0x5EA1F807")]));
        let mut device = DeviceAdapter::new(BASE, &config).unwrap();

        assert!(device.set_state("Tuner", &mut h.scheduler, &mut h.bus).unwrap());
        assert!(h.scheduler.is_empty());
        assert_eq!(device.state().name(), "Tuner");
    }

    #[test]
    fn reconnect_republishes_status() {
        let mut h = Harness::new();
        let device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        device.on_reconnect(&mut h.bus);
        device.on_reconnect(&mut h.bus);

        assert_eq!(
            h.statuses(),
            [
                r#"{"state":"Off","friendly_name":"Off"}"#,
                r#"{"state":"Off","friendly_name":"Off"}"#,
            ]
        );
    }

    #[test]
    fn remote_topic_queues_command() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        let handled = device
            .handle_message("home/tv/remote", "Mute\n", &mut h.scheduler, &mut h.bus)
            .unwrap();

        assert!(handled);
        assert_eq!(h.drain(), ["Mute"]);
    }

    #[test]
    fn unknown_remote_command_queues_nothing() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        let result =
            device.handle_message("home/tv/remote", "Eject", &mut h.scheduler, &mut h.bus);

        assert!(result.is_err());
        assert!(h.scheduler.is_empty());
    }

    #[test]
    fn status_echo_is_ignored() {
        let mut h = Harness::new();
        let mut device = DeviceAdapter::new(BASE, &bravia()).unwrap();

        let handled = device
            .handle_message(
                "home/tv/status",
                r#"{"state":"Off","friendly_name":"Off"}"#,
                &mut h.scheduler,
                &mut h.bus,
            )
            .unwrap();

        assert!(!handled);
        assert!(h.bus.messages().is_empty());
    }

    #[test]
    fn missing_short_name_is_config_error() {
        let err = DeviceAdapter::new(BASE, &DeviceConfig::default().with_model("sony_bravia"))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "short_name",
                ..
            }
        ));
    }

    #[test]
    fn dangling_power_on_is_config_error() {
        let config = bravia().with_power_on("WakeUp");
        let err = DeviceAdapter::new(BASE, &config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCommand { .. }));
    }

    #[test]
    fn dangling_state_command_is_config_error() {
        let config = bravia().with_state("HDMI5", Some("HDMI5"));
        let err = DeviceAdapter::new(BASE, &config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCommand { .. }));
    }
}
