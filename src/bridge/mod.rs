// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge: devices, decoder, and scheduler behind one message handler.
//!
//! [`Bridge`] owns every component and is driven from a single task. The
//! caller feeds it inbound messages with [`Bridge::handle_message`], calls
//! [`Bridge::tick`] periodically, and calls [`Bridge::on_connect`] after
//! every (re)connect. With the `mqtt` feature, [`runner::run`] does all of
//! that against a live broker.
//!
//! # Examples
//!
//! ```
//! use ir_bridge::bridge::Bridge;
//! use ir_bridge::bus::MemoryPublisher;
//! use ir_bridge::clock::ManualClock;
//! use ir_bridge::decoder::DecoderTable;
//! use ir_bridge::device::DeviceConfig;
//! use ir_bridge::scheduler::WireTemplates;
//!
//! let clock = ManualClock::new();
//! let devices = [DeviceConfig::new("tv").with_model("sony_bravia")];
//! let mut bridge = Bridge::new(
//!     "home",
//!     &devices,
//!     DecoderTable::default(),
//!     WireTemplates::default(),
//!     clock.shared(),
//! );
//! let mut bus = MemoryPublisher::new();
//!
//! bridge.handle_message("home/tv/remote", "Mute", &mut bus).unwrap();
//! let sent = bridge.tick(&mut bus).unwrap();
//! assert_eq!(sent.command(), "Mute");
//! ```

mod router;
#[cfg(feature = "mqtt")]
pub mod runner;

pub use router::{Route, TopicRouter};

use crate::bus::Publisher;
use crate::clock::SharedClock;
use crate::config::BridgeConfig;
use crate::decoder::{DecoderTable, InboundDecoder};
use crate::device::{DeviceAdapter, DeviceConfig};
use crate::error::{ConfigError, Error};
use crate::scheduler::{Scheduler, TransmitRequest, WireTemplates};
use crate::topics;

/// All bridge components, owned by one task.
#[derive(Debug)]
pub struct Bridge {
    scheduler: Scheduler,
    devices: Vec<DeviceAdapter>,
    decoder: InboundDecoder,
    router: TopicRouter,
    gateway_report: String,
}

impl Bridge {
    /// Builds a bridge from its parts.
    ///
    /// A device whose configuration is invalid is logged and left out; the
    /// remaining devices still work.
    #[must_use]
    pub fn new(
        base_topic: &str,
        devices: &[DeviceConfig],
        decoder: DecoderTable,
        templates: WireTemplates,
        clock: SharedClock,
    ) -> Self {
        let gateway_report = topics::gateway_report(base_topic);
        let mut router = TopicRouter::new(gateway_report.clone());
        let mut adapters = Vec::with_capacity(devices.len());

        for config in devices {
            let adapter = match DeviceAdapter::new(base_topic, config) {
                Ok(adapter) => adapter,
                Err(e) => {
                    tracing::error!(error = %e, "Skipping device");
                    continue;
                }
            };
            if !router.register(adapter.topics().prefix.clone(), adapters.len()) {
                let e = ConfigError::DuplicateDevice(adapter.short_name().to_string());
                tracing::error!(error = %e, "Skipping device");
                continue;
            }
            adapters.push(adapter);
        }

        if decoder.is_empty() {
            tracing::debug!("No IR codes configured for decoding");
        }

        Self {
            scheduler: Scheduler::new(topics::gateway_command(base_topic), clock.clone())
                .with_templates(templates),
            devices: adapters,
            decoder: InboundDecoder::new(decoder, clock),
            router,
            gateway_report,
        }
    }

    /// Builds a bridge from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig, clock: SharedClock) -> Self {
        Self::new(
            &config.base_topic,
            &config.devices,
            config.decoder.clone(),
            config.wire_templates(),
            clock,
        )
    }

    /// Topic filters the bridge needs to be subscribed to.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.devices
            .iter()
            .map(|d| d.topics().filter.clone())
            .chain(std::iter::once(self.gateway_report.clone()))
            .collect()
    }

    /// The configured devices.
    #[must_use]
    pub fn devices(&self) -> &[DeviceAdapter] {
        &self.devices
    }

    /// Looks up a device by short name.
    #[must_use]
    pub fn device(&self, short_name: &str) -> Option<&DeviceAdapter> {
        self.devices.iter().find(|d| d.short_name() == short_name)
    }

    /// The transmission scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Publishes every device's status after a (re)connect.
    pub fn on_connect(&mut self, publisher: &mut dyn Publisher) {
        for device in &self.devices {
            device.on_reconnect(publisher);
        }
    }

    /// Sends the next queued IR code if it is due.
    pub fn tick(&mut self, publisher: &mut dyn Publisher) -> Option<TransmitRequest> {
        self.scheduler.tick(publisher)
    }

    /// Handles one inbound bus message.
    ///
    /// Errors are for logging only; none of them leave the bridge in a
    /// different state than if the message had not arrived.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for a malformed gateway report and
    /// `Error::Lookup` for an unknown command or state.
    pub fn handle_message(
        &mut self,
        topic: &str,
        payload: &str,
        publisher: &mut dyn Publisher,
    ) -> Result<(), Error> {
        match self.router.route(topic) {
            Route::GatewayReport => {
                self.scheduler.notify_receiving();
                self.decoder.handle_report(payload, publisher)?;
            }
            Route::Device(index) => {
                if let Some(device) = self.devices.get_mut(index) {
                    device.handle_message(topic, payload, &mut self.scheduler, publisher)?;
                }
            }
            Route::Unhandled => {
                tracing::debug!(topic = %topic, "Ignoring message");
            }
        }
        Ok(())
    }
}
