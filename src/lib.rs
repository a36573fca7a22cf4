// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ir_bridge` - An MQTT to infrared bridge.
//!
//! Appliances that only understand infrared (TVs, amplifiers, projectors)
//! are exposed on an MQTT bus. The bridge translates symbolic commands into
//! IR codes for an MQTT-attached IR gateway, tracks each appliance's logical
//! state, and turns IR codes received by the gateway back into bus messages.
//!
//! # Components
//!
//! - **Scheduler** ([`scheduler`]): a FIFO of IR codes, sent no closer
//!   together than [`scheduler::MIN_GAP`] and deferred while the gateway
//!   is receiving
//! - **Device adapter** ([`device`]): remote commands and state transitions
//!   for one appliance, with a retained status snapshot
//! - **Inbound decoder** ([`decoder`]): received IR codes mapped to
//!   republish actions, with repeat suppression
//! - **Bridge** ([`bridge`]): routing between the bus and the components
//!
//! # Topics
//!
//! | Topic | Direction | Payload |
//! |-------|-----------|---------|
//! | `<base>/<device>/remote` | in | command name |
//! | `<base>/<device>/set-state` | in | state or friendly name |
//! | `<base>/<device>/status` | out, retained | `{"state":..,"friendly_name":..}` |
//! | `<base>/ir-gateway/commands/MQTTtoIR` | out | IR code JSON |
//! | `<base>/ir-gateway/IRtoMQTT` | in | received IR code JSON |
//!
//! # Quick Start
//!
//! ```no_run
//! use ir_bridge::bridge::runner;
//! use ir_bridge::config::BridgeConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::from_file("bridge.json")?;
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     runner::serve(&config, shutdown).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `mqtt` (default): rumqttc transport, [`bridge::runner`], and the
//!   `ir-bridge` binary

pub mod bridge;
pub mod bus;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod scheduler;
pub mod topics;
pub mod types;

pub use bridge::Bridge;
pub use bus::{MemoryPublisher, Publisher};
pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use config::{BridgeConfig, BrokerConfig, ReconnectionPolicy};
pub use decoder::{DecoderTable, InboundDecoder, RepublishAction};
pub use device::{DeviceAdapter, DeviceConfig, DeviceState};
pub use error::{ConfigError, Error, LookupError, ParseError, ProtocolError, Result};
pub use scheduler::{Scheduler, TransmitRequest};
pub use types::IrCode;
