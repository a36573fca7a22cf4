// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration, loaded once at startup.
//!
//! # Examples
//!
//! ```
//! use ir_bridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::from_json_str(r#"{
//!     "base_topic": "home",
//!     "broker": { "host": "192.168.1.50" },
//!     "devices": [
//!         { "short_name": "tv", "name": "Lounge TV", "model": "sony_bravia",
//!           "input_friendly_names": { "HDMI1": "Blu-ray" } }
//!     ],
//!     "decoder": {
//!         "NEC": { "0x20DF10EF": { "topic": "home/tv/set-state", "payload": "Off" } }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.broker.port, 1883);
//! assert_eq!(config.devices.len(), 1);
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::decoder::DecoderTable;
use crate::device::DeviceConfig;
use crate::error::ConfigError;
use crate::scheduler::{WireFormat, WireTemplates};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BridgeConfig {
    /// Prefix for every topic the bridge uses.
    pub base_topic: String,
    /// Broker connection settings.
    pub broker: BrokerConfig,
    /// How often the event loop polls the scheduler.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Retry behaviour after the connection drops.
    #[serde(default)]
    pub reconnection: ReconnectionPolicy,
    /// Per-protocol payload overrides, merged over the built-in ones.
    #[serde(default)]
    pub wire_templates: HashMap<String, WireFormat>,
    /// IR-controlled appliances.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Received-code table.
    #[serde(default)]
    pub decoder: DecoderTable,
}

fn default_tick_interval_ms() -> u64 {
    50
}

impl BridgeConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or lacks a required top-level
    /// field.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Scheduler polling interval.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Built-in wire templates with this configuration's overrides applied.
    #[must_use]
    pub fn wire_templates(&self) -> WireTemplates {
        self.wire_templates
            .iter()
            .fold(WireTemplates::default(), |templates, (protocol, format)| {
                templates.with(protocol.clone(), *format)
            })
    }
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// Password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,
    /// Fixed client ID; generated when absent.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_connection_timeout_secs() -> u64 {
    10
}

impl BrokerConfig {
    /// Returns `(username, password)` when both are set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

/// Configuration for automatic reconnection.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ir_bridge::config::ReconnectionPolicy;
///
/// let policy = ReconnectionPolicy::new()
///     .with_max_retries(5)
///     .with_initial_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(30));
///
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectionPolicy {
    /// Whether automatic reconnection is enabled.
    pub enabled: bool,
    /// Maximum number of consecutive failures (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay between retry attempts, in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retry attempts, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f32,
}

impl ReconnectionPolicy {
    /// Creates a new reconnection policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled reconnection policy.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets infinite retries.
    #[must_use]
    pub fn with_infinite_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    /// Sets the initial delay between retry attempts.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = duration_to_ms(delay);
        self
    }

    /// Sets the maximum delay between retry attempts.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = duration_to_ms(delay);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay for a given retry attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial = Duration::from_millis(self.initial_delay_ms);
        let max = Duration::from_millis(self.max_delay_ms);
        if attempt == 0 {
            return initial.min(max);
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Safe: initial delays are seconds, nowhere near f32 precision limits
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay_ms as f32 * multiplier;

        // Safe: delay_ms is non-negative; overflow saturates
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(max)
    }

    /// Returns true if another retry should be attempted.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: None,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{"base_topic": "home", "broker": {"host": "localhost"}}"#;

    #[test]
    fn minimal_config_defaults() {
        let config = BridgeConfig::from_json_str(MINIMAL).unwrap();

        assert_eq!(config.base_topic, "home");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.keep_alive_secs, 30);
        assert_eq!(config.broker.connection_timeout_secs, 10);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
        assert!(config.devices.is_empty());
        assert!(config.decoder.is_empty());
        assert!(config.reconnection.enabled);
    }

    #[test]
    fn missing_broker_is_error() {
        let err = BridgeConfig::from_json_str(r#"{"base_topic": "home"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = BridgeConfig::from_file("/nonexistent/ir-bridge.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn broken_device_does_not_fail_parsing() {
        let json = r#"{
            "base_topic": "home",
            "broker": {"host": "localhost"},
            "devices": [{"name": "No short name"}]
        }"#;
        let config = BridgeConfig::from_json_str(json).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert!(config.devices[0].short_name.is_empty());
    }

    #[test]
    fn credentials_need_both_parts() {
        let json = r#"{"host": "h", "username": "u"}"#;
        let broker: BrokerConfig = serde_json::from_str(json).unwrap();
        assert!(broker.credentials().is_none());

        let json = r#"{"host": "h", "username": "u", "password": "p"}"#;
        let broker: BrokerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(broker.credentials(), Some(("u", "p")));
    }

    #[test]
    fn wire_template_overrides_merge() {
        let json = r#"{
            "base_topic": "home",
            "broker": {"host": "localhost"},
            "wire_templates": {"RC6": {"repeat": 2}}
        }"#;
        let templates = BridgeConfig::from_json_str(json).unwrap().wire_templates();

        assert_eq!(templates.format_for("RC6").repeat, Some(2));
        assert_eq!(templates.format_for("SONY").repeat, Some(3));
    }

    #[test]
    fn zero_tick_interval_is_clamped() {
        let json = r#"{"base_topic": "home", "broker": {"host": "h"}, "tick_interval_ms": 0}"#;
        let config = BridgeConfig::from_json_str(json).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn reconnection_policy_disabled() {
        let policy = ReconnectionPolicy::disabled();

        assert!(!policy.enabled);
        assert!(!policy.should_retry(0));
    }

    #[test]
    fn reconnection_delay_calculation() {
        let policy = ReconnectionPolicy::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10));

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(10));
    }

    #[test]
    fn reconnection_should_retry() {
        let policy = ReconnectionPolicy::new().with_max_retries(3);

        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(ReconnectionPolicy::new().with_infinite_retries().should_retry(1000));
    }

    #[test]
    fn reconnection_policy_from_json() {
        let policy: ReconnectionPolicy =
            serde_json::from_str(r#"{"max_retries": 5, "initial_delay_ms": 250}"#).unwrap();

        assert!(policy.enabled);
        assert_eq!(policy.max_retries, Some(5));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
    }
}
