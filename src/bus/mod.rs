// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message bus integration.
//!
//! Everything that leaves the bridge goes through the [`Publisher`] trait.
//! The MQTT implementation lives in [`MqttBus`]; [`MemoryPublisher`] records
//! messages instead of sending them and is what the tests use.

#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBus, MqttBusBuilder, MqttPublisher};

use crate::error::ProtocolError;

/// The publish side of the message bus.
pub trait Publisher {
    /// Publishes `payload` on `topic`.
    ///
    /// Implementations must not block: the bridge calls this from its
    /// event loop.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message could not be handed to the bus.
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError>;
}

/// A message captured by [`MemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Message body.
    pub payload: String,
    /// Whether the retain flag was set.
    pub retain: bool,
}

/// A [`Publisher`] that keeps every message in memory.
///
/// # Examples
///
/// ```
/// use ir_bridge::bus::{MemoryPublisher, Publisher};
///
/// let mut bus = MemoryPublisher::new();
/// bus.publish("home/tv/status", "{}", true).unwrap();
/// assert_eq!(bus.messages()[0].topic, "home/tv/status");
/// ```
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Vec<PublishedMessage>,
    reject: bool,
}

impl MemoryPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that rejects every message.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            messages: Vec::new(),
            reject: true,
        }
    }

    /// Returns all captured messages in publish order.
    #[must_use]
    pub fn messages(&self) -> &[PublishedMessage] {
        &self.messages
    }

    /// Returns captured messages for one topic.
    #[must_use]
    pub fn on_topic(&self, topic: &str) -> Vec<&PublishedMessage> {
        self.messages.iter().filter(|m| m.topic == topic).collect()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError> {
        if self.reject {
            return Err(ProtocolError::PublishFailed {
                topic: topic.to_string(),
                message: "publisher rejects all messages".to_string(),
            });
        }
        self.messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }
}
