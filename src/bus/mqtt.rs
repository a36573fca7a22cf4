// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection for the bridge.
//!
//! Unlike a client that spawns its own event loop task, [`MqttBus`] hands
//! the rumqttc [`EventLoop`] to the caller. The bridge runner polls it on the
//! same task that owns the scheduler, so queue and device state are never
//! shared across tasks.
//!
//! # Examples
//!
//! ```no_run
//! use ir_bridge::bus::MqttBus;
//!
//! # async fn example() -> Result<(), ir_bridge::error::ProtocolError> {
//! let bus = MqttBus::builder()
//!     .host("192.168.1.50")
//!     .port(1883)
//!     .credentials("user", "password")
//!     .connect()
//!     .await?;
//!
//! println!("Connected to {}:{}", bus.host(), bus.port());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};

use crate::bus::Publisher;
use crate::error::ProtocolError;

/// Global counter for generating unique client IDs.
static BUS_CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Capacity of the rumqttc request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on flushing the `Disconnect` packet.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for an MQTT broker connection.
#[derive(Debug, Clone)]
struct MqttBusConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    client_id: Option<String>,
    keep_alive: Duration,
    connection_timeout: Duration,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            client_id: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// A connected MQTT broker session.
pub struct MqttBus {
    client: AsyncClient,
    event_loop: EventLoop,
    host: String,
    port: u16,
}

impl MqttBus {
    /// Creates a new builder for configuring an MQTT broker connection.
    #[must_use]
    pub fn builder() -> MqttBusBuilder {
        MqttBusBuilder::default()
    }

    /// Returns the host address of the broker.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port of the broker.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns a publisher that shares this connection.
    #[must_use]
    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }

    /// Queues subscriptions for every topic filter.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be queued on the client.
    pub fn subscribe_all<I, S>(&self, filters: I) -> Result<(), ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for filter in filters {
            let filter = filter.into();
            tracing::debug!(topic = %filter, "Subscribing");
            self.client
                .try_subscribe(filter, QoS::AtMostOnce)
                .map_err(ProtocolError::Mqtt)?;
        }
        Ok(())
    }

    /// Polls the underlying event loop for the next event.
    ///
    /// rumqttc reconnects on the next poll after a connection error.
    ///
    /// # Errors
    ///
    /// Returns error if the connection failed.
    pub async fn poll(&mut self) -> Result<Event, ProtocolError> {
        self.event_loop
            .poll()
            .await
            .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))
    }

    /// Disconnects from the broker.
    ///
    /// The event loop is polled until the `Disconnect` packet has gone out,
    /// for at most [`DISCONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        tracing::info!(host = %self.host, port = %self.port, "Disconnecting from MQTT broker");
        self.client.try_disconnect().map_err(ProtocolError::Mqtt)?;

        let flush = async {
            loop {
                match self.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
            tracing::debug!("Disconnect not flushed before timeout");
        }
        Ok(())
    }
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// Publishes through a shared [`AsyncClient`] without awaiting.
#[derive(Debug, Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), ProtocolError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.as_bytes().to_vec())
            .map_err(ProtocolError::Mqtt)
    }
}

/// Builder for creating an MQTT broker connection.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use ir_bridge::bus::MqttBus;
///
/// # async fn example() -> Result<(), ir_bridge::error::ProtocolError> {
/// let bus = MqttBus::builder()
///     .host("192.168.1.50")
///     .keep_alive(Duration::from_secs(60))
///     .connection_timeout(Duration::from_secs(5))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MqttBusBuilder {
    config: MqttBusConfig,
}

impl MqttBusBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets a fixed client ID instead of a generated one.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Connects to the broker and waits for the `ConnAck`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set
    /// - Connection fails
    /// - Connection times out
    pub async fn connect(self) -> Result<MqttBus, ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let client_id = self.config.client_id.clone().unwrap_or_else(|| {
            let counter = BUS_CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("ir_bridge_{}_{}", std::process::id(), counter)
        });

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, wait_for_connack(&mut event_loop)).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    client_id = %client_id,
                    "Connected to MQTT broker"
                );
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                )));
            }
        }

        Ok(MqttBus {
            client,
            event_loop,
            host: self.config.host,
            port: self.config.port,
        })
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), ProtocolError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => return Err(ProtocolError::ConnectionFailed(e.to_string())),
        }
    }
}
