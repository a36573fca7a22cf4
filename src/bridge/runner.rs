// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drives a [`Bridge`] against a live MQTT broker.
//!
//! One task polls the rumqttc event loop and a tick interval side by side.
//! Inbound messages and scheduler ticks are therefore handled one at a time
//! and the bridge needs no locking.

use std::future::Future;
use std::time::Duration;

use rumqttc::{Event, Packet, Publish};
use tokio::time::MissedTickBehavior;

use crate::bridge::Bridge;
use crate::bus::{MqttBus, MqttPublisher, Publisher};
use crate::clock::MonotonicClock;
use crate::config::{BridgeConfig, BrokerConfig, ReconnectionPolicy};
use crate::error::{self, ProtocolError};

/// Connects to the configured broker and runs the bridge until `shutdown`
/// completes or the connection is lost for good.
///
/// # Errors
///
/// Returns `Error::Protocol` if the broker cannot be reached within the
/// reconnection policy's retry budget.
pub async fn serve<F>(config: &BridgeConfig, shutdown: F) -> error::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let bus = tokio::select! {
        bus = connect_with_retry(&config.broker, &config.reconnection) => bus?,
        () = &mut shutdown => return Ok(()),
    };
    let bridge = Bridge::from_config(config, MonotonicClock::shared());
    tracing::info!(
        devices = bridge.devices().len(),
        base_topic = %config.base_topic,
        "Bridge started"
    );
    run(bridge, bus, config.tick_interval(), &config.reconnection, shutdown).await?;
    Ok(())
}

/// Runs the bridge on an already connected bus.
///
/// Subscriptions and status snapshots are re-sent after every `ConnAck`,
/// so a broker restart is recovered transparently. When `shutdown`
/// completes the bus is disconnected and `Ok(())` is returned.
///
/// # Errors
///
/// Returns error once the reconnection policy gives up.
pub async fn run<F>(
    mut bridge: Bridge,
    mut bus: MqttBus,
    tick_interval: Duration,
    policy: &ReconnectionPolicy,
    shutdown: F,
) -> Result<(), ProtocolError>
where
    F: Future<Output = ()>,
{
    let mut publisher = bus.publisher();
    resume_session(&mut bridge, &mut publisher, |filters| bus.subscribe_all(filters));

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures: u32 = 0;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                if let Err(e) = bus.disconnect().await {
                    tracing::warn!(error = %e, "Failed to disconnect cleanly");
                }
                return Ok(());
            }
            _ = ticker.tick() => {
                bridge.tick(&mut publisher);
            }
            event = bus.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    tracing::info!(?connack, "Reconnected to MQTT broker");
                    failures = 0;
                    resume_session(&mut bridge, &mut publisher, |filters| bus.subscribe_all(filters));
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handle_publish(&mut bridge, &publish, &mut publisher);
                }
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    tracing::debug!(?suback, "MQTT subscription acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    if !policy.should_retry(failures) {
                        tracing::error!(error = %e, "Giving up on MQTT broker");
                        return Err(e);
                    }
                    let delay = policy.delay_for_attempt(failures);
                    failures = failures.saturating_add(1);
                    tracing::warn!(
                        error = %e,
                        attempt = failures,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "MQTT connection lost, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Subscribes the bridge's topics and republishes every status snapshot.
///
/// A subscription that cannot be queued is logged; the session carries on
/// and the next `ConnAck` tries again.
fn resume_session<S>(bridge: &mut Bridge, publisher: &mut dyn Publisher, subscribe: S)
where
    S: FnOnce(Vec<String>) -> Result<(), ProtocolError>,
{
    if let Err(e) = subscribe(bridge.subscriptions()) {
        tracing::warn!(error = %e, "Failed to queue subscriptions");
    }
    bridge.on_connect(publisher);
}

fn handle_publish(bridge: &mut Bridge, publish: &Publish, publisher: &mut MqttPublisher) {
    let Ok(payload) = std::str::from_utf8(&publish.payload) else {
        tracing::warn!(topic = %publish.topic, "Ignoring non-UTF-8 payload");
        return;
    };
    tracing::debug!(topic = %publish.topic, payload = %payload, "MQTT message received");
    if let Err(e) = bridge.handle_message(&publish.topic, payload, publisher) {
        tracing::warn!(topic = %publish.topic, error = %e, "Failed to handle message");
    }
}

async fn connect_with_retry(
    broker: &BrokerConfig,
    policy: &ReconnectionPolicy,
) -> Result<MqttBus, ProtocolError> {
    let mut attempt = 0;
    loop {
        let mut builder = MqttBus::builder()
            .host(&broker.host)
            .port(broker.port)
            .keep_alive(Duration::from_secs(broker.keep_alive_secs))
            .connection_timeout(Duration::from_secs(broker.connection_timeout_secs));
        if let Some((username, password)) = broker.credentials() {
            builder = builder.credentials(username, password);
        }
        if let Some(client_id) = &broker.client_id {
            builder = builder.client_id(client_id);
        }

        match builder.connect().await {
            Ok(bus) => return Ok(bus),
            Err(e @ ProtocolError::InvalidAddress(_)) => return Err(e),
            Err(e) if policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                attempt += 1;
                tracing::warn!(error = %e, attempt, "MQTT connect failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryPublisher;

    #[tokio::test]
    async fn empty_host_is_not_retried() {
        let broker = BrokerConfig {
            host: String::new(),
            port: 1883,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 30,
            connection_timeout_secs: 1,
        };

        let err = connect_with_retry(&broker, &ReconnectionPolicy::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn unreachable_broker_gives_up_when_disabled() {
        let broker = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 30,
            connection_timeout_secs: 1,
        };

        let err = connect_with_retry(&broker, &ReconnectionPolicy::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionFailed(_)));
    }

    fn bridge() -> Bridge {
        use crate::clock::ManualClock;
        use crate::decoder::DecoderTable;
        use crate::device::DeviceConfig;
        use crate::scheduler::WireTemplates;

        Bridge::new(
            "home",
            &[DeviceConfig::new("tv").with_model("sony_bravia")],
            DecoderTable::default(),
            WireTemplates::default(),
            ManualClock::new().shared(),
        )
    }

    #[test]
    fn resume_session_subscribes_and_publishes_status() {
        let mut bridge = bridge();
        let mut bus = MemoryPublisher::new();
        let mut subscribed = Vec::new();

        resume_session(&mut bridge, &mut bus, |filters| {
            subscribed = filters;
            Ok(())
        });

        assert_eq!(subscribed, ["home/tv/#", "home/ir-gateway/IRtoMQTT"]);
        assert_eq!(bus.on_topic("home/tv/status").len(), 1);
    }

    #[test]
    fn failed_subscription_keeps_session_alive() {
        let mut bridge = bridge();
        let mut bus = MemoryPublisher::new();

        resume_session(&mut bridge, &mut bus, |_| {
            Err(ProtocolError::ConnectionFailed("request channel full".to_string()))
        });

        let status = bus.on_topic("home/tv/status");
        assert_eq!(status.len(), 1);
        assert!(status[0].retain);
    }
}
