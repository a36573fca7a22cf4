// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing of inbound topics to bridge components.
//!
//! ```text
//! home/tv/set-state → HDMI1
//!         ↓
//!   TopicRouter.route()
//!         ↓
//!   longest registered prefix "home/tv"
//!         ↓
//!   Route::Device(0)
//! ```

use std::collections::HashMap;

/// Where an inbound message should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A code report from the IR gateway.
    GatewayReport,
    /// A message for the device at this index.
    Device(usize),
    /// Nothing handles this topic.
    Unhandled,
}

/// Maps topics to the component that handles them.
#[derive(Debug, Default)]
pub struct TopicRouter {
    gateway_report: String,
    devices: HashMap<String, usize>,
}

impl TopicRouter {
    /// Creates a router that sends `gateway_report` to the gateway route.
    #[must_use]
    pub fn new(gateway_report: impl Into<String>) -> Self {
        Self {
            gateway_report: gateway_report.into(),
            devices: HashMap::new(),
        }
    }

    /// Registers a device topic prefix.
    ///
    /// Returns `false` if the prefix was already taken.
    pub fn register(&mut self, prefix: impl Into<String>, index: usize) -> bool {
        let prefix = prefix.into();
        if self.devices.contains_key(&prefix) {
            return false;
        }
        tracing::debug!(prefix = %prefix, index, "Registering device for routing");
        self.devices.insert(prefix, index);
        true
    }

    /// Resolves the route for `topic`.
    #[must_use]
    pub fn route(&self, topic: &str) -> Route {
        if topic == self.gateway_report {
            return Route::GatewayReport;
        }

        let mut end = topic.len();
        while let Some(slash) = topic[..end].rfind('/') {
            if let Some(&index) = self.devices.get(&topic[..slash]) {
                return Route::Device(index);
            }
            end = slash;
        }

        tracing::trace!(topic = %topic, "No route for topic");
        Route::Unhandled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> TopicRouter {
        let mut router = TopicRouter::new("home/ir-gateway/IRtoMQTT");
        router.register("home/tv", 0);
        router.register("home/amp", 1);
        router
    }

    #[test]
    fn gateway_report() {
        assert_eq!(router().route("home/ir-gateway/IRtoMQTT"), Route::GatewayReport);
    }

    #[test]
    fn device_topics() {
        let router = router();
        assert_eq!(router.route("home/tv/remote"), Route::Device(0));
        assert_eq!(router.route("home/amp/set-state"), Route::Device(1));
        assert_eq!(router.route("home/amp/some/deeper/topic"), Route::Device(1));
    }

    #[test]
    fn unhandled_topics() {
        let router = router();
        assert_eq!(router.route("home/tv"), Route::Unhandled);
        assert_eq!(router.route("home/projector/remote"), Route::Unhandled);
        assert_eq!(router.route("home/ir-gateway/commands/MQTTtoIR"), Route::Unhandled);
        assert_eq!(router.route(""), Route::Unhandled);
    }

    #[test]
    fn duplicate_prefix_is_rejected() {
        let mut router = router();
        assert!(!router.register("home/tv", 5));
        assert_eq!(router.route("home/tv/remote"), Route::Device(0));
    }
}
