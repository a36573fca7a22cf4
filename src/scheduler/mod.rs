// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Throttled IR transmission queue.
//!
//! IR receivers miss codes that arrive back to back, and the gateway cannot
//! transmit cleanly while it is receiving. The [`Scheduler`] therefore
//! sends at most one code per [`MIN_GAP`], and pushes its next transmission
//! out by [`MIN_GAP`] whenever the gateway reports incoming IR.
//!
//! The scheduler has no timer of its own. The event loop calls
//! [`Scheduler::tick`] periodically, and all mutation happens on that one
//! task.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use ir_bridge::bus::MemoryPublisher;
//! use ir_bridge::clock::ManualClock;
//! use ir_bridge::scheduler::{Scheduler, TransmitRequest};
//! use ir_bridge::types::IrCode;
//!
//! let clock = ManualClock::new();
//! let mut scheduler = Scheduler::new("home/ir-gateway/commands/MQTTtoIR", clock.shared());
//! let mut bus = MemoryPublisher::new();
//!
//! scheduler.enqueue(TransmitRequest::new("TV", "Mute", IrCode::new("NEC", 32, "0x20DF906F")));
//! scheduler.enqueue(TransmitRequest::new("TV", "Info", IrCode::new("NEC", 32, "0x20DF55AA")));
//!
//! assert!(scheduler.tick(&mut bus).is_some());
//! assert!(scheduler.tick(&mut bus).is_none());
//!
//! clock.advance(Duration::from_millis(500));
//! assert!(scheduler.tick(&mut bus).is_some());
//! ```

mod wire;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub use wire::{WireFormat, WireTemplates};

use crate::bus::Publisher;
use crate::clock::SharedClock;
use crate::types::IrCode;

/// Minimum spacing between IR activity on the gateway.
pub const MIN_GAP: Duration = Duration::from_millis(500);

/// A pending IR transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequest {
    device: String,
    command: String,
    code: IrCode,
}

impl TransmitRequest {
    /// Creates a request to send `code` on behalf of `device`.
    #[must_use]
    pub fn new(device: impl Into<String>, command: impl Into<String>, code: IrCode) -> Self {
        Self {
            device: device.into(),
            command: command.into(),
            code,
        }
    }

    /// Display name of the device that asked for this transmission.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Symbolic command name, for logging.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The code to send.
    #[must_use]
    pub fn code(&self) -> &IrCode {
        &self.code
    }
}

/// FIFO queue of IR transmissions with a minimum gap between them.
///
/// # Invariants
///
/// - `next_due` is `None` exactly when the queue is empty.
/// - When set, `next_due` is no earlier than `last_ir_activity + MIN_GAP`.
#[derive(Debug)]
pub struct Scheduler {
    queue: VecDeque<TransmitRequest>,
    last_ir_activity: Option<Instant>,
    next_due: Option<Instant>,
    clock: SharedClock,
    templates: WireTemplates,
    command_topic: String,
}

impl Scheduler {
    /// Creates an empty scheduler publishing to `command_topic`.
    #[must_use]
    pub fn new(command_topic: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            queue: VecDeque::new(),
            last_ir_activity: None,
            next_due: None,
            clock,
            templates: WireTemplates::default(),
            command_topic: command_topic.into(),
        }
    }

    /// Replaces the wire templates.
    #[must_use]
    pub fn with_templates(mut self, templates: WireTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Topic transmissions are published on.
    #[must_use]
    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// When the head of the queue may be sent.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Time left until the head of the queue may be sent.
    ///
    /// `Some(Duration::ZERO)` if it is already due.
    #[must_use]
    pub fn time_until_due(&self) -> Option<Duration> {
        self.next_due
            .map(|due| due.saturating_duration_since(self.clock.now()))
    }

    /// Appends a request to the tail of the queue.
    pub fn enqueue(&mut self, request: TransmitRequest) {
        tracing::info!(
            device = %request.device,
            command = %request.command,
            "Queueing IR command"
        );
        self.queue.push_back(request);
        self.recompute_due(self.clock.now());
    }

    /// Records that the gateway is receiving IR right now.
    ///
    /// Nothing is sent until [`MIN_GAP`] after the latest notification.
    pub fn notify_receiving(&mut self) {
        let now = self.clock.now();
        tracing::debug!(pending = self.queue.len(), "Gateway is receiving IR");
        self.last_ir_activity = Some(now);
        self.recompute_due(now);
    }

    /// Sends the head of the queue if it is due.
    ///
    /// Returns the request that was sent. A publish failure is logged and
    /// the request is dropped; there is no retry.
    pub fn tick(&mut self, publisher: &mut dyn Publisher) -> Option<TransmitRequest> {
        let now = self.clock.now();
        if now < self.next_due? {
            return None;
        }
        let request = self.queue.pop_front()?;

        match self.templates.render(&request.code) {
            Ok(payload) => {
                tracing::info!(
                    device = %request.device,
                    command = %request.command,
                    code = %request.code,
                    "Sending IR"
                );
                if let Err(e) = publisher.publish(&self.command_topic, &payload, false) {
                    tracing::warn!(
                        device = %request.device,
                        command = %request.command,
                        error = %e,
                        "IR transmission dropped"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(command = %request.command, error = %e, "Failed to encode IR command");
            }
        }

        self.last_ir_activity = Some(now);
        self.recompute_due(now);
        Some(request)
    }

    fn recompute_due(&mut self, now: Instant) {
        self.next_due = if self.queue.is_empty() {
            None
        } else {
            Some(match self.last_ir_activity {
                Some(last) => now.max(last + MIN_GAP),
                None => now,
            })
        };
    }
}
