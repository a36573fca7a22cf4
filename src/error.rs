// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the IR bridge.
//!
//! Runtime errors ([`ParseError`], [`LookupError`]) are local to a single
//! bus message: callers log them and carry on. [`ConfigError`] is raised
//! while loading configuration or building a device and is returned as is.
//! [`ProtocolError`] covers the MQTT connection itself.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// An inbound payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A command, state, or code was not found.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Error occurred during MQTT communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors raised while loading configuration or constructing a device.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for the expected shape.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is missing.
    #[error("device {device}: missing required field {field}")]
    MissingField {
        /// Short name of the device being configured.
        device: String,
        /// The missing field.
        field: &'static str,
    },

    /// A referenced built-in model does not exist.
    #[error("device {device}: unknown model {model}")]
    UnknownModel {
        /// Short name of the device being configured.
        device: String,
        /// The model name that was requested.
        model: String,
    },

    /// Another device already uses this short name.
    #[error("device {0}: short name already in use")]
    DuplicateDevice(String),

    /// A state or power-on entry refers to a command no code bank defines.
    #[error("device {device}: {context} refers to unknown command {command}")]
    UnknownCommand {
        /// Short name of the device being configured.
        device: String,
        /// Where the reference was found.
        context: String,
        /// The unresolved command name.
        command: String,
    },
}

/// Errors raised while parsing inbound bus payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A symbolic name did not resolve against the configured tables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No code bank defines the command.
    #[error("{device}: unknown command {command:?}")]
    UnknownCommand {
        /// Display name of the device.
        device: String,
        /// The command that was requested.
        command: String,
    },

    /// The state is neither a canonical state nor a known alias.
    #[error("{device}: unknown state {state:?}")]
    UnknownState {
        /// Display name of the device.
        device: String,
        /// The state that was requested.
        state: String,
    },
}

/// Errors related to MQTT communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The outbound publish could not be handed to the client.
    #[error("publish to {topic} failed: {message}")]
    PublishFailed {
        /// Topic of the dropped message.
        topic: String,
        /// Description of the failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
