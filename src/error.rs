//! Error types for the CDC replicator.
//!
//! This module provides a unified error type [`ReplicatorError`] for all replicator
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Decode**: malformed envelopes or payloads. Fatal for the message, never for the loop.
//! - **Sink**: timeouts and store-level failures on a single target.
//! - **Broker/Connection**: startup-time failures that abort the process.
//! - **Configuration**: invalid settings or missing configuration.
//!
//! # Example
//!
//! ```rust
//! use cdc_replicator::cdc::envelope;
//! use cdc_replicator::error::ReplicatorError;
//!
//! let err: ReplicatorError = envelope::decode(b"{not json").unwrap_err().into();
//! assert!(err.is_decode_error());
//! ```

use std::io;
use thiserror::Error;

/// Failure to turn raw message bytes into a change payload.
///
/// Every variant marks the message as poison: it is rejected without requeue.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("envelope is not a JSON object (found {0})")]
    EnvelopeNotObject(&'static str),

    #[error("malformed payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("payload is not a JSON object (found {0})")]
    PayloadNotObject(&'static str),
}

/// Main error type for replicator operations.
#[derive(Error, Debug)]
pub enum ReplicatorError {
    // Message errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    // Sink errors
    #[error("Sink {sink} write failed: {reason}")]
    SinkWrite { sink: String, reason: String },

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Document store error: {0}")]
    Store(String),

    // Broker errors
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplicatorError {
    /// Whether this error rejects the current message as poison.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, ReplicatorError::Decode(_))
    }
}

impl From<serde_json::Error> for ReplicatorError {
    fn from(e: serde_json::Error) -> Self {
        ReplicatorError::Serialization(e.to_string())
    }
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for ReplicatorError {
    fn from(e: lapin::Error) -> Self {
        ReplicatorError::Broker(e.to_string())
    }
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for ReplicatorError {
    fn from(e: mongodb::error::Error) -> Self {
        ReplicatorError::Store(e.to_string())
    }
}

/// Result type alias for replicator operations.
pub type Result<T> = std::result::Result<T, ReplicatorError>;
