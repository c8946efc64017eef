//! Upstream error types
//!
//! Defines the errors that can occur while talking to the broker.
//! None of them are fatal: the subscriber logs them and reconnects.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur on the broker link
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Transport or protocol failure reported by the MQTT client
    #[error("Connection error: {0}")]
    Connection(String),

    /// Broker closed the session
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Connect handshake did not finish in time
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// Broker refused the subscription
    #[error("Subscription to {topic} rejected: {reason}")]
    SubscribeRejected { topic: String, reason: String },

    /// Request could not be queued on the client
    #[error("Client error: {0}")]
    Client(String),

    /// Read attempted without an established session
    #[error("Not connected")]
    NotConnected,
}

impl From<rumqttc::ConnectionError> for UpstreamError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        UpstreamError::Connection(err.to_string())
    }
}

impl From<rumqttc::ClientError> for UpstreamError {
    fn from(err: rumqttc::ClientError) -> Self {
        UpstreamError::Client(err.to_string())
    }
}

/// Errors raised when validating a topic name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("Topic must not be empty")]
    Empty,

    #[error("Topic {0:?} contains a wildcard; exactly one concrete topic is relayed")]
    Wildcard(String),

    #[error("Topic {0:?} contains a NUL character")]
    Nul(String),

    #[error("Topic is {0} bytes long (limit: 65535)")]
    TooLong(usize),
}
