//! Upstream Telemetry Feed
//!
//! Subscribes to the sensor topic on the MQTT broker and forwards every
//! payload to the [`BroadcastRelay`](crate::websocket::BroadcastRelay).
//!
//! ## Architecture
//!
//! - **Broker**: trait over a single-topic pub/sub session
//! - **MqttBroker**: `rumqttc` implementation
//! - **MemoryBroker**: in-process implementation for demos and tests
//! - **ReconnectPolicy / Backoff**: delay between connection attempts
//! - **UpstreamSubscriber**: connect → subscribe → relay loop, forever
//!
//! Delivery is at-most-once. Messages published while the link is down
//! are not recovered.

mod backoff;
mod broker;
mod error;
mod mqtt;
mod subscriber;
mod topic;

pub use backoff::{
    Backoff, ReconnectPolicy, DEFAULT_INITIAL_DELAY_MS, DEFAULT_JITTER_FACTOR, MIN_DELAY_MS,
    DEFAULT_MAX_DELAY_MS, DEFAULT_MULTIPLIER,
};
pub use broker::{Broker, MemoryBroker, MemoryBrokerHandle};
pub use error::{TopicError, UpstreamError};
pub use mqtt::MqttBroker;
pub use subscriber::{LinkState, UpstreamSubscriber};
pub use topic::Topic;
