//! # Posture Relay
//!
//! Bridges a posture-sensor MQTT topic to live browser dashboards over
//! WebSocket.
//!
//! ## Features
//!
//! - **Single subscription**: one fixed topic, reconnected forever with backoff
//! - **Fan-out**: every reading goes to every open dashboard, verbatim
//! - **Current state only**: no history, no replay; new viewers get a zero state
//! - **Isolation**: a slow or dead viewer never holds up the others
//!
//! ## Modules
//!
//! - [`upstream`]: Broker connection, reconnect policy, subscription loop
//! - [`websocket`]: Client registry, broadcast relay, connection handler
//! - [`api`]: HTTP server with Axum (WebSocket, health, static files)
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use posture_relay::upstream::{MemoryBroker, ReconnectPolicy, Topic, UpstreamSubscriber};
//! use posture_relay::websocket::{BroadcastRelay, ClientRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ClientRegistry::new());
//!     let relay = Arc::new(BroadcastRelay::new(Arc::clone(&registry)));
//!
//!     let (broker, handle) = MemoryBroker::new();
//!     let topic = Topic::new("/TEF/posture001/attrs/jsonObject")?;
//!     UpstreamSubscriber::new(broker, topic, ReconnectPolicy::default(), relay).spawn();
//!
//!     handle.publish(r#"{"postureStatus":"good","postureScore":95}"#);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod upstream;
pub mod websocket;

pub use api::{build_router, serve, AppState, ServerError};

pub use upstream::{
    Broker, LinkState, MemoryBroker, MqttBroker, ReconnectPolicy, Topic, UpstreamError,
    UpstreamSubscriber,
};

pub use websocket::{BroadcastRelay, BroadcastReport, ClientRegistry, Frame, ZeroState};

pub use config::{BrokerConfig, Config, ConfigError, LoggingConfig, ServerConfig};
