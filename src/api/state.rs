//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::upstream::{LinkState, Topic};
use crate::websocket::ClientRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Open dashboard connections
    pub registry: Arc<ClientRegistry>,
    /// Broker link state published by the upstream subscriber
    pub link_state: watch::Receiver<LinkState>,
    /// Topic being relayed
    pub topic: Topic,
    /// Dashboard files, if served by this process
    pub static_dir: Option<PathBuf>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        registry: Arc<ClientRegistry>,
        link_state: watch::Receiver<LinkState>,
        topic: Topic,
    ) -> Self {
        Self {
            registry,
            link_state,
            topic,
            static_dir: None,
            start_time: Instant::now(),
        }
    }

    /// Serve dashboard files from `dir`
    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Current broker link state
    pub fn upstream_state(&self) -> LinkState {
        *self.link_state.borrow()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.registry.connection_count().await
    }
}
