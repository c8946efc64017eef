//! Client Registry
//!
//! Tracks every open dashboard connection. The gateway inserts and
//! removes entries as sockets open and close; the broadcast relay reads
//! a point-in-time snapshot of the set and fans out without holding the
//! lock.

use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::Frame;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Outbound frames a connection may hold before readings are dropped for it
pub const CLIENT_QUEUE_CAPACITY: usize = 16;

/// Sending half of a connection's bounded outbound queue
pub type FrameSender = mpsc::Sender<Frame>;

/// Set of open dashboard connections
pub struct ClientRegistry {
    /// Active connections: ConnectionId → outbound sender
    connections: RwLock<HashMap<ConnectionId, FrameSender>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register an open connection and return its handle
    pub async fn register(&self, sender: FrameSender) -> ConnectionId {
        let id = Uuid::new_v4().to_string();
        let count = {
            let mut connections = self.connections.write().await;
            connections.insert(id.clone(), sender);
            connections.len()
        };

        tracing::info!(connection_id = %id, connections = count, "WebSocket connected");
        id
    }

    /// Remove a connection.
    ///
    /// Returns `true` if the handle was present. Removing an unknown or
    /// already removed handle is a no-op.
    pub async fn unregister(&self, id: &str) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.write().await;
            let removed = connections.remove(id).is_some();
            (removed, connections.len())
        };

        if removed {
            tracing::info!(connection_id = %id, connections = count, "WebSocket disconnected");
        }
        removed
    }

    /// Copy of the current membership, taken under a short read lock
    pub async fn snapshot(&self) -> Vec<(ConnectionId, FrameSender)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, sender)| (id.clone(), sender.clone()))
            .collect()
    }

    /// Check whether a connection is still registered
    pub async fn contains(&self, id: &str) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
