//! Broadcast Relay
//!
//! Fans a single upstream payload out to every registered connection.

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

use super::messages::Frame;
use super::registry::ClientRegistry;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the frame was queued on
    pub delivered: usize,
    /// Connections too far behind to take the frame; it is lost for them
    pub dropped: usize,
    /// Connections that were already gone and have been removed
    pub failed: usize,
}

/// Pushes frames to all connections in the registry
pub struct BroadcastRelay {
    registry: Arc<ClientRegistry>,
}

impl BroadcastRelay {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Send `frame` to every connection open at the time of the call.
    ///
    /// Sends never wait on the socket, so a slow client never holds up
    /// the others. A client whose queue is full misses this frame and
    /// stays connected. A connection whose queue is closed is removed
    /// from the registry. Nothing is retried or buffered for later clients.
    pub async fn relay(&self, frame: Frame) -> BroadcastReport {
        let targets = self.registry.snapshot().await;
        let mut report = BroadcastReport::default();

        if targets.is_empty() {
            tracing::trace!(bytes = frame.len(), "No connections, dropping message");
            return report;
        }

        let mut dead = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(connection_id = %id, "Client lagging, message dropped");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(connection_id = %id, "Send failed, dropping connection");
                    dead.push(id);
                }
            }
        }

        report.failed = dead.len();
        for id in dead {
            self.registry.unregister(&id).await;
        }

        tracing::trace!(
            delivered = report.delivered,
            dropped = report.dropped,
            failed = report.failed,
            "Broadcast message"
        );
        report
    }
}
