//! Broker abstraction
//!
//! The subscriber talks to the broker through [`Broker`] so the
//! reconnect loop does not depend on a live MQTT server. [`MqttBroker`]
//! is the production implementation; [`MemoryBroker`] is an in-process
//! broker driven by a [`MemoryBrokerHandle`], used for demos and tests.
//!
//! [`MqttBroker`]: super::MqttBroker

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::UpstreamError;
use super::topic::Topic;

/// A pub/sub session carrying a single topic
#[async_trait]
pub trait Broker: Send {
    /// Human-readable address, for logs
    fn endpoint(&self) -> String;

    /// Open a fresh session and subscribe to `topic`.
    ///
    /// Returns once the broker has acknowledged the subscription. Any
    /// previous session is discarded.
    async fn connect(&mut self, topic: &Topic) -> Result<(), UpstreamError>;

    /// Wait for the next payload published on the subscribed topic.
    ///
    /// An error means the session is gone and [`Broker::connect`] must
    /// be called again.
    async fn next_message(&mut self) -> Result<Bytes, UpstreamError>;
}

enum BrokerEvent {
    Publish(Bytes),
    Disconnect,
}

#[derive(Default)]
struct MemoryBrokerShared {
    reachable: AtomicBool,
    connected: AtomicBool,
    connects: AtomicUsize,
}

/// In-process broker.
///
/// Messages published while no session is open are discarded, the same
/// way a real broker drops QoS 0 traffic for an absent clean-session
/// subscriber.
pub struct MemoryBroker {
    events: mpsc::UnboundedReceiver<BrokerEvent>,
    shared: Arc<MemoryBrokerShared>,
}

/// Control side of a [`MemoryBroker`]
#[derive(Clone)]
pub struct MemoryBrokerHandle {
    events: mpsc::UnboundedSender<BrokerEvent>,
    shared: Arc<MemoryBrokerShared>,
}

impl MemoryBroker {
    /// Create a reachable broker and its control handle
    pub fn new() -> (Self, MemoryBrokerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(MemoryBrokerShared::default());
        shared.reachable.store(true, Ordering::SeqCst);

        let broker = Self {
            events: rx,
            shared: Arc::clone(&shared),
        };
        let handle = MemoryBrokerHandle { events: tx, shared };
        (broker, handle)
    }
}

impl MemoryBrokerHandle {
    /// Publish on the subscribed topic.
    ///
    /// Returns `false` if no session was open and the message was dropped.
    pub fn publish(&self, payload: impl Into<Bytes>) -> bool {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.events.send(BrokerEvent::Publish(payload.into())).is_ok()
    }

    /// Drop the current session, as a network failure would
    pub fn disconnect(&self) {
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(BrokerEvent::Disconnect);
        }
    }

    /// Make future connection attempts fail or succeed
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Number of connection attempts seen so far
    pub fn connect_attempts(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn endpoint(&self) -> String {
        "memory".to_string()
    }

    async fn connect(&mut self, _topic: &Topic) -> Result<(), UpstreamError> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);

        if !self.shared.reachable.load(Ordering::SeqCst) {
            return Err(UpstreamError::Connection("broker unreachable".to_string()));
        }

        // Anything left over from the previous session is gone
        while self.events.try_recv().is_ok() {}

        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Bytes, UpstreamError> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(UpstreamError::NotConnected);
        }

        match self.events.recv().await {
            Some(BrokerEvent::Publish(payload)) => Ok(payload),
            Some(BrokerEvent::Disconnect) => {
                Err(UpstreamError::ConnectionLost("session dropped".to_string()))
            }
            None => {
                self.shared.connected.store(false, Ordering::SeqCst);
                Err(UpstreamError::ConnectionLost("broker shut down".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic::new("sensors/posture").unwrap()
    }

    #[tokio::test]
    async fn test_publish_requires_session() {
        let (mut broker, handle) = MemoryBroker::new();
        assert!(!handle.publish("early"));

        broker.connect(&topic()).await.unwrap();
        assert!(handle.is_connected());
        assert!(handle.publish("reading"));
        assert_eq!(broker.next_message().await.unwrap(), Bytes::from("reading"));
    }

    #[tokio::test]
    async fn test_disconnect_ends_session() {
        let (mut broker, handle) = MemoryBroker::new();
        broker.connect(&topic()).await.unwrap();

        handle.disconnect();
        assert!(!handle.is_connected());
        assert!(matches!(
            broker.next_message().await,
            Err(UpstreamError::ConnectionLost(_))
        ));
        assert!(!handle.publish("missed"));
    }

    #[tokio::test]
    async fn test_unreachable_broker() {
        let (mut broker, handle) = MemoryBroker::new();
        handle.set_reachable(false);

        assert!(broker.connect(&topic()).await.is_err());
        assert_eq!(handle.connect_attempts(), 1);

        handle.set_reachable(true);
        assert!(broker.connect(&topic()).await.is_ok());
        assert_eq!(handle.connect_attempts(), 2);
    }
}
