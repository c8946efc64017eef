//! Upstream Subscriber
//!
//! Keeps one subscription to the telemetry topic alive for the life of
//! the process and hands every payload to the broadcast relay.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::backoff::ReconnectPolicy;
use super::broker::Broker;
use super::error::UpstreamError;
use super::topic::Topic;
use crate::websocket::{BroadcastRelay, Frame};

/// State of the broker link, as reported to health checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Connect or subscribe in progress
    Connecting,
    /// Subscribed and relaying
    Subscribed,
    /// Waiting before the next attempt
    Disconnected,
}

/// Long-running subscription to the telemetry topic
pub struct UpstreamSubscriber<B> {
    broker: B,
    topic: Topic,
    policy: ReconnectPolicy,
    relay: Arc<BroadcastRelay>,
    state_tx: watch::Sender<LinkState>,
}

impl<B: Broker + 'static> UpstreamSubscriber<B> {
    pub fn new(
        broker: B,
        topic: Topic,
        policy: ReconnectPolicy,
        relay: Arc<BroadcastRelay>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Connecting);
        Self {
            broker,
            topic,
            policy,
            relay,
            state_tx,
        }
    }

    /// Watch the link state
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    /// Spawn the subscription loop onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Connect, subscribe, relay; on any failure wait and start over.
    ///
    /// Never returns. Failures are logged and retried without limit.
    pub async fn run(mut self) {
        let endpoint = self.broker.endpoint();
        let mut backoff = self.policy.backoff();

        loop {
            self.state_tx.send_replace(LinkState::Connecting);
            tracing::info!(broker = %endpoint, topic = %self.topic, "Connecting to broker");

            match self.broker.connect(&self.topic).await {
                Ok(()) => {
                    backoff.reset();
                    self.state_tx.send_replace(LinkState::Subscribed);
                    tracing::info!(broker = %endpoint, topic = %self.topic, "Subscribed to topic");

                    let error = self.pump().await;
                    tracing::warn!(broker = %endpoint, error = %error, "Broker connection lost");
                }
                Err(e) => {
                    tracing::warn!(
                        broker = %endpoint,
                        topic = %self.topic,
                        attempt = backoff.attempt() + 1,
                        error = %e,
                        "Failed to connect or subscribe"
                    );
                }
            }

            self.state_tx.send_replace(LinkState::Disconnected);
            let delay = backoff.next_delay();
            tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting to broker");
            tokio::time::sleep(delay).await;
        }
    }

    /// Relay messages until the session fails
    async fn pump(&mut self) -> UpstreamError {
        loop {
            match self.broker.next_message().await {
                Ok(payload) => {
                    tracing::debug!(bytes = payload.len(), "Upstream message");
                    self.relay.relay(Frame::from_payload(payload)).await;
                }
                Err(e) => return e,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MemoryBroker;
    use crate::websocket::{ClientRegistry, CLIENT_QUEUE_CAPACITY};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn topic() -> Topic {
        Topic::new("/TEF/posture001/attrs/jsonObject").unwrap()
    }

    fn text(s: &str) -> Frame {
        Frame::Text(s.to_string())
    }

    /// Let spawned tasks run until they block again
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for(state: &mut watch::Receiver<LinkState>, wanted: LinkState) {
        tokio::time::timeout(Duration::from_secs(300), state.wait_for(|s| *s == wanted))
            .await
            .expect("link state not reached")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_relays_in_broker_order() {
        let registry = Arc::new(ClientRegistry::new());
        let relay = Arc::new(BroadcastRelay::new(Arc::clone(&registry)));
        let (tx, mut rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        registry.register(tx).await;

        let (broker, handle) = MemoryBroker::new();
        let subscriber =
            UpstreamSubscriber::new(broker, topic(), ReconnectPolicy::default(), relay);
        let mut state = subscriber.link_state();
        let task = subscriber.spawn();

        wait_for(&mut state, LinkState::Subscribed).await;
        for payload in ["a", "b", "c"] {
            assert!(handle.publish(payload));
        }

        for expected in ["a", "b", "c"] {
            assert_eq!(rx.recv().await.unwrap(), text(expected));
        }
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_broker_reachable() {
        let registry = Arc::new(ClientRegistry::new());
        let relay = Arc::new(BroadcastRelay::new(Arc::clone(&registry)));
        let (tx, mut rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        registry.register(tx).await;

        let (broker, handle) = MemoryBroker::new();
        handle.set_reachable(false);

        let policy = ReconnectPolicy::fixed(Duration::from_secs(5));
        let subscriber = UpstreamSubscriber::new(broker, topic(), policy, relay);
        let mut state = subscriber.link_state();
        let task = subscriber.spawn();

        settle().await;
        assert_eq!(handle.connect_attempts(), 1);
        assert_eq!(*state.borrow(), LinkState::Disconnected);

        tokio::time::advance(Duration::from_millis(5_001)).await;
        settle().await;
        assert_eq!(handle.connect_attempts(), 2);

        handle.set_reachable(true);
        wait_for(&mut state, LinkState::Subscribed).await;
        assert_eq!(handle.connect_attempts(), 3);

        assert!(handle.publish("after outage"));
        assert_eq!(rx.recv().await.unwrap(), text("after outage"));
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumes_after_connection_drop() {
        let registry = Arc::new(ClientRegistry::new());
        let relay = Arc::new(BroadcastRelay::new(Arc::clone(&registry)));
        let (tx, mut rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        registry.register(tx).await;

        let (broker, handle) = MemoryBroker::new();
        let subscriber =
            UpstreamSubscriber::new(broker, topic(), ReconnectPolicy::default(), relay);
        let mut state = subscriber.link_state();
        let task = subscriber.spawn();

        wait_for(&mut state, LinkState::Subscribed).await;
        assert!(handle.publish("before"));
        assert_eq!(rx.recv().await.unwrap(), text("before"));

        handle.disconnect();
        wait_for(&mut state, LinkState::Disconnected).await;

        // Published during the outage: lost, never replayed
        assert!(!handle.publish("during"));

        wait_for(&mut state, LinkState::Subscribed).await;
        assert_eq!(handle.connect_attempts(), 2);

        assert!(handle.publish("after"));
        assert_eq!(rx.recv().await.unwrap(), text("after"));
        assert!(rx.try_recv().is_err());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_delay_bounded_by_ceiling() {
        let registry = Arc::new(ClientRegistry::new());
        let relay = Arc::new(BroadcastRelay::new(registry));

        let (broker, handle) = MemoryBroker::new();
        handle.set_reachable(false);

        let policy = ReconnectPolicy {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 10.0,
            jitter_factor: 0.5,
        };
        let task = UpstreamSubscriber::new(broker, topic(), policy, relay).spawn();

        settle().await;
        // After warming up, every ceiling-length interval yields one more attempt
        tokio::time::advance(Duration::from_millis(1_100)).await;
        settle().await;
        let warmed = handle.connect_attempts();
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(1_001)).await;
            settle().await;
        }
        assert!(handle.connect_attempts() >= warmed + 5);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_policy_does_not_spin() {
        let registry = Arc::new(ClientRegistry::new());
        let relay = Arc::new(BroadcastRelay::new(registry));

        let (broker, handle) = MemoryBroker::new();
        handle.set_reachable(false);

        let policy = ReconnectPolicy {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            jitter_factor: 0.0,
        };
        let task = UpstreamSubscriber::new(broker, topic(), policy, relay).spawn();

        settle().await;
        assert_eq!(handle.connect_attempts(), 1);

        tokio::time::advance(Duration::from_millis(crate::upstream::MIN_DELAY_MS + 1)).await;
        settle().await;
        assert_eq!(handle.connect_attempts(), 2);
        task.abort();
    }
}
