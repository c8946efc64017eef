//! MQTT broker client
//!
//! [`Broker`] implementation on top of `rumqttc`. Every call to
//! [`Broker::connect`] builds a new client and event loop, so a dropped
//! session never leaks queued requests into the next one.

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use std::time::Duration;

use super::broker::Broker;
use super::error::UpstreamError;
use super::topic::Topic;
use crate::config::BrokerConfig;

/// Live session state
struct Session {
    // Kept alive for the session: dropping the last client handle
    // stops the event loop
    _client: AsyncClient,
    eventloop: EventLoop,
    topic: Topic,
}

/// Connection to an MQTT 3.1.1 broker
pub struct MqttBroker {
    options: MqttOptions,
    endpoint: String,
    capacity: usize,
    connect_timeout: Duration,
    session: Option<Session>,
}

impl MqttBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        Self {
            options,
            endpoint: config.endpoint(),
            capacity: config.channel_capacity.max(1),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            session: None,
        }
    }

    /// Drive the event loop until the subscription is acknowledged
    async fn handshake(
        client: &AsyncClient,
        eventloop: &mut EventLoop,
        topic: &Topic,
    ) -> Result<(), UpstreamError> {
        loop {
            if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
                tracing::debug!(session_present = ack.session_present, "Broker accepted connection");
                break;
            }
        }

        client.subscribe(topic.as_str(), QoS::AtMostOnce).await?;

        loop {
            if let Event::Incoming(Packet::SubAck(ack)) = eventloop.poll().await? {
                return match ack.return_codes.first() {
                    Some(SubscribeReasonCode::Success(qos)) => {
                        tracing::debug!(qos = ?qos, "Subscription acknowledged");
                        Ok(())
                    }
                    other => Err(UpstreamError::SubscribeRejected {
                        topic: topic.to_string(),
                        reason: format!("{:?}", other),
                    }),
                };
            }
        }
    }
}

#[async_trait]
impl Broker for MqttBroker {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn connect(&mut self, topic: &Topic) -> Result<(), UpstreamError> {
        self.session = None;

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), self.capacity);

        tokio::time::timeout(
            self.connect_timeout,
            Self::handshake(&client, &mut eventloop, topic),
        )
        .await
        .map_err(|_| UpstreamError::Timeout(self.connect_timeout))??;

        self.session = Some(Session {
            _client: client,
            eventloop,
            topic: topic.clone(),
        });
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Bytes, UpstreamError> {
        let session = self.session.as_mut().ok_or(UpstreamError::NotConnected)?;

        let result = loop {
            match session.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic == session.topic.as_str() {
                        break Ok(publish.payload);
                    }
                    tracing::trace!(topic = %publish.topic, "Ignoring publish on other topic");
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    break Err(UpstreamError::ConnectionLost(
                        "broker sent disconnect".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => break Err(UpstreamError::from(e)),
            }
        };

        if result.is_err() {
            self.session = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_next_message_without_session() {
        let mut broker = MqttBroker::new(&BrokerConfig::default());
        assert!(matches!(
            broker.next_message().await,
            Err(UpstreamError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_is_an_error() {
        // Bind then drop a listener to get a port with nothing behind it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_secs: 2,
            ..Default::default()
        };
        let mut broker = MqttBroker::new(&config);
        let topic = Topic::new("sensors/posture").unwrap();

        assert!(broker.connect(&topic).await.is_err());
        assert!(broker.session.is_none());
    }

    #[test]
    fn test_endpoint() {
        let config = BrokerConfig {
            host: "broker.local".to_string(),
            port: 1884,
            ..Default::default()
        };
        assert_eq!(MqttBroker::new(&config).endpoint(), "broker.local:1884");
    }
}
