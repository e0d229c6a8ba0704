//! Seam between the bridge logic and the MQTT client.
//!
//! Everything the bridge sends is plain text at QoS 0 without retain, so the
//! trait only exposes that. `rumqttc::AsyncClient` implements it for
//! production; tests use the devkit mock.

use rumqttc::{AsyncClient, ClientError, ConnectionError, QoS};
use std::future::Future;

pub const QOS: QoS = QoS::AtMostOnce;
pub const RETAIN: bool = false;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("cannot connect to broker: {0}")]
    Connect(#[from] ConnectionError),
    #[error("broker connection attempts exhausted after {attempts} tries")]
    GaveUp { attempts: u32 },
    #[error("broker request failed: {0}")]
    Client(#[from] ClientError),
    #[error("broker rejected request: {0}")]
    Rejected(String),
}

/// Shared broker handle, cloned into every task
pub trait Broker: Clone + Send + Sync + 'static {
    /// Queue a QoS 0, non-retained publish without waiting for room in the queue
    fn publish_text(&self, topic: String, payload: String) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Queue a QoS 0 subscription
    fn subscribe_topic(&self, topic: String) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

impl Broker for AsyncClient {
    async fn publish_text(&self, topic: String, payload: String) -> Result<(), BrokerError> {
        // try_publish: a broker outage must not stall the poll loop or the heartbeat
        AsyncClient::try_publish(self, topic, QOS, RETAIN, payload)?;
        Ok(())
    }

    async fn subscribe_topic(&self, topic: String) -> Result<(), BrokerError> {
        AsyncClient::subscribe(self, topic, QOS).await?;
        Ok(())
    }
}

#[cfg(test)]
impl Broker for modem_bridge_devkit::MockMqttClient {
    async fn publish_text(&self, topic: String, payload: String) -> Result<(), BrokerError> {
        self.publish(topic, QOS, RETAIN, payload)
            .await
            .map_err(|e| BrokerError::Rejected(e.to_string()))
    }

    async fn subscribe_topic(&self, topic: String) -> Result<(), BrokerError> {
        self.subscribe(topic, QOS)
            .await
            .map_err(|e| BrokerError::Rejected(e.to_string()))
    }
}
