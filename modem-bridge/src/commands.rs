//! Command listener on `<publish_topic>/set`.
//!
//! The MQTT event loop only forwards payloads into a channel; the refresh
//! triggered by a command runs here, off the dispatch path.

use crate::bridge::Refresher;
use crate::broker::{Broker, BrokerError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fetch and publish the modem status now
    RefreshState,
}

impl Command {
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "STATE" => Some(Command::RefreshState),
            _ => None,
        }
    }
}

pub fn command_topic(publish_topic: &str) -> String {
    format!("{publish_topic}/set")
}

/// Subscribe to the command topic, then handle payloads until the channel closes
pub async fn spawn_command_listener<B: Broker>(
    refresher: Refresher<B>,
    mut payloads: mpsc::Receiver<String>,
) -> Result<JoinHandle<()>, BrokerError> {
    let topic = command_topic(refresher.topic_prefix());
    refresher.broker().subscribe_topic(topic.clone()).await?;
    info!(%topic, "listening for commands");

    Ok(tokio::spawn(async move {
        while let Some(payload) = payloads.recv().await {
            handle_payload(&refresher, &payload).await;
        }
        debug!("command channel closed");
    }))
}

async fn handle_payload<B: Broker>(refresher: &Refresher<B>, payload: &str) {
    info!(%payload, "command received");
    match Command::parse(payload) {
        Some(Command::RefreshState) => match refresher.refresh().await {
            Ok(report) => info!(published = report.attempted, failed = report.failed, "on-demand refresh done"),
            Err(e) => warn!("on-demand refresh failed: {}", e),
        },
        None => debug!(%payload, "ignoring unknown command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{Credentials, RouterClient};
    use modem_bridge_devkit::fixtures::{TEST_PASSWORD, TEST_USERNAME};
    use modem_bridge_devkit::{MockMqttClient, MockRouter};
    use std::time::Duration;

    fn refresher(router: &MockRouter, broker: &MockMqttClient) -> Refresher<MockMqttClient> {
        Refresher::new(
            RouterClient::new(Duration::from_secs(5)).unwrap(),
            Credentials::new(router.base_url(), TEST_USERNAME, TEST_PASSWORD),
            broker.clone(),
            "home/router",
        )
    }

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("STATE"), Some(Command::RefreshState));
        assert_eq!(Command::parse("state"), None);
        assert_eq!(Command::parse("STATE\n"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_command_topic() {
        assert_eq!(command_topic("home/router"), "home/router/set");
    }

    #[tokio::test]
    async fn test_state_command_publishes_status() {
        let router = MockRouter::start().await.unwrap();
        let broker = MockMqttClient::new();
        let rx = broker.setup_receiver(8);

        let handle = spawn_command_listener(refresher(&router, &broker), rx).await.unwrap();
        assert_eq!(broker.get_subscriptions(), vec![("home/router/set".to_string(), rumqttc::QoS::AtMostOnce)]);

        assert!(broker.simulate_incoming("home/router/set", "STATE").await.unwrap());
        broker.close_receiver();
        handle.await.unwrap();

        assert_eq!(router.login_calls(), 1);
        assert_eq!(broker.get_published_messages().len(), 19);
        assert_eq!(broker.last_text("home/router/mobile_signal").as_deref(), Some("-62"));
    }

    #[tokio::test]
    async fn test_unknown_payload_has_no_effect() {
        let router = MockRouter::start().await.unwrap();
        let broker = MockMqttClient::new();
        let rx = broker.setup_receiver(8);

        let handle = spawn_command_listener(refresher(&router, &broker), rx).await.unwrap();
        for payload in ["REBOOT", "state", "{\"cmd\":\"STATE\"}"] {
            broker.simulate_incoming("home/router/set", payload).await.unwrap();
        }
        // STATE on a topic the listener never subscribed to
        assert!(!broker.simulate_incoming("home/router/get", "STATE").await.unwrap());
        broker.close_receiver();
        handle.await.unwrap();

        assert_eq!(router.login_calls(), 0);
        assert!(broker.get_published_messages().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_publishes_nothing() {
        let router = MockRouter::start().await.unwrap();
        router.set_login_status(401);
        let broker = MockMqttClient::new();
        let (tx, rx) = mpsc::channel(8);

        let handle = spawn_command_listener(refresher(&router, &broker), rx).await.unwrap();
        tx.send("STATE".to_string()).await.unwrap();
        tx.send("STATE".to_string()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        // no retry: one login per command
        assert_eq!(router.login_calls(), 2);
        assert!(broker.get_published_messages().is_empty());
    }
}
