//! Heartbeat emitter: publishes the current liveness every period.

use crate::broker::Broker;
use crate::state::LivenessCell;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Runs until aborted. Publish failures are swallowed: silence on the topic
/// is itself the signal a monitor watches for.
pub fn spawn_heartbeat<B: Broker>(broker: B, topic: String, liveness: LivenessCell, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let value = liveness.get();
            if let Err(e) = broker.publish_text(topic.clone(), value.to_string()).await {
                debug!(%topic, "heartbeat publish failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Liveness;
    use modem_bridge_devkit::MockMqttClient;

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_follows_liveness() {
        let broker = MockMqttClient::new();
        let liveness = LivenessCell::default();
        let handle = spawn_heartbeat(broker.clone(), "hb".into(), liveness.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let before = broker.find_messages_by_topic("hb");
        assert_eq!(before.len(), 2);
        assert!(before.iter().all(|m| m.text() == "ALIVE"));

        liveness.set(Liveness::Error);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(broker.last_text("hb").as_deref(), Some("ERROR"));

        liveness.set(Liveness::Alive);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(broker.last_text("hb").as_deref(), Some("ALIVE"));
        assert_eq!(broker.find_messages_by_topic("hb").len(), 4);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_survives_publish_failures() {
        let broker = MockMqttClient::new();
        broker.fail_topic("hb");
        let handle = spawn_heartbeat(broker.clone(), "hb".into(), LivenessCell::default(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
