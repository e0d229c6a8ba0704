/**
 * BRIDGE ORCHESTRATOR - Poll loop and task wiring
 *
 * ROLE:
 * CONNECTING → CONNECTED → (cycle)*. Connects to the broker (retrying
 * forever), starts the heartbeat and the command listener, then polls the
 * router on a fixed interval until shutdown.
 *
 * CYCLE:
 * sleep(interval) → login + status_full → publish fields → liveness ALIVE.
 * Any router error sets liveness ERROR and the loop goes on.
 *
 * The poll loop and the command listener share one `Refresher`; its gate
 * lets only one fetch + publish run at a time.
 */

use crate::broker::{Broker, BrokerError};
use crate::commands::{command_topic, spawn_command_listener};
use crate::config::BridgeConfig;
use crate::heartbeat::spawn_heartbeat;
use crate::mqtt;
use crate::publisher::{publish_status, PublishReport};
use crate::retry::RetryPolicy;
use crate::router::{Credentials, RouterClient, RouterError};
use crate::state::{Liveness, LivenessCell};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Bounded wait for the DISCONNECT to go out at shutdown
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// One fetch + publish, shared by the poll loop and the command listener
#[derive(Clone)]
pub struct Refresher<B> {
    router: RouterClient,
    credentials: Arc<Credentials>,
    broker: B,
    topic_prefix: Arc<str>,
    gate: Arc<Mutex<()>>,
}

impl<B: Broker> Refresher<B> {
    pub fn new(router: RouterClient, credentials: Credentials, broker: B, topic_prefix: impl Into<String>) -> Self {
        let topic_prefix: String = topic_prefix.into();
        Self {
            router,
            credentials: Arc::new(credentials),
            broker,
            topic_prefix: Arc::from(topic_prefix),
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    /// Fresh login, status fetch, publish. Nothing is published on error.
    pub async fn refresh(&self) -> Result<PublishReport, RouterError> {
        let _running = self.gate.lock().await;
        let record = self.router.get_modem_data(&self.credentials).await?;
        Ok(publish_status(&self.broker, &self.topic_prefix, &record).await)
    }
}

/// One timer-driven cycle: refresh, then record the outcome in `liveness`
pub async fn poll_cycle<B: Broker>(refresher: &Refresher<B>, liveness: &LivenessCell) -> Result<PublishReport, RouterError> {
    match refresher.refresh().await {
        Ok(report) => {
            if liveness.set(Liveness::Alive) == Liveness::Error {
                info!("router polling recovered");
            }
            Ok(report)
        }
        Err(e) => {
            liveness.set(Liveness::Error);
            Err(e)
        }
    }
}

/// Never returns
pub async fn poll_loop<B: Broker>(refresher: Refresher<B>, liveness: LivenessCell, interval: Duration) {
    loop {
        sleep(interval).await;
        debug!("starting poll cycle");
        match poll_cycle(&refresher, &liveness).await {
            Ok(report) if report.failed > 0 => {
                warn!(published = report.attempted - report.failed, failed = report.failed, "status partially published")
            }
            Ok(report) => debug!(published = report.attempted, "status published"),
            Err(e) => error!(stage = e.stage(), "router request failed: {}", e),
        }
    }
}

/// CONNECTED state: heartbeat + command listener + poll loop until `shutdown`
pub async fn run_connected<B, S>(
    refresher: Refresher<B>,
    commands: mpsc::Receiver<String>,
    liveness: LivenessCell,
    config: &BridgeConfig,
    shutdown: S,
) where
    B: Broker,
    S: Future<Output = ()>,
{
    let heartbeat = spawn_heartbeat(
        refresher.broker().clone(),
        config.heartbeat_topic.clone(),
        liveness.clone(),
        config.heartbeat_period,
    );

    let listener = match spawn_command_listener(refresher.clone(), commands).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("command subscription failed, on-demand refresh disabled: {}", e);
            None
        }
    };

    info!(interval_secs = config.poll_interval.as_secs(), "polling router");
    tokio::select! {
        _ = poll_loop(refresher, liveness, config.poll_interval) => {}
        _ = shutdown => info!("shutdown requested"),
    }

    heartbeat.abort();
    if let Some(listener) = listener {
        listener.abort();
    }
}

/// Main bridge state
pub struct Bridge {
    config: BridgeConfig,
    router: RouterClient,
    liveness: LivenessCell,
    connect_policy: RetryPolicy,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Result<Self, RouterError> {
        let router = RouterClient::new(config.http_timeout)?;
        Ok(Self {
            config,
            router,
            liveness: LivenessCell::default(),
            connect_policy: RetryPolicy::default(),
        })
    }

    pub fn with_connect_policy(mut self, policy: RetryPolicy) -> Self {
        self.connect_policy = policy;
        self
    }

    pub fn liveness(&self) -> LivenessCell {
        self.liveness.clone()
    }

    /// Runs until `shutdown` resolves, then closes the broker connection
    pub async fn run<S>(self, shutdown: S) -> Result<(), BrokerError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let command_topic = command_topic(&self.config.publish_topic);

        info!(host = %self.config.mqtt.host, port = self.config.mqtt.port, "connecting to broker");
        let (session, commands) = tokio::select! {
            res = mqtt::connect(&self.config.mqtt, &command_topic, &self.liveness, &self.connect_policy) => res?,
            _ = &mut shutdown => {
                info!("shutdown requested before broker connection");
                return Ok(());
            }
        };

        let refresher = Refresher::new(
            self.router.clone(),
            self.config.router.clone(),
            session.client(),
            self.config.publish_topic.clone(),
        );
        run_connected(refresher, commands, self.liveness.clone(), &self.config, &mut shutdown).await;

        session.close(SHUTDOWN_GRACE).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MqttSettings, HEARTBEAT_PERIOD};
    use modem_bridge_devkit::fixtures::{self, TEST_PASSWORD, TEST_USERNAME};
    use modem_bridge_devkit::{MockMqttClient, MockRouter};

    fn refresher(router: &MockRouter, broker: &MockMqttClient) -> Refresher<MockMqttClient> {
        Refresher::new(
            RouterClient::new(Duration::from_secs(5)).unwrap(),
            Credentials::new(router.base_url(), TEST_USERNAME, TEST_PASSWORD),
            broker.clone(),
            "home/router",
        )
    }

    fn config(router_url: String, broker_port: u16) -> BridgeConfig {
        BridgeConfig {
            mqtt: MqttSettings {
                host: "127.0.0.1".into(),
                port: broker_port,
                client_id: "bridge-test".into(),
                credentials: None,
            },
            router: Credentials::new(router_url, TEST_USERNAME, TEST_PASSWORD),
            poll_interval: Duration::from_millis(100),
            publish_topic: "home/router".into(),
            heartbeat_topic: "home/router/heartbeat".into(),
            heartbeat_period: HEARTBEAT_PERIOD,
            http_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_cycle_success_publishes_and_marks_alive() {
        let router = MockRouter::start().await.unwrap();
        let broker = MockMqttClient::new();
        let liveness = LivenessCell::new(Liveness::Error);

        let report = poll_cycle(&refresher(&router, &broker), &liveness).await.unwrap();

        assert_eq!(report.attempted, 19);
        assert_eq!(liveness.get(), Liveness::Alive);
        assert_eq!(broker.last_text("home/router/mobile_signal").as_deref(), Some("-62"));
        assert_eq!(broker.last_text("home/router/mobile_rsrp").as_deref(), Some("-102"));
        assert_eq!(broker.last_text("home/router/band").as_deref(), Some("LTE B3"));
        assert_eq!(broker.last_text("home/router/ntype").as_deref(), Some("LTE"));
    }

    #[tokio::test]
    async fn test_login_401_marks_error_without_publishing() {
        let router = MockRouter::start().await.unwrap();
        router.set_login_status(401);
        let broker = MockMqttClient::new();
        let liveness = LivenessCell::default();

        let err = poll_cycle(&refresher(&router, &broker), &liveness).await.unwrap_err();

        assert!(matches!(err, RouterError::Auth(_)));
        assert!(err.to_string().starts_with("login failed"));
        assert!(broker.get_published_messages().is_empty());
        assert_eq!(liveness.get(), Liveness::Error);
    }

    #[tokio::test]
    async fn test_router_failure_or_empty_data_never_publishes() {
        for body in [fixtures::status_failure_response(), fixtures::status_empty_response()] {
            let router = MockRouter::start().await.unwrap();
            router.set_status_response(200, body);
            let broker = MockMqttClient::new();
            let liveness = LivenessCell::default();

            let err = poll_cycle(&refresher(&router, &broker), &liveness).await.unwrap_err();

            assert!(matches!(err, RouterError::Upstream(_)));
            assert!(broker.get_published_messages().is_empty());
            assert_eq!(liveness.get(), Liveness::Error);
        }
    }

    #[tokio::test]
    async fn test_liveness_recovers_on_next_good_cycle() {
        let router = MockRouter::start().await.unwrap();
        let broker = MockMqttClient::new();
        let liveness = LivenessCell::default();
        let refresher = refresher(&router, &broker);

        router.set_status_raw(503, "busy");
        assert!(poll_cycle(&refresher, &liveness).await.is_err());
        assert_eq!(liveness.get(), Liveness::Error);

        router.set_status_response(200, fixtures::status_full_response());
        assert!(poll_cycle(&refresher, &liveness).await.is_ok());
        assert_eq!(liveness.get(), Liveness::Alive);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_do_not_overlap() {
        let router = MockRouter::start().await.unwrap();
        router.set_status_delay(Duration::from_millis(150));
        let broker = MockMqttClient::new();
        let refresher = refresher(&router, &broker);

        let (a, b) = tokio::join!(refresher.refresh(), refresher.refresh());

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(router.login_calls(), 2);
        assert_eq!(router.max_concurrent_status(), 1);
        assert_eq!(broker.get_published_messages().len(), 38);
    }

    #[tokio::test]
    async fn test_run_connected_until_shutdown() {
        let router = MockRouter::start().await.unwrap();
        let broker = MockMqttClient::new();
        let mut cfg = config(router.base_url(), 1883);
        cfg.heartbeat_period = Duration::from_millis(50);
        let liveness = LivenessCell::default();
        let (tx, rx) = mpsc::channel(4);

        run_connected(
            refresher(&router, &broker),
            rx,
            liveness.clone(),
            &cfg,
            sleep(Duration::from_millis(450)),
        )
        .await;

        assert!(router.login_calls() >= 2, "expected several poll cycles");
        assert_eq!(liveness.get(), Liveness::Alive);
        assert_eq!(broker.last_text("home/router/heartbeat").as_deref(), Some("ALIVE"));
        assert_eq!(broker.get_subscriptions()[0].0, "home/router/set");

        // heartbeat and listener are stopped
        let published = broker.get_published_messages().len();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(broker.get_published_messages().len(), published);
        assert!(tx.send("STATE".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_command_refresh_between_cycles() {
        let router = MockRouter::start().await.unwrap();
        let broker = MockMqttClient::new();
        let mut cfg = config(router.base_url(), 1883);
        cfg.poll_interval = Duration::from_secs(3600);
        let (tx, rx) = mpsc::channel(4);

        let sender = async {
            sleep(Duration::from_millis(50)).await;
            tx.send("STATE".into()).await.unwrap();
            sleep(Duration::from_millis(300)).await;
        };
        run_connected(refresher(&router, &broker), rx, LivenessCell::default(), &cfg, sender).await;

        assert_eq!(router.login_calls(), 1);
        assert_eq!(broker.last_text("home/router/band").as_deref(), Some("LTE B3"));
    }

    #[tokio::test]
    async fn test_run_keeps_retrying_broker_until_shutdown() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let bridge = Bridge::new(config("http://127.0.0.1:9".into(), port))
            .unwrap()
            .with_connect_policy(RetryPolicy::fixed(Duration::from_millis(20)));
        let liveness = bridge.liveness();

        bridge.run(sleep(Duration::from_millis(200))).await.unwrap();

        assert_eq!(liveness.get(), Liveness::Error);
    }
}
