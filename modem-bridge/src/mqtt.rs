/**
 * MQTT CONNECTION - Broker connection and event loop driver
 *
 * ROLE:
 * Build the rumqttc client, block until the broker accepts the connection
 * (retrying per `RetryPolicy`), then drive the event loop in a background
 * task for the process lifetime.
 *
 * HOW IT WORKS:
 * - `connect` polls the event loop until CONNACK; every failure sets the
 *   liveness to ERROR and waits for the policy delay
 * - the driver task forwards payloads received on the command topic into a
 *   bounded channel and never waits on the receiver
 * - on reconnection (new CONNACK, clean session) the command subscription
 *   is re-issued
 * - `MqttSession::close` sends DISCONNECT and waits at most a grace period
 */

use crate::broker::{BrokerError, QOS};
use crate::config::MqttSettings;
use crate::retry::RetryPolicy;
use crate::state::{Liveness, LivenessCell};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Request queue between client handles and the event loop. Holds a full
/// status publish plus heartbeats. Whatever queued during an outage (up to
/// this many stale heartbeats/fields) is flushed in one burst on reconnect.
const REQUEST_CAPACITY: usize = 64;
const COMMAND_QUEUE: usize = 16;
const KEEP_ALIVE: Duration = Duration::from_secs(30);

pub fn mqtt_options(settings: &MqttSettings) -> MqttOptions {
    let mut opts = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    opts.set_keep_alive(KEEP_ALIVE);
    opts.set_clean_session(true);
    if let Some((username, password)) = &settings.credentials {
        opts.set_credentials(username, password);
    }
    opts
}

/// Live broker connection: client handle plus the task driving it
pub struct MqttSession {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl MqttSession {
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Best-effort DISCONNECT, bounded by `grace`
    pub async fn close(mut self, grace: Duration) {
        let client = self.client.clone();
        let driver = &mut self.driver;
        let closed = timeout(grace, async move {
            client.disconnect().await?;
            let _ = driver.await;
            Ok::<(), rumqttc::ClientError>(())
        })
        .await;

        match closed {
            Ok(Ok(())) => info!("broker connection closed"),
            Ok(Err(e)) => warn!("broker disconnect failed: {}", e),
            Err(_) => warn!("broker did not close within {:?}", grace),
        }
        self.driver.abort();
    }
}

/// CONNECTING state: returns once the broker acknowledged the connection.
/// Only errors when the policy has a finite number of attempts.
pub async fn connect(
    settings: &MqttSettings,
    command_topic: &str,
    liveness: &LivenessCell,
    policy: &RetryPolicy,
) -> Result<(MqttSession, mpsc::Receiver<String>), BrokerError> {
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(settings), REQUEST_CAPACITY);

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match wait_for_connack(&mut eventloop).await {
            Ok(()) => break,
            Err(e) => {
                liveness.set(Liveness::Error);
                error!(attempt, host = %settings.host, port = settings.port, "mqtt connection failed: {}", e);
                match policy.delay_after(attempt) {
                    Some(delay) => sleep(delay).await,
                    None => return Err(BrokerError::GaveUp { attempts: attempt }),
                }
            }
        }
    }
    info!(host = %settings.host, port = settings.port, client_id = %settings.client_id, "connected to broker");

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let driver = tokio::spawn(drive_event_loop(
        eventloop,
        client.clone(),
        command_topic.to_string(),
        tx,
        policy.delay,
    ));

    Ok((MqttSession { client, driver }, rx))
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), BrokerError> {
    loop {
        // a refused CONNACK comes back as an error from poll
        if let Event::Incoming(Incoming::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    command_topic: String,
    commands: mpsc::Sender<String>,
    reconnect_delay: Duration,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(p))) if p.topic == command_topic => {
                let payload = String::from_utf8_lossy(&p.payload).into_owned();
                if let Err(e) = commands.try_send(payload) {
                    warn!(topic = %p.topic, "dropping command: {}", e);
                }
            }
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("reconnected to broker");
                // the queue may still be full from the outage; wait for room
                // in a separate task while this loop drains it
                let client = client.clone();
                let topic = command_topic.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.subscribe(topic.clone(), QOS).await {
                        warn!(%topic, "resubscribe failed: {}", e);
                    }
                });
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("disconnect sent, stopping event loop");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("mqtt connection error: {}", e);
                sleep(reconnect_delay).await;
            }
        }
    }
}
