//! Bridge configuration, read from the environment
//!
//! Handles:
//! - MQTT broker endpoint and optional broker credentials
//! - Router base URL and login credentials
//! - Poll interval, topics, HTTP timeout
//!
//! A `.env` file in the working directory is loaded first by the binary.

use crate::router::Credentials;
use std::time::Duration;

pub const DEFAULT_CLIENT_ID: &str = "openwrt-modem-bridge";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// (username, password)
    pub credentials: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt: MqttSettings,
    pub router: Credentials,
    pub poll_interval: Duration,
    pub publish_topic: String,
    pub heartbeat_topic: String,
    pub heartbeat_period: Duration,
    pub http_timeout: Duration,
}

impl BridgeConfig {
    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup (environment, map in tests...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| -> Option<String> {
            lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        // MQTT_BRORKER_URL is the spelling older deployments use
        let broker_url = get("MQTT_BROKER_URL")
            .or_else(|| get("MQTT_BRORKER_URL"))
            .ok_or(ConfigError::Missing("MQTT_BROKER_URL"))?;
        let (host, port) = parse_broker_url(&broker_url)?;

        let credentials = match (get("MQTT_USERNAME"), get("MQTT_PASSWORD")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("MQTT_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("MQTT_USERNAME")),
        };

        let router_url = require("OPENWRT_URL")?;
        if !(router_url.starts_with("http://") || router_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "OPENWRT_URL",
                reason: format!("expected an http(s) URL, got {router_url:?}"),
            });
        }

        let poll_secs = parse_secs("DELAY_SECONDS", &require("DELAY_SECONDS")?)?;
        let http_timeout_secs = match get("HTTP_TIMEOUT_SECONDS") {
            Some(raw) => parse_secs("HTTP_TIMEOUT_SECONDS", &raw)?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            mqtt: MqttSettings {
                host,
                port,
                client_id: get("MQTT_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
                credentials,
            },
            router: Credentials::new(router_url, require("OPENWRT_USERNAME")?, require("OPENWRT_PASSWORD")?),
            poll_interval: Duration::from_secs(poll_secs),
            publish_topic: require("PUBLISH_TOPIC")?,
            heartbeat_topic: require("HEARTBEAT_TOPIC")?,
            heartbeat_period: HEARTBEAT_PERIOD,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

fn parse_secs(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid { name, reason: "must be greater than zero".into() }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::Invalid { name, reason: format!("{raw:?}: {e}") }),
    }
}

/// Accepts `tcp://host:port`, `mqtt://host:port` or `host[:port]`
pub fn parse_broker_url(url: &str) -> Result<(String, u16), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { name: "MQTT_BROKER_URL", reason };

    let rest = match url.split_once("://") {
        Some(("tcp" | "mqtt", rest)) => rest,
        Some((scheme, _)) => return Err(invalid(format!("unsupported scheme {scheme:?}"))),
        None => url,
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| invalid(format!("bad port {port:?}: {e}")))?;
            (host, port)
        }
        None => (rest, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() {
        return Err(invalid(format!("no host in {url:?}")));
    }
    Ok((host.to_string(), port))
}
