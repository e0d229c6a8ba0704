//! OpenWRT modem bridge
//!
//! Polls the management API of an OpenWRT-based cellular router and
//! republishes the modem status over MQTT:
//! - one plain-text topic per telemetry field under the publish prefix
//! - `ALIVE` / `ERROR` heartbeat every second
//! - `STATE` on `<prefix>/set` forces an immediate refresh

pub mod bridge;
pub mod broker;
pub mod commands;
pub mod config;
pub mod heartbeat;
pub mod mqtt;
pub mod publisher;
pub mod retry;
pub mod router;
pub mod state;

pub use bridge::{Bridge, Refresher};
pub use broker::{Broker, BrokerError};
pub use config::{BridgeConfig, ConfigError};
pub use router::{Credentials, RouterClient, RouterError, TelemetryRecord};
pub use state::{Liveness, LivenessCell};
