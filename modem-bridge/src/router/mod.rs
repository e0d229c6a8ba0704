/**
 * ROUTER SESSION CLIENT - HTTP access to the OpenWRT router API
 *
 * ROLE:
 * Login on the router API, obtain a bearer token, fetch the full modem
 * status and hand back the first modem as a `TelemetryRecord`.
 *
 * HOW IT WORKS:
 * - `POST {base}/api/login` with `{username, password}` → `ubus_rpc_session`
 * - `GET {base}/api/mobile/modems/status_full/` with `Authorization: Bearer`
 * - A new token is requested on every call to `get_modem_data`, it is never
 *   cached between cycles
 * - No retry here: the next poll cycle is the retry
 */

mod client;
mod models;

pub use client::RouterClient;
pub use models::{CellInfo, LoginResponse, ServiceModes, SessionToken, StatusResponse, TelemetryRecord};

use std::fmt;

/// Router login data, fixed for the process lifetime
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    base_url: String,
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Failure of one `get_modem_data` call; the message carries the stage
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Login transport failure, non-200 status or undecodable login body
    #[error("login failed: {0}")]
    Auth(String),
    /// Status request transport failure or non-200 status
    #[error("status failed: {0}")]
    Fetch(String),
    /// Status body is not the expected JSON
    #[error("status failed: malformed body: {0}")]
    Decode(String),
    /// Router answered but reported `success: false` or no modem
    #[error("status failed: {0}")]
    Upstream(String),
    #[error("cannot build HTTP client: {0}")]
    Setup(#[from] reqwest::Error),
}

impl RouterError {
    pub fn stage(&self) -> &'static str {
        match self {
            RouterError::Auth(_) => "login",
            RouterError::Fetch(_) | RouterError::Decode(_) | RouterError::Upstream(_) => "status",
            RouterError::Setup(_) => "setup",
        }
    }
}
