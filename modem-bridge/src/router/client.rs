use super::models::{LoginRequest, LoginResponse, SessionToken, StatusResponse, TelemetryRecord};
use super::{Credentials, RouterError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

const LOGIN_PATH: &str = "/api/login";
const STATUS_PATH: &str = "/api/mobile/modems/status_full/";

/// HTTP client for the router API. Cheap to clone, connections are pooled.
#[derive(Debug, Clone)]
pub struct RouterClient {
    http: reqwest::Client,
}

impl RouterClient {
    /// `timeout` bounds every single request, connect included
    pub fn new(timeout: Duration) -> Result<Self, RouterError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    /// Login and return a fresh session token
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionToken, RouterError> {
        let url = format!("{}{}", credentials.base_url(), LOGIN_PATH);
        let body = LoginRequest {
            username: credentials.username(),
            password: credentials.password(),
        };

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RouterError::Auth(format!("request call failed: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(RouterError::Auth(format!("unexpected status {}", response.status())));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| RouterError::Auth(format!("response decoding failed: {e}")))?;

        let token = SessionToken::from(login);
        debug!(expires = token.expires, timeout = token.timeout, "router session opened");
        Ok(token)
    }

    /// Fetch `status_full` and return the first modem
    pub async fn fetch_status(&self, base_url: &str, token: &SessionToken) -> Result<TelemetryRecord, RouterError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), STATUS_PATH);

        let response = self
            .http
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&token.token)
            .send()
            .await
            .map_err(|e| RouterError::Fetch(format!("request call failed: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(RouterError::Fetch(format!("unexpected status {}", response.status())));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RouterError::Fetch(format!("reading body failed: {e}")))?;
        let status: StatusResponse =
            serde_json::from_str(&text).map_err(|e| RouterError::Decode(e.to_string()))?;

        if !status.success {
            return Err(RouterError::Upstream("request failed by router internally".into()));
        }
        status
            .data
            .into_iter()
            .next()
            .ok_or_else(|| RouterError::Upstream("router returned no modem data".into()))
    }

    /// Login then fetch, stopping at the first failing stage
    pub async fn get_modem_data(&self, credentials: &Credentials) -> Result<TelemetryRecord, RouterError> {
        let token = self.login(credentials).await?;
        self.fetch_status(credentials.base_url(), &token).await
    }
}
