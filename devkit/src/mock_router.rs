/*!
Routeur OpenWRT simulé pour tests sans matériel

Serveur Axum local (port éphémère) qui expose les deux routes utilisées
par le bridge :
- `POST /api/login` : vérifie les identifiants, renvoie un token
- `GET /api/mobile/modems/status_full/` : vérifie le bearer, renvoie le statut

Le comportement (codes HTTP, corps, latence) est modifiable pendant le
test, et les appels sont comptés pour les assertions.
*/

use crate::fixtures::{login_response, status_full_response, TEST_PASSWORD, TEST_TOKEN, TEST_USERNAME};
use anyhow::Result;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Behaviour {
    username: String,
    password: String,
    token: String,
    /// Code forcé sur le login (ex: 401) quels que soient les identifiants
    login_status: Option<StatusCode>,
    /// Corps brut renvoyé à la place du login normal
    login_body: Option<String>,
    status_code: StatusCode,
    status_body: String,
    status_delay: Duration,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            username: TEST_USERNAME.to_string(),
            password: TEST_PASSWORD.to_string(),
            token: TEST_TOKEN.to_string(),
            login_status: None,
            login_body: None,
            status_code: StatusCode::OK,
            status_body: status_full_response().to_string(),
            status_delay: Duration::ZERO,
        }
    }
}

#[derive(Default)]
struct Counters {
    login_calls: AtomicUsize,
    status_calls: AtomicUsize,
    status_in_flight: AtomicUsize,
    status_max_in_flight: AtomicUsize,
    last_authorization: Mutex<Option<String>>,
}

#[derive(Clone, Default)]
struct RouterState {
    behaviour: Arc<Mutex<Behaviour>>,
    counters: Arc<Counters>,
}

/// Routeur simulé, arrêté automatiquement au drop
pub struct MockRouter {
    addr: SocketAddr,
    state: RouterState,
    server: JoinHandle<()>,
}

impl MockRouter {
    /// Démarre le serveur sur 127.0.0.1 avec un port libre
    pub async fn start() -> Result<Self> {
        env_logger::builder().is_test(true).try_init().ok(); // Init logging pour tests
        let state = RouterState::default();
        let app = Router::new()
            .route("/api/login", post(login))
            .route("/api/mobile/modems/status_full/", get(status_full))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[mock-router] server stopped: {}", e);
            }
        });

        log::info!("[mock-router] listening on http://{}", addr);
        Ok(Self { addr, state, server })
    }

    /// URL de base à donner au bridge (sans slash final)
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn token(&self) -> String {
        self.state.behaviour.lock().unwrap().token.clone()
    }

    /// Force le code HTTP du login
    pub fn set_login_status(&self, code: u16) {
        self.state.behaviour.lock().unwrap().login_status = Some(to_status(code));
    }

    /// Remplace le corps du login (200) par un texte brut
    pub fn set_login_body<S: Into<String>>(&self, body: S) {
        self.state.behaviour.lock().unwrap().login_body = Some(body.into());
    }

    /// Réponse JSON de la route status_full
    pub fn set_status_response(&self, code: u16, body: Value) {
        self.set_status_raw(code, body.to_string());
    }

    /// Réponse brute (éventuellement invalide) de la route status_full
    pub fn set_status_raw<S: Into<String>>(&self, code: u16, body: S) {
        let mut behaviour = self.state.behaviour.lock().unwrap();
        behaviour.status_code = to_status(code);
        behaviour.status_body = body.into();
    }

    /// Latence ajoutée avant la réponse status_full
    pub fn set_status_delay(&self, delay: Duration) {
        self.state.behaviour.lock().unwrap().status_delay = delay;
    }

    pub fn login_calls(&self) -> usize {
        self.state.counters.login_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.state.counters.status_calls.load(Ordering::SeqCst)
    }

    /// Nombre max de requêtes status_full servies en parallèle
    pub fn max_concurrent_status(&self) -> usize {
        self.state.counters.status_max_in_flight.load(Ordering::SeqCst)
    }

    /// Dernier header Authorization reçu sur status_full
    pub fn last_authorization(&self) -> Option<String> {
        self.state.counters.last_authorization.lock().unwrap().clone()
    }
}

impl Drop for MockRouter {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn to_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn json_response(code: StatusCode, body: String) -> Response {
    (code, [(CONTENT_TYPE, "application/json")], body).into_response()
}

async fn login(State(state): State<RouterState>, body: String) -> Response {
    state.counters.login_calls.fetch_add(1, Ordering::SeqCst);
    let behaviour = state.behaviour.lock().unwrap().clone();

    if let Some(code) = behaviour.login_status {
        return json_response(code, r#"{"error":"forced"}"#.to_string());
    }
    if let Some(raw) = behaviour.login_body {
        return json_response(StatusCode::OK, raw);
    }

    let credentials: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => return json_response(StatusCode::BAD_REQUEST, r#"{"error":"bad json"}"#.to_string()),
    };
    if credentials["username"] != behaviour.username || credentials["password"] != behaviour.password {
        log::warn!("[mock-router] rejected login for {}", credentials["username"]);
        return json_response(StatusCode::UNAUTHORIZED, r#"{"error":"unauthorized"}"#.to_string());
    }

    json_response(StatusCode::OK, login_response(&behaviour.token).to_string())
}

async fn status_full(State(state): State<RouterState>, headers: HeaderMap) -> Response {
    let counters = &state.counters;
    counters.status_calls.fetch_add(1, Ordering::SeqCst);

    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    *counters.last_authorization.lock().unwrap() = authorization.clone();
    let behaviour = state.behaviour.lock().unwrap().clone();

    let current = counters.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    counters.status_max_in_flight.fetch_max(current, Ordering::SeqCst);
    if !behaviour.status_delay.is_zero() {
        tokio::time::sleep(behaviour.status_delay).await;
    }
    counters.status_in_flight.fetch_sub(1, Ordering::SeqCst);

    let expected = format!("Bearer {}", behaviour.token);
    if authorization.as_deref() != Some(expected.as_str()) {
        return json_response(StatusCode::UNAUTHORIZED, r#"{"error":"bad token"}"#.to_string());
    }

    json_response(behaviour.status_code, behaviour.status_body)
}
