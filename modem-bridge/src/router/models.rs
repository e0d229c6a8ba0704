use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/login`
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "ubus_rpc_session")]
    pub token: String,
    #[serde(default)]
    pub expires: i64,
    #[serde(default)]
    pub timeout: i64,
}

/// Bearer token for a single status fetch. `expires`/`timeout` are kept for
/// logging only; the token is never reused.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires: i64,
    pub timeout: i64,
}

impl From<LoginResponse> for SessionToken {
    fn from(res: LoginResponse) -> Self {
        Self {
            token: res.token,
            issued_at: Utc::now(),
            expires: res.expires,
            timeout: res.timeout,
        }
    }
}

/// Body of `GET /api/mobile/modems/status_full/`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<TelemetryRecord>,
}

/// One modem as reported by `status_full`. Published fields are required,
/// descriptive ones are optional since firmwares differ.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryRecord {
    // connection
    pub state: String,
    pub conntype: String,
    pub netstate: String,
    pub band: String,
    pub ntype: String,

    // signal, router units (dBm / dB)
    pub signal: i64,
    pub rsrp: i64,
    pub rsrq: i64,
    pub sinr: i64,

    // cell
    pub cellid: String,
    #[serde(default)]
    pub cell_info: Vec<CellInfo>,
    pub lac: String,

    // sim / isp
    pub provider: String,
    pub oper: String,
    pub simstate: String,
    pub sc_band_av: String,
    #[serde(default)]
    pub service_modes: ServiceModes,

    pub id: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub imei: Option<String>,
    pub temperature: Option<i64>,
    pub pinstate: Option<String>,
    pub active_sim: Option<i64>,
    pub primary: Option<bool>,
    pub volte: Option<bool>,
    pub txbytes: Option<f64>,
    pub rxbytes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CellInfo {
    #[serde(default)]
    pub cellid: String,
    #[serde(default)]
    pub mcc: String,
    #[serde(default)]
    pub mnc: String,
    pub earfcn: Option<i64>,
    pub pcid: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceModes {
    #[serde(rename = "3G", default)]
    pub mode_3g: Vec<String>,
    #[serde(rename = "4G", default)]
    pub mode_4g: Vec<String>,
    #[serde(rename = "5G", default)]
    pub mode_5g: Vec<String>,
}
