/*!
Fixtures JSON capturées sur un routeur RUTX (identifiants anonymisés)
*/

use serde_json::{json, Value};

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "admin01";
pub const TEST_TOKEN: &str = "7d4f0c1e2b3a49c8a6f5e4d3c2b1a090";

/// Réponse de `POST /api/login`
pub fn login_response(token: &str) -> Value {
    json!({
        "ubus_rpc_session": token,
        "expires": 299,
        "timeout": 300
    })
}

/// Un élément complet de `data` de `status_full`
pub fn modem_status_entry() -> Value {
    json!({
        "txbytes": 12332234942.0,
        "volte": false,
        "pinleft": 3,
        "sc_band_av": "Single",
        "rxbytes": 156511412785.0,
        "wwan_gnss_conflict": false,
        "cell_info": [{
            "cellid": "76957227",
            "mnc": "01",
            "ue_state": 3,
            "earfcn": 1350,
            "pcid": 17,
            "mcc": "222"
        }],
        "rscp": "N/A",
        "pinstate": "Inserted",
        "provider": "TIM",
        "oper": "I TIM",
        "ecio": "N/A",
        "sinr": 0,
        "state_id": 1,
        "conntype": "4G (LTE)",
        "state": "Connected",
        "temperature": 43,
        "version": "EG06ELAR04A04M4G",
        "model": "EG06-E",
        "busy_state": "Idle",
        "imei": "860000000000001",
        "active_sim": 1,
        "imsi": "222010000000001",
        "busy_state_id": 1,
        "name": "Internal modem",
        "pinstate_id": 1,
        "iccid": "89390100000000000001",
        "sim_count": 1,
        "service_modes": {
            "4G": ["lte_b1", "lte_b3", "lte_b5", "lte_b7", "lte_b8", "lte_b20"],
            "3G": ["wcdma_850", "wcdma_900", "wcdma_1800", "wcdma_2100"]
        },
        "builtin": true,
        "cellid": "76957227",
        "ipv6": true,
        "ca_signal": [],
        "baudrate": 115200,
        "mode": 0,
        "dynamic_mtu": true,
        "operators_scan": true,
        "band": "LTE B3",
        "ntype": "LTE",
        "volte_supported": true,
        "multi_apn": true,
        "id": "1-1",
        "primary": true,
        "netstate": "Registered, home",
        "rsrq": -12,
        "rsrp": -102,
        "signal": -62,
        "simstate_id": 0,
        "lac": "4025",
        "netstate_id": 1,
        "pukleft": 10,
        "is_busy": 0,
        "simstate": "Inserted"
    })
}

/// Réponse complète de `GET /api/mobile/modems/status_full/`
pub fn status_full_response() -> Value {
    json!({ "success": true, "data": [modem_status_entry()] })
}

/// Le routeur répond mais signale un échec interne
pub fn status_failure_response() -> Value {
    json!({ "success": false, "data": [] })
}

/// Succès déclaré mais aucun modem
pub fn status_empty_response() -> Value {
    json!({ "success": true, "data": [] })
}
