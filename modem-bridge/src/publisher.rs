//! Status publisher: one plain-text topic per telemetry field.

use crate::broker::Broker;
use crate::router::TelemetryRecord;
use tracing::{debug, warn};

type Extractor = fn(&TelemetryRecord) -> String;

/// Topic suffix and value for every published field, in publish order
pub const STATUS_FIELDS: &[(&str, Extractor)] = &[
    // connection
    ("/state", |r| r.state.clone()),
    ("/connectionType", |r| r.conntype.clone()),
    ("/netState", |r| r.netstate.clone()),
    ("/band", |r| r.band.clone()),
    ("/ntype", |r| r.ntype.clone()),
    // signal
    ("/mobile_signal", |r| r.signal.to_string()),
    ("/mobile_rsrp", |r| r.rsrp.to_string()),
    ("/mobile_rsrq", |r| r.rsrq.to_string()),
    ("/mobile_sinr", |r| r.sinr.to_string()),
    // cell
    ("/cell_id", |r| r.cellid.clone()),
    ("/mcc", |r| r.cell_info.first().map(|c| c.mcc.clone()).unwrap_or_default()),
    ("/mnc", |r| r.cell_info.first().map(|c| c.mnc.clone()).unwrap_or_default()),
    ("/lac", |r| r.lac.clone()),
    // sim and isp
    ("/provider", |r| r.provider.clone()),
    ("/operator", |r| r.oper.clone()),
    ("/simState", |r| r.simstate.clone()),
    ("/band_agg", |r| r.sc_band_av.clone()),
    ("/service_modes_3g", |r| r.service_modes.mode_3g.join(",")),
    ("/service_modes_4g", |r| r.service_modes.mode_4g.join(",")),
];

/// (full topic, payload) pairs for a record
pub fn status_messages(topic_prefix: &str, record: &TelemetryRecord) -> Vec<(String, String)> {
    STATUS_FIELDS
        .iter()
        .map(|(suffix, extract)| (format!("{topic_prefix}{suffix}"), extract(record)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Publish every field independently. A failed field is logged and skipped.
pub async fn publish_status<B: Broker>(broker: &B, topic_prefix: &str, record: &TelemetryRecord) -> PublishReport {
    let mut report = PublishReport::default();

    for (topic, payload) in status_messages(topic_prefix, record) {
        report.attempted += 1;
        debug!(%topic, %payload, "publish");
        if let Err(e) = broker.publish_text(topic.clone(), payload).await {
            report.failed += 1;
            warn!(%topic, "publish failed: {}", e);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use modem_bridge_devkit::{fixtures, MockMqttClient};

    fn sample() -> TelemetryRecord {
        serde_json::from_value(fixtures::modem_status_entry()).unwrap()
    }

    #[tokio::test]
    async fn test_publishes_exact_field_set() {
        let broker = MockMqttClient::new();

        let report = publish_status(&broker, "home/router", &sample()).await;

        assert_eq!(report, PublishReport { attempted: 19, failed: 0 });
        let topics: Vec<String> = broker.get_published_messages().into_iter().map(|m| m.topic).collect();
        let expected: Vec<String> = [
            "state", "connectionType", "netState", "band", "ntype",
            "mobile_signal", "mobile_rsrp", "mobile_rsrq", "mobile_sinr",
            "cell_id", "mcc", "mnc", "lac",
            "provider", "operator", "simState", "band_agg", "service_modes_3g", "service_modes_4g",
        ]
        .iter()
        .map(|s| format!("home/router/{s}"))
        .collect();
        assert_eq!(topics, expected);
    }

    #[tokio::test]
    async fn test_payload_values() {
        let broker = MockMqttClient::new();
        publish_status(&broker, "r", &sample()).await;

        let value = |t: &str| broker.last_text(&format!("r/{t}")).unwrap();
        assert_eq!(value("mobile_signal"), "-62");
        assert_eq!(value("mobile_rsrp"), "-102");
        assert_eq!(value("mobile_rsrq"), "-12");
        assert_eq!(value("mobile_sinr"), "0");
        assert_eq!(value("band"), "LTE B3");
        assert_eq!(value("ntype"), "LTE");
        assert_eq!(value("connectionType"), "4G (LTE)");
        assert_eq!(value("netState"), "Registered, home");
        assert_eq!(value("mcc"), "222");
        assert_eq!(value("mnc"), "01");
        assert_eq!(value("operator"), "I TIM");
        assert_eq!(value("band_agg"), "Single");
        assert_eq!(value("service_modes_3g"), "wcdma_850,wcdma_900,wcdma_1800,wcdma_2100");
        assert_eq!(
            value("service_modes_4g"),
            "lte_b1,lte_b3,lte_b5,lte_b7,lte_b8,lte_b20"
        );
    }

    #[tokio::test]
    async fn test_failed_field_does_not_stop_the_rest() {
        let broker = MockMqttClient::new();
        broker.fail_topic("r/band");
        broker.fail_topic("r/mcc");

        let report = publish_status(&broker, "r", &sample()).await;

        assert_eq!(report, PublishReport { attempted: 19, failed: 2 });
        assert_eq!(broker.get_published_messages().len(), 17);
        assert_eq!(broker.last_text("r/service_modes_4g").as_deref(), Some("lte_b1,lte_b3,lte_b5,lte_b7,lte_b8,lte_b20"));
    }

    #[test]
    fn test_missing_cell_info_gives_empty_values() {
        let mut record = sample();
        record.cell_info.clear();
        record.service_modes.mode_3g.clear();

        let messages = status_messages("r", &record);
        let get = |t: &str| messages.iter().find(|(topic, _)| topic == t).map(|(_, v)| v.as_str());
        assert_eq!(get("r/mcc"), Some(""));
        assert_eq!(get("r/mnc"), Some(""));
        assert_eq!(get("r/service_modes_3g"), Some(""));
        assert_eq!(messages.len(), STATUS_FIELDS.len());
    }
}
