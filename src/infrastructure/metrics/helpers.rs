//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    MESSAGES_DELIVERED_TOTAL, MESSAGES_FAILED_TOTAL, MESSAGES_RECEIVED_TOTAL,
    PERSISTENCE_APPENDS_TOTAL, PERSISTENCE_LATENCY, WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording message metrics
pub struct MessageMetrics;

impl MessageMetrics {
    pub fn record_received() {
        MESSAGES_RECEIVED_TOTAL.inc();
    }

    pub fn record_delivered(count: u64) {
        MESSAGES_DELIVERED_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        MESSAGES_FAILED_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording persistence outcomes
pub struct PersistenceMetrics;

impl PersistenceMetrics {
    pub fn record_stored(latency_secs: f64) {
        PERSISTENCE_APPENDS_TOTAL.with_label_values(&["stored"]).inc();
        PERSISTENCE_LATENCY.observe(latency_secs);
    }

    pub fn record_failed(latency_secs: f64) {
        PERSISTENCE_APPENDS_TOTAL.with_label_values(&["failed"]).inc();
        PERSISTENCE_LATENCY.observe(latency_secs);
    }

    pub fn record_timeout() {
        PERSISTENCE_APPENDS_TOTAL.with_label_values(&["timeout"]).inc();
    }

    pub fn record_unavailable() {
        PERSISTENCE_APPENDS_TOTAL.with_label_values(&["unavailable"]).inc();
    }
}

/// Helper struct for recording inbound WebSocket frames
pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_join() {
        WS_MESSAGES_RECEIVED.with_label_values(&["join_chat_room"]).inc();
    }

    pub fn record_send() {
        WS_MESSAGES_RECEIVED.with_label_values(&["send_message"]).inc();
    }

    pub fn record_ping() {
        WS_MESSAGES_RECEIVED.with_label_values(&["ping"]).inc();
    }

    pub fn record_invalid() {
        WS_MESSAGES_RECEIVED.with_label_values(&["invalid"]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        MessageMetrics::record_received();
        PersistenceMetrics::record_unavailable();

        let output = encode_metrics().unwrap();
        assert!(output.contains("chat_relay_messages_received_total"));
        assert!(output.contains("chat_relay_persistence_appends_total"));
    }
}
