/// Metrics and telemetry for rollsync
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Live stream messages and dropped protocol errors
/// - Reconnection attempts
/// - History page fetches
/// - Game server requests
/// - Size of the in-memory roll log

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== Live Stream Metrics ==========

    /// Messages received on the live stream by channel
    pub static ref STREAM_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rollsync_stream_messages_total",
        "Total number of live stream messages received",
        &["channel"]
    )
    .unwrap();

    /// Messages dropped because they could not be decoded
    pub static ref PROTOCOL_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rollsync_protocol_errors_total",
        "Total number of malformed or unrecognized stream messages",
        &["channel"]
    )
    .unwrap();

    /// Reconnection attempts scheduled after a stream failure
    pub static ref RECONNECT_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        "rollsync_reconnect_attempts_total",
        "Total number of scheduled live stream reconnections"
    )
    .unwrap();

    // ========== History Metrics ==========

    /// History page fetches by outcome
    pub static ref HISTORY_FETCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rollsync_history_fetches_total",
        "Total number of history page fetches",
        &["outcome"]
    )
    .unwrap();

    // ========== Request Metrics ==========

    /// Game server request duration in seconds
    pub static ref REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "rollsync_request_duration_seconds",
        "Game server request latencies in seconds",
        &["endpoint", "outcome"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Store Metrics ==========

    /// Events currently held in the log
    pub static ref EVENT_LOG_SIZE: IntGauge = register_int_gauge!(
        "rollsync_event_log_size",
        "Number of events in the in-memory roll log"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record a received stream message
pub fn record_stream_message(channel: &str) {
    STREAM_MESSAGES_TOTAL.with_label_values(&[channel]).inc();
}

/// Record a dropped stream message
pub fn record_protocol_error(channel: &str) {
    PROTOCOL_ERRORS_TOTAL.with_label_values(&[channel]).inc();
}

/// Record a scheduled reconnection
pub fn record_reconnect_attempt() {
    RECONNECT_ATTEMPTS_TOTAL.inc();
}

/// Record a history fetch outcome ("more", "finished" or "error")
pub fn record_history_fetch(outcome: &str) {
    HISTORY_FETCHES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a game server request
pub fn record_request(endpoint: &str, outcome: &str, duration: f64) {
    REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint, outcome])
        .observe(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_stream_traffic() {
        record_stream_message("update");
        record_protocol_error("update");
        let metrics = render_metrics();
        assert!(metrics.contains("rollsync_stream_messages_total"));
        assert!(metrics.contains("rollsync_protocol_errors_total"));
    }

    #[test]
    fn test_record_history_and_requests() {
        record_history_fetch("more");
        record_request("history", "success", 0.05);
        record_reconnect_attempt();
        let metrics = render_metrics();
        assert!(metrics.contains("rollsync_history_fetches_total"));
        assert!(metrics.contains("rollsync_request_duration_seconds"));
        assert!(metrics.contains("rollsync_reconnect_attempts_total"));
    }
}
