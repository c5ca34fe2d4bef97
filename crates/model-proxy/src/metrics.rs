//! Prometheus metrics for model-proxy.
//!
//! Tracks call outcomes and durations per interface.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of settled calls
    pub static ref CALLS_TOTAL: CounterVec = register_counter_vec!(
        "model_proxy_calls_total",
        "Total number of interface calls by outcome",
        &["interface", "outcome"]  // outcome: ok|network_failure|impure_json|malformed_json|parse_failure|mock|mock_error
    )
    .unwrap();

    /// Wall-clock duration of network calls
    pub static ref CALL_DURATION_MS: HistogramVec = register_histogram_vec!(
        "model_proxy_call_duration_ms",
        "Histogram of interface call duration in milliseconds",
        &["interface"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();

    /// Calls aborted by their timeout
    pub static ref CALL_TIMEOUTS_TOTAL: CounterVec = register_counter_vec!(
        "model_proxy_call_timeouts_total",
        "Total number of interface calls aborted by timeout",
        &["interface"]
    )
    .unwrap();

    /// Batches drained by aggregators
    pub static ref BATCHES_TOTAL: CounterVec = register_counter_vec!(
        "model_proxy_batches_total",
        "Total number of drained aggregator batches",
        &["result"]  // result: ok|partial|empty
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record a settled call
pub fn record_call(interface: &str, outcome: &str) {
    CALLS_TOTAL.with_label_values(&[interface, outcome]).inc();
}

/// Helper to record network call duration
pub fn record_call_duration(interface: &str, duration_ms: f64) {
    CALL_DURATION_MS
        .with_label_values(&[interface])
        .observe(duration_ms);
}

/// Helper to record a timeout
pub fn record_timeout(interface: &str) {
    CALL_TIMEOUTS_TOTAL.with_label_values(&[interface]).inc();
}

/// Helper to record a drained batch
pub fn record_batch(total: usize, failed: usize) {
    let result = match (total, failed) {
        (0, _) => "empty",
        (_, 0) => "ok",
        _ => "partial",
    };
    BATCHES_TOTAL.with_label_values(&[result]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_call("Api.list", "ok");
        record_call_duration("Api.list", 12.5);
        record_timeout("Api.slow");
        record_batch(2, 1);

        let metrics = collect_metrics();
        assert!(metrics.contains("model_proxy_calls_total"));
        assert!(metrics.contains("model_proxy_call_duration_ms"));
        assert!(metrics.contains("model_proxy_call_timeouts_total"));
        assert!(metrics.contains("model_proxy_batches_total"));
    }

    #[test]
    fn test_batch_result_labels() {
        record_batch(0, 0);
        record_batch(3, 0);
        record_batch(3, 3);

        let metrics = collect_metrics();
        assert!(metrics.contains("result=\"empty\""));
        assert!(metrics.contains("result=\"ok\""));
        assert!(metrics.contains("result=\"partial\""));
    }

    #[test]
    fn test_multiple_interfaces_same_metric() {
        record_call("Api.a", "mock");
        record_call("Api.b", "mock_error");

        let metrics = collect_metrics();
        assert!(metrics.contains("interface=\"Api.a\""));
        assert!(metrics.contains("interface=\"Api.b\""));
    }
}
