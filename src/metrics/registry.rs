// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry,
    register_histogram_vec_with_registry, CounterVec, Encoder, GaugeVec, HistogramVec, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // UPSTREAM METRICS
    // ============================================================================

    /// Upstream provider calls, one per attempt
    pub static ref UPSTREAM_CALLS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("upstream_calls_total", "Total upstream provider calls"),
        &["provider", "tier", "outcome"],
        REGISTRY
    ).unwrap();

    /// Upstream call duration
    pub static ref UPSTREAM_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("upstream_duration_seconds", "Upstream provider call duration")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]),
        &["provider"],
        REGISTRY
    ).unwrap();

    /// Retry executor failures by class
    pub static ref RETRY_ATTEMPTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("retry_attempts_total", "Failed attempts seen by the retry executor"),
        &["operation", "class"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // USAGE METRICS
    // ============================================================================

    /// Total tokens billed
    pub static ref TOKENS_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("tokens_total", "Total tokens billed"),
        &["tier", "type"], // type: input, output
        REGISTRY
    ).unwrap();

    /// Total spend in dollars
    pub static ref COST_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cost_usd_total", "Total upstream spend in USD"),
        &["kind"], // kind: text, voice
        REGISTRY
    ).unwrap();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total cache operations"),
        &["cache", "operation"], // operation: hit, miss, join, expire, evict
        REGISTRY
    ).unwrap();

    /// Current cache entries
    pub static ref CACHE_ENTRIES: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("cache_entries_current", "Current number of cache entries"),
        &["cache"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // GENERATION METRICS
    // ============================================================================

    /// Provider responses that did not match the expected ad-copy shape
    pub static ref PARSE_FAILURES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("parse_failures_total", "Unparseable provider responses"),
        &["stage"], // stage: initial, reprompt
        REGISTRY
    ).unwrap();

    /// Orchestrated generation requests
    pub static ref GENERATION_REQUESTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("generation_requests_total", "Total orchestrated generation requests"),
        &["outcome"],
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        UPSTREAM_CALLS.with_label_values(&["anthropic", "fast", "success"]).inc();
        CACHE_OPERATIONS.with_label_values(&["ad_copy", "hit"]).inc();
        TOKENS_TOTAL.with_label_values(&["fast", "input"]).inc_by(1.0);

        let metrics = gather_metrics();
        assert!(metrics.contains("upstream_calls_total"));
        assert!(metrics.contains("tokens_total"));
        assert!(metrics.contains("cache_operations_total"));
    }
}
