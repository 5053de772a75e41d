// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics, CACHE_ENTRIES, CACHE_OPERATIONS, COST_TOTAL, GENERATION_REQUESTS,
    PARSE_FAILURES, RETRY_ATTEMPTS, TOKENS_TOTAL, UPSTREAM_CALLS, UPSTREAM_DURATION,
};

/// Helper to record one upstream attempt
pub fn record_upstream_call(provider: &str, tier: &str, outcome: &str, duration_secs: f64) {
    UPSTREAM_CALLS
        .with_label_values(&[provider, tier, outcome])
        .inc();

    UPSTREAM_DURATION
        .with_label_values(&[provider])
        .observe(duration_secs);
}

/// Helper to record a failed attempt inside the retry executor
pub fn record_retry_attempt(operation: &str, class: &str) {
    RETRY_ATTEMPTS.with_label_values(&[operation, class]).inc();
}

/// Helper to record token usage
pub fn record_tokens(tier: &str, input: u64, output: u64) {
    if input > 0 {
        TOKENS_TOTAL
            .with_label_values(&[tier, "input"])
            .inc_by(input as f64);
    }
    if output > 0 {
        TOKENS_TOTAL
            .with_label_values(&[tier, "output"])
            .inc_by(output as f64);
    }
}

pub fn record_cost(kind: &str, dollars: f64) {
    if dollars > 0.0 {
        COST_TOTAL.with_label_values(&[kind]).inc_by(dollars);
    }
}

/// Helper to record cache operations (hit, miss, join, expire, evict)
pub fn record_cache_operation(cache: &str, operation: &str) {
    CACHE_OPERATIONS.with_label_values(&[cache, operation]).inc();
}

pub fn update_cache_entries(cache: &str, count: usize) {
    CACHE_ENTRIES.with_label_values(&[cache]).set(count as f64);
}

pub fn record_parse_failure(stage: &str) {
    PARSE_FAILURES.with_label_values(&[stage]).inc();
}

pub fn record_generation(outcome: &str) {
    GENERATION_REQUESTS.with_label_values(&[outcome]).inc();
}
