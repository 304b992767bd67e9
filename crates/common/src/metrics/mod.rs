//! Metrics and observability utilities
//!
//! Prometheus metrics for task lifecycle, capability calls and discovery
//! runs, following a `papertrail_` naming convention.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all PaperTrail metrics
pub const METRICS_PREFIX: &str = "papertrail";

/// Histogram buckets for HTTP request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
];

/// Buckets for whole-task duration; runs fan out to several remote services
pub const TASK_BUCKETS: &[f64] = &[
    1.0,   // 1s
    5.0,   // 5s
    10.0,  // 10s
    30.0,  // 30s
    60.0,  // 1m
    120.0, // 2m
    300.0, // 5m
    600.0, // 10m
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_tasks_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Tasks accepted by the registry"
    );

    describe_counter!(
        format!("{}_tasks_finished_total", METRICS_PREFIX),
        Unit::Count,
        "Tasks reaching a terminal status"
    );

    describe_histogram!(
        format!("{}_task_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Wall time from task start to terminal status"
    );

    describe_gauge!(
        format!("{}_tasks_active", METRICS_PREFIX),
        Unit::Count,
        "Tasks currently queued or processing"
    );

    describe_counter!(
        format!("{}_capability_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound capability calls by capability and outcome"
    );

    describe_histogram!(
        format!("{}_capability_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Outbound capability call latency"
    );

    describe_counter!(
        format!("{}_candidates_discarded_total", METRICS_PREFIX),
        Unit::Count,
        "Candidates dropped during discovery, by reason"
    );

    describe_counter!(
        format!("{}_papers_unscored_total", METRICS_PREFIX),
        Unit::Count,
        "Papers whose relevance score could not be produced"
    );

    describe_histogram!(
        format!("{}_layer_size", METRICS_PREFIX),
        Unit::Count,
        "New papers accepted per citation layer"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// A task entered the registry
pub fn record_task_submitted(kind: &str) {
    counter!(
        format!("{}_tasks_submitted_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);

    gauge!(format!("{}_tasks_active", METRICS_PREFIX)).increment(1.0);
}

/// A task reached `completed` or `failed`
pub fn record_task_finished(kind: &str, status: &str, duration_secs: Option<f64>) {
    counter!(
        format!("{}_tasks_finished_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    gauge!(format!("{}_tasks_active", METRICS_PREFIX)).decrement(1.0);

    if let Some(duration) = duration_secs {
        histogram!(
            format!("{}_task_duration_seconds", METRICS_PREFIX),
            "kind" => kind.to_string()
        )
        .record(duration);
    }
}

/// One outbound capability call
pub fn record_capability_call(capability: &str, duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_capability_calls_total", METRICS_PREFIX),
        "capability" => capability.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_capability_duration_seconds", METRICS_PREFIX),
        "capability" => capability.to_string()
    )
    .record(duration_secs);
}

/// Discard tally of a finished run, split by reason
pub fn record_discards(unresolved: usize, over_cap: usize) {
    if unresolved > 0 {
        counter!(
            format!("{}_candidates_discarded_total", METRICS_PREFIX),
            "reason" => "unresolved"
        )
        .increment(unresolved as u64);
    }
    if over_cap > 0 {
        counter!(
            format!("{}_candidates_discarded_total", METRICS_PREFIX),
            "reason" => "over_cap"
        )
        .increment(over_cap as u64);
    }
}

pub fn record_unscored(count: usize) {
    if count > 0 {
        counter!(format!("{}_papers_unscored_total", METRICS_PREFIX)).increment(count as u64);
    }
}

/// Size of one completed citation layer
pub fn record_layer(depth: u32, accepted: usize) {
    histogram!(
        format!("{}_layer_size", METRICS_PREFIX),
        "depth" => depth.to_string()
    )
    .record(accepted as f64);
}
