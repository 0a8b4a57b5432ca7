//! Metrics and observability utilities
//!
//! Counters and histograms for the pipeline stages with standardized
//! naming conventions. Recording is a no-op until a recorder is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Duration;

/// Metrics prefix for all PubForge metrics
pub const METRICS_PREFIX: &str = "pubforge";

/// Register all metric descriptions
pub fn register_metrics() {
    // Search metrics
    describe_counter!(
        format!("{}_search_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total search API requests, labelled by outcome"
    );

    describe_counter!(
        format!("{}_search_rate_limited_total", METRICS_PREFIX),
        Unit::Count,
        "Search API responses with status 429"
    );

    // Store metrics
    describe_counter!(
        format!("{}_publications_upserted_total", METRICS_PREFIX),
        Unit::Count,
        "Publications inserted or updated, labelled by stage"
    );

    describe_counter!(
        format!("{}_item_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Items rolled back to their savepoint, labelled by stage"
    );

    // Validation metrics
    describe_gauge!(
        format!("{}_validation_findings", METRICS_PREFIX),
        Unit::Count,
        "Findings reported by the last validation run, labelled by check"
    );

    // Stage metrics
    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Stage wall-clock duration in seconds"
    );
}

/// Record one search request attempt
pub fn record_search_request(outcome: &'static str) {
    counter!(
        format!("{}_search_requests_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a 429 from the search API
pub fn record_rate_limited() {
    counter!(format!("{}_search_rate_limited_total", METRICS_PREFIX)).increment(1);
}

/// Record publications written by a stage
pub fn record_publications_upserted(stage: &'static str, count: u64) {
    counter!(
        format!("{}_publications_upserted_total", METRICS_PREFIX),
        "stage" => stage
    )
    .increment(count);
}

/// Record an item that was rolled back
pub fn record_item_failure(stage: &'static str) {
    counter!(
        format!("{}_item_failures_total", METRICS_PREFIX),
        "stage" => stage
    )
    .increment(1);
}

/// Record the finding count of a validation check
pub fn record_validation_findings(check: &'static str, count: u64) {
    gauge!(
        format!("{}_validation_findings", METRICS_PREFIX),
        "check" => check
    )
    .set(count as f64);
}

/// Record how long a stage took
pub fn record_stage_duration(stage: &'static str, elapsed: Duration) {
    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage
    )
    .record(elapsed.as_secs_f64());
}
