//! Prometheus metrics for the gateway.
//!
//! This module provides:
//! - HTTP request metrics (count, latency)
//! - Cache metrics (hit/miss counts)
//! - Downstream call outcomes
//! - Dependency liveness gauges from the last health check
//! - Process metrics (CPU, memory, open fds), sampled on each scrape

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

static PROCESS_COLLECTOR: OnceLock<metrics_process::Collector> = OnceLock::new();

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";

    // Dependency metrics
    pub const DOWNSTREAM_REQUESTS_TOTAL: &str = "downstream_requests_total";
    pub const DEPENDENCY_UP: &str = "dependency_up";
}

/// Initialize the Prometheus metrics exporter.
///
/// This should be called once at server startup.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Use install_recorder() for pull-based metrics (we serve /metrics ourselves)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            let collector = PROCESS_COLLECTOR.get_or_init(metrics_process::Collector::default);
            collector.describe();

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    let handle = PROMETHEUS_HANDLE.get()?;
    if let Some(collector) = PROCESS_COLLECTOR.get() {
        collector.collect();
    }
    Some(handle.render())
}

/// Record an HTTP request. `route` is the matched route template.
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string(),
        "status_class" => status_class
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a cache hit.
pub fn record_cache_hit(mode: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "mode" => mode).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss(mode: &'static str) {
    counter!(names::CACHE_MISSES_TOTAL, "mode" => mode).increment(1);
}

/// Record the outcome of an outbound call (`ok`, `error_status`, `unreachable`, ...).
pub fn record_downstream(target: &'static str, outcome: &'static str) {
    counter!(
        names::DOWNSTREAM_REQUESTS_TOTAL,
        "target" => target,
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish whether a dependency was reachable in the latest health check.
pub fn set_dependency_up(dependency: &'static str, up: bool) {
    gauge!(names::DEPENDENCY_UP, "dependency" => dependency).set(if up { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_after_init() {
        init_metrics();
        record_http_request("GET", "/api/users", 200, Duration::from_millis(3));
        record_downstream("processing", "ok");

        let rendered = render_metrics().expect("metrics initialized");
        assert!(rendered.contains(names::HTTP_REQUESTS_TOTAL));
        assert!(rendered.contains(names::DOWNSTREAM_REQUESTS_TOTAL));
        assert!(rendered.contains("process_"));
    }
}
