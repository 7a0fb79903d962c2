//! Prometheus metrics for the monitoring engine
//!
//! This module provides metrics tracking for:
//! - Checks: outcomes, duration, in-flight count, queue depth
//! - Monitors: live monitor count, status changes
//! - Notifications: delivered and failed messages
//! - API: requests by endpoint and status
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or it is never called, metrics operations are
//! no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec,
    CounterVec, Encoder, Gauge, Histogram, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all engine metrics
struct EngineMetrics {
    checks: CounterVec,
    check_duration: Histogram,
    checks_in_flight: Gauge,
    queue_depth: Gauge,
    active_monitors: Gauge,
    status_changes: CounterVec,
    notifications: CounterVec,
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

/// Global storage for engine metrics
static ENGINE_METRICS: OnceLock<EngineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Registers into the default registry. Calling it again is a no-op.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = stockwatch::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.set(true).is_err() {
        return Ok(());
    }

    let metrics = EngineMetrics {
        checks: register_counter_vec!(
            "stockwatch_checks_total",
            "Completed checks by outcome",
            &["outcome"]
        )?,
        check_duration: register_histogram!(
            "stockwatch_check_duration_seconds",
            "Time spent on a single check in seconds",
            vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0, 120.0]
        )?,
        checks_in_flight: register_gauge!(
            "stockwatch_checks_in_flight",
            "Checks currently running"
        )?,
        queue_depth: register_gauge!(
            "stockwatch_check_queue_depth",
            "Checks waiting for a free slot"
        )?,
        active_monitors: register_gauge!(
            "stockwatch_active_monitors",
            "Items currently being monitored"
        )?,
        status_changes: register_counter_vec!(
            "stockwatch_status_changes_total",
            "Observed stock status changes by new status",
            &["status"]
        )?,
        notifications: register_counter_vec!(
            "stockwatch_notifications_total",
            "Notification deliveries by result",
            &["result"]
        )?,
        api_requests: register_counter_vec!(
            "stockwatch_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "stockwatch_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        )?,
    };

    ENGINE_METRICS
        .set(metrics)
        .map_err(|_| "Engine metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ENGINE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a finished check (stock status or error kind)
pub fn record_check(outcome: &str) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.checks.with_label_values(&[outcome]).inc();
    }
}

pub fn set_checks_in_flight(count: usize) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.checks_in_flight.set(count as f64);
    }
}

pub fn set_queue_depth(depth: usize) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.queue_depth.set(depth as f64);
    }
}

pub fn set_active_monitors(count: usize) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.active_monitors.set(count as f64);
    }
}

/// Record a status change to `status`
pub fn record_status_change(status: &str) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.status_changes.with_label_values(&[status]).inc();
    }
}

/// Record a notification delivery result ("sent" or "failed")
pub fn record_notification(result: &str) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.notifications.with_label_values(&[result]).inc();
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a check timer (records when dropped)
pub fn start_check_timer() -> MetricsTimer {
    match ENGINE_METRICS.get() {
        Some(m) => MetricsTimer::new(m.check_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_are_safe_and_encode() {
        init_metrics().unwrap();
        // Second call is a no-op
        init_metrics().unwrap();
        assert!(metrics_initialized());

        record_check("IN_STOCK");
        record_status_change("IN_STOCK");
        record_notification("sent");
        set_active_monitors(2);
        set_queue_depth(1);
        set_checks_in_flight(1);
        record_api_request("/health", 200, 0.001);
        drop(start_check_timer());

        let text = encode_metrics().unwrap();
        assert!(text.contains("stockwatch_checks_total"));
        assert!(text.contains("stockwatch_active_monitors"));
    }
}
