//! Prometheus metrics for the reminder service
//!
//! Tracks deliveries, skipped events, unresolved names, failing upstream
//! stores and tick durations. An optional HTTP listener exposes `/metrics`
//! and `/health`.
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Instant;
use tower_http::trace::TraceLayer;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all notifier metrics
struct NotifierMetrics {
    deliveries: CounterVec,
    parse_failures: Counter,
    unresolved_names: Counter,
    roster_refresh_failures: Counter,
    calendar_fetch_failures: Counter,
    tick_duration: HistogramVec,
}

/// Global storage for notifier metrics
static NOTIFIER_METRICS: OnceLock<NotifierMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

/// Process start, reported by `/health`
static STARTED_AT: OnceLock<Instant> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = coursebell::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();
    STARTED_AT.get_or_init(Instant::now);

    let metrics = NotifierMetrics {
        deliveries: register_counter_vec!(
            "coursebell_deliveries_total",
            "Push messages by outcome",
            &["outcome"]
        )?,
        parse_failures: register_counter!(
            "coursebell_parse_failures_total",
            "Event descriptions that could not be parsed"
        )?,
        unresolved_names: register_counter!(
            "coursebell_unresolved_names_total",
            "Names with no roster match"
        )?,
        roster_refresh_failures: register_counter!(
            "coursebell_roster_refresh_failures_total",
            "Failed roster refreshes (stale roster served)"
        )?,
        calendar_fetch_failures: register_counter!(
            "coursebell_calendar_fetch_failures_total",
            "Ticks abandoned because the calendar store failed"
        )?,
        tick_duration: register_histogram_vec!(
            "coursebell_tick_duration_seconds",
            "Duration of scheduler ticks in seconds",
            &["kind"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
    };

    NOTIFIER_METRICS
        .set(metrics)
        .map_err(|_| "Notifier metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    NOTIFIER_METRICS.get().is_some()
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

/// Record one push attempt
pub fn record_delivery(success: bool) {
    if let Some(m) = NOTIFIER_METRICS.get() {
        let outcome = if success { "sent" } else { "failed" };
        m.deliveries.with_label_values(&[outcome]).inc();
    }
}

pub fn record_parse_failure() {
    if let Some(m) = NOTIFIER_METRICS.get() {
        m.parse_failures.inc();
    }
}

pub fn record_unresolved_name() {
    if let Some(m) = NOTIFIER_METRICS.get() {
        m.unresolved_names.inc();
    }
}

pub fn record_roster_refresh_failure() {
    if let Some(m) = NOTIFIER_METRICS.get() {
        m.roster_refresh_failures.inc();
    }
}

pub fn record_calendar_fetch_failure() {
    if let Some(m) = NOTIFIER_METRICS.get() {
        m.calendar_fetch_failures.inc();
    }
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

/// Start a tick timer; `kind` is `lookahead` or `digest`
pub fn start_tick_timer(kind: &str) -> MetricsTimer {
    match NOTIFIER_METRICS.get() {
        Some(m) => MetricsTimer::new(m.tick_duration.with_label_values(&[kind]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// HTTP Listener
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    metrics: bool,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: STARTED_AT.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
        metrics: metrics_initialized(),
    })
}

async fn metrics_text() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Router serving `/health` and `/metrics`
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .layer(TraceLayer::new_for_http())
}

/// Serve the metrics router until `shutdown` resolves
pub async fn serve(
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics listener on {}", addr);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

// ============================================================================
// Tests
// ============================================================================
