//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! exporter health statistics as a plain-text table.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use herakles_jvm_exporter::health_stats::LastSweep;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "More info: https://www.herakles.now - Support: exporter@herakles.now";

/// Maps the last sweep outcome to an HTTP status and a short heading.
pub fn sweep_status(last: Option<LastSweep>) -> (StatusCode, &'static str) {
    match last {
        None => (StatusCode::OK, "OK - Waiting for first sweep"),
        Some(sweep) if sweep.success => (StatusCode::OK, "OK"),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, "Last discovery sweep failed"),
    }
}

fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    // Track HTTP request for health endpoint
    state.health_stats.record_http_request();

    let (status, message) = sweep_status(state.health_stats.last_sweep());
    let uptime_str = format_uptime(state.health_stats.get_uptime_seconds());

    // Render plain-text table from HealthStats
    let table = state.health_stats.render_table();
    let in_flight = state.sweep.in_flight();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nSamplers in flight: {in_flight}\n\n{table}\n{FOOTER_TEXT}"
        ),
    )
}
