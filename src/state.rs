//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and owns the sweep pipeline driven by the scheduler.

use herakles_jvm_exporter::{
    DeltaTracker, DiscoverySweep, ExporterMetrics, HealthStats, InstanceSampler, JolokiaClient,
    JvmMetrics,
};
use prometheus::{Gauge, Registry};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub scrape_duration: Gauge,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    pub tracker: Arc<DeltaTracker>,
    pub sweep: Arc<DiscoverySweep>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the registry, metric families and sweep pipeline for `config`.
    /// The configuration must already be validated.
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();
        let telemetry_enabled = config.enable_telemetry.unwrap_or(true);

        let jvm_metrics = Arc::new(JvmMetrics::new(&registry)?);
        let telemetry = ExporterMetrics::new(&registry, telemetry_enabled)?;

        let scrape_duration = Gauge::new(
            "herakles_jvm_exporter_scrape_duration_seconds",
            "Time spent serving the /metrics request",
        )?;
        if telemetry_enabled {
            registry.register(Box::new(scrape_duration.clone()))?;
        }
        debug!(telemetry_enabled, "All metrics registered successfully");

        let health_stats = Arc::new(HealthStats::new());
        let tracker = Arc::new(DeltaTracker::new());
        let sampler = Arc::new(InstanceSampler::new(
            Arc::new(JolokiaClient::new(config.request_timeout())?),
            tracker.clone(),
            jvm_metrics,
            telemetry,
            health_stats.clone(),
            config.sampler_options(),
        ));
        let sweep = Arc::new(DiscoverySweep::new(
            config.build_discovery()?,
            sampler,
            config.sweep_options(),
        ));

        Ok(Self {
            registry,
            scrape_duration,
            config: Arc::new(config),
            health_stats,
            tracker,
            sweep,
            start_time: Instant::now(),
        })
    }
}
