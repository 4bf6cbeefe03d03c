//! Health statistics and monitoring for the exporter.
//!
//! This module provides types for tracking sweep and sampler health, baseline
//! bookkeeping and HTTP request counts. It backs the plain-text `/health`
//! endpoint; the Prometheus view of the same events lives in
//! [`ExporterMetrics`](crate::metrics::ExporterMetrics).

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Thread-safe sliding window of HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Keep only last 10 minutes of timestamps
            let cutoff = now.checked_sub(Duration::from_secs(600)).unwrap_or(now);
            while guard.front().is_some_and(|&t| t < cutoff) {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            let now = Instant::now();
            let cutoff = now.checked_sub(Duration::from_secs(60)).unwrap_or(now);
            guard.iter().filter(|&&t| t >= cutoff).count() as u64
        } else {
            0
        }
    }
}

/// Outcome of the most recent sweep.
#[derive(Debug, Clone, Copy)]
pub struct LastSweep {
    pub finished_at: DateTime<Utc>,
    pub success: bool,
}

/// Health statistics for sweeps, samplers and the HTTP surface.
pub struct HealthStats {
    // Sweeps
    pub total_sweeps: AtomicU64,
    pub sweep_failures: AtomicU64,
    pub sweep_duration_ms: Stat,
    pub discovered_instances: Stat,

    // Samplers
    pub samples_dispatched: AtomicU64,
    pub samples_skipped: AtomicU64,
    pub samples_succeeded: AtomicU64,
    pub samples_failed: AtomicU64,
    pub sample_duration_ms: Stat,

    // Baselines
    pub baseline_entries: AtomicU64,
    pub baseline_resets: AtomicU64,
    pub baselines_evicted: AtomicU64,

    // HTTP server stats
    pub http_request_timestamps: RequestTimestamps,
    pub metrics_endpoint_calls: AtomicU64,

    // Timing
    pub start_time: Instant,
    pub last_sweep: StdRwLock<Option<LastSweep>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            total_sweeps: AtomicU64::new(0),
            sweep_failures: AtomicU64::new(0),
            sweep_duration_ms: Stat::default(),
            discovered_instances: Stat::default(),
            samples_dispatched: AtomicU64::new(0),
            samples_skipped: AtomicU64::new(0),
            samples_succeeded: AtomicU64::new(0),
            samples_failed: AtomicU64::new(0),
            sample_duration_ms: Stat::default(),
            baseline_entries: AtomicU64::new(0),
            baseline_resets: AtomicU64::new(0),
            baselines_evicted: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            start_time: Instant::now(),
            last_sweep: StdRwLock::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    fn set_last_sweep(&self, success: bool) {
        if let Ok(mut guard) = self.last_sweep.write() {
            *guard = Some(LastSweep {
                finished_at: Utc::now(),
                success,
            });
        }
    }

    pub fn record_sweep(&self, duration_ms: f64, discovered_instances: u64) {
        self.total_sweeps.fetch_add(1, Ordering::Relaxed);
        self.sweep_duration_ms.add_sample(duration_ms);
        self.discovered_instances
            .add_sample(discovered_instances as f64);
        self.set_last_sweep(true);
    }

    pub fn record_sweep_failure(&self, duration_ms: f64) {
        self.total_sweeps.fetch_add(1, Ordering::Relaxed);
        self.sweep_failures.fetch_add(1, Ordering::Relaxed);
        self.sweep_duration_ms.add_sample(duration_ms);
        self.set_last_sweep(false);
    }

    pub fn record_dispatch(&self) {
        self.samples_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.samples_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_success(&self, duration_ms: f64) {
        self.samples_succeeded.fetch_add(1, Ordering::Relaxed);
        self.sample_duration_ms.add_sample(duration_ms);
    }

    pub fn record_sample_failure(&self, duration_ms: f64) {
        self.samples_failed.fetch_add(1, Ordering::Relaxed);
        self.sample_duration_ms.add_sample(duration_ms);
    }

    pub fn record_baseline_reset(&self) {
        self.baseline_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_baselines_evicted(&self, count: u64) {
        self.baselines_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn update_baseline_entries(&self, count: u64) {
        self.baseline_entries.store(count, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// `None` until the first sweep has finished.
    pub fn last_sweep(&self) -> Option<LastSweep> {
        self.last_sweep.read().ok().and_then(|guard| *guard)
    }

    pub fn get_sample_success_rate(&self) -> f64 {
        let success = self.samples_succeeded.load(Ordering::Relaxed);
        let failure = self.samples_failed.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_sweep_time_str(&self) -> String {
        match self.last_sweep() {
            Some(last) => last.finished_at.format("%H:%M:%S").to_string(),
            None => "N/A".to_string(),
        }
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;

        let stat_row = |out: &mut String, name: &str, stat: &Stat, precision: usize| {
            let (cur, avg, max, min, _) = stat.snapshot();
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                format!("{:.*}", precision, cur),
                format!("{:.*}", precision.max(1), avg),
                format!("{:.*}", precision, max),
                format!("{:.*}", precision, min),
                left = left_col,
                col = col_w
            )
            .ok();
        };
        let value_row = |out: &mut String, name: &str, value: String| {
            writeln!(out, "{:left$} | {:^col$}", name, value, left = left_col, col = col_w).ok();
        };

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "SWEEPS").ok();
        writeln!(out, "------").ok();
        stat_row(&mut out, "sweep_duration (ms)", &self.sweep_duration_ms, 1);
        stat_row(&mut out, "discovered_instances", &self.discovered_instances, 0);
        value_row(
            &mut out,
            "total_sweeps",
            self.total_sweeps.load(Ordering::Relaxed).to_string(),
        );
        value_row(
            &mut out,
            "failed_sweeps",
            self.sweep_failures.load(Ordering::Relaxed).to_string(),
        );
        value_row(&mut out, "last_sweep", self.get_last_sweep_time_str());

        writeln!(out).ok();
        writeln!(out, "SAMPLERS").ok();
        writeln!(out, "--------").ok();
        stat_row(&mut out, "sample_duration (ms)", &self.sample_duration_ms, 1);
        value_row(
            &mut out,
            "dispatched",
            self.samples_dispatched.load(Ordering::Relaxed).to_string(),
        );
        value_row(
            &mut out,
            "skipped_in_flight",
            self.samples_skipped.load(Ordering::Relaxed).to_string(),
        );
        value_row(
            &mut out,
            "failed",
            self.samples_failed.load(Ordering::Relaxed).to_string(),
        );
        value_row(
            &mut out,
            "success_rate (%)",
            format!("{:.1}", self.get_sample_success_rate()),
        );

        writeln!(out).ok();
        writeln!(out, "BASELINES").ok();
        writeln!(out, "---------").ok();
        value_row(
            &mut out,
            "tracked",
            self.baseline_entries.load(Ordering::Relaxed).to_string(),
        );
        value_row(
            &mut out,
            "resets (remote restarts)",
            self.baseline_resets.load(Ordering::Relaxed).to_string(),
        );
        value_row(
            &mut out,
            "evicted",
            self.baselines_evicted.load(Ordering::Relaxed).to_string(),
        );

        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();
        value_row(
            &mut out,
            "requests_last_minute",
            self.http_request_timestamps.count_last_minute().to_string(),
        );
        value_row(
            &mut out,
            "metrics_endpoint_calls",
            self.metrics_endpoint_calls
                .load(Ordering::Relaxed)
                .to_string(),
        );

        out
    }
}
