//! Per-instance sampling.
//!
//! One [`InstanceSampler::sample`] call performs three Jolokia reads against a
//! single instance (JVM memory, Tomcat thread pool, Tomcat request processor)
//! and writes the results into [`JvmMetrics`]. Any failure abandons the
//! remaining reads for that instance, zeroes its gauges and leaves its
//! counters where they are. Nothing is propagated to the caller.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::baseline::{DeltaTracker, Observation};
use crate::error::Result;
use crate::health_stats::HealthStats;
use crate::identity::{InstanceIdentity, ServiceIdentity};
use crate::jolokia::{
    self, bytes_to_megabytes, AttributeBag, AttributeReader, CURRENT_THREADS_BUSY, CURRENT_THREAD_COUNT,
    HEAP_MEMORY_USAGE, MAX_THREADS, MEMORY_MBEAN, NON_HEAP_MEMORY_USAGE,
};
use crate::metrics::{series_labels, CounterKind, ExporterMetrics, GaugeKind, JvmMetrics};

pub const DEFAULT_AGENT_PATH: &str = "/jolokia";
pub const DEFAULT_CONNECTOR_PREFIX: &str = "http-nio";

/// Where to find the agent and which connector to read.
#[derive(Debug, Clone)]
pub struct SamplerOptions {
    /// Path of the Jolokia agent below the instance URI.
    pub agent_path: String,
    /// Connector name prefix; the MBean name is `<prefix>-<port>`.
    pub connector_prefix: String,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            agent_path: DEFAULT_AGENT_PATH.to_string(),
            connector_prefix: DEFAULT_CONNECTOR_PREFIX.to_string(),
        }
    }
}

/// Samples single instances and publishes their metrics.
pub struct InstanceSampler {
    reader: Arc<dyn AttributeReader>,
    tracker: Arc<DeltaTracker>,
    metrics: Arc<JvmMetrics>,
    telemetry: ExporterMetrics,
    stats: Arc<HealthStats>,
    options: SamplerOptions,
}

impl InstanceSampler {
    pub fn new(
        reader: Arc<dyn AttributeReader>,
        tracker: Arc<DeltaTracker>,
        metrics: Arc<JvmMetrics>,
        telemetry: ExporterMetrics,
        stats: Arc<HealthStats>,
        options: SamplerOptions,
    ) -> Self {
        Self {
            reader,
            tracker,
            metrics,
            telemetry,
            stats,
            options,
        }
    }

    pub fn tracker(&self) -> &Arc<DeltaTracker> {
        &self.tracker
    }

    pub fn telemetry(&self) -> &ExporterMetrics {
        &self.telemetry
    }

    pub fn stats(&self) -> &Arc<HealthStats> {
        &self.stats
    }

    /// Samples one instance. Failures are logged and turned into zeroed gauges.
    #[instrument(skip(self, service, instance), fields(service = %service, instance = %instance))]
    pub async fn sample(&self, service: &ServiceIdentity, instance: &InstanceIdentity) {
        let start = Instant::now();
        let result = self.try_sample(service, instance).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => {
                debug!(elapsed_ms, "instance sampled");
                self.stats.record_sample_success(elapsed_ms);
            }
            Err(e) => {
                warn!(
                    service = %service,
                    host = %instance.host(),
                    port = instance.port(),
                    error = %e,
                    "sampling failed, zeroing gauges"
                );
                self.metrics.reset_gauges(&series_labels(service, instance));
                self.telemetry
                    .sample_failures_total
                    .with_label_values(&[service.as_str()])
                    .inc();
                self.stats.record_sample_failure(elapsed_ms);
            }
        }
    }

    async fn try_sample(&self, service: &ServiceIdentity, instance: &InstanceIdentity) -> Result<()> {
        let endpoint = instance.endpoint_url(&self.options.agent_path);
        let labels = series_labels(service, instance);

        // ========== JVM memory ==========
        let memory = self
            .reader
            .read(&endpoint, MEMORY_MBEAN, &[HEAP_MEMORY_USAGE, NON_HEAP_MEMORY_USAGE])
            .await?;
        let heap = jolokia::composite(&memory, MEMORY_MBEAN, HEAP_MEMORY_USAGE)?;
        let non_heap = jolokia::composite(&memory, MEMORY_MBEAN, NON_HEAP_MEMORY_USAGE)?;
        let megabytes = |usage: &AttributeBag, field: &str| {
            jolokia::number(usage, MEMORY_MBEAN, field).map(bytes_to_megabytes)
        };

        let memory_gauges = [
            (GaugeKind::HeapMemoryUsed, megabytes(heap, "used")?),
            (GaugeKind::HeapMemoryMax, megabytes(heap, "max")?),
            (GaugeKind::HeapMemoryCommitted, megabytes(heap, "committed")?),
            (GaugeKind::NonHeapMemoryUsed, megabytes(non_heap, "used")?),
            (GaugeKind::NonHeapMemoryCommitted, megabytes(non_heap, "committed")?),
        ];
        for (kind, value) in memory_gauges {
            self.metrics.set_gauge(kind, &labels, value);
        }

        // ========== Tomcat thread pool ==========
        let pool_mbean = jolokia::thread_pool_mbean(&self.options.connector_prefix, instance.port());
        let pool = self
            .reader
            .read(
                &endpoint,
                &pool_mbean,
                &[MAX_THREADS, CURRENT_THREAD_COUNT, CURRENT_THREADS_BUSY],
            )
            .await?;

        let thread_gauges = [
            (GaugeKind::MaxThreads, jolokia::number(&pool, &pool_mbean, MAX_THREADS)?),
            (
                GaugeKind::CurrentThreadCount,
                jolokia::number(&pool, &pool_mbean, CURRENT_THREAD_COUNT)?,
            ),
            (
                GaugeKind::CurrentThreadsBusy,
                jolokia::number(&pool, &pool_mbean, CURRENT_THREADS_BUSY)?,
            ),
        ];
        for (kind, value) in thread_gauges {
            self.metrics.set_gauge(kind, &labels, value);
        }

        // ========== Tomcat request processor ==========
        let processor_mbean =
            jolokia::request_processor_mbean(&self.options.connector_prefix, instance.port());
        let attributes: Vec<&str> = CounterKind::ALL.iter().map(|k| k.attribute()).collect();
        let requests = self
            .reader
            .read(&endpoint, &processor_mbean, &attributes)
            .await?;

        // Parse everything before touching a baseline so a malformed attribute
        // leaves all five baselines untouched.
        let readings = CounterKind::ALL
            .iter()
            .map(|&kind| {
                jolokia::counter(&requests, &processor_mbean, kind.attribute()).map(|v| (kind, v))
            })
            .collect::<Result<Vec<_>>>()?;

        for (kind, value) in readings {
            match self.tracker.record(kind, service, instance, value) {
                Observation::Advanced(delta) => {
                    self.metrics.increment_counter(kind, &labels, delta);
                }
                Observation::First => {
                    debug!(counter = kind.attribute(), value, "baseline established");
                }
                Observation::Reset { previous, current } => {
                    info!(
                        counter = kind.attribute(),
                        previous,
                        current,
                        "remote counter went backwards, instance restarted; new baseline"
                    );
                    self.telemetry.baseline_resets_total.inc();
                    self.stats.record_baseline_reset();
                }
            }
        }

        Ok(())
    }
}
