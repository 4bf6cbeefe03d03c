//! Prometheus metrics definitions for herakles-jvm-exporter.
//!
//! [`JvmMetrics`] is the sink every sampler writes into: memory and thread-pool
//! gauges plus Tomcat request counters, all labelled by `(service, host)`.
//! [`ExporterMetrics`] holds the exporter's own telemetry.
//!
//! Counters are `IntCounterVec`s so an increment is a `u64`; a negative delta
//! cannot be expressed at all.

use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

use crate::identity::{InstanceIdentity, ServiceIdentity};

pub const LABEL_SERVICE: &str = "service";
pub const LABEL_HOST: &str = "host";

/// Instantaneous values read from an instance. Overwritten on every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GaugeKind {
    HeapMemoryUsed,
    HeapMemoryMax,
    HeapMemoryCommitted,
    NonHeapMemoryUsed,
    NonHeapMemoryCommitted,
    MaxThreads,
    CurrentThreadCount,
    CurrentThreadsBusy,
}

impl GaugeKind {
    pub const ALL: [GaugeKind; 8] = [
        GaugeKind::HeapMemoryUsed,
        GaugeKind::HeapMemoryMax,
        GaugeKind::HeapMemoryCommitted,
        GaugeKind::NonHeapMemoryUsed,
        GaugeKind::NonHeapMemoryCommitted,
        GaugeKind::MaxThreads,
        GaugeKind::CurrentThreadCount,
        GaugeKind::CurrentThreadsBusy,
    ];
}

/// Cumulative Tomcat request-processor attributes.
///
/// The remote value counts from the instance's own start and resets when it
/// restarts, so it is only ever applied as an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterKind {
    RequestCount,
    ErrorCount,
    ProcessingTime,
    BytesReceived,
    BytesSent,
}

impl CounterKind {
    pub const ALL: [CounterKind; 5] = [
        CounterKind::RequestCount,
        CounterKind::ErrorCount,
        CounterKind::ProcessingTime,
        CounterKind::BytesReceived,
        CounterKind::BytesSent,
    ];

    /// Attribute name on the `GlobalRequestProcessor` MBean.
    pub fn attribute(self) -> &'static str {
        match self {
            CounterKind::RequestCount => "requestCount",
            CounterKind::ErrorCount => "errorCount",
            CounterKind::ProcessingTime => "processingTime",
            CounterKind::BytesReceived => "bytesReceived",
            CounterKind::BytesSent => "bytesSent",
        }
    }
}

/// Label values for one `(service, host)` series.
pub fn series_labels<'a>(service: &'a ServiceIdentity, instance: &'a InstanceIdentity) -> [&'a str; 2] {
    [service.as_str(), instance.host()]
}

/// Collection of per-instance JVM and Tomcat metrics.
#[derive(Clone)]
pub struct JvmMetrics {
    // ========== JVM Memory ==========
    pub heap_memory_used_mb: IntGaugeVec,
    pub heap_memory_max_mb: IntGaugeVec,
    pub heap_memory_committed_mb: IntGaugeVec,
    pub non_heap_memory_used_mb: IntGaugeVec,
    pub non_heap_memory_committed_mb: IntGaugeVec,

    // ========== Tomcat Thread Pool ==========
    pub tomcat_max_threads: IntGaugeVec,
    pub tomcat_current_threads: IntGaugeVec,
    pub tomcat_busy_threads: IntGaugeVec,

    // ========== Tomcat Requests ==========
    pub tomcat_requests_total: IntCounterVec,
    pub tomcat_errors_total: IntCounterVec,
    pub tomcat_processing_time_ms_total: IntCounterVec,
    pub tomcat_received_bytes_total: IntCounterVec,
    pub tomcat_sent_bytes_total: IntCounterVec,
}

fn gauge_vec(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntGaugeVec> {
    let vec = IntGaugeVec::new(Opts::new(name, help), &[LABEL_SERVICE, LABEL_HOST])?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn counter_vec(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounterVec> {
    let vec = IntCounterVec::new(Opts::new(name, help), &[LABEL_SERVICE, LABEL_HOST])?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

impl JvmMetrics {
    /// Creates and registers all JVM metric families with the registry.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            heap_memory_used_mb: gauge_vec(
                registry,
                "herakles_jvm_heap_memory_used_megabytes",
                "Heap memory currently used by the JVM in MB",
            )?,
            heap_memory_max_mb: gauge_vec(
                registry,
                "herakles_jvm_heap_memory_max_megabytes",
                "Maximum heap memory available to the JVM in MB",
            )?,
            heap_memory_committed_mb: gauge_vec(
                registry,
                "herakles_jvm_heap_memory_committed_megabytes",
                "Heap memory committed by the JVM in MB",
            )?,
            non_heap_memory_used_mb: gauge_vec(
                registry,
                "herakles_jvm_non_heap_memory_used_megabytes",
                "Non-heap memory currently used by the JVM in MB",
            )?,
            non_heap_memory_committed_mb: gauge_vec(
                registry,
                "herakles_jvm_non_heap_memory_committed_megabytes",
                "Non-heap memory committed by the JVM in MB",
            )?,
            tomcat_max_threads: gauge_vec(
                registry,
                "herakles_jvm_tomcat_max_threads",
                "Configured maximum worker threads of the HTTP connector",
            )?,
            tomcat_current_threads: gauge_vec(
                registry,
                "herakles_jvm_tomcat_current_threads",
                "Worker threads currently allocated by the HTTP connector",
            )?,
            tomcat_busy_threads: gauge_vec(
                registry,
                "herakles_jvm_tomcat_busy_threads",
                "Worker threads currently processing a request",
            )?,
            tomcat_requests_total: counter_vec(
                registry,
                "herakles_jvm_tomcat_requests_total",
                "Requests processed by the HTTP connector",
            )?,
            tomcat_errors_total: counter_vec(
                registry,
                "herakles_jvm_tomcat_errors_total",
                "Requests that ended in an error",
            )?,
            tomcat_processing_time_ms_total: counter_vec(
                registry,
                "herakles_jvm_tomcat_processing_time_milliseconds_total",
                "Cumulative request processing time in milliseconds",
            )?,
            tomcat_received_bytes_total: counter_vec(
                registry,
                "herakles_jvm_tomcat_received_bytes_total",
                "Bytes received by the HTTP connector",
            )?,
            tomcat_sent_bytes_total: counter_vec(
                registry,
                "herakles_jvm_tomcat_sent_bytes_total",
                "Bytes sent by the HTTP connector",
            )?,
        })
    }

    pub fn gauge(&self, kind: GaugeKind) -> &IntGaugeVec {
        match kind {
            GaugeKind::HeapMemoryUsed => &self.heap_memory_used_mb,
            GaugeKind::HeapMemoryMax => &self.heap_memory_max_mb,
            GaugeKind::HeapMemoryCommitted => &self.heap_memory_committed_mb,
            GaugeKind::NonHeapMemoryUsed => &self.non_heap_memory_used_mb,
            GaugeKind::NonHeapMemoryCommitted => &self.non_heap_memory_committed_mb,
            GaugeKind::MaxThreads => &self.tomcat_max_threads,
            GaugeKind::CurrentThreadCount => &self.tomcat_current_threads,
            GaugeKind::CurrentThreadsBusy => &self.tomcat_busy_threads,
        }
    }

    pub fn counter(&self, kind: CounterKind) -> &IntCounterVec {
        match kind {
            CounterKind::RequestCount => &self.tomcat_requests_total,
            CounterKind::ErrorCount => &self.tomcat_errors_total,
            CounterKind::ProcessingTime => &self.tomcat_processing_time_ms_total,
            CounterKind::BytesReceived => &self.tomcat_received_bytes_total,
            CounterKind::BytesSent => &self.tomcat_sent_bytes_total,
        }
    }

    pub fn set_gauge(&self, kind: GaugeKind, labels: &[&str; 2], value: i64) {
        self.gauge(kind).with_label_values(labels).set(value);
    }

    pub fn increment_counter(&self, kind: CounterKind, labels: &[&str; 2], delta: u64) {
        self.counter(kind).with_label_values(labels).inc_by(delta);
    }

    /// Sets every gauge of the series to 0. Counters are left untouched.
    pub fn reset_gauges(&self, labels: &[&str; 2]) {
        for kind in GaugeKind::ALL {
            self.set_gauge(kind, labels, 0);
        }
    }

    pub fn gauge_value(&self, kind: GaugeKind, labels: &[&str; 2]) -> i64 {
        self.gauge(kind).with_label_values(labels).get()
    }

    pub fn counter_value(&self, kind: CounterKind, labels: &[&str; 2]) -> u64 {
        self.counter(kind).with_label_values(labels).get()
    }
}

/// Internal exporter telemetry.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub sweeps_total: IntCounter,
    pub sweep_failures_total: IntCounter,
    pub sweep_duration_seconds: Gauge,
    pub discovered_instances: IntGauge,
    pub samples_dispatched_total: IntCounter,
    pub samples_skipped_total: IntCounter,
    pub sample_failures_total: IntCounterVec, // labels: service
    pub baseline_entries: IntGauge,
    pub baseline_resets_total: IntCounter,
}

impl ExporterMetrics {
    /// Creates the telemetry metrics; they are only registered when `register` is set.
    pub fn new(registry: &Registry, register: bool) -> prometheus::Result<Self> {
        let metrics = Self {
            sweeps_total: IntCounter::new(
                "herakles_jvm_exporter_sweeps_total",
                "Discovery sweeps started",
            )?,
            sweep_failures_total: IntCounter::new(
                "herakles_jvm_exporter_sweep_failures_total",
                "Discovery sweeps aborted because the topology could not be read",
            )?,
            sweep_duration_seconds: Gauge::new(
                "herakles_jvm_exporter_sweep_duration_seconds",
                "Time spent discovering and dispatching during the last sweep",
            )?,
            discovered_instances: IntGauge::new(
                "herakles_jvm_exporter_discovered_instances",
                "Instances found by the last successful sweep, ignored services excluded",
            )?,
            samples_dispatched_total: IntCounter::new(
                "herakles_jvm_exporter_samples_dispatched_total",
                "Instance samplers dispatched",
            )?,
            samples_skipped_total: IntCounter::new(
                "herakles_jvm_exporter_samples_skipped_total",
                "Instance samplers not dispatched because the previous one was still running",
            )?,
            sample_failures_total: IntCounterVec::new(
                Opts::new(
                    "herakles_jvm_exporter_sample_failures_total",
                    "Instance samples that failed and zeroed the instance gauges",
                ),
                &[LABEL_SERVICE],
            )?,
            baseline_entries: IntGauge::new(
                "herakles_jvm_exporter_baseline_entries",
                "Counter baselines currently tracked",
            )?,
            baseline_resets_total: IntCounter::new(
                "herakles_jvm_exporter_baseline_resets_total",
                "Counter regressions absorbed as a new baseline (remote restarts)",
            )?,
        };

        if register {
            registry.register(Box::new(metrics.sweeps_total.clone()))?;
            registry.register(Box::new(metrics.sweep_failures_total.clone()))?;
            registry.register(Box::new(metrics.sweep_duration_seconds.clone()))?;
            registry.register(Box::new(metrics.discovered_instances.clone()))?;
            registry.register(Box::new(metrics.samples_dispatched_total.clone()))?;
            registry.register(Box::new(metrics.samples_skipped_total.clone()))?;
            registry.register(Box::new(metrics.sample_failures_total.clone()))?;
            registry.register(Box::new(metrics.baseline_entries.clone()))?;
            registry.register(Box::new(metrics.baseline_resets_total.clone()))?;
        }

        Ok(metrics)
    }
}
