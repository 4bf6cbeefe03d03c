//! Herakles JVM Exporter Library
//!
//! This library discovers a fleet of JVM web services, reads JVM memory and
//! Tomcat connector statistics from every instance through Jolokia, and
//! publishes them as Prometheus gauges and counters.
//!
//! # Features
//!
//! - **Pluggable Discovery**: static topology, Consul or Eureka
//! - **Restart-Safe Counters**: absolute Tomcat counters are converted into
//!   increments per `(counter, service, instance)`, so exported counters never
//!   go backwards when an instance restarts
//! - **Isolated Failures**: an unreachable instance zeroes its own gauges and
//!   never blocks or affects any other instance
//! - **Bounded Fan-Out**: concurrent samplers are capped across sweeps
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use herakles_jvm_exporter::{
//!     DeltaTracker, DiscoverySweep, ExporterMetrics, HealthStats, InstanceSampler,
//!     JolokiaClient, JvmMetrics, SamplerOptions, Scheduler, StaticDiscovery, SweepOptions,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = prometheus::Registry::new();
//! let sampler = Arc::new(InstanceSampler::new(
//!     Arc::new(JolokiaClient::new(Duration::from_secs(10))?),
//!     Arc::new(DeltaTracker::new()),
//!     Arc::new(JvmMetrics::new(&registry)?),
//!     ExporterMetrics::new(&registry, true)?,
//!     Arc::new(HealthStats::new()),
//!     SamplerOptions::default(),
//! ));
//! let sweep = Arc::new(DiscoverySweep::new(
//!     Arc::new(StaticDiscovery::default()),
//!     sampler,
//!     SweepOptions::default(),
//! ));
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! Scheduler::new(sweep, Duration::from_secs(5), Duration::from_secs(30))
//!     .spawn(shutdown_rx);
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod discovery;
pub mod error;
pub mod health_stats;
pub mod identity;
pub mod jolokia;
pub mod metrics;
pub mod sampler;
pub mod scheduler;
pub mod sweep;

// Re-export main types for convenience
pub use baseline::{DeltaTracker, Observation};
pub use discovery::{ConsulDiscovery, DiscoveredInstance, Discovery, EurekaDiscovery, StaticDiscovery};
pub use error::{ExporterError, Result};
pub use health_stats::HealthStats;
pub use identity::{InstanceIdentity, ServiceIdentity};
pub use jolokia::{AttributeBag, AttributeReader, JolokiaClient};
pub use metrics::{CounterKind, ExporterMetrics, GaugeKind, JvmMetrics};
pub use sampler::{InstanceSampler, SamplerOptions};
pub use scheduler::Scheduler;
pub use sweep::{DiscoverySweep, SweepOptions, SweepReport, Topology};
