//! Discovery sweep: topology snapshot plus sampler fan-out.
//!
//! A sweep asks the discovery backend for every service and its instances,
//! drops ignored services, and spawns one sampler task per remaining
//! `(service, instance)` pair. It returns as soon as the tasks are spawned;
//! the samplers finish on their own.
//!
//! Fan-out is bounded by a semaphore shared by all sweeps, and a pair whose
//! sampler from an earlier sweep is still running is not dispatched again, so
//! a hanging instance holds at most one task and one permit.

use ahash::AHashSet;
use dashmap::DashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::discovery::{DiscoveredInstance, Discovery};
use crate::error::Result;
use crate::identity::{normalize_service_name, InstanceIdentity, ServiceIdentity};
use crate::sampler::InstanceSampler;

pub const DEFAULT_MAX_CONCURRENT_SAMPLES: usize = 64;

/// Services and their instances as seen by one sweep.
pub type Topology = BTreeMap<ServiceIdentity, BTreeSet<InstanceIdentity>>;

type InFlightKey = (ServiceIdentity, InstanceIdentity);

/// Sweep tuning.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Service names never sampled. Raw or normalized form both match.
    pub ignore_services: Vec<String>,
    /// Upper bound of concurrently running samplers across all sweeps.
    pub max_concurrent_samples: usize,
    /// Baselines idle for longer than this are evicted after each sweep.
    pub baseline_ttl: Option<Duration>,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            ignore_services: Vec::new(),
            max_concurrent_samples: DEFAULT_MAX_CONCURRENT_SAMPLES,
            baseline_ttl: None,
        }
    }
}

/// What a sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Services present in the topology, ignored ones included.
    pub services: usize,
    /// Instances of non-ignored services.
    pub instances: usize,
    /// Instances skipped because their service is ignored.
    pub ignored: usize,
    /// Instances skipped because their previous sampler is still running.
    pub skipped: usize,
    /// Discovery error that aborted the sweep, if any.
    pub error: Option<String>,
    /// Spawned sampler tasks. Dropping them detaches the tasks.
    pub tasks: Vec<JoinHandle<()>>,
}

impl SweepReport {
    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn dispatched(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every dispatched sampler to finish.
    pub async fn wait(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "sampler task panicked");
            }
        }
    }
}

/// Removes its key from the in-flight set when the sampler task ends.
struct InFlightGuard {
    in_flight: Arc<DashSet<InFlightKey>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// One discovery-and-dispatch cycle, reusable across scheduler ticks.
pub struct DiscoverySweep {
    discovery: Arc<dyn Discovery>,
    sampler: Arc<InstanceSampler>,
    ignored: AHashSet<String>,
    permits: Arc<Semaphore>,
    in_flight: Arc<DashSet<InFlightKey>>,
    baseline_ttl: Option<Duration>,
}

impl DiscoverySweep {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        sampler: Arc<InstanceSampler>,
        options: SweepOptions,
    ) -> Self {
        let ignored = options
            .ignore_services
            .iter()
            .map(|name| normalize_service_name(name))
            .filter(|name| !name.is_empty())
            .collect();

        Self {
            discovery,
            sampler,
            ignored,
            permits: Arc::new(Semaphore::new(options.max_concurrent_samples.max(1))),
            in_flight: Arc::new(DashSet::new()),
            baseline_ttl: options.baseline_ttl,
        }
    }

    pub fn is_ignored(&self, service: &ServiceIdentity) -> bool {
        self.ignored.contains(service.as_str())
    }

    /// Number of samplers currently running or waiting for a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Runs one sweep. Never fails: discovery errors abort only this sweep.
    #[instrument(skip(self), fields(backend = self.discovery.backend()))]
    pub async fn run(&self) -> SweepReport {
        let start = Instant::now();
        let telemetry = self.sampler.telemetry();
        let stats = self.sampler.stats();
        telemetry.sweeps_total.inc();

        let report = match self.discover_topology().await {
            Ok(topology) => {
                let report = self.dispatch(topology);
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                info!(
                    services = report.services,
                    instances = report.instances,
                    dispatched = report.dispatched(),
                    ignored = report.ignored,
                    skipped = report.skipped,
                    elapsed_ms,
                    "sweep dispatched"
                );
                telemetry.discovered_instances.set(report.instances as i64);
                stats.record_sweep(elapsed_ms, report.instances as u64);
                report
            }
            Err(e) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                error!(error = %e, "discovery failed, sweep aborted");
                telemetry.sweep_failures_total.inc();
                stats.record_sweep_failure(elapsed_ms);
                SweepReport::failed(e.to_string())
            }
        };

        self.evict_idle_baselines();
        telemetry
            .sweep_duration_seconds
            .set(start.elapsed().as_secs_f64());
        report
    }

    /// Reads the full topology. Services without instances are left out.
    pub async fn discover_topology(&self) -> Result<Topology> {
        let mut topology = Topology::new();
        for name in self.discovery.list_service_names().await? {
            let instances = self.discovery.list_instances(&name).await?;
            if instances.is_empty() {
                debug!(service = %name, "no instances");
                continue;
            }
            topology
                .entry(ServiceIdentity::from_discovery(&name))
                .or_default()
                .extend(instances.iter().map(DiscoveredInstance::identity));
        }
        Ok(topology)
    }

    /// Spawns one sampler task per non-ignored instance and returns immediately.
    pub fn dispatch(&self, topology: Topology) -> SweepReport {
        let telemetry = self.sampler.telemetry();
        let stats = self.sampler.stats();
        let mut report = SweepReport {
            services: topology.len(),
            ..Default::default()
        };

        for (service, instances) in topology {
            if self.is_ignored(&service) {
                debug!(service = %service, count = instances.len(), "service ignored");
                report.ignored += instances.len();
                continue;
            }

            for instance in instances {
                report.instances += 1;

                let key = (service.clone(), instance.clone());
                if !self.in_flight.insert(key.clone()) {
                    debug!(service = %service, instance = %instance, "previous sample still running");
                    report.skipped += 1;
                    telemetry.samples_skipped_total.inc();
                    stats.record_skip();
                    continue;
                }

                let guard = InFlightGuard {
                    in_flight: self.in_flight.clone(),
                    key,
                };
                let sampler = self.sampler.clone();
                let permits = self.permits.clone();
                let service = service.clone();

                report.tasks.push(tokio::spawn(async move {
                    let _guard = guard;
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    sampler.sample(&service, &instance).await;
                }));
                telemetry.samples_dispatched_total.inc();
                stats.record_dispatch();
            }
        }

        report
    }

    fn evict_idle_baselines(&self) {
        let tracker = self.sampler.tracker();
        if let Some(ttl) = self.baseline_ttl {
            let evicted = tracker.evict_idle(ttl);
            if evicted > 0 {
                info!(evicted, "evicted idle counter baselines");
                self.sampler.stats().record_baselines_evicted(evicted as u64);
            }
        }
        let entries = tracker.len();
        self.sampler.telemetry().baseline_entries.set(entries as i64);
        self.sampler.stats().update_baseline_entries(entries as u64);
    }
}
