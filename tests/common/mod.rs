//! Shared fakes for the integration tests: an in-memory JVM fleet standing in
//! for Jolokia agents and a mutable discovery backend.

#![allow(dead_code)]

use async_trait::async_trait;
use herakles_jvm_exporter::jolokia::{
    AttributeBag, AttributeReader, CURRENT_THREADS_BUSY, CURRENT_THREAD_COUNT, HEAP_MEMORY_USAGE,
    MAX_THREADS, MEMORY_MBEAN, NON_HEAP_MEMORY_USAGE,
};
use herakles_jvm_exporter::{
    CounterKind, DeltaTracker, DiscoveredInstance, Discovery, DiscoverySweep, ExporterError,
    ExporterMetrics, HealthStats, InstanceSampler, JvmMetrics, Result, SamplerOptions,
    SweepOptions,
};
use prometheus::Registry;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MB: i64 = 1024 * 1024;

/// What one fake JVM reports.
#[derive(Debug, Clone)]
pub struct JvmSnapshot {
    pub heap_used: i64,
    pub heap_max: i64,
    pub heap_committed: i64,
    pub non_heap_used: i64,
    pub non_heap_committed: i64,
    pub max_threads: i64,
    pub current_threads: i64,
    pub busy_threads: i64,
    /// requestCount, errorCount, processingTime, bytesReceived, bytesSent
    pub counters: [u64; 5],
}

impl Default for JvmSnapshot {
    fn default() -> Self {
        Self {
            heap_used: 512 * MB,
            heap_max: 2048 * MB,
            heap_committed: 1024 * MB,
            non_heap_used: 100 * MB,
            non_heap_committed: 128 * MB,
            max_threads: 200,
            current_threads: 25,
            busy_threads: 3,
            counters: [0; 5],
        }
    }
}

impl JvmSnapshot {
    pub fn with_counters(counters: [u64; 5]) -> Self {
        Self {
            counters,
            ..Default::default()
        }
    }
}

/// Agent endpoint of an instance without explicit URI.
pub fn endpoint(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/jolokia")
}

/// In-memory fleet of JVMs keyed by agent endpoint.
#[derive(Default)]
pub struct FakeFleet {
    jvms: Mutex<HashMap<String, JvmSnapshot>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    pub reads: AtomicUsize,
}

impl FakeFleet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, endpoint: &str, snapshot: JvmSnapshot) {
        self.jvms.lock().unwrap().insert(endpoint.to_string(), snapshot);
    }

    pub fn set_counters(&self, endpoint: &str, counters: [u64; 5]) {
        let mut jvms = self.jvms.lock().unwrap();
        jvms.entry(endpoint.to_string()).or_default().counters = counters;
    }

    pub fn set_failing(&self, endpoint: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(endpoint.to_string());
        } else {
            set.remove(endpoint);
        }
    }

    pub fn set_delay(&self, endpoint: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(endpoint.to_string(), delay);
    }

    fn bag(value: Value) -> AttributeBag {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }
}

#[async_trait]
impl AttributeReader for FakeFleet {
    async fn read(&self, endpoint: &str, mbean: &str, _attributes: &[&str]) -> Result<AttributeBag> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(endpoint).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(endpoint) {
            return Err(ExporterError::Remote {
                url: endpoint.to_string(),
                status: 503,
                message: "agent unavailable".to_string(),
            });
        }

        let snapshot = self
            .jvms
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| ExporterError::Remote {
                url: endpoint.to_string(),
                status: 404,
                message: "no such instance".to_string(),
            })?;

        let value = if mbean == MEMORY_MBEAN {
            json!({
                HEAP_MEMORY_USAGE: {
                    "init": 0,
                    "used": snapshot.heap_used,
                    "max": snapshot.heap_max,
                    "committed": snapshot.heap_committed,
                },
                NON_HEAP_MEMORY_USAGE: {
                    "init": 0,
                    "used": snapshot.non_heap_used,
                    "max": -1,
                    "committed": snapshot.non_heap_committed,
                },
            })
        } else if mbean.starts_with("Tomcat:type=ThreadPool") {
            json!({
                MAX_THREADS: snapshot.max_threads,
                CURRENT_THREAD_COUNT: snapshot.current_threads,
                CURRENT_THREADS_BUSY: snapshot.busy_threads,
            })
        } else if mbean.starts_with("Tomcat:type=GlobalRequestProcessor") {
            let mut bag = AttributeBag::new();
            for (kind, value) in CounterKind::ALL.iter().zip(snapshot.counters) {
                bag.insert(kind.attribute().to_string(), json!(value));
            }
            Value::Object(bag)
        } else {
            return Err(ExporterError::Remote {
                url: endpoint.to_string(),
                status: 404,
                message: format!("unknown mbean {mbean}"),
            });
        };

        Ok(Self::bag(value))
    }
}

/// Discovery backend whose topology can change between sweeps.
#[derive(Default)]
pub struct FakeDiscovery {
    services: Mutex<BTreeMap<String, Vec<DiscoveredInstance>>>,
    failing: AtomicBool,
    pub listings: AtomicUsize,
}

impl FakeDiscovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_instances(&self, service: &str, instances: Vec<DiscoveredInstance>) {
        self.services
            .lock()
            .unwrap()
            .insert(service.to_string(), instances);
    }

    pub fn remove(&self, service: &str) {
        self.services.lock().unwrap().remove(service);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Discovery for FakeDiscovery {
    fn backend(&self) -> &'static str {
        "fake"
    }

    async fn list_service_names(&self) -> Result<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExporterError::Discovery {
                backend: "fake".to_string(),
                message: "registry unreachable".to_string(),
            });
        }
        Ok(self.services.lock().unwrap().keys().cloned().collect())
    }

    async fn list_instances(&self, service: &str) -> Result<Vec<DiscoveredInstance>> {
        Ok(self
            .services
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default())
    }
}

/// Everything a test needs to drive and inspect one exporter pipeline.
pub struct Pipeline {
    pub registry: Registry,
    pub metrics: Arc<JvmMetrics>,
    pub telemetry: ExporterMetrics,
    pub tracker: Arc<DeltaTracker>,
    pub stats: Arc<HealthStats>,
    pub sampler: Arc<InstanceSampler>,
    pub sweep: Arc<DiscoverySweep>,
}

pub fn pipeline(
    reader: Arc<dyn AttributeReader>,
    discovery: Arc<dyn Discovery>,
    options: SweepOptions,
) -> Pipeline {
    let registry = Registry::new();
    let metrics = Arc::new(JvmMetrics::new(&registry).unwrap());
    let telemetry = ExporterMetrics::new(&registry, true).unwrap();
    let tracker = Arc::new(DeltaTracker::new());
    let stats = Arc::new(HealthStats::new());
    let sampler = Arc::new(InstanceSampler::new(
        reader,
        tracker.clone(),
        metrics.clone(),
        telemetry.clone(),
        stats.clone(),
        SamplerOptions::default(),
    ));
    let sweep = Arc::new(DiscoverySweep::new(discovery, sampler.clone(), options));

    Pipeline {
        registry,
        metrics,
        telemetry,
        tracker,
        stats,
        sampler,
        sweep,
    }
}
