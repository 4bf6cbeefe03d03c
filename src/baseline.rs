//! Baseline tracking for cumulative remote counters.
//!
//! Tomcat reports request counters as absolute values since the JVM started.
//! Prometheus counters must only ever be incremented, so every observation is
//! turned into a delta against the last value seen for the same
//! `(counter, service, instance)` triple.
//!
//! Rules applied per triple:
//! - first observation: store it, apply nothing
//! - value >= previous: apply the difference (possibly 0)
//! - value < previous: the remote instance restarted; store the new value as
//!   the baseline and apply nothing this cycle
//!
//! The map is a `DashMap`, so the read-modify-write of one key holds only the
//! shard lock for that key and unrelated instances never serialize on each other.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::identity::{InstanceIdentity, ServiceIdentity};
use crate::metrics::CounterKind;

/// Composite key of one tracked remote counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaselineKey {
    pub counter: CounterKind,
    pub service: ServiceIdentity,
    pub instance: InstanceIdentity,
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    value: u64,
    observed_at: Instant,
}

/// Outcome of feeding one absolute value into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// No baseline existed; the value became the baseline.
    First,
    /// The counter advanced by this amount since the last observation.
    Advanced(u64),
    /// The counter went backwards; the new value replaced the baseline.
    Reset { previous: u64, current: u64 },
}

impl Observation {
    /// Increment to apply to the exported counter, if any.
    pub fn increment(self) -> Option<u64> {
        match self {
            Observation::Advanced(delta) => Some(delta),
            Observation::First | Observation::Reset { .. } => None,
        }
    }
}

/// Last observed absolute value per `(counter, service, instance)`.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    baselines: DashMap<BaselineKey, Baseline>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` and returns the increment to apply, if any.
    pub fn observe(
        &self,
        counter: CounterKind,
        service: &ServiceIdentity,
        instance: &InstanceIdentity,
        value: u64,
    ) -> Option<u64> {
        self.record(counter, service, instance, value).increment()
    }

    /// Like [`observe`](Self::observe) but reports why no increment was produced.
    pub fn record(
        &self,
        counter: CounterKind,
        service: &ServiceIdentity,
        instance: &InstanceIdentity,
        value: u64,
    ) -> Observation {
        let key = BaselineKey {
            counter,
            service: service.clone(),
            instance: instance.clone(),
        };
        let now = Instant::now();

        match self.baselines.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Baseline {
                    value,
                    observed_at: now,
                });
                Observation::First
            }
            Entry::Occupied(mut slot) => {
                let baseline = slot.get_mut();
                let previous = baseline.value;
                baseline.value = value;
                baseline.observed_at = now;
                if value >= previous {
                    Observation::Advanced(value - previous)
                } else {
                    Observation::Reset {
                        previous,
                        current: value,
                    }
                }
            }
        }
    }

    /// Current baseline for a triple, if one has been recorded.
    pub fn baseline(
        &self,
        counter: CounterKind,
        service: &ServiceIdentity,
        instance: &InstanceIdentity,
    ) -> Option<u64> {
        let key = BaselineKey {
            counter,
            service: service.clone(),
            instance: instance.clone(),
        };
        self.baselines.get(&key).map(|b| b.value)
    }

    /// Drops baselines that have not been observed within `ttl`.
    ///
    /// Returns the number of evicted entries. An evicted triple starts over
    /// with a first observation the next time it is seen.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut evicted = 0;
        self.baselines.retain(|_, baseline| {
            let keep = baseline.observed_at.elapsed() < ttl;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}
