//! Integration tests for the sweep scheduler.
//!
//! These tests run the scheduler with millisecond periods against fake
//! discovery and verify initial delay, periodic firing and shutdown.

mod common;

use common::{endpoint, pipeline, FakeDiscovery, FakeFleet, JvmSnapshot};
use herakles_jvm_exporter::{DiscoveredInstance, Scheduler, SweepOptions};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_scheduler_waits_for_initial_delay() {
    let discovery = FakeDiscovery::new();
    let p = pipeline(FakeFleet::new(), discovery.clone(), SweepOptions::default());
    let (tx, rx) = watch::channel(false);

    let handle = Scheduler::new(
        p.sweep.clone(),
        Duration::from_millis(200),
        Duration::from_millis(10),
    )
    .spawn(rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(discovery.listings.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(discovery.listings.load(Ordering::SeqCst) >= 1);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_scheduler_keeps_firing_when_discovery_fails() {
    let discovery = FakeDiscovery::new();
    discovery.set_failing(true);
    let p = pipeline(FakeFleet::new(), discovery.clone(), SweepOptions::default());
    let (tx, rx) = watch::channel(false);

    let handle = Scheduler::new(p.sweep.clone(), Duration::ZERO, Duration::from_millis(20)).spawn(rx);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let fired = discovery.listings.load(Ordering::SeqCst);
    assert!(fired >= 3, "only {fired} sweeps fired");
    assert_eq!(p.telemetry.sweep_failures_total.get() as usize, fired);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_scheduler_samples_on_every_tick() {
    let fleet = FakeFleet::new();
    let discovery = FakeDiscovery::new();
    fleet.set(&endpoint("10.0.0.1", 8080), JvmSnapshot::default());
    discovery.set_instances("orders", vec![DiscoveredInstance::new("10.0.0.1", 8080)]);
    let p = pipeline(fleet.clone(), discovery, SweepOptions::default());
    let (tx, rx) = watch::channel(false);

    let handle = Scheduler::new(p.sweep.clone(), Duration::ZERO, Duration::from_millis(20)).spawn(rx);

    tokio::time::sleep(Duration::from_millis(150)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(p.stats.samples_succeeded.load(Ordering::Relaxed) >= 3);
}

#[tokio::test]
async fn test_shutdown_stops_scheduling() {
    let discovery = FakeDiscovery::new();
    let p = pipeline(FakeFleet::new(), discovery.clone(), SweepOptions::default());
    let (tx, rx) = watch::channel(false);

    let handle = Scheduler::new(p.sweep.clone(), Duration::ZERO, Duration::from_millis(10)).spawn(rx);
    tokio::time::sleep(Duration::from_millis(50)).await;

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    // Let already spawned sweeps finish, then make sure nothing new starts
    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_stop = discovery.listings.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(discovery.listings.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn test_dropped_sender_stops_scheduler_before_first_sweep() {
    let discovery = FakeDiscovery::new();
    let p = pipeline(FakeFleet::new(), discovery.clone(), SweepOptions::default());
    let (tx, rx) = watch::channel(false);

    let handle = Scheduler::new(p.sweep.clone(), Duration::from_secs(60), Duration::from_secs(1)).spawn(rx);
    drop(tx);

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert_eq!(discovery.listings.load(Ordering::SeqCst), 0);
}
