//! Integration tests for health stats module.
//!
//! These tests verify that the HealthStats structure correctly tracks
//! sweeps, samplers and baselines and reports them in the health table.

use herakles_jvm_exporter::health_stats::HealthStats;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn test_health_stats_initialize_empty() {
    let stats = HealthStats::new();

    assert_eq!(stats.total_sweeps.load(Ordering::Relaxed), 0);
    assert_eq!(stats.sweep_failures.load(Ordering::Relaxed), 0);
    assert_eq!(stats.samples_dispatched.load(Ordering::Relaxed), 0);
    assert_eq!(stats.baseline_entries.load(Ordering::Relaxed), 0);

    let (cur, avg, _, _, count) = stats.sweep_duration_ms.snapshot();
    assert_eq!(count, 0);
    assert_eq!(cur, 0.0);
    assert_eq!(avg, 0.0);

    assert!(stats.last_sweep().is_none());
    assert_eq!(stats.get_last_sweep_time_str(), "N/A");
    assert_eq!(stats.get_sample_success_rate(), 100.0);
}

#[test]
fn test_sweep_recording_tracks_last_outcome() {
    let stats = HealthStats::new();

    stats.record_sweep(12.5, 4);
    assert!(stats.last_sweep().unwrap().success);

    stats.record_sweep_failure(3.0);
    assert!(!stats.last_sweep().unwrap().success);
    assert_eq!(stats.total_sweeps.load(Ordering::Relaxed), 2);
    assert_eq!(stats.sweep_failures.load(Ordering::Relaxed), 1);

    let (cur, avg, max, min, count) = stats.sweep_duration_ms.snapshot();
    assert_eq!(count, 2);
    assert_eq!(cur, 3.0);
    assert_eq!(max, 12.5);
    assert_eq!(min, 3.0);
    assert_eq!(avg, 7.75);

    let (instances, _, _, _, _) = stats.discovered_instances.snapshot();
    assert_eq!(instances, 4.0);
}

#[test]
fn test_sample_success_rate() {
    let stats = HealthStats::new();
    for _ in 0..3 {
        stats.record_sample_success(5.0);
    }
    stats.record_sample_failure(100.0);

    assert_eq!(stats.get_sample_success_rate(), 75.0);
    let (_, _, max, _, count) = stats.sample_duration_ms.snapshot();
    assert_eq!(count, 4);
    assert_eq!(max, 100.0);
}

#[test]
fn test_health_stats_render_table_contains_sections() {
    let stats = Arc::new(HealthStats::new());

    stats.record_sweep(8.0, 12);
    stats.record_dispatch();
    stats.record_skip();
    stats.record_sample_success(4.0);
    stats.record_baseline_reset();
    stats.record_baselines_evicted(5);
    stats.update_baseline_entries(60);
    stats.record_http_request();
    stats.record_metrics_endpoint_call();

    let output = stats.render_table();

    for section in ["SWEEPS", "SAMPLERS", "BASELINES", "HTTP SERVER"] {
        assert!(output.contains(section), "Should contain {section} section");
    }
    assert!(output.contains("resets (remote restarts)"));
    assert!(output.contains("skipped_in_flight"));
    assert!(!output.contains("N/A"), "last sweep time should be rendered");
}

#[test]
fn test_health_stats_concurrent_updates() {
    let stats = Arc::new(HealthStats::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let stats = stats.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    stats.record_dispatch();
                    stats.record_sample_success(1.0);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stats.samples_dispatched.load(Ordering::Relaxed), 800);
    let (_, _, _, _, count) = stats.sample_duration_ms.snapshot();
    assert_eq!(count, 800);
}
