//! # Auditor Tests
//!
//! Tests for:
//! - Integrity patrols over a persisted store
//! - Staleness from real access history
//! - The scheduled background auditor

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tempfile::TempDir;

use vdatabprot_core::types::VectorId;
use vdatabprot_core::{Config, VectorCodec};
use vdatabprot_storage::{AccessLayer, AuditSchedule, RecordStore};

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.storage.sync_writes = false;
    config
}

fn corrupt(layer: &AccessLayer, id: &VectorId) {
    let mut record = layer.store().get(id).unwrap().unwrap();
    record.compressed_payload = Bytes::from(vec![0u8; record.compressed_payload.len().max(8)]);
    layer.store().put(id, record).unwrap();
}

#[test]
fn test_patrol_counts_corrupted_records() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let layer = AccessLayer::open(&config).unwrap();

    let ids: Vec<_> = (0..10)
        .map(|i| layer.write(format!("record {}", i).as_bytes(), None).unwrap())
        .collect();
    let mut damaged = vec![ids[2].clone(), ids[7].clone(), ids[9].clone()];
    for id in &damaged {
        corrupt(&layer, id);
    }
    // A readable payload under the wrong fingerprint counts too
    let mut record = layer.store().get(&ids[4]).unwrap().unwrap();
    record.compressed_payload = VectorCodec::default()
        .encode(b"swapped")
        .unwrap()
        .compressed_payload;
    layer.store().put(&ids[4], record).unwrap();
    damaged.push(ids[4].clone());
    damaged.sort();

    let report = layer.auditor(&config).run_integrity_patrol().unwrap();
    assert_eq!(report.verified, 6);
    assert_eq!(report.corrupted, damaged);
    assert!(!report.is_clean());
}

#[test]
fn test_patrol_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let bad;
    {
        let layer = AccessLayer::open(&config).unwrap();
        layer.write(b"fine", None).unwrap();
        bad = layer.write(b"will rot", None).unwrap();
        corrupt(&layer, &bad);
    }

    let layer = AccessLayer::open(&config).unwrap();
    let report = layer.auditor(&config).run_integrity_patrol().unwrap();
    assert_eq!(report.verified, 1);
    assert_eq!(report.corrupted, vec![bad]);
}

#[test]
fn test_staleness_from_access_history() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let layer = AccessLayer::open(&config).unwrap();
    let auditor = layer.auditor(&config);

    let a = layer.write(b"A", Some(VectorId::from("a"))).unwrap();
    let b = layer.write(b"B", Some(VectorId::from("b"))).unwrap();
    layer.read(&a).unwrap();

    let now = Utc::now();
    assert!(auditor
        .run_anti_entropy_analysis_at(Duration::from_secs(60), now)
        .unwrap()
        .is_empty());

    let later = now + chrono::Duration::seconds(120);
    let stale = auditor
        .run_anti_entropy_analysis_at(Duration::from_secs(60), later)
        .unwrap();
    assert_eq!(stale, vec![a, b]);

    // Ids that were never accessed are not reported
    assert!(!stale.contains(&VectorId::from("never")));
}

#[test]
fn test_analysis_beyond_window_creates_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let layer = AccessLayer::open(&config).unwrap();

    let a = layer.write(b"A", None).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    let b = layer.write(b"B", None).unwrap();

    let created = layer
        .auditor(&config)
        .analyze_access_patterns(Duration::from_millis(5))
        .unwrap();
    assert_eq!(created, 0);
    assert!(layer.links_for(&a).is_empty());
    assert!(layer.links_for(&b).is_empty());
}

#[tokio::test]
async fn test_background_auditor() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let layer = AccessLayer::open(&config).unwrap();

    let a = layer.write(b"A", None).unwrap();
    layer.write(b"B", None).unwrap();
    let bad = layer.write(b"C", None).unwrap();
    corrupt(&layer, &bad);

    let auditor = Arc::new(layer.auditor(&config));
    let handle = auditor.spawn(AuditSchedule {
        patrol_interval: Duration::from_millis(50),
        analysis_interval: Duration::from_millis(50),
    });

    let mut report = None;
    for _ in 0..200 {
        report = handle.last_patrol();
        if report.is_some() && !layer.links_for(&a).is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.shutdown().await;

    let report = report.expect("background patrol never completed");
    assert_eq!(report.verified, 2);
    assert_eq!(report.corrupted, vec![bad]);
    assert_eq!(layer.links_for(&a).len(), 2);
    assert_eq!(layer.metrics().snapshot().links_derived, 6);
}
