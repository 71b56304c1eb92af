//! End-to-end cycle scenarios against the in-memory fakes: orphan
//! detection, backup-then-delete, retention, exclusion, stale-registry
//! re-verification, exclusivity, cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use s3gc_core::errors::{CycleError, GcError};
use s3gc_core::models::{CycleStatus, GcMode};
use s3gc_engine::GcRuntime;
use s3gc_store::MemoryObjectStore;

use common::{avatar_column, days_ago, fixture, fixture_with, SlowStore};

#[tokio::test]
async fn dry_run_reports_the_orphan_without_deleting() {
    let fx = fixture(GcMode::DryRun).await;
    fx.verifier.insert(avatar_column(), "avatars/alice.jpg");
    fx.store
        .put_with_mtime("avatars/alice.jpg", b"alice".to_vec(), days_ago(30));
    fx.store
        .put_with_mtime("avatars/bob.jpg", b"bob".to_vec(), days_ago(30));
    // The registry knows about alice's reference; bob has no row at all.
    fx.runtime
        .registry()
        .increment("avatars/alice.jpg", &avatar_column())
        .unwrap();

    let report = fx.runtime.run_cycle(None).await.unwrap();

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.counters.candidates_found, 1);
    assert_eq!(report.counters.verified_orphans, 1);
    assert_eq!(report.counters.deleted_count, 0);
    assert_eq!(report.orphans, ["avatars/bob.jpg"]);
    assert!(fx.store.contains("avatars/bob.jpg"));
    assert!(fx.store.contains("avatars/alice.jpg"));
}

#[tokio::test]
async fn execute_backs_up_then_deletes() {
    let fx = fixture(GcMode::Execute).await;
    fx.verifier.insert(avatar_column(), "avatars/alice.jpg");
    fx.store
        .put_with_mtime("avatars/alice.jpg", b"alice-bytes".to_vec(), days_ago(30));
    fx.store
        .put_with_mtime("avatars/bob.jpg", b"bob-bytes".to_vec(), days_ago(30));

    let report = fx.runtime.run_cycle(None).await.unwrap();

    assert_eq!(report.counters.deleted_count, 1);
    assert!(!fx.store.contains("avatars/bob.jpg"));
    assert!(fx.store.contains("avatars/alice.jpg"));

    // Backup precedes delete: the vault record and blob exist, hash is of
    // the original bytes.
    let record = fx
        .runtime
        .vault()
        .lookup_by_key("avatars/bob.jpg")
        .unwrap()
        .unwrap();
    assert_eq!(record.operation_id, report.operation_id);
    assert_eq!(
        record.content_hash,
        s3gc_vault::compressor::content_hash(b"bob-bytes")
    );
    assert_eq!(record.original_size, 9);
    let blob = fx.runtime.vault().blobs().read(&record.blob_path).unwrap();
    let restored =
        s3gc_vault::compressor::decompress_bytes(&blob, record.codec).unwrap();
    assert_eq!(restored, b"bob-bytes");
}

#[tokio::test]
async fn retention_gate_holds_young_objects() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("k1", b"young".to_vec(), days_ago(2));

    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.deleted_count, 0);
    assert_eq!(report.counters.retained_count, 1);
    assert!(fx.store.contains("k1"));

    // Same object, aged past the floor: collected.
    fx.store.put_with_mtime("k1", b"young".to_vec(), days_ago(8));
    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.deleted_count, 1);
    assert!(!fx.store.contains("k1"));
}

#[tokio::test]
async fn missing_last_modified_fails_closed() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_without_mtime("no-mtime", b"x".to_vec());

    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.deleted_count, 0);
    assert_eq!(report.counters.retained_count, 1);
    assert!(fx.store.contains("no-mtime"));
}

#[tokio::test]
async fn excluded_prefixes_are_never_candidates() {
    let fx = fixture_with(GcMode::Execute, |cfg| {
        cfg.exclude_prefixes = vec!["backups/".into()];
    })
    .await;
    fx.store
        .put_with_mtime("backups/snapshot.tar", b"tar".to_vec(), days_ago(30));

    for _ in 0..3 {
        let report = fx.runtime.run_cycle(None).await.unwrap();
        assert_eq!(report.counters.deleted_count, 0);
        assert_eq!(report.counters.excluded_count, 1);
        assert_eq!(report.counters.candidates_found, 0);
        assert!(fx.store.contains("backups/snapshot.tar"));
    }
}

#[tokio::test]
async fn live_reference_beats_stale_registry() {
    // CDC "paused": the DB row exists but the registry never heard of it.
    let fx = fixture(GcMode::Execute).await;
    fx.verifier.insert(avatar_column(), "k2");
    fx.store.put_with_mtime("k2", b"live".to_vec(), days_ago(30));

    let report = fx.runtime.run_cycle(None).await.unwrap();

    assert_eq!(report.counters.candidates_found, 1);
    assert_eq!(report.counters.verified_orphans, 0);
    assert_eq!(report.counters.deleted_count, 0);
    assert_eq!(report.counters.registry_stale_count, 1);
    assert!(report
        .errors
        .iter()
        .any(|e| e.kind == "registry_stale(k2)"));
    assert!(fx.store.contains("k2"));
    // The registry was corrected on the spot.
    assert_eq!(fx.runtime.registry().count_of("k2").unwrap(), 1);

    // Next cycle: count is 1, not even a candidate.
    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.candidates_found, 0);
}

#[tokio::test]
async fn overlapping_cycles_return_busy() {
    let dir = tempfile::tempdir().unwrap();
    let inner = Arc::new(MemoryObjectStore::new());
    inner.put_with_mtime("k", b"x".to_vec(), days_ago(30));
    let store = Arc::new(SlowStore {
        inner: inner.clone(),
        delay: Duration::from_millis(300),
    });
    let verifier = Arc::new(s3gc_store::MemoryVerifier::new());
    let runtime = GcRuntime::initialize(
        common::config(dir.path().join("vault"), GcMode::DryRun),
        store,
        verifier,
        None,
    )
    .await
    .unwrap();

    let first = {
        let runtime = runtime.clone();
        tokio::spawn(async move { runtime.run_cycle(None).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = runtime.run_cycle(None).await;
    assert!(matches!(
        second,
        Err(GcError::Cycle(CycleError::Busy))
    ));
    // No second operation was opened.
    let (ops, _) = runtime.list_operations(10, None).unwrap();
    assert_eq!(ops.len(), 1);

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.status, CycleStatus::Completed);
}

#[tokio::test]
async fn deadline_cancels_cleanly_with_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    let inner = Arc::new(MemoryObjectStore::with_page_size(1));
    for i in 0..20 {
        inner.put_with_mtime(&format!("k{i:02}"), b"x".to_vec(), days_ago(30));
    }
    let store = Arc::new(SlowStore {
        inner: inner.clone(),
        delay: Duration::from_millis(100),
    });
    let verifier = Arc::new(s3gc_store::MemoryVerifier::new());
    let runtime = GcRuntime::initialize(
        common::config(dir.path().join("vault"), GcMode::Execute),
        store,
        verifier,
        None,
    )
    .await
    .unwrap();

    let report = runtime
        .run_cycle(Some(Duration::from_millis(250)))
        .await
        .unwrap();

    assert_eq!(report.status, CycleStatus::Cancelled);
    // The slow lister never got through all twenty pages.
    assert!(inner.len() > 0, "some objects must remain");
    let op = runtime
        .vault()
        .get_operation(&report.operation_id)
        .unwrap()
        .unwrap();
    assert_eq!(op.status, CycleStatus::Cancelled);
    assert!(op.finished_at.is_some());
}

#[tokio::test]
async fn backup_failure_leaves_object_in_bucket() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("k", b"x".to_vec(), days_ago(30));
    fx.store.set_fail_gets(true);

    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.deleted_count, 0);
    assert_eq!(report.counters.error_count, 1);
    assert!(fx.store.contains("k"));
    assert!(fx.runtime.vault().lookup_by_key("k").unwrap().is_none());
}

#[tokio::test]
async fn failed_delete_keeps_record_for_reconciliation() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("k", b"x".to_vec(), days_ago(30));
    fx.store.set_fail_deletes(true);

    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.deleted_count, 0);
    assert_eq!(report.counters.error_count, 1);
    assert!(fx.store.contains("k"));
    // Record + blob stay behind with restored_at null.
    let record = fx.runtime.vault().lookup_by_key("k").unwrap().unwrap();
    assert!(record.restored_at.is_none());
    assert!(fx.runtime.vault().blobs().exists(&record.blob_path));
}

#[tokio::test]
async fn audit_only_records_without_blob_or_delete() {
    let fx = fixture(GcMode::AuditOnly).await;
    fx.store.put_with_mtime("k", b"payload".to_vec(), days_ago(30));

    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.verified_orphans, 1);
    assert_eq!(report.counters.deleted_count, 0);
    assert!(fx.store.contains("k"));

    let record = fx.runtime.vault().lookup_by_key("k").unwrap().unwrap();
    assert_eq!(record.stored_size, 0);
    assert!(record.content_hash.is_empty());
    assert!(record.blob_path.is_empty());
    assert_eq!(record.original_size, 7);
}

#[tokio::test]
async fn status_and_metrics_reflect_runs() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("k", b"x".to_vec(), days_ago(30));
    fx.runtime.run_cycle(None).await.unwrap();

    let status = fx.runtime.status().unwrap();
    assert_eq!(status.total_runs, 1);
    assert_eq!(status.total_deleted, 1);
    assert!(status.last_run_at.is_some());

    let metrics = fx.runtime.metrics().unwrap();
    assert_eq!(metrics.vault.total_deleted, 1);
    assert!(metrics.vault.bytes_original >= 1);

    let health = fx.runtime.health().await;
    assert!(health.vault_accessible);
    assert!(health.store_reachable);
    assert!(!health.cdc_connected);
}

#[tokio::test]
async fn rebuild_replaces_counts_from_scan() {
    let fx = fixture(GcMode::DryRun).await;
    fx.verifier.insert(avatar_column(), "a");
    fx.verifier.insert(avatar_column(), "a");
    fx.verifier.insert(avatar_column(), "b");
    // Registry drifted: it believes "a" has one reference and knows "c".
    fx.runtime.registry().increment("a", &avatar_column()).unwrap();
    fx.runtime.registry().increment("c", &avatar_column()).unwrap();

    let written = fx.runtime.rebuild_registry().await.unwrap();
    assert_eq!(written, 2);
    assert_eq!(fx.runtime.registry().count_of("a").unwrap(), 2);
    assert_eq!(fx.runtime.registry().count_of("b").unwrap(), 1);
    // Keys the scan did not observe are left untouched.
    assert_eq!(fx.runtime.registry().count_of("c").unwrap(), 1);
}
