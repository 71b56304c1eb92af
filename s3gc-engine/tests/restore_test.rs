//! Restore scenarios: full-operation restore, single key, idempotency,
//! skip_existing, hash verification, audit-only records.

mod common;

use s3gc_core::errors::{GcError, RestoreError};
use s3gc_core::models::{CycleStatus, GcMode};
use s3gc_core::traits::IObjectStore;

use common::{avatar_column, days_ago, fixture};

#[tokio::test]
async fn restore_operation_round_trips_bytes() {
    let fx = fixture(GcMode::Execute).await;
    fx.verifier.insert(avatar_column(), "avatars/alice.jpg");
    fx.store
        .put_with_mtime("avatars/alice.jpg", b"alice".to_vec(), days_ago(30));
    fx.store
        .put_with_mtime("avatars/bob.jpg", b"bob-original".to_vec(), days_ago(30));

    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.status, CycleStatus::Completed);
    assert!(!fx.store.contains("avatars/bob.jpg"));

    let restore = fx
        .runtime
        .restore_operation(&report.operation_id, false, false)
        .await
        .unwrap();
    assert_eq!(restore.restored_count, 1);
    assert_eq!(restore.failed_count, 0);
    assert!(!restore.dry_run);

    // Bytes are back, byte for byte.
    assert_eq!(
        fx.store.get("avatars/bob.jpg").await.unwrap(),
        b"bob-original"
    );

    // The record is marked, exactly once; a second restore is a no-op.
    let record = fx
        .runtime
        .vault()
        .lookup_by_operation(&report.operation_id)
        .unwrap()
        .remove(0);
    assert!(record.restored_at.is_some());
    assert_eq!(record.restore_operation_id, Some(restore.restore_operation_id));

    let again = fx
        .runtime
        .restore_operation(&report.operation_id, false, false)
        .await
        .unwrap();
    assert_eq!(again.restored_count, 0);
    assert_eq!(again.failed_count, 0);
    assert_eq!(again.skipped_count, 1);
}

#[tokio::test]
async fn restore_unknown_operation_is_an_error() {
    let fx = fixture(GcMode::Execute).await;
    let bogus = s3gc_core::models::OperationIdGenerator::new().next();
    let err = fx
        .runtime
        .restore_operation(&bogus, false, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GcError::Restore(RestoreError::UnknownOperation { .. })
    ));
}

#[tokio::test]
async fn restore_single_key_uses_latest_record() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("k", b"v1".to_vec(), days_ago(30));
    fx.runtime.run_cycle(None).await.unwrap();

    // The key comes back, is deleted again in a later cycle, restore picks
    // the newest record.
    fx.store.put_with_mtime("k", b"v2".to_vec(), days_ago(30));
    fx.runtime.run_cycle(None).await.unwrap();

    let restore = fx.runtime.restore_single_key("k", false).await.unwrap();
    assert_eq!(restore.restored_count, 1);
    assert_eq!(fx.store.get("k").await.unwrap(), b"v2");

    let missing = fx.runtime.restore_single_key("never-seen", false).await;
    assert!(matches!(
        missing,
        Err(GcError::Restore(RestoreError::NoRecord { .. }))
    ));
}

#[tokio::test]
async fn dry_run_restore_touches_nothing() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("k", b"x".to_vec(), days_ago(30));
    let report = fx.runtime.run_cycle(None).await.unwrap();

    let restore = fx
        .runtime
        .restore_operation(&report.operation_id, true, false)
        .await
        .unwrap();
    assert_eq!(restore.restored_count, 1);
    assert!(restore.dry_run);

    assert!(!fx.store.contains("k"));
    let record = fx.runtime.vault().lookup_by_key("k").unwrap().unwrap();
    assert!(record.restored_at.is_none());
}

#[tokio::test]
async fn skip_existing_leaves_record_unmarked() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("k", b"old".to_vec(), days_ago(30));
    let report = fx.runtime.run_cycle(None).await.unwrap();

    // Someone re-uploaded the key in the meantime.
    fx.store.put_with_mtime("k", b"newer".to_vec(), days_ago(0));

    let restore = fx
        .runtime
        .restore_operation(&report.operation_id, false, true)
        .await
        .unwrap();
    assert_eq!(restore.restored_count, 0);
    assert_eq!(restore.skipped_count, 1);

    // The newer object was not clobbered, the record stays undone.
    assert_eq!(fx.store.get("k").await.unwrap(), b"newer");
    assert!(fx
        .runtime
        .vault()
        .lookup_by_key("k")
        .unwrap()
        .unwrap()
        .restored_at
        .is_none());
}

#[tokio::test]
async fn corrupted_blob_fails_that_object_only() {
    let fx = fixture(GcMode::Execute).await;
    fx.store.put_with_mtime("good", b"good-bytes".to_vec(), days_ago(30));
    fx.store.put_with_mtime("torn", b"torn-bytes".to_vec(), days_ago(30));
    let report = fx.runtime.run_cycle(None).await.unwrap();
    assert_eq!(report.counters.deleted_count, 2);

    // Corrupt one blob on disk.
    let torn = fx.runtime.vault().lookup_by_key("torn").unwrap().unwrap();
    let blob_abs = fx.dir.path().join("vault").join(&torn.blob_path);
    std::fs::write(&blob_abs, b"garbage").unwrap();

    let restore = fx
        .runtime
        .restore_operation(&report.operation_id, false, false)
        .await
        .unwrap();
    assert_eq!(restore.restored_count, 1);
    assert_eq!(restore.failed_count, 1);
    assert_eq!(restore.errors.len(), 1);
    assert_eq!(restore.errors[0].key, "torn");

    assert!(fx.store.contains("good"));
    assert!(!fx.store.contains("torn"));
    // The torn record stays undone for a later attempt.
    assert!(fx
        .runtime
        .vault()
        .lookup_by_key("torn")
        .unwrap()
        .unwrap()
        .restored_at
        .is_none());
}

#[tokio::test]
async fn audit_only_records_cannot_be_restored() {
    let fx = fixture(GcMode::AuditOnly).await;
    fx.store.put_with_mtime("k", b"x".to_vec(), days_ago(30));
    let report = fx.runtime.run_cycle(None).await.unwrap();

    let restore = fx
        .runtime
        .restore_operation(&report.operation_id, false, false)
        .await
        .unwrap();
    assert_eq!(restore.restored_count, 0);
    assert_eq!(restore.skipped_count, 1);
    assert_eq!(restore.failed_count, 0);
}
