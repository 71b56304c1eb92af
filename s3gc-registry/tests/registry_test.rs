//! Integration tests: delta application, underflow handling, checkpoint
//! atomicity, scan rebuild.

use s3gc_core::errors::RegistryError;
use s3gc_core::models::{CdcCursor, Checkpoint, RefDelta, WatchedColumn};
use s3gc_registry::RegistryEngine;

fn src() -> WatchedColumn {
    WatchedColumn::new("users", "avatar_url")
}

fn checkpoint(seq: u64) -> Checkpoint {
    Checkpoint {
        stream: "s3gc_media".into(),
        cursor: CdcCursor::Postgres {
            lsn: format!("0/{seq:X}"),
        },
        seq,
    }
}

#[test]
fn increment_creates_row_lazily() {
    let registry = RegistryEngine::open_in_memory().unwrap();
    assert_eq!(registry.count_of("avatars/a.jpg").unwrap(), 0);

    registry.increment("avatars/a.jpg", &src()).unwrap();
    registry.increment("avatars/a.jpg", &src()).unwrap();
    assert_eq!(registry.count_of("avatars/a.jpg").unwrap(), 2);

    let entry = registry.entry("avatars/a.jpg").unwrap().unwrap();
    assert_eq!(entry.ref_count, 2);
}

#[test]
fn decrement_to_zero_keeps_the_row() {
    let registry = RegistryEngine::open_in_memory().unwrap();
    registry.increment("k", &src()).unwrap();
    registry.decrement("k", &src()).unwrap();

    assert_eq!(registry.count_of("k").unwrap(), 0);
    // Row persists as retention evidence.
    assert!(registry.entry("k").unwrap().is_some());
    assert_eq!(registry.zero_ref_count().unwrap(), 1);
}

#[test]
fn decrement_below_zero_is_underflow() {
    let registry = RegistryEngine::open_in_memory().unwrap();
    assert!(matches!(
        registry.decrement("missing", &src()),
        Err(RegistryError::Underflow { .. })
    ));

    registry.increment("k", &src()).unwrap();
    registry.decrement("k", &src()).unwrap();
    assert!(matches!(
        registry.decrement("k", &src()),
        Err(RegistryError::Underflow { .. })
    ));
}

#[test]
fn apply_batch_commits_deltas_and_checkpoint_together() {
    let registry = RegistryEngine::open_in_memory().unwrap();
    let deltas = vec![
        RefDelta::increment("a", src()),
        RefDelta::increment("b", src()),
        RefDelta::decrement("a", src()),
    ];

    let outcome = registry.apply_batch(&deltas, &checkpoint(1)).unwrap();
    assert_eq!(outcome.applied, 3);
    assert_eq!(outcome.underflows, 0);

    assert_eq!(registry.count_of("a").unwrap(), 0);
    assert_eq!(registry.count_of("b").unwrap(), 1);

    let cp = registry.checkpoint("s3gc_media").unwrap().unwrap();
    assert_eq!(cp.seq, 1);
}

#[test]
fn apply_batch_swallows_underflow_but_still_commits() {
    let registry = RegistryEngine::open_in_memory().unwrap();
    let deltas = vec![
        RefDelta::decrement("never-seen", src()),
        RefDelta::increment("kept", src()),
    ];

    let outcome = registry.apply_batch(&deltas, &checkpoint(1)).unwrap();
    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.underflows, 1);
    assert_eq!(registry.count_of("kept").unwrap(), 1);
    assert_eq!(registry.checkpoint("s3gc_media").unwrap().unwrap().seq, 1);
}

#[test]
fn stale_checkpoint_rolls_back_the_whole_batch() {
    let registry = RegistryEngine::open_in_memory().unwrap();
    registry
        .apply_batch(&[RefDelta::increment("a", src())], &checkpoint(5))
        .unwrap();

    let err = registry
        .apply_batch(&[RefDelta::increment("b", src())], &checkpoint(5))
        .unwrap_err();
    assert!(matches!(err, RegistryError::StaleCheckpoint { .. }));

    // Neither the delta nor the checkpoint moved.
    assert_eq!(registry.count_of("b").unwrap(), 0);
    assert_eq!(registry.checkpoint("s3gc_media").unwrap().unwrap().seq, 5);
}

#[test]
fn rebuild_replaces_supplied_keys_only() {
    let registry = RegistryEngine::open_in_memory().unwrap();
    registry.increment("scanned", &src()).unwrap();
    registry.increment("scanned", &src()).unwrap();
    registry.increment("untouched", &src()).unwrap();

    let written = registry
        .rebuild(vec![("scanned".to_string(), 7u64), ("fresh".to_string(), 1u64)])
        .unwrap();
    assert_eq!(written, 2);

    assert_eq!(registry.count_of("scanned").unwrap(), 7);
    assert_eq!(registry.count_of("fresh").unwrap(), 1);
    assert_eq!(registry.count_of("untouched").unwrap(), 1);
}

#[test]
fn file_backed_registry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    {
        let registry = RegistryEngine::open(&path).unwrap();
        registry
            .apply_batch(&[RefDelta::increment("persisted", src())], &checkpoint(9))
            .unwrap();
    }

    let registry = RegistryEngine::open(&path).unwrap();
    assert_eq!(registry.count_of("persisted").unwrap(), 1);
    assert_eq!(registry.checkpoint("s3gc_media").unwrap().unwrap().seq, 9);
}
