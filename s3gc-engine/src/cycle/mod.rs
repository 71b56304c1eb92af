//! One GC cycle: `Pending → Listing → Verifying → Acting → Closed`.
//!
//! The listing streams through a bounded channel into a worker pool; no
//! key list is ever materialized. Workers re-verify each candidate
//! against the live database right before acting; that re-check is the
//! linearization point with concurrent writers.

mod progress;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};

use s3gc_core::config::GcConfig;
use s3gc_core::constants::{CYCLE_QUEUE_FACTOR, CYCLE_WORKERS};
use s3gc_core::errors::{GcError, GcResult, StoreError, VaultError};
use s3gc_core::models::{
    Codec, CycleReport, CycleStatus, GcMode, GcOperation, ObjectFailure, OperationCounters,
    OperationId, VaultRecord,
};
use s3gc_core::traits::{IObjectStore, IReferenceVerifier, ObjectInfo};
use s3gc_registry::RegistryEngine;
use s3gc_vault::{compressor, VaultStore};

use progress::CycleProgress;

/// Everything a cycle touches; cloned `Arc`s, cheap to hand to tasks.
#[derive(Clone)]
pub struct CycleDeps {
    pub config: Arc<GcConfig>,
    pub registry: Arc<RegistryEngine>,
    pub vault: Arc<VaultStore>,
    pub store: Arc<dyn IObjectStore>,
    pub verifier: Arc<dyn IReferenceVerifier>,
}

/// Run one complete cycle. Cancellation (deadline) closes the cycle
/// cleanly with partial results; infrastructure faults fail it.
pub async fn run(
    deps: CycleDeps,
    operation_id: OperationId,
    deadline: Option<Duration>,
) -> GcResult<CycleReport> {
    let started_at = Utc::now();
    let mode = deps.config.mode;
    tracing::info!(operation = %operation_id, mode = %mode, "gc cycle started");

    deps.vault.begin_operation(&GcOperation {
        id: operation_id.clone(),
        mode,
        status: CycleStatus::Running,
        started_at,
        finished_at: None,
        counters: OperationCounters::default(),
        config_digest: deps.config.digest(),
    })?;

    let progress = Arc::new(CycleProgress::new());
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (tx, rx) = mpsc::channel::<ObjectInfo>(CYCLE_WORKERS * CYCLE_QUEUE_FACTOR);
    let rx = Arc::new(Mutex::new(rx));

    let timer = deadline.map(|d| {
        let cancel_tx = cancel_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(d).await;
            let _ = cancel_tx.send(true);
        })
    });

    let lister = {
        let deps = deps.clone();
        let progress = progress.clone();
        let cancel_rx = cancel_rx.clone();
        let cancel_tx = cancel_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = list_bucket(&deps, &progress, tx, &cancel_rx).await {
                tracing::error!(error = %e, "bucket listing failed");
                progress.set_fatal(e);
                let _ = cancel_tx.send(true);
            }
        })
    };

    let mut workers = Vec::with_capacity(CYCLE_WORKERS);
    for _ in 0..CYCLE_WORKERS {
        let deps = deps.clone();
        let progress = progress.clone();
        let rx = rx.clone();
        let cancel_rx = cancel_rx.clone();
        let operation_id = operation_id.clone();
        workers.push(tokio::spawn(async move {
            loop {
                // No new candidates are dequeued once cancelled; whatever
                // is mid-action elsewhere finishes on its own.
                if *cancel_rx.borrow() {
                    break;
                }
                let next = rx.lock().await.recv().await;
                match next {
                    Some(info) => process_key(&deps, &progress, &operation_id, info).await,
                    None => break,
                }
            }
        }));
    }
    // The workers hold the only receiver handles now. Once they exit, a
    // lister blocked on a full queue sees the channel close instead of
    // hanging.
    drop(rx);

    lister.await.ok();
    for worker in workers {
        worker.await.ok();
    }
    if let Some(timer) = timer {
        timer.abort();
    }

    let cancelled = *cancel_rx.borrow() && !progress.has_fatal();
    let finished_at = Utc::now();
    let counters = progress.counters();

    if let Some(fatal) = progress.take_fatal() {
        let _ = deps
            .vault
            .end_operation(&operation_id, CycleStatus::Failed, &counters, finished_at);
        tracing::error!(operation = %operation_id, error = %fatal, "gc cycle failed");
        return Err(fatal);
    }

    let status = if cancelled {
        CycleStatus::Cancelled
    } else {
        CycleStatus::Completed
    };
    deps.vault
        .end_operation(&operation_id, status, &counters, finished_at)?;

    tracing::info!(
        operation = %operation_id,
        status = status.as_str(),
        candidates = counters.candidates_found,
        orphans = counters.verified_orphans,
        deleted = counters.deleted_count,
        "gc cycle closed"
    );

    Ok(CycleReport {
        operation_id,
        mode,
        status,
        started_at,
        finished_at,
        counters,
        orphans: progress.take_orphans(),
        errors: progress.take_errors(),
    })
}

/// Stream the bucket listing through exclusion and retention gates into
/// the worker queue.
async fn list_bucket(
    deps: &CycleDeps,
    progress: &CycleProgress,
    tx: mpsc::Sender<ObjectInfo>,
    cancel: &watch::Receiver<bool>,
) -> Result<(), GcError> {
    let now = Utc::now();
    let retention = chrono::Duration::days(i64::from(deps.config.retention_days));
    let mut token: Option<String> = None;

    loop {
        if *cancel.borrow() {
            return Ok(());
        }
        let page = deps.store.list_page(token.take()).await?;

        for info in page.objects {
            if *cancel.borrow() {
                return Ok(());
            }
            if deps
                .config
                .exclude_prefixes
                .iter()
                .any(|p| info.key.starts_with(p.as_str()))
            {
                progress.excluded_count.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            // Retention gate. A missing timestamp means the store did not
            // tell us the age, so the key is treated as too young.
            let old_enough = info
                .last_modified
                .map(|ts| now - ts >= retention)
                .unwrap_or(false);
            if !old_enough {
                progress.retained_count.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if tx.send(info).await.is_err() {
                return Ok(());
            }
        }

        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(()),
        }
    }
}

/// Registry filter → live DB re-verification → mode action, for one key.
async fn process_key(
    deps: &CycleDeps,
    progress: &CycleProgress,
    operation_id: &OperationId,
    info: ObjectInfo,
) {
    let key = info.key.clone();

    match deps.registry.count_of(&key) {
        Ok(0) => {}
        Ok(_) => return,
        Err(e) => {
            progress.set_fatal(e.into());
            return;
        }
    }
    progress.candidates_found.fetch_add(1, Ordering::Relaxed);

    // Live re-verification: a committed reference at this moment always
    // wins, and the registry is corrected on the spot.
    match deps.verifier.find_reference(&key).await {
        Ok(Some(column)) => {
            tracing::warn!(key = %key, column = %column, "registry stale, reference is live");
            progress.registry_stale_count.fetch_add(1, Ordering::Relaxed);
            progress.push_warning(ObjectFailure::registry_stale(&key));
            if let Err(e) = deps.registry.increment(&key, &column) {
                progress.set_fatal(e.into());
            }
            return;
        }
        Ok(None) => {}
        Err(e) => {
            // Fail closed: an unverifiable candidate is never deleted.
            progress.push_failure(ObjectFailure::new(&key, "VerifierError", e.to_string()));
            return;
        }
    }

    progress.verified_orphans.fetch_add(1, Ordering::Relaxed);
    progress.push_orphan(&key);

    match deps.config.mode {
        GcMode::DryRun => {}
        GcMode::AuditOnly => audit_only(deps, progress, operation_id, &info).await,
        GcMode::Execute => execute(deps, progress, operation_id, &key).await,
    }
}

/// audit_only: a vault record with no blob, no download, no delete.
async fn audit_only(
    deps: &CycleDeps,
    progress: &CycleProgress,
    operation_id: &OperationId,
    info: &ObjectInfo,
) {
    let record = VaultRecord {
        operation_id: operation_id.clone(),
        s3_key: info.key.clone(),
        original_size: info.size,
        stored_size: 0,
        codec: Codec::Zstd,
        content_hash: String::new(),
        blob_path: String::new(),
        deleted_at: Utc::now(),
        restored_at: None,
        restore_operation_id: None,
    };
    match deps.vault.record_deletion(&record) {
        Ok(()) => {}
        Err(VaultError::Conflict { .. }) => {
            tracing::debug!(key = %info.key, "duplicate listing entry, record exists");
        }
        Err(e) => progress.set_fatal(e.into()),
    }
}

/// execute: download → compress → blob → record → delete, aborting the
/// object (bucket untouched) on any failure before the delete.
async fn execute(
    deps: &CycleDeps,
    progress: &CycleProgress,
    operation_id: &OperationId,
    key: &str,
) {
    let bytes = match deps.store.get(key).await {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound { .. }) => {
            tracing::debug!(key = %key, "object vanished before backup");
            return;
        }
        Err(e) => {
            progress.push_failure(ObjectFailure::new(key, "StoreError", e.to_string()));
            return;
        }
    };

    let (compressed, stats) = match compressor::compress_bytes(&bytes, Codec::Zstd) {
        Ok(out) => out,
        Err(e) => {
            progress.push_failure(ObjectFailure::new(key, "BackupError", e.to_string()));
            return;
        }
    };

    let blob_path = match deps
        .vault
        .blobs()
        .write(operation_id, key, Codec::Zstd, &compressed)
    {
        Ok(path) => path,
        Err(e) => {
            progress.push_failure(ObjectFailure::new(key, "BackupError", e.to_string()));
            return;
        }
    };

    let record = VaultRecord {
        operation_id: operation_id.clone(),
        s3_key: key.to_string(),
        original_size: stats.original_size,
        stored_size: stats.stored_size,
        codec: Codec::Zstd,
        content_hash: stats.content_hash,
        blob_path: blob_path.clone(),
        deleted_at: Utc::now(),
        restored_at: None,
        restore_operation_id: None,
    };
    match deps.vault.record_deletion(&record) {
        Ok(()) => {}
        Err(VaultError::Conflict { .. }) => {
            // Second appearance of the key in this listing; the first
            // attempt owns the record (and the identical blob).
            tracing::debug!(key = %key, "duplicate listing entry, record exists");
            return;
        }
        Err(e) => {
            deps.vault.blobs().remove_quiet(&blob_path);
            progress.set_fatal(e.into());
            return;
        }
    }

    // The object is acknowledged as collected only after the delete
    // returns OK. A failed delete leaves record + blob for reconciliation.
    match deps.store.delete(key).await {
        Ok(()) => {
            progress.deleted_count.fetch_add(1, Ordering::Relaxed);
            progress
                .bytes_original
                .fetch_add(stats.original_size, Ordering::Relaxed);
            progress
                .bytes_stored
                .fetch_add(stats.stored_size, Ordering::Relaxed);
            tracing::debug!(key = %key, "object backed up and deleted");
        }
        Err(e) => {
            progress.push_failure(ObjectFailure::new(
                key,
                "StoreError",
                format!("delete failed, vault record retained: {e}"),
            ));
        }
    }
}
