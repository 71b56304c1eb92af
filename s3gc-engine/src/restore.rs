//! Restore engine: replay vault records back into the bucket.
//!
//! Per-object atomicity only: a partial operation restore leaves the
//! already-restored rows marked and the rest untouched, so re-invoking is
//! idempotent.

use std::sync::Arc;

use s3gc_core::errors::{GcResult, RestoreError, VaultError};
use s3gc_core::models::{
    ObjectFailure, OperationId, OperationIdGenerator, RestoreReport, VaultRecord,
};
use s3gc_core::traits::IObjectStore;
use s3gc_vault::{compressor, VaultStore};

#[derive(Clone)]
pub struct RestoreDeps {
    pub vault: Arc<VaultStore>,
    pub store: Arc<dyn IObjectStore>,
    pub op_ids: Arc<OperationIdGenerator>,
}

/// Restore every not-yet-restored record of one operation.
pub async fn restore_operation(
    deps: RestoreDeps,
    operation_id: &OperationId,
    dry_run: bool,
    skip_existing: bool,
) -> GcResult<RestoreReport> {
    if deps.vault.get_operation(operation_id)?.is_none() {
        return Err(RestoreError::UnknownOperation {
            operation_id: operation_id.to_string(),
        }
        .into());
    }

    let restore_id = deps.op_ids.next();
    let mut report = RestoreReport {
        restore_operation_id: restore_id.clone(),
        dry_run,
        restored_count: 0,
        skipped_count: 0,
        failed_count: 0,
        errors: Vec::new(),
    };

    for record in deps.vault.lookup_by_operation(operation_id)? {
        if record.restored_at.is_some() {
            report.skipped_count += 1;
            continue;
        }
        restore_record(&deps, &restore_id, &record, dry_run, skip_existing, &mut report).await;
    }

    tracing::info!(
        operation = %operation_id,
        restore_operation = %restore_id,
        restored = report.restored_count,
        skipped = report.skipped_count,
        failed = report.failed_count,
        dry_run,
        "operation restore finished"
    );
    Ok(report)
}

/// Restore the most recent undone record for one key.
pub async fn restore_single_key(
    deps: RestoreDeps,
    key: &str,
    dry_run: bool,
) -> GcResult<RestoreReport> {
    let record = deps
        .vault
        .lookup_by_key(key)?
        .ok_or_else(|| RestoreError::NoRecord {
            key: key.to_string(),
        })?;

    let restore_id = deps.op_ids.next();
    let mut report = RestoreReport {
        restore_operation_id: restore_id.clone(),
        dry_run,
        restored_count: 0,
        skipped_count: 0,
        failed_count: 0,
        errors: Vec::new(),
    };
    restore_record(&deps, &restore_id, &record, dry_run, false, &mut report).await;
    Ok(report)
}

/// One record end to end: blob → decompress → hash check → put → mark.
async fn restore_record(
    deps: &RestoreDeps,
    restore_id: &OperationId,
    record: &VaultRecord,
    dry_run: bool,
    skip_existing: bool,
    report: &mut RestoreReport,
) {
    let key = record.s3_key.as_str();

    // audit_only records carry no blob; nothing can be brought back.
    if !record.has_blob() {
        tracing::warn!(key = %key, operation = %record.operation_id,
            "record has no backup blob (audit_only), skipping");
        report.skipped_count += 1;
        return;
    }

    if skip_existing {
        match deps.store.head(key).await {
            Ok(true) => {
                report.skipped_count += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                report.failed_count += 1;
                report
                    .errors
                    .push(ObjectFailure::new(key, "RestoreError", e.to_string()));
                return;
            }
        }
    }

    if dry_run {
        report.restored_count += 1;
        return;
    }

    let result = async {
        let blob = deps.vault.blobs().read(&record.blob_path)?;
        let bytes = compressor::decompress_bytes(&blob, record.codec)?;
        let actual = compressor::content_hash(&bytes);
        if actual != record.content_hash {
            return Err(VaultError::HashMismatch {
                key: key.to_string(),
                expected: record.content_hash.clone(),
                actual,
            }
            .into());
        }
        deps.store
            .put(key, bytes)
            .await
            .map_err(s3gc_core::errors::GcError::from)?;
        Ok::<(), s3gc_core::errors::GcError>(())
    }
    .await;

    if let Err(e) = result {
        report.failed_count += 1;
        report
            .errors
            .push(ObjectFailure::new(key, "RestoreError", e.to_string()));
        return;
    }

    match deps
        .vault
        .mark_restored(&record.operation_id, key, restore_id)
    {
        Ok(()) => report.restored_count += 1,
        // Lost a race with a concurrent restore; the object is back either
        // way.
        Err(VaultError::AlreadyRestored { .. }) => report.skipped_count += 1,
        Err(e) => {
            report.failed_count += 1;
            report
                .errors
                .push(ObjectFailure::new(key, "RestoreError", e.to_string()));
        }
    }
}
