//! Status and metrics aggregation over the vault and registry.

use std::sync::Arc;

use s3gc_core::errors::GcResult;
use s3gc_core::models::{GcMetrics, GcMode, StatusSummary};
use s3gc_registry::RegistryEngine;
use s3gc_vault::VaultStore;

/// Merge vault aggregates with registry stats.
pub fn collect(vault: &VaultStore, registry: &Arc<RegistryEngine>) -> GcResult<GcMetrics> {
    let aggregates = vault.aggregates()?;
    Ok(GcMetrics {
        vault: aggregates,
        tracked_keys: registry.key_count()?,
        zero_ref_keys: registry.zero_ref_count()?,
    })
}

/// Last-cycle summary. `configured_mode` is reported when nothing has run
/// yet.
pub fn status(vault: &VaultStore, configured_mode: GcMode) -> GcResult<StatusSummary> {
    let aggregates = vault.aggregates()?;
    let last = vault.last_finished()?;
    Ok(StatusSummary {
        last_run_at: aggregates.last_run_at,
        total_runs: aggregates.total_operations,
        total_deleted: aggregates.total_deleted,
        mode: last.map(|op| op.mode).unwrap_or(configured_mode),
    })
}
