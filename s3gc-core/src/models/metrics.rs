use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::GcMode;

/// Aggregates computed from the vault audit DB.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VaultAggregates {
    pub total_operations: u64,
    pub total_deleted: u64,
    pub total_restored: u64,
    pub bytes_original: u64,
    pub bytes_stored: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Merged view served by `/admin/s3gc/metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcMetrics {
    #[serde(flatten)]
    pub vault: VaultAggregates,
    /// Keys tracked by the registry.
    pub tracked_keys: u64,
    /// Tracked keys currently at refcount zero.
    pub zero_ref_keys: u64,
}

/// Last-cycle summary served by `/admin/s3gc/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub last_run_at: Option<DateTime<Utc>>,
    pub total_runs: u64,
    pub total_deleted: u64,
    pub mode: GcMode,
}

/// Liveness + dependency reachability served by `/admin/s3gc/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub vault_accessible: bool,
    pub store_reachable: bool,
    pub cdc_connected: bool,
}

impl HealthReport {
    pub fn derive(vault: bool, store: bool, cdc: bool) -> Self {
        let status = if vault && store { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            vault_accessible: vault,
            store_reachable: store,
            cdc_connected: cdc,
        }
    }
}
