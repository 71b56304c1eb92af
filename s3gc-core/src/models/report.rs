use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::{CycleStatus, GcMode, OperationCounters, OperationId};

/// One per-object failure captured in a cycle or restore report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectFailure {
    pub key: String,
    /// Taxonomy tag, e.g. `BackupError` or the literal `registry_stale(key)`
    /// warning form.
    pub kind: String,
    pub message: String,
}

impl ObjectFailure {
    pub fn new(key: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// The warning entry emitted when live re-verification contradicts the
    /// registry.
    pub fn registry_stale(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: format!("registry_stale({key})"),
            message: "registry count was zero but a live reference exists".into(),
        }
    }
}

/// Outcome of one GC cycle, returned by `run_cycle` and the admin trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub operation_id: OperationId,
    pub mode: GcMode,
    pub status: CycleStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counters: OperationCounters,
    /// Keys confirmed as orphans this cycle (deleted in execute mode).
    pub orphans: Vec<String>,
    /// Bounded at `CYCLE_MAX_ERRORS`; `counters.error_count` keeps the
    /// true total.
    pub errors: Vec<ObjectFailure>,
}

/// Outcome of a restore invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    pub restore_operation_id: OperationId,
    pub dry_run: bool,
    pub restored_count: u64,
    /// Already-restored rows, `skip_existing` hits, and audit-only records.
    pub skipped_count: u64,
    pub failed_count: u64,
    pub errors: Vec<ObjectFailure>,
}
