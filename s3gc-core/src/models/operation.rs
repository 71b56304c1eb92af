use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::errors::ConfigError;

/// Identifier of one GC or restore operation.
///
/// A ULID: 26 Crockford base32 characters, ascending under lexicographic
/// sort when generation time ascends.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse from its canonical 26-char form.
    pub fn parse(s: &str) -> Option<Self> {
        Ulid::from_string(s).ok().map(|u| Self(u.to_string()))
    }
}

impl From<Ulid> for OperationId {
    fn from(u: Ulid) -> Self {
        Self(u.to_string())
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-wide monotonic operation id source.
///
/// Two ids allocated in the same millisecond still sort in allocation
/// order; the underlying generator increments the random component.
pub struct OperationIdGenerator {
    inner: Mutex<ulid::Generator>,
}

impl OperationIdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ulid::Generator::new()),
        }
    }

    pub fn next(&self) -> OperationId {
        let mut gen = self.inner.lock().expect("operation id generator poisoned");
        match gen.generate() {
            Ok(ulid) => ulid.into(),
            // Random component overflow within one millisecond. Vanishingly
            // rare at our allocation rate; a fresh ulid keeps time ordering.
            Err(_) => Ulid::new().into(),
        }
    }
}

impl Default for OperationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// What a cycle is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcMode {
    /// Report only, no side effects.
    DryRun,
    /// Write vault records, never download or delete.
    AuditOnly,
    /// Full backup-then-delete pipeline.
    Execute,
}

impl GcMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GcMode::DryRun => "dry_run",
            GcMode::AuditOnly => "audit_only",
            GcMode::Execute => "execute",
        }
    }
}

impl Default for GcMode {
    fn default() -> Self {
        GcMode::DryRun
    }
}

impl std::fmt::Display for GcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GcMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dry_run" => Ok(GcMode::DryRun),
            "audit_only" => Ok(GcMode::AuditOnly),
            "execute" => Ok(GcMode::Execute),
            other => Err(ConfigError::Invalid {
                name: "mode".into(),
                value: other.into(),
                reason: "expected dry_run, audit_only, or execute".into(),
            }),
        }
    }
}

/// Terminal (or in-flight) state of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Running => "running",
            CycleStatus::Completed => "completed",
            CycleStatus::Cancelled => "cancelled",
            CycleStatus::Failed => "failed",
        }
    }
}

impl FromStr for CycleStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(CycleStatus::Running),
            "completed" => Ok(CycleStatus::Completed),
            "cancelled" => Ok(CycleStatus::Cancelled),
            "failed" => Ok(CycleStatus::Failed),
            _ => Err(()),
        }
    }
}

/// Aggregate counters closed into the vault at cycle end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounters {
    /// Keys that passed exclusion + retention + registry filter.
    pub candidates_found: u64,
    /// Candidates that also passed live DB re-verification.
    pub verified_orphans: u64,
    /// Objects actually removed from the bucket (execute only).
    pub deleted_count: u64,
    /// Keys dropped by an exclusion prefix.
    pub excluded_count: u64,
    /// Keys dropped by the retention gate.
    pub retained_count: u64,
    /// Candidates rejected at re-verification (registry was stale).
    pub registry_stale_count: u64,
    /// Sum of original object sizes backed up.
    pub bytes_original: u64,
    /// Sum of compressed blob sizes written.
    pub bytes_stored: u64,
    /// Per-object failures (including those past the bounded error list).
    pub error_count: u64,
}

/// One end-to-end cycle as persisted in the vault. Immutable once closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcOperation {
    pub id: OperationId,
    pub mode: GcMode,
    pub status: CycleStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counters: OperationCounters,
    /// SHA-256 of the redacted config snapshot active for this run.
    pub config_digest: String,
}
