//! Process-wide constants.

/// Deltas accumulated before a CDC batch is flushed to the registry.
pub const CDC_BATCH_MAX_DELTAS: usize = 5_000;

/// Longest a CDC batch may sit before it is flushed, in milliseconds.
pub const CDC_BATCH_MAX_WAIT_MS: u64 = 500;

/// Initial CDC reconnect backoff.
pub const CDC_BACKOFF_INITIAL_MS: u64 = 100;

/// CDC reconnect backoff ceiling.
pub const CDC_BACKOFF_CAP_MS: u64 = 30_000;

/// Worker pool size for cycle verification and actions.
pub const CYCLE_WORKERS: usize = 8;

/// Queue depth between the lister and the workers, per worker.
pub const CYCLE_QUEUE_FACTOR: usize = 2;

/// Per-cycle error entries retained in the result; overflow is counted only.
pub const CYCLE_MAX_ERRORS: usize = 1_000;

/// Default minimum object age before deletion, in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Directory under the vault root holding backup blobs.
pub const VAULT_BACKUP_DIR: &str = "backups";

/// Filename of the vault audit database under the vault root.
pub const VAULT_AUDIT_DB: &str = "audit.db";
