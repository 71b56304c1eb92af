/// GC cycle errors. Per-object failures are collected in the cycle result;
/// these variants abort or reject the cycle itself.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// A cycle is already in flight on this process.
    #[error("a gc cycle is already running")]
    Busy,

    /// Deadline expiry or shutdown. The cycle closes cleanly with partial
    /// results before this is surfaced.
    #[error("cycle cancelled")]
    Cancelled,

    /// Compression or blob write failure for one object; used as the
    /// per-object error kind in results.
    #[error("backup of {key} failed: {message}")]
    Backup { key: String, message: String },

    /// Registry or vault became unusable mid-cycle.
    #[error("cycle infrastructure failure: {message}")]
    Infrastructure { message: String },
}

/// Restore engine errors.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("no vault record found for key {key}")]
    NoRecord { key: String },

    #[error("operation {operation_id} not found")]
    UnknownOperation { operation_id: String },

    #[error("restore of {key} failed: {message}")]
    Object { key: String, message: String },
}
