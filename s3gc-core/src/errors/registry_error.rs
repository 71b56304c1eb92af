/// Reference registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Decrement on a missing row or one already at zero.
    #[error("refcount underflow for key {key}")]
    Underflow { key: String },

    #[error("registry store error: {message}")]
    Store { message: String },

    /// A checkpoint older than the one already persisted was offered.
    #[error("stale checkpoint for stream {stream}: seq {offered} <= {persisted}")]
    StaleCheckpoint {
        stream: String,
        offered: u64,
        persisted: u64,
    },
}
