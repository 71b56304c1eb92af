/// Vault audit store and blob store errors.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Duplicate `(operation_id, s3_key)` record.
    #[error("vault record already exists for {operation_id}/{key}")]
    Conflict { operation_id: String, key: String },

    /// A second restore attempt on the same record.
    #[error("record {operation_id}/{key} is already restored")]
    AlreadyRestored { operation_id: String, key: String },

    #[error("unknown operation {operation_id}")]
    UnknownOperation { operation_id: String },

    #[error("vault store error: {message}")]
    Store { message: String },

    #[error("blob missing at {path}")]
    BlobMissing { path: String },

    #[error("blob io error at {path}: {message}")]
    BlobIo { path: String, message: String },

    #[error("content hash mismatch for {key}: expected {expected}, got {actual}")]
    HashMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("unknown codec tag {tag:?}")]
    UnknownCodec { tag: String },

    #[error("codec error: {message}")]
    Codec { message: String },
}
