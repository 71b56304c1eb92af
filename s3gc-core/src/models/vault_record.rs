use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::OperationId;
use crate::errors::VaultError;

/// Codec tag stored on every vault record and in the blob filename, so the
/// vault can evolve codecs without rewriting history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    Zstd,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zstd" => Ok(Codec::Zstd),
            other => Err(VaultError::UnknownCodec { tag: other.into() }),
        }
    }
}

/// Immutable audit row describing one deletion.
///
/// Once written with `restored_at = None`, the only permitted mutation is
/// setting `restored_at` + `restore_operation_id`, exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub operation_id: OperationId,
    pub s3_key: String,
    pub original_size: u64,
    pub stored_size: u64,
    pub codec: Codec,
    /// SHA-256 (hex) of the pre-compression bytes. Empty in audit_only mode.
    pub content_hash: String,
    /// Path of the backup blob relative to the vault root. Empty in
    /// audit_only mode.
    pub blob_path: String,
    pub deleted_at: DateTime<Utc>,
    pub restored_at: Option<DateTime<Utc>>,
    pub restore_operation_id: Option<OperationId>,
}

impl VaultRecord {
    /// Whether this record carries a restorable blob.
    pub fn has_blob(&self) -> bool {
        !self.blob_path.is_empty() && !self.content_hash.is_empty()
    }
}
