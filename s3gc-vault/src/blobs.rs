//! Content-addressed backup blob files.
//!
//! Layout: `<vault_root>/backups/<operation_id>/<sha256(key)>.<codec>`.
//! Filenames are unique per `(operation, key-hash)` so no locking is
//! needed; the audit record is the source of truth for which blobs exist.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use s3gc_core::constants::VAULT_BACKUP_DIR;
use s3gc_core::errors::VaultError;
use s3gc_core::models::{Codec, OperationId};

/// Filesystem home of backup blobs under the vault root.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(vault_root: &Path) -> Self {
        Self {
            root: vault_root.to_path_buf(),
        }
    }

    /// Blob path relative to the vault root. This exact string is stored
    /// on the vault record.
    pub fn relative_path(operation_id: &OperationId, key: &str, codec: Codec) -> String {
        let key_hash = hex::encode(Sha256::digest(key.as_bytes()));
        format!("{VAULT_BACKUP_DIR}/{operation_id}/{key_hash}.{codec}")
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write a blob, creating the per-operation directory on first use.
    /// Returns the relative path for the record.
    pub fn write(
        &self,
        operation_id: &OperationId,
        key: &str,
        codec: Codec,
        bytes: &[u8],
    ) -> Result<String, VaultError> {
        let relative = Self::relative_path(operation_id, key, codec);
        let path = self.absolute(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(&path, e))?;
        }
        fs::write(&path, bytes).map_err(|e| io_err(&path, e))?;
        Ok(relative)
    }

    /// Read a blob by its recorded relative path.
    pub fn read(&self, relative: &str) -> Result<Vec<u8>, VaultError> {
        let path = self.absolute(relative);
        if !path.exists() {
            return Err(VaultError::BlobMissing {
                path: relative.to_string(),
            });
        }
        fs::read(&path).map_err(|e| io_err(&path, e))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.absolute(relative).exists()
    }

    /// Best-effort removal, used when an object action aborts after its
    /// blob was written. Failure is logged, not surfaced.
    pub fn remove_quiet(&self, relative: &str) {
        let path = self.absolute(relative);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "blob cleanup failed");
            }
        }
    }
}

fn io_err(path: &Path, e: std::io::Error) -> VaultError {
    VaultError::BlobIo {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
