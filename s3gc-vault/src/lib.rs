//! # s3gc-vault
//!
//! The immutable side of the collector: an append-only audit database of
//! deletions, a content-addressed blob store for backups, and the
//! streaming compressor that feeds it.

pub mod blobs;
pub mod compressor;
pub mod engine;
pub mod migrations;
pub mod queries;

pub use blobs::BlobStore;
pub use engine::VaultStore;

use s3gc_core::errors::VaultError;

pub(crate) fn to_store_err(message: impl Into<String>) -> VaultError {
    VaultError::Store {
        message: message.into(),
    }
}
