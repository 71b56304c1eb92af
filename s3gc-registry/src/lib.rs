//! # s3gc-registry
//!
//! Durable `key → refcount` map with multi-writer safety between the CDC
//! ingester and the GC orchestrator. One mutex-guarded write connection
//! keeps delta ordering; WAL mode gives readers snapshot isolation.

mod db;
pub mod engine;
pub mod migrations;
pub mod queries;

pub use engine::{BatchOutcome, RegistryEngine};

use s3gc_core::errors::RegistryError;

/// Map an underlying store failure into the registry error domain.
pub(crate) fn to_store_err(message: impl Into<String>) -> RegistryError {
    RegistryError::Store {
        message: message.into(),
    }
}
