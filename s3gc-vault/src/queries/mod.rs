//! Row-level audit DB operations.

pub mod operation_ops;
pub mod record_ops;

use chrono::{DateTime, Utc};

use s3gc_core::errors::VaultError;

use crate::to_store_err;

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, VaultError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| to_store_err(format!("bad timestamp {raw:?}: {e}")))
}
