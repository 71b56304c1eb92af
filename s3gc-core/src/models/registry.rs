use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the reference registry.
///
/// `ref_count` never goes below zero; a row that reaches zero is kept as
/// evidence for retention gating rather than deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: String,
    pub ref_count: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}
