use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreError;

/// One entry from a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    /// Server-reported modification time. Missing entries are treated as
    /// too young by the retention gate (fail-closed).
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    pub next: Option<String>,
}

/// Flat-key object store. ListObjectsV2 / Get / Put / Delete / Head
/// semantics; implementations must be safe for concurrent use.
#[async_trait]
pub trait IObjectStore: Send + Sync {
    /// Fetch one listing page; `continuation = None` starts from the front.
    async fn list_page(&self, continuation: Option<String>) -> Result<ListPage, StoreError>;

    /// Download the full object body.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Upload an object under `key`, replacing any existing one.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Whether `key` currently exists.
    async fn head(&self, key: &str) -> Result<bool, StoreError>;
}
