use async_trait::async_trait;

use crate::errors::VerifierError;
use crate::models::WatchedColumn;

/// On-demand existence checks against the authoritative database.
///
/// This is the linearization point between a GC cycle and concurrent
/// writers: a key referenced by a committed row at the moment of
/// `find_reference` is never deleted in that cycle.
#[async_trait]
pub trait IReferenceVerifier: Send + Sync {
    /// First watched column currently holding `key`, or `None` when no
    /// live reference exists.
    async fn find_reference(&self, key: &str) -> Result<Option<WatchedColumn>, VerifierError>;

    /// Full scan of all watched columns: `(key, occurrence count)` pairs,
    /// for the registry rebuild.
    async fn scan_counts(&self) -> Result<Vec<(String, u64)>, VerifierError>;
}
