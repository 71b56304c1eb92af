//! In-memory verifier for tests: rows are `(watched column → values)`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use s3gc_core::errors::VerifierError;
use s3gc_core::models::WatchedColumn;
use s3gc_core::traits::IReferenceVerifier;

/// A fake database the tests mutate mid-cycle to exercise the
/// re-verification linearization point.
#[derive(Default)]
pub struct MemoryVerifier {
    rows: Mutex<HashMap<WatchedColumn, Vec<String>>>,
}

impl MemoryVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference value under a watched column.
    pub fn insert(&self, column: WatchedColumn, value: &str) {
        self.rows
            .lock()
            .unwrap()
            .entry(column)
            .or_default()
            .push(value.to_string());
    }

    /// Remove one occurrence of a value.
    pub fn remove(&self, column: &WatchedColumn, value: &str) {
        if let Some(values) = self.rows.lock().unwrap().get_mut(column) {
            if let Some(pos) = values.iter().position(|v| v == value) {
                values.remove(pos);
            }
        }
    }
}

#[async_trait]
impl IReferenceVerifier for MemoryVerifier {
    async fn find_reference(&self, key: &str) -> Result<Option<WatchedColumn>, VerifierError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|(_, values)| values.iter().any(|v| v == key))
            .map(|(column, _)| column.clone()))
    }

    async fn scan_counts(&self) -> Result<Vec<(String, u64)>, VerifierError> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for values in self.rows.lock().unwrap().values() {
            for value in values {
                if !value.is_empty() {
                    *counts.entry(value.clone()).or_insert(0) += 1;
                }
            }
        }
        Ok(counts.into_iter().collect())
    }
}
