//! Shared fixtures: a runtime wired to in-memory store/verifier fakes.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use s3gc_core::config::GcConfig;
use s3gc_core::errors::StoreError;
use s3gc_core::models::{GcMode, WatchedColumn, WatchedSet};
use s3gc_core::traits::{IObjectStore, ListPage};
use s3gc_engine::GcRuntime;
use s3gc_store::{MemoryObjectStore, MemoryVerifier};

pub fn avatar_column() -> WatchedColumn {
    WatchedColumn::new("users", "avatar_url")
}

pub fn config(vault_path: std::path::PathBuf, mode: GcMode) -> GcConfig {
    GcConfig {
        bucket: "media".into(),
        region: "us-east-1".into(),
        mode,
        tables: WatchedSet::new(vec![avatar_column()]),
        retention_days: 7,
        exclude_prefixes: vec![],
        vault_path,
        cdc_backend: None,
        cdc_connection_url: None,
        schedule: None,
        admin_api_key: "secret".into(),
    }
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub runtime: Arc<GcRuntime>,
    pub store: Arc<MemoryObjectStore>,
    pub verifier: Arc<MemoryVerifier>,
}

pub async fn fixture(mode: GcMode) -> Fixture {
    fixture_with(mode, |_| {}).await
}

pub async fn fixture_with(mode: GcMode, tweak: impl FnOnce(&mut GcConfig)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path().join("vault"), mode);
    tweak(&mut cfg);

    let store = Arc::new(MemoryObjectStore::new());
    let verifier = Arc::new(MemoryVerifier::new());
    let runtime = GcRuntime::initialize(cfg, store.clone(), verifier.clone(), None)
        .await
        .unwrap();
    Fixture {
        dir,
        runtime,
        store,
        verifier,
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - ChronoDuration::days(days)
}

/// Object store wrapper that sleeps in `list_page`, so cycles stay
/// in flight long enough for overlap and deadline tests.
pub struct SlowStore {
    pub inner: Arc<MemoryObjectStore>,
    pub delay: Duration,
}

#[async_trait]
impl IObjectStore for SlowStore {
    async fn list_page(&self, continuation: Option<String>) -> Result<ListPage, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_page(continuation).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.inner.put(key, body).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn head(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.head(key).await
    }
}
