//! In-memory object store for tests: flat sorted keys, settable
//! last-modified times, fault injection toggles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use s3gc_core::errors::StoreError;
use s3gc_core::traits::{IObjectStore, ListPage, ObjectInfo};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    last_modified: Option<DateTime<Utc>>,
}

/// BTreeMap-backed bucket. Listing pages through keys in sorted order, the
/// continuation token being the last key of the previous page.
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
    fail_gets: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    /// Small pages force the lister through multiple round trips in tests.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            fail_gets: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Insert an object with an explicit age.
    pub fn put_with_mtime(&self, key: &str, bytes: Vec<u8>, last_modified: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                last_modified: Some(last_modified),
            },
        );
    }

    /// Insert an object with no last-modified at all (the retention gate
    /// must treat it as too young).
    pub fn put_without_mtime(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                last_modified: None,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IObjectStore for MemoryObjectStore {
    async fn list_page(&self, continuation: Option<String>) -> Result<ListPage, StoreError> {
        let objects = self.objects.lock().unwrap();
        let lower = continuation
            .as_deref()
            .map_or(std::ops::Bound::Unbounded, |c| {
                std::ops::Bound::Excluded(c.to_string())
            });
        let page: Vec<ObjectInfo> = objects
            .range((lower, std::ops::Bound::Unbounded))
            .take(self.page_size)
            .map(|(key, obj)| ObjectInfo {
                key: key.clone(),
                size: obj.bytes.len() as u64,
                last_modified: obj.last_modified,
            })
            .collect();

        let next = if page.len() == self.page_size {
            page.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ListPage {
            objects: page,
            next,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Get {
                key: key.to_string(),
                message: "injected get failure".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes: body,
                last_modified: Some(Utc::now()),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Delete {
                key: key.to_string(),
                message: "injected delete failure".into(),
            });
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}
