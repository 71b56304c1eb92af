//! AWS S3 object store client.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use chrono::{DateTime, TimeZone, Utc};

use s3gc_core::errors::StoreError;
use s3gc_core::traits::{IObjectStore, ListPage, ObjectInfo};

/// S3-backed object store. The underlying SDK client holds its own
/// connection pool and is safe to share.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS environment plus the
    /// configured region.
    pub async fn connect(region: &str, bucket: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl IObjectStore for S3ObjectStore {
    async fn list_page(&self, continuation: Option<String>) -> Result<ListPage, StoreError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| StoreError::List {
                message: e.to_string(),
            })?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectInfo {
                    key,
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            next: resp.next_continuation_token().map(String::from),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let svc = e.into_service_error();
                if svc.is_no_such_key() {
                    StoreError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StoreError::Get {
                        key: key.to_string(),
                        message: svc.to_string(),
                    }
                }
            })?;

        let body = resp.body.collect().await.map_err(|e| StoreError::Get {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body.into())
            .send()
            .await
            .map_err(|e| StoreError::Put {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let svc = e.into_service_error();
                if svc.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Head {
                        key: key.to_string(),
                        message: svc.to_string(),
                    })
                }
            }
        }
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(dt.secs(), dt.subsec_nanos()).single()
}
