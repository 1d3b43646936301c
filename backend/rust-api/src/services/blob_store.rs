use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::{PortalError, Result};

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stores `bytes` at `bucket/path`. Existing objects are never overwritten.
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

lazy_static! {
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// Object path for an uploaded file: `{folder}/{millis}_{sanitised name}`.
pub fn object_path(folder: &str, file_name: &str, now: DateTime<Utc>) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let cleaned = UNSAFE_NAME_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches('_');
    let name = if cleaned.is_empty() { "file" } else { cleaned };

    format!(
        "{}/{}_{}",
        folder.trim_matches('/'),
        now.timestamp_millis(),
        name
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Object store kept in process memory.
#[derive(Debug)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    public_base_url: String,
    failing: AtomicBool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl MemoryBlobStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            public_base_url: public_base_url.into(),
            failing: AtomicBool::new(false),
        }
    }

    /// While set, every upload is rejected.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortalError::upload("blob store unavailable"));
        }

        let key = (bucket.to_string(), path.to_string());
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(PortalError::upload(format!(
                "object {}/{} already exists",
                bucket, path
            )));
        }

        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            bucket,
            path
        )
    }
}
