//! S3-compatible object storage for watched-folder uploads.
//!
//! Each folder entry names its own bucket/region/credentials; entries that
//! share a target share one client via [`StoreCache`]. An empty bucket falls
//! back to a local directory store, which doubles as the test backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use uuid::Uuid;

use crate::config::ConfigEntry;
use crate::error::UploadError;
use crate::key;
use crate::observer::UploadObserver;

/// Object storage backend for one folder entry's target.
#[derive(Clone)]
pub enum ObjectStore {
    S3 { bucket: Box<Bucket> },
    Local { root: PathBuf },
}

impl ObjectStore {
    /// Build a store for one folder entry's S3 target.
    pub fn for_entry(entry: &ConfigEntry, local_root: &Path) -> anyhow::Result<Self> {
        if entry.s3_bucket.trim().is_empty() {
            return Ok(Self::Local {
                root: local_root.to_path_buf(),
            });
        }

        let use_path_style = entry.s3_endpoint.is_some(); // Only use path-style for custom endpoints (MinIO, etc.)

        let region = if let Some(ref endpoint) = entry.s3_endpoint {
            Region::Custom {
                region: entry.s3_region.clone(),
                endpoint: endpoint.clone(),
            }
        } else {
            entry.s3_region.parse().unwrap_or(Region::UsEast1)
        };

        let credentials = if !entry.s3_access_key.is_empty() && !entry.s3_secret_key.is_empty() {
            Credentials::new(
                Some(entry.s3_access_key.as_str()),
                Some(entry.s3_secret_key.as_str()),
                None,
                None,
                None,
            )?
        } else {
            // Try to load from environment / instance metadata
            Credentials::default()?
        };

        let bucket = Bucket::new(&entry.s3_bucket, region, credentials)?;
        let bucket = if use_path_style {
            bucket.with_path_style()
        } else {
            bucket
        };
        Ok(Self::S3 { bucket })
    }

    /// Put one object. Success means the store answered HTTP 200; any other
    /// status is surfaced as an error so the watcher's retry policy applies.
    pub async fn put(&self, object_key: &str, data: &[u8]) -> Result<(), UploadError> {
        match self {
            ObjectStore::S3 { bucket } => {
                let response = bucket.put_object(object_key, data).await?;
                if response.status_code() != 200 {
                    return Err(UploadError::StoreStatus(response.status_code()));
                }
                Ok(())
            }
            ObjectStore::Local { root } => {
                let full_path = root.join(object_key);
                if let Some(parent) = full_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&full_path, data).await?;
                Ok(())
            }
        }
    }
}

/// One store per distinct (access key, region, bucket) target, built lazily.
/// Folder entries pointing at the same target reuse the same client.
pub struct StoreCache {
    local_root: PathBuf,
    stores: HashMap<String, ObjectStore>,
}

impl StoreCache {
    pub fn new(local_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            stores: HashMap::new(),
        }
    }

    pub fn store_for(&mut self, entry: &ConfigEntry) -> anyhow::Result<ObjectStore> {
        let cache_key = format!(
            "{}_{}_{}",
            entry.s3_access_key, entry.s3_region, entry.s3_bucket
        );
        if let Some(store) = self.stores.get(&cache_key) {
            return Ok(store.clone());
        }
        let store = ObjectStore::for_entry(entry, &self.local_root)?;
        self.stores.insert(cache_key, store.clone());
        Ok(store)
    }
}

/// The upload capability the watcher drives. Folder-specific behavior (the
/// series companion policy) layers over the base implementation as a
/// decorator rather than a parallel hierarchy.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload one object for `path`: the file's bytes, or `contents` when the
    /// object is synthesized (manifests, placeholder companions). The
    /// correlation id groups every object of one logical unit in key space.
    async fn upload(
        &self,
        entry: &ConfigEntry,
        path: &Path,
        contents: Option<&str>,
        correlation_id: Uuid,
    ) -> Result<(), UploadError>;
}

/// Base uploader: build the key, put the object, notify the observer.
pub struct S3Uploader {
    store: ObjectStore,
    observer: Arc<UploadObserver>,
}

impl S3Uploader {
    pub fn new(store: ObjectStore, observer: Arc<UploadObserver>) -> Self {
        Self { store, observer }
    }
}

#[async_trait]
impl Uploader for S3Uploader {
    async fn upload(
        &self,
        entry: &ConfigEntry,
        path: &Path,
        contents: Option<&str>,
        correlation_id: Uuid,
    ) -> Result<(), UploadError> {
        let object_key = key::build_key(entry, path, correlation_id);

        let data = match contents {
            Some(text) => text.as_bytes().to_vec(),
            None => tokio::fs::read(path).await?,
        };

        self.store.put(&object_key, &data).await?;
        tracing::debug!(file = %path.display(), key = %object_key, "object uploaded");

        self.observer.record_upload(&entry.name);
        Ok(())
    }
}
