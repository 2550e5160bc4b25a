//! Blob storage access
//!
//! Pipelines talk to storage through [`BlobStore`]. Production uses Azure
//! Blob Storage via `object_store`; tests and dry runs use [`MemoryBlobStore`].

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};

/// Container homepage images are published to
pub const DOWNLOADS_CONTAINER: &str = "downloads";

/// Container intermediate pipeline files live in
pub const PIPELINE_CONTAINER: &str = "pipeline";

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

pub const HOMEPAGE_CACHE_CONTROL: &str = "public, max-age=30, s-maxage=90, must-revalidate";

/// One entry of a container listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobListing {
    pub name: String,
    /// `None` when the store has no metadata for the blob
    pub content_type: Option<String>,
}

/// Headers attached to an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: Option<String>,
}

impl UploadOptions {
    /// Options for a homepage SVG
    pub fn homepage_svg() -> Self {
        Self {
            content_type: SVG_CONTENT_TYPE.to_string(),
            cache_control: Some(HOMEPAGE_CACHE_CONTROL.to_string()),
        }
    }
}

/// A single storage container
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every blob whose name starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<BlobListing>>;

    /// Create or overwrite the blob at `path`
    async fn upload(&self, path: &str, data: Bytes, options: &UploadOptions) -> Result<()>;
}

/// [`BlobStore`] over any `object_store` backend.
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    container: String,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    /// Azure container using credentials from the `AZURE_STORAGE_*` environment.
    pub fn azure_from_env(container: &str) -> Result<Self> {
        let store = object_store::azure::MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()?;
        Ok(Self::new(Arc::new(store), container))
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobListing>> {
        let prefix = Path::from(prefix);
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;

        debug!(container = %self.container, count = objects.len(), "Listed blobs");

        // Listings carry no content settings; callers fall back to the default
        Ok(objects
            .into_iter()
            .map(|meta| BlobListing {
                name: meta.location.to_string(),
                content_type: None,
            })
            .collect())
    }

    async fn upload(&self, path: &str, data: Bytes, options: &UploadOptions) -> Result<()> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, options.content_type.clone().into());
        if let Some(cache_control) = &options.cache_control {
            attributes.insert(Attribute::CacheControl, cache_control.clone().into());
        }

        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&Path::from(path), PutPayload::from(data), opts)
            .await?;

        debug!(container = %self.container, path = %path, "Uploaded blob");
        Ok(())
    }
}

/// A blob held by [`MemoryBlobStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

/// In-process [`BlobStore`]. Listing is ordered by name.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<BTreeMap<String, StoredBlob>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without going through `upload`
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>, content_type: Option<&str>) {
        self.blobs.lock().insert(
            name.into(),
            StoredBlob {
                data: data.into(),
                content_type: content_type.map(str::to_string),
                cache_control: None,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<StoredBlob> {
        self.blobs.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobListing>> {
        Ok(self
            .blobs
            .lock()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, blob)| BlobListing {
                name: name.clone(),
                content_type: blob.content_type.clone(),
            })
            .collect())
    }

    async fn upload(&self, path: &str, data: Bytes, options: &UploadOptions) -> Result<()> {
        if path.is_empty() {
            return Err(AppError::StorageError("Empty blob path".into()));
        }
        self.blobs.lock().insert(
            path.to_string(),
            StoredBlob {
                data,
                content_type: Some(options.content_type.clone()),
                cache_control: options.cache_control.clone(),
            },
        );
        Ok(())
    }
}
