use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use quick_cache::sync::Cache;
use crate::errors::BlobResult;
use crate::metadata::{MetadataIndex, SharedMetadataIndex};
use crate::types::{BlobId, BlobMetadata};

/// Read-through cache in front of another index.
///
/// Entries are only filled from successful reads of committed records.
/// Every delete bumps `deletions` after the inner record is gone; a read whose
/// inner lookup overlapped a delete drops the entry it just filled, so a
/// finished delete is never undone by a slower read.
pub struct CachedMetadataIndex {
    inner: SharedMetadataIndex,
    cache: Cache<BlobId, BlobMetadata>,
    deletions: AtomicU64,
}

impl CachedMetadataIndex {
    pub fn new(inner: SharedMetadataIndex, capacity: usize) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity),
            deletions: AtomicU64::new(0),
        }
    }

    pub fn shared(inner: SharedMetadataIndex, capacity: usize) -> SharedMetadataIndex {
        Arc::new(Self::new(inner, capacity))
    }
}

#[async_trait]
impl MetadataIndex for CachedMetadataIndex {
    async fn create(&self, metadata: BlobMetadata) -> BlobResult<()> {
        self.inner.create(metadata).await
    }

    async fn get(&self, blob_id: BlobId) -> BlobResult<BlobMetadata> {
        if let Some(hit) = self.cache.get(&blob_id) {
            return Ok(hit);
        }
        let seen = self.deletions.load(Ordering::SeqCst);
        let metadata = self.inner.get(blob_id).await?;
        self.cache.insert(blob_id, metadata.clone());
        if self.deletions.load(Ordering::SeqCst) != seen {
            self.cache.remove(&blob_id);
        }
        Ok(metadata)
    }

    async fn delete(&self, blob_id: BlobId) -> BlobResult<()> {
        self.cache.remove(&blob_id);
        let result = self.inner.delete(blob_id).await;
        self.deletions.fetch_add(1, Ordering::SeqCst);
        self.cache.remove(&blob_id);
        result
    }
}
