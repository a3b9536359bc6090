use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use crate::chunk_storage::store::{ensure_fits, ChunkStore};
use crate::errors::{BlobError, BlobResult};
use crate::types::BlobId;

/// A `ChunkStore` that keeps chunks in process memory. Used by tests and benches.
#[derive(Clone, Debug)]
pub struct MemoryChunkStore {
    chunk_size: usize,
    chunks: Arc<DashMap<(BlobId, u64), Bytes>>,
}

impl MemoryChunkStore {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunks: Arc::new(DashMap::new()),
        }
    }

    /// Number of chunks currently held for a blob.
    pub fn chunk_count(&self, blob_id: BlobId) -> usize {
        self.chunks.iter().filter(|entry| entry.key().0 == blob_id).count()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn put_chunk(&self, blob_id: BlobId, seq: u64, payload: Bytes) -> BlobResult<()> {
        ensure_fits(self.chunk_size, blob_id, seq, &payload)?;
        self.chunks.insert((blob_id, seq), payload);
        Ok(())
    }

    async fn get_chunk(&self, blob_id: BlobId, seq: u64) -> BlobResult<Bytes> {
        self.chunks
            .get(&(blob_id, seq))
            .map(|entry| entry.value().clone())
            .ok_or(BlobError::ChunkNotFound { blob_id, seq })
    }

    async fn delete_all(&self, blob_id: BlobId) -> BlobResult<()> {
        self.chunks.retain(|key, _| key.0 != blob_id);
        Ok(())
    }
}
