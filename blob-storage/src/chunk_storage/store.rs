use std::pin::Pin;
use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream};
use crate::chunk_storage::local::LocalChunkStore;
use crate::chunk_storage::memory::MemoryChunkStore;
use crate::chunk_storage::rocks::RocksChunkStore;
use crate::errors::{BlobError, BlobResult};
use crate::types::BlobId;

/// Single-pass, lazily-read sequence of byte slices.
pub type ByteStream = Pin<Box<dyn Stream<Item = BlobResult<Bytes>> + Send>>;

pub type SharedChunkStore = Arc<dyn ChunkStore>;

/// Trait for storing and fetching the fixed-size chunks of a blob.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Payload limit of a single chunk; constant for the lifetime of the store.
    fn chunk_size(&self) -> usize;

    /// Stores one chunk. Payloads longer than `chunk_size` are rejected.
    async fn put_chunk(&self, blob_id: BlobId, seq: u64, payload: Bytes) -> BlobResult<()>;

    /// Retrieves one chunk, or `ChunkNotFound`.
    async fn get_chunk(&self, blob_id: BlobId, seq: u64) -> BlobResult<Bytes>;

    /// Removes every chunk of the blob. Deleting an unknown blob succeeds.
    async fn delete_all(&self, blob_id: BlobId) -> BlobResult<()>;
}

pub(crate) fn ensure_fits(chunk_size: usize, blob_id: BlobId, seq: u64, payload: &[u8]) -> BlobResult<()> {
    if payload.len() > chunk_size {
        return Err(BlobError::InvalidInput(format!(
            "chunk {} of blob {} is {} bytes, limit is {}",
            seq,
            blob_id,
            payload.len(),
            chunk_size
        )));
    }
    Ok(())
}

/// Reassembles the inclusive byte range `start..=end` of a blob.
///
/// Only chunks `start / chunk_size ..= end / chunk_size` are read, one at a
/// time and only when the consumer polls for the next slice. Dropping the
/// stream stops further reads. The first and last chunk are trimmed to the
/// requested bounds; a missing chunk ends the stream with `ChunkNotFound`.
pub fn get_range(store: SharedChunkStore, blob_id: BlobId, start: u64, end: u64) -> ByteStream {
    if start > end {
        return empty_stream();
    }
    let chunk_size = store.chunk_size() as u64;
    let first = start / chunk_size;
    let last = end / chunk_size;

    let slices = stream::try_unfold(first, move |seq| {
        let store = store.clone();
        async move {
            if seq > last {
                return Ok(None);
            }
            let payload = store.get_chunk(blob_id, seq).await?;
            let chunk_start = seq * chunk_size;
            let from = if seq == first { (start - chunk_start) as usize } else { 0 };
            let to = if seq == last { (end - chunk_start) as usize + 1 } else { chunk_size as usize };
            if to > payload.len() {
                return Err(BlobError::CorruptChunk { blob_id, seq });
            }
            tracing::trace!("blob {} chunk {} yields bytes {}..{}", blob_id, seq, from, to);
            Ok(Some((payload.slice(from..to), seq + 1)))
        }
    });
    Box::pin(slices)
}

pub fn empty_stream() -> ByteStream {
    Box::pin(stream::empty())
}

#[derive(Debug, Clone)]
pub enum ChunkStores {
    Local(LocalChunkStore),
    Rocks(RocksChunkStore),
    Memory(MemoryChunkStore),
}

impl ChunkStores {
    /// Returns a reference to the inner value as a trait object.
    pub fn as_trait(&self) -> &dyn ChunkStore {
        match self {
            ChunkStores::Local(a) => a,
            ChunkStores::Rocks(b) => b,
            ChunkStores::Memory(c) => c,
        }
    }

    pub fn into_shared(self) -> SharedChunkStore {
        match self {
            ChunkStores::Local(a) => Arc::new(a),
            ChunkStores::Rocks(b) => Arc::new(b),
            ChunkStores::Memory(c) => Arc::new(c),
        }
    }
}
