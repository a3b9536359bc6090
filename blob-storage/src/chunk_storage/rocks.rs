use std::sync::Arc;
use async_trait::async_trait;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use rocksdb::{ColumnFamily, DB};
use crate::chunk_storage::store::{ensure_fits, ChunkStore};
use crate::errors::{BlobError, BlobResult};
use crate::storage::{column_family, CHUNKS_CF, STORE_CF};
use crate::types::BlobId;

const CHUNK_SIZE_KEY: &[u8] = b"chunk_size";

/// Builds the 24-byte chunk key: blob id followed by the big-endian sequence
/// number, so a blob's chunks sort contiguously and in order.
fn chunk_key(blob_id: BlobId, seq: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(blob_id.as_bytes());
    BigEndian::write_u64(&mut key[16..], seq);
    key
}

/// A `ChunkStore` backed by the `chunks` column family of a shared RocksDB handle.
#[derive(Debug, Clone)]
pub struct RocksChunkStore {
    db: Arc<DB>,
    chunk_size: usize,
}

impl RocksChunkStore {
    /// Wraps an open database, pinning the chunk size on first use.
    pub fn open(db: Arc<DB>, chunk_size: usize) -> BlobResult<Self> {
        let settings = column_family(&db, STORE_CF)?;
        match db.get_cf(settings, CHUNK_SIZE_KEY)? {
            Some(raw) if raw.len() == 8 => {
                let pinned = BigEndian::read_u64(&raw);
                if pinned != chunk_size as u64 {
                    return Err(BlobError::InvalidConfig(format!(
                        "database was created with chunk size {}, not {}",
                        pinned, chunk_size
                    )));
                }
            }
            Some(_) => return Err(BlobError::store("unreadable pinned chunk size")),
            None => {
                let mut raw = [0u8; 8];
                BigEndian::write_u64(&mut raw, chunk_size as u64);
                db.put_cf(settings, CHUNK_SIZE_KEY, raw)?;
                db.flush_wal(true)?;
            }
        }
        Ok(Self { db, chunk_size })
    }

    /// Returns a handle to the "chunks" column family
    fn chunks(&self) -> BlobResult<&ColumnFamily> {
        column_family(&self.db, CHUNKS_CF)
    }
}

#[async_trait]
impl ChunkStore for RocksChunkStore {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn put_chunk(&self, blob_id: BlobId, seq: u64, payload: Bytes) -> BlobResult<()> {
        ensure_fits(self.chunk_size, blob_id, seq, &payload)?;
        self.db.put_cf(self.chunks()?, chunk_key(blob_id, seq), &payload)?;
        Ok(())
    }

    async fn get_chunk(&self, blob_id: BlobId, seq: u64) -> BlobResult<Bytes> {
        self.db
            .get_cf(self.chunks()?, chunk_key(blob_id, seq))?
            .map(Bytes::from)
            .ok_or(BlobError::ChunkNotFound { blob_id, seq })
    }

    async fn delete_all(&self, blob_id: BlobId) -> BlobResult<()> {
        // The end key is exclusive; u64::MAX is never a real sequence number.
        self.db.delete_range_cf(
            self.chunks()?,
            chunk_key(blob_id, 0),
            chunk_key(blob_id, u64::MAX),
        )?;
        Ok(())
    }
}
