#![allow(clippy::uninlined_format_args)]

//! Chunked blob storage with single-range reads.
//!
//! Blobs are written as fixed-size chunks through a [`ChunkStore`] and become
//! visible once their [`BlobMetadata`] is committed to a [`MetadataIndex`].

use std::sync::Arc;
use rocksdb::DB;

use crate::chunk_storage::store::{ChunkStores, SharedChunkStore};
use crate::config::StoreConfig;
use crate::metadata::cached::CachedMetadataIndex;
use crate::metadata::rocks::RocksMetadataIndex;
use crate::metadata::SharedMetadataIndex;

pub mod chunk_storage;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod metadata;
pub mod range;
pub mod reader;
pub mod storage;
pub mod types;
pub mod upload;

pub use crate::chunk_storage::store::{ByteStream, ChunkStore};
pub use crate::errors::{BlobError, BlobResult};
pub use crate::lifecycle::{LifecycleBinder, MediaReference};
pub use crate::metadata::MetadataIndex;
pub use crate::range::ByteRange;
pub use crate::reader::{RangeReader, ServeStatus, ServedBlob};
pub use crate::types::{BlobId, BlobMetadata, MediaKind};
pub use crate::upload::{UploadRequest, Uploader};

/// The three pipelines wired to one chunk store and one metadata index.
#[derive(Clone)]
pub struct BlobServices {
    pub uploader: Uploader,
    pub reader: RangeReader,
    pub binder: LifecycleBinder,
}

impl BlobServices {
    pub fn new(chunks: SharedChunkStore, index: SharedMetadataIndex, config: &StoreConfig) -> Self {
        Self {
            uploader: Uploader::from_config(chunks.clone(), index.clone(), config),
            reader: RangeReader::new(chunks.clone(), index.clone()),
            binder: LifecycleBinder::new(chunks, index),
        }
    }

    /// Services over an already opened RocksDB handle, with metadata cached in
    /// front of the `metadata` column family.
    pub fn with_rocks_index(chunks: ChunkStores, db: Arc<DB>, config: &StoreConfig, cache_capacity: usize) -> Self {
        let index = CachedMetadataIndex::shared(Arc::new(RocksMetadataIndex::new(db)), cache_capacity);
        Self::new(chunks.into_shared(), index, config)
    }
}
