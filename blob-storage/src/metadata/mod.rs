//! Blob metadata index: the source of truth for a blob's length and type.
//!
//! A record is created exactly once, after every chunk of its blob is stored,
//! so a reader that finds metadata can rely on the chunks being complete.

use std::sync::Arc;
use async_trait::async_trait;
use crate::errors::BlobResult;
use crate::types::{BlobId, BlobMetadata};

pub mod cached;
pub mod memory;
pub mod rocks;

pub type SharedMetadataIndex = Arc<dyn MetadataIndex>;

#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Commits metadata for a blob. Fails with `AlreadyCommitted` if present.
    async fn create(&self, metadata: BlobMetadata) -> BlobResult<()>;

    /// Looks up a blob, or `NotFound`.
    async fn get(&self, blob_id: BlobId) -> BlobResult<BlobMetadata>;

    /// Removes a blob's metadata. Deleting an unknown blob succeeds.
    async fn delete(&self, blob_id: BlobId) -> BlobResult<()>;

    async fn exists(&self, blob_id: BlobId) -> BlobResult<bool> {
        match self.get(blob_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;
    use chrono::Utc;
    use crate::types::{BlobId, BlobMetadata, MediaKind};

    pub fn metadata(length: u64) -> BlobMetadata {
        BlobMetadata {
            blob_id: BlobId::generate(),
            length,
            content_type: "audio/mpeg".to_string(),
            original_name: "lecture.mp3".to_string(),
            stored_filename: "1700000000000-abc123.mp3".to_string(),
            media_kind: MediaKind::Audio,
            sha256: "00".repeat(32),
            attributes: BTreeMap::from([("speaker".to_string(), "guest".to_string())]),
            created_at: Utc::now(),
        }
    }
}
