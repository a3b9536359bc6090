use crate::chunk_storage::store::SharedChunkStore;
use crate::errors::{BlobError, BlobResult};
use crate::metadata::SharedMetadataIndex;
use crate::types::BlobId;

/// Anything that may point at a stored blob through a media URL.
pub trait MediaReference {
    fn media_url(&self) -> Option<&str>;

    /// The referenced blob, if the URL belongs to this store.
    fn blob_id(&self) -> Option<BlobId> {
        self.media_url().and_then(BlobId::from_media_url)
    }
}

impl MediaReference for str {
    fn media_url(&self) -> Option<&str> {
        Some(self)
    }
}

impl MediaReference for String {
    fn media_url(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl<T: MediaReference> MediaReference for Option<T> {
    fn media_url(&self) -> Option<&str> {
        self.as_ref().and_then(|inner| inner.media_url())
    }
}

/// Ties catalog records to the blobs they reference.
#[derive(Clone)]
pub struct LifecycleBinder {
    chunks: SharedChunkStore,
    index: SharedMetadataIndex,
}

impl LifecycleBinder {
    pub fn new(chunks: SharedChunkStore, index: SharedMetadataIndex) -> Self {
        Self { chunks, index }
    }

    /// Removes a blob. Metadata goes first so readers stop resolving the blob
    /// before its chunks disappear. Deleting an unknown blob succeeds.
    pub async fn delete_blob(&self, blob_id: BlobId) -> BlobResult<()> {
        self.index.delete(blob_id).await?;
        self.chunks.delete_all(blob_id).await?;
        tracing::info!("deleted blob {}", blob_id);
        Ok(())
    }

    /// Best-effort removal of the blob a deleted record pointed at. Failures
    /// are logged and never reach the caller. Returns the blob id that was
    /// targeted, if any.
    pub async fn delete_blob_for<R: MediaReference + ?Sized>(&self, record: &R) -> Option<BlobId> {
        let blob_id = record.blob_id()?;
        if let Err(e) = self.delete_blob(blob_id).await {
            tracing::warn!("failed to delete blob {} of a removed record: {}", blob_id, e);
        }
        Some(blob_id)
    }

    /// Rejects a media URL that names a blob of this store which does not
    /// exist. URLs pointing elsewhere are accepted as is.
    pub async fn ensure_resolvable(&self, media_url: &str) -> BlobResult<()> {
        match BlobId::from_media_url(media_url) {
            Some(blob_id) if !self.index.exists(blob_id).await? => Err(BlobError::NotFound(blob_id)),
            _ => Ok(()),
        }
    }
}
