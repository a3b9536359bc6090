use std::sync::Arc;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use crate::errors::{BlobError, BlobResult};
use crate::metadata::MetadataIndex;
use crate::types::{BlobId, BlobMetadata};

#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataIndex {
    records: Arc<DashMap<BlobId, BlobMetadata>>,
}

impl MemoryMetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MetadataIndex for MemoryMetadataIndex {
    async fn create(&self, metadata: BlobMetadata) -> BlobResult<()> {
        match self.records.entry(metadata.blob_id) {
            Entry::Occupied(_) => Err(BlobError::AlreadyCommitted(metadata.blob_id)),
            Entry::Vacant(slot) => {
                slot.insert(metadata);
                Ok(())
            }
        }
    }

    async fn get(&self, blob_id: BlobId) -> BlobResult<BlobMetadata> {
        self.records
            .get(&blob_id)
            .map(|entry| entry.value().clone())
            .ok_or(BlobError::NotFound(blob_id))
    }

    async fn delete(&self, blob_id: BlobId) -> BlobResult<()> {
        self.records.remove(&blob_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::testing::metadata;

    #[tokio::test]
    async fn test_memory_index_lifecycle() {
        let index = MemoryMetadataIndex::new();
        let meta = metadata(42);
        let blob_id = meta.blob_id;

        assert!(!index.exists(blob_id).await.unwrap());
        index.create(meta.clone()).await.unwrap();
        assert!(index.exists(blob_id).await.unwrap());
        assert_eq!(index.get(blob_id).await.unwrap(), meta);

        let err = index.create(meta).await.unwrap_err();
        assert!(matches!(err, BlobError::AlreadyCommitted(id) if id == blob_id));

        index.delete(blob_id).await.unwrap();
        index.delete(blob_id).await.unwrap();
        assert!(index.get(blob_id).await.unwrap_err().is_not_found());
        assert!(index.is_empty());
    }
}
