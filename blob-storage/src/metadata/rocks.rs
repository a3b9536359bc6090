use std::sync::Arc;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, DB};
use crate::errors::{BlobError, BlobResult};
use crate::metadata::MetadataIndex;
use crate::storage::{column_family, METADATA_CF};
use crate::types::{BlobId, BlobMetadata};

/// Metadata index stored as JSON in the `metadata` column family.
#[derive(Debug, Clone)]
pub struct RocksMetadataIndex {
    db: Arc<DB>,
}

impl RocksMetadataIndex {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    /// Returns a handle to the "metadata" column family
    fn records(&self) -> BlobResult<&ColumnFamily> {
        column_family(&self.db, METADATA_CF)
    }
}

#[async_trait]
impl MetadataIndex for RocksMetadataIndex {
    async fn create(&self, metadata: BlobMetadata) -> BlobResult<()> {
        let cf = self.records()?;
        let key = metadata.blob_id.as_bytes();
        if self.db.get_pinned_cf(cf, key)?.is_some() {
            return Err(BlobError::AlreadyCommitted(metadata.blob_id));
        }
        self.db.put_cf(cf, key, serde_json::to_vec(&metadata)?)?;
        // Chunks went through the same WAL, so syncing here makes them durable too.
        self.db.flush_wal(true)?;
        Ok(())
    }

    async fn get(&self, blob_id: BlobId) -> BlobResult<BlobMetadata> {
        let raw = self
            .db
            .get_pinned_cf(self.records()?, blob_id.as_bytes())?
            .ok_or(BlobError::NotFound(blob_id))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn delete(&self, blob_id: BlobId) -> BlobResult<()> {
        self.db.delete_cf(self.records()?, blob_id.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::testing::metadata;
    use crate::storage::open_db;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocks_index_lifecycle() {
        let temp_dir = tempdir().unwrap();
        let index = RocksMetadataIndex::new(open_db(temp_dir.path(), &[]).unwrap());
        let meta = metadata(1 << 20);
        let blob_id = meta.blob_id;

        index.create(meta.clone()).await.unwrap();
        assert_eq!(index.get(blob_id).await.unwrap(), meta);
        assert!(matches!(index.create(meta).await, Err(BlobError::AlreadyCommitted(_))));

        index.delete(blob_id).await.unwrap();
        index.delete(blob_id).await.unwrap();
        assert!(!index.exists(blob_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rocks_index_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let meta = metadata(7);
        {
            let index = RocksMetadataIndex::new(open_db(temp_dir.path(), &[]).unwrap());
            index.create(meta.clone()).await.unwrap();
        }
        let index = RocksMetadataIndex::new(open_db(temp_dir.path(), &[]).unwrap());
        assert_eq!(index.get(meta.blob_id).await.unwrap(), meta);
    }
}
