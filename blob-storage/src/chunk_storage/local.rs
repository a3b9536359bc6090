use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use crate::chunk_storage::store::{ensure_fits, ChunkStore};
use crate::errors::{BlobError, BlobResult};
use crate::types::BlobId;

const CHUNK_SIZE_MARKER: &str = ".chunk_size";

/// A `ChunkStore` that writes chunks to a local directory, one directory per
/// blob and one file per chunk.
#[derive(Clone, Debug)]
pub struct LocalChunkStore {
    directory: PathBuf,
    chunk_size: usize,
}

impl LocalChunkStore {
    /// Opens a `LocalChunkStore` rooted at `directory`.
    ///
    /// The chunk size is pinned on first open; reopening with a different size
    /// fails because existing blobs would no longer map onto their chunks.
    pub async fn open(directory: PathBuf, chunk_size: usize) -> BlobResult<Self> {
        fs::create_dir_all(&directory).await?;
        let marker = directory.join(CHUNK_SIZE_MARKER);
        match fs::read_to_string(&marker).await {
            Ok(existing) => {
                let pinned: usize = existing
                    .trim()
                    .parse()
                    .map_err(|_| BlobError::store(format!("unreadable chunk size marker in {}", directory.display())))?;
                if pinned != chunk_size {
                    return Err(BlobError::InvalidConfig(format!(
                        "{} was created with chunk size {}, not {}",
                        directory.display(),
                        pinned,
                        chunk_size
                    )));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::write(&marker, chunk_size.to_string()).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self { directory, chunk_size })
    }

    fn blob_dir(&self, blob_id: BlobId) -> PathBuf {
        self.directory.join(blob_id.to_string())
    }

    fn chunk_path(&self, blob_id: BlobId, seq: u64) -> PathBuf {
        self.blob_dir(blob_id).join(format!("{:020}", seq))
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn put_chunk(&self, blob_id: BlobId, seq: u64, payload: Bytes) -> BlobResult<()> {
        ensure_fits(self.chunk_size, blob_id, seq, &payload)?;
        fs::create_dir_all(self.blob_dir(blob_id)).await?;
        let mut file = fs::File::create(self.chunk_path(blob_id, seq)).await?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn get_chunk(&self, blob_id: BlobId, seq: u64) -> BlobResult<Bytes> {
        match fs::read(self.chunk_path(blob_id, seq)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::ChunkNotFound { blob_id, seq }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self, blob_id: BlobId) -> BlobResult<()> {
        match fs::remove_dir_all(self.blob_dir(blob_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_chunk_store() {
        // Create a temporary directory.
        let temp_dir = tempdir().unwrap();
        let store = LocalChunkStore::open(temp_dir.path().to_path_buf(), 16).await.unwrap();
        let blob_id = BlobId::generate();

        store.put_chunk(blob_id, 0, Bytes::from_static(b"this is a test c")).await.unwrap();
        store.put_chunk(blob_id, 1, Bytes::from_static(b"hunk")).await.unwrap();

        let retrieved = store.get_chunk(blob_id, 1).await.unwrap();
        assert_eq!(retrieved, Bytes::from_static(b"hunk"));
        assert!(store.get_chunk(blob_id, 2).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_local_chunk_overwrite() {
        let temp_dir = tempdir().unwrap();
        let store = LocalChunkStore::open(temp_dir.path().to_path_buf(), 16).await.unwrap();
        let blob_id = BlobId::generate();

        store.put_chunk(blob_id, 0, Bytes::from_static(b"data one")).await.unwrap();
        store.put_chunk(blob_id, 0, Bytes::from_static(b"data two")).await.unwrap();

        assert_eq!(store.get_chunk(blob_id, 0).await.unwrap(), Bytes::from_static(b"data two"));
    }

    #[tokio::test]
    async fn test_local_delete_all_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let store = LocalChunkStore::open(temp_dir.path().to_path_buf(), 16).await.unwrap();
        let blob_id = BlobId::generate();

        store.put_chunk(blob_id, 0, Bytes::from_static(b"abc")).await.unwrap();
        store.delete_all(blob_id).await.unwrap();
        store.delete_all(blob_id).await.unwrap();
        assert!(store.get_chunk(blob_id, 0).await.unwrap_err().is_not_found());
        assert!(!temp_dir.path().join(blob_id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_local_chunk_size_is_pinned() {
        let temp_dir = tempdir().unwrap();
        LocalChunkStore::open(temp_dir.path().to_path_buf(), 16).await.unwrap();
        assert!(LocalChunkStore::open(temp_dir.path().to_path_buf(), 16).await.is_ok());
        let err = LocalChunkStore::open(temp_dir.path().to_path_buf(), 32).await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidConfig(_)));
    }
}
