use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::Display;
use std::path::Path;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{stream, Stream, StreamExt};
use rand::Rng;
use sha2::{Digest, Sha256};
use crate::chunk_storage::store::{ChunkStore, SharedChunkStore};
use crate::config::StoreConfig;
use crate::errors::{BlobError, BlobResult};
use crate::metadata::SharedMetadataIndex;
use crate::types::{BlobId, BlobMetadata, MediaKind, DEFAULT_CONTENT_TYPE};

const DEFAULT_ORIGINAL_NAME: &str = "file";
const FILENAME_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Describes an incoming file. The bytes travel separately.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub original_name: String,
    /// Declared MIME type; blank or missing falls back to `application/octet-stream`.
    pub content_type: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

/// Generates a collision-resistant storage name: unix millis, six random
/// base36 characters, then the original extension.
pub fn storage_filename(original_name: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| FILENAME_ALPHABET[rng.random_range(0..FILENAME_ALPHABET.len())] as char)
        .collect();
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    format!("{}-{}{}", now.timestamp_millis(), suffix, extension)
}

/// Cuts incoming bytes into chunk-size windows and writes each full window
/// as soon as it is complete.
struct ChunkWriter<'a> {
    store: &'a dyn ChunkStore,
    blob_id: BlobId,
    chunk_size: usize,
    pending: BytesMut,
    next_seq: u64,
    written: u64,
    hasher: Sha256,
}

impl<'a> ChunkWriter<'a> {
    fn new(store: &'a dyn ChunkStore, blob_id: BlobId) -> Self {
        let chunk_size = store.chunk_size();
        Self {
            store,
            blob_id,
            chunk_size,
            pending: BytesMut::with_capacity(chunk_size),
            next_seq: 0,
            written: 0,
            hasher: Sha256::new(),
        }
    }

    async fn push(&mut self, mut data: Bytes) -> BlobResult<()> {
        self.hasher.update(&data);
        self.written += data.len() as u64;
        while !data.is_empty() {
            if self.pending.is_empty() && data.len() >= self.chunk_size {
                let window = data.split_to(self.chunk_size);
                self.write(window).await?;
                continue;
            }
            let take = (self.chunk_size - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data.split_to(take));
            if self.pending.len() == self.chunk_size {
                let window = self.pending.split().freeze();
                self.write(window).await?;
            }
        }
        Ok(())
    }

    async fn write(&mut self, window: Bytes) -> BlobResult<()> {
        self.store.put_chunk(self.blob_id, self.next_seq, window).await?;
        self.next_seq += 1;
        Ok(())
    }

    /// Writes the short tail, if any. Returns total length and hex digest.
    async fn finish(mut self) -> BlobResult<(u64, String)> {
        if !self.pending.is_empty() {
            let tail = self.pending.split().freeze();
            self.write(tail).await?;
        }
        let digest = self.hasher.finalize();
        let hex = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
        Ok((self.written, hex))
    }
}

/// Upload pipeline: chunks the input, then commits metadata once the last
/// chunk is stored.
#[derive(Clone)]
pub struct Uploader {
    chunks: SharedChunkStore,
    index: SharedMetadataIndex,
    max_upload_size: u64,
}

impl Uploader {
    pub fn new(chunks: SharedChunkStore, index: SharedMetadataIndex, max_upload_size: u64) -> Self {
        Self { chunks, index, max_upload_size }
    }

    pub fn from_config(chunks: SharedChunkStore, index: SharedMetadataIndex, config: &StoreConfig) -> Self {
        Self::new(chunks, index, config.max_upload_size)
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    fn check_limit(&self, attempted: u64) -> BlobResult<()> {
        if attempted > self.max_upload_size {
            return Err(BlobError::SizeLimitExceeded {
                limit: self.max_upload_size,
                attempted,
            });
        }
        Ok(())
    }

    /// Stores a file the caller already holds in memory.
    pub async fn upload_bytes(&self, data: Bytes, request: UploadRequest) -> BlobResult<BlobMetadata> {
        let length = data.len() as u64;
        self.check_limit(length)?;
        let input = stream::once(async move { Ok::<_, Infallible>(data) });
        self.upload_stream(input, Some(length), request).await
    }

    /// Stores a file consumed incrementally from `input`.
    ///
    /// A declared length over the limit fails before any chunk is written. An
    /// undeclared stream is cut off as soon as it crosses the limit. On any
    /// failure metadata is never created and the partial chunks are removed on
    /// a best-effort basis.
    pub async fn upload_stream<S, E>(
        &self,
        input: S,
        declared_length: Option<u64>,
        request: UploadRequest,
    ) -> BlobResult<BlobMetadata>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        if let Some(declared) = declared_length {
            self.check_limit(declared)?;
        }
        let blob_id = BlobId::generate();
        match self.store(blob_id, input, request).await {
            Ok(metadata) => {
                tracing::info!(
                    "committed blob {} ({} bytes, {}, {})",
                    blob_id,
                    metadata.length,
                    metadata.content_type,
                    metadata.stored_filename
                );
                Ok(metadata)
            }
            Err(e) => {
                tracing::warn!("upload of blob {} failed: {}", blob_id, e);
                if let Err(cleanup) = self.chunks.delete_all(blob_id).await {
                    tracing::warn!("could not discard partial chunks of blob {}: {}", blob_id, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn store<S, E>(&self, blob_id: BlobId, input: S, request: UploadRequest) -> BlobResult<BlobMetadata>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut input = std::pin::pin!(input);
        let mut writer = ChunkWriter::new(self.chunks.as_ref(), blob_id);
        while let Some(piece) = input.next().await {
            let piece = piece.map_err(|e| BlobError::InvalidInput(e.to_string()))?;
            self.check_limit(writer.written + piece.len() as u64)?;
            writer.push(piece).await?;
        }
        let (length, sha256) = writer.finish().await?;

        let content_type = request
            .content_type
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let original_name = match request.original_name.trim() {
            "" => DEFAULT_ORIGINAL_NAME.to_string(),
            name => name.to_string(),
        };
        let created_at = Utc::now();
        let metadata = BlobMetadata {
            blob_id,
            length,
            media_kind: MediaKind::from_content_type(&content_type),
            content_type,
            stored_filename: storage_filename(&original_name, created_at),
            original_name,
            sha256,
            attributes: request.attributes,
            created_at,
        };
        self.index.create(metadata.clone()).await?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use async_trait::async_trait;
    use crate::chunk_storage::memory::MemoryChunkStore;
    use crate::metadata::memory::MemoryMetadataIndex;
    use crate::metadata::MetadataIndex;

    fn setup(chunk_size: usize, limit: u64) -> (MemoryChunkStore, MemoryMetadataIndex, Uploader) {
        let chunks = MemoryChunkStore::new(chunk_size);
        let index = MemoryMetadataIndex::new();
        let uploader = Uploader::new(Arc::new(chunks.clone()), Arc::new(index.clone()), limit);
        (chunks, index, uploader)
    }

    fn named(name: &str, content_type: Option<&str>) -> UploadRequest {
        UploadRequest {
            original_name: name.to_string(),
            content_type: content_type.map(str::to_string),
            attributes: BTreeMap::new(),
        }
    }

    fn pieces(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(parts.iter().map(|part| Ok(Bytes::from_static(part.as_bytes()))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_buffer_upload_chunks_and_commits() {
        let (chunks, index, uploader) = setup(4, 1024);
        let meta = uploader.upload_bytes(Bytes::from_static(b"0123456789"), named("talk.mp3", Some("audio/mpeg"))).await.unwrap();

        assert_eq!(meta.length, 10);
        assert_eq!(meta.media_kind, MediaKind::Audio);
        assert_eq!(meta.original_name, "talk.mp3");
        assert!(meta.stored_filename.ends_with(".mp3"));
        assert_ne!(meta.stored_filename, meta.original_name);
        assert_eq!(chunks.chunk_count(meta.blob_id), 3);
        assert_eq!(chunks.get_chunk(meta.blob_id, 2).await.unwrap(), Bytes::from_static(b"89"));
        assert_eq!(index.get(meta.blob_id).await.unwrap(), meta);
        assert_eq!(meta.sha256, "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882");
    }

    #[tokio::test]
    async fn test_stream_upload_matches_buffer_upload() {
        let (chunks, _index, uploader) = setup(4, 1024);
        let input = pieces(&["0", "12345", "", "6789"]);
        let meta = uploader.upload_stream(input, None, named("clip.mp4", Some("video/mp4"))).await.unwrap();

        assert_eq!(meta.length, 10);
        assert_eq!(meta.media_kind, MediaKind::Video);
        assert_eq!(chunks.chunk_count(meta.blob_id), 3);
        assert_eq!(chunks.get_chunk(meta.blob_id, 0).await.unwrap(), Bytes::from_static(b"0123"));
        assert_eq!(chunks.get_chunk(meta.blob_id, 1).await.unwrap(), Bytes::from_static(b"4567"));
        assert_eq!(chunks.get_chunk(meta.blob_id, 2).await.unwrap(), Bytes::from_static(b"89"));
        assert_eq!(meta.sha256, "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882");
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_empty_tail() {
        let (chunks, _index, uploader) = setup(4, 1024);
        let meta = uploader.upload_bytes(Bytes::from_static(b"01234567"), named("a", None)).await.unwrap();
        assert_eq!(chunks.chunk_count(meta.blob_id), 2);
        assert_eq!(meta.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(meta.media_kind, MediaKind::Video);

        let unnamed = uploader.upload_bytes(Bytes::from_static(b"0"), named("  ", None)).await.unwrap();
        assert_eq!(unnamed.original_name, "file");
    }

    #[tokio::test]
    async fn test_zero_byte_upload() {
        let (chunks, index, uploader) = setup(4, 1024);
        let meta = uploader.upload_bytes(Bytes::new(), named("silence.wav", Some(" "))).await.unwrap();
        assert_eq!(meta.length, 0);
        assert_eq!(meta.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(meta.original_name, "silence.wav");
        assert_eq!(chunks.chunk_count(meta.blob_id), 0);
        assert!(index.exists(meta.blob_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_size_limit_rejected_before_writing() {
        let (chunks, index, uploader) = setup(4, 8);
        let err = uploader.upload_bytes(Bytes::from_static(b"0123456789"), named("big", None)).await.unwrap_err();
        assert!(matches!(err, BlobError::SizeLimitExceeded { limit: 8, attempted: 10 }));

        let err = uploader.upload_stream(pieces(&["0"]), Some(9), named("big", None)).await.unwrap_err();
        assert!(matches!(err, BlobError::SizeLimitExceeded { limit: 8, attempted: 9 }));
        assert!(index.is_empty());
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_undeclared_stream_over_limit_is_cut_off() {
        let (chunks, index, uploader) = setup(4, 8);
        let err = uploader
            .upload_stream(pieces(&["0123", "4567", "89"]), None, named("big", None))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::SizeLimitExceeded { attempted: 10, .. }));
        assert!(index.is_empty());
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_input_error_aborts_without_metadata() {
        let (chunks, index, uploader) = setup(4, 1024);
        let input = stream::iter(vec![
            Ok(Bytes::from_static(b"01234567")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ]);
        let err = uploader.upload_stream(input, None, named("x", None)).await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidInput(_)));
        assert!(index.is_empty());
        assert!(chunks.is_empty());
    }

    /// Fails every write after the first `allowed` chunks.
    struct FlakyStore {
        inner: MemoryChunkStore,
        allowed: u64,
    }

    #[async_trait]
    impl ChunkStore for FlakyStore {
        fn chunk_size(&self) -> usize {
            self.inner.chunk_size()
        }

        async fn put_chunk(&self, blob_id: BlobId, seq: u64, payload: Bytes) -> BlobResult<()> {
            if seq >= self.allowed {
                return Err(BlobError::store("disk full"));
            }
            self.inner.put_chunk(blob_id, seq, payload).await
        }

        async fn get_chunk(&self, blob_id: BlobId, seq: u64) -> BlobResult<Bytes> {
            self.inner.get_chunk(blob_id, seq).await
        }

        async fn delete_all(&self, blob_id: BlobId) -> BlobResult<()> {
            self.inner.delete_all(blob_id).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_never_commits_metadata() {
        let inner = MemoryChunkStore::new(4);
        let index = MemoryMetadataIndex::new();
        let store = FlakyStore { inner: inner.clone(), allowed: 1 };
        let uploader = Uploader::new(Arc::new(store), Arc::new(index.clone()), 1024);

        let err = uploader.upload_bytes(Bytes::from_static(b"0123456789"), named("x", None)).await.unwrap_err();
        assert!(matches!(err, BlobError::Store(_)));
        assert!(index.is_empty());
        assert!(inner.is_empty());
    }

    #[test]
    fn test_storage_filename_shape() {
        let now = Utc::now();
        let name = storage_filename("lecture.final.m4a", now);
        let (millis, rest) = name.split_once('-').unwrap();
        assert_eq!(millis, now.timestamp_millis().to_string());
        assert_eq!(rest.len(), 6 + ".m4a".len());
        assert!(rest.ends_with(".m4a"));
        assert!(rest[..6].bytes().all(|b| FILENAME_ALPHABET.contains(&b)));
        assert!(!storage_filename("noext", now).contains('.'));
    }
}
