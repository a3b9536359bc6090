use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use crate::chunk_storage::store::{empty_stream, get_range, ByteStream, SharedChunkStore};
use crate::errors::BlobResult;
use crate::metadata::SharedMetadataIndex;
use crate::range::ByteRange;
use crate::types::{BlobId, BlobMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeStatus {
    Full,
    Partial,
}

impl ServeStatus {
    pub fn code(&self) -> u16 {
        match self {
            ServeStatus::Full => 200,
            ServeStatus::Partial => 206,
        }
    }
}

/// A blob answer: status, header values and a lazy body.
///
/// The body is read from chunk storage only as it is polled. Errors after the
/// first slice can no longer change the status; callers streaming to a client
/// terminate the connection instead.
pub struct ServedBlob {
    pub status: ServeStatus,
    pub metadata: BlobMetadata,
    /// `None` only for an empty blob served in full.
    pub range: Option<ByteRange>,
    pub body: ByteStream,
}

impl ServedBlob {
    pub fn content_length(&self) -> u64 {
        self.range.map(|range| range.len()).unwrap_or(0)
    }

    pub fn content_range(&self) -> Option<String> {
        match (self.status, self.range) {
            (ServeStatus::Partial, Some(range)) => Some(range.content_range(self.metadata.length)),
            _ => None,
        }
    }

    pub fn content_disposition(&self) -> String {
        content_disposition(&self.metadata.original_name)
    }

    pub fn etag(&self) -> Option<String> {
        (!self.metadata.sha256.is_empty()).then(|| format!("\"{}\"", self.metadata.sha256))
    }

    /// Response headers in the order they should be written.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", self.metadata.content_type.clone()),
            ("Content-Length", self.content_length().to_string()),
            ("Content-Disposition", self.content_disposition()),
            ("Accept-Ranges", "bytes".to_string()),
        ];
        if let Some(content_range) = self.content_range() {
            headers.push(("Content-Range", content_range));
        }
        if let Some(etag) = self.etag() {
            headers.push(("ETag", etag));
        }
        headers
    }

    /// Collects the whole body into one buffer, for transports that cannot
    /// emit a response incrementally. Memory use is the size of the range.
    pub async fn into_buffered(self) -> BlobResult<Bytes> {
        let mut buffer = BytesMut::with_capacity(self.content_length() as usize);
        let mut body = self.body;
        while let Some(slice) = body.try_next().await? {
            buffer.extend_from_slice(&slice);
        }
        Ok(buffer.freeze())
    }
}

/// `inline` disposition carrying the original name. Quotes, backslashes and
/// control characters are replaced; non-ASCII names also get an RFC 5987
/// `filename*` parameter.
pub fn content_disposition(original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    if original_name.is_ascii() {
        return format!("inline; filename=\"{}\"", fallback);
    }
    let encoded: String = original_name
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'~' => (b as char).to_string(),
            b => format!("%{:02X}", b),
        })
        .collect();
    format!("inline; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

/// Range-read pipeline: resolves metadata, validates the requested range and
/// hands back a lazy body over exactly the covering chunks.
#[derive(Clone)]
pub struct RangeReader {
    chunks: SharedChunkStore,
    index: SharedMetadataIndex,
}

impl RangeReader {
    pub fn new(chunks: SharedChunkStore, index: SharedMetadataIndex) -> Self {
        Self { chunks, index }
    }

    /// Serves a blob in full (200) or the single range named by `range_header` (206).
    pub async fn serve(&self, blob_id: BlobId, range_header: Option<&str>) -> BlobResult<ServedBlob> {
        let metadata = self.index.get(blob_id).await?;
        let (status, range) = match range_header {
            None => (ServeStatus::Full, ByteRange::full(metadata.length)),
            Some(header) => (ServeStatus::Partial, Some(ByteRange::parse(header, metadata.length)?)),
        };
        tracing::debug!("serving blob {} {:?} range {:?} of {}", blob_id, status, range, metadata.length);
        let body = match range {
            Some(range) => get_range(self.chunks.clone(), blob_id, range.start, range.end),
            None => empty_stream(),
        };
        Ok(ServedBlob { status, metadata, range, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::chunk_storage::memory::MemoryChunkStore;
    use crate::errors::BlobError;
    use crate::lifecycle::LifecycleBinder;
    use crate::metadata::memory::MemoryMetadataIndex;
    use crate::types::MediaKind;
    use crate::upload::{UploadRequest, Uploader};

    struct Fixture {
        chunks: MemoryChunkStore,
        uploader: Uploader,
        reader: RangeReader,
        binder: LifecycleBinder,
    }

    fn fixture(chunk_size: usize) -> Fixture {
        let chunks = MemoryChunkStore::new(chunk_size);
        let shared_chunks: SharedChunkStore = Arc::new(chunks.clone());
        let index: SharedMetadataIndex = Arc::new(MemoryMetadataIndex::new());
        Fixture {
            chunks,
            uploader: Uploader::new(shared_chunks.clone(), index.clone(), 64 * 1024 * 1024),
            reader: RangeReader::new(shared_chunks.clone(), index.clone()),
            binder: LifecycleBinder::new(shared_chunks, index),
        }
    }

    fn sample(len: usize) -> Bytes {
        (0..len).map(|i| (i * 31 % 256) as u8).collect::<Vec<u8>>().into()
    }

    fn request(name: &str, content_type: &str) -> UploadRequest {
        UploadRequest {
            original_name: name.to_string(),
            content_type: Some(content_type.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_read_round_trips() {
        let fx = fixture(1000);
        for len in [1usize, 999, 1000, 1001, 4500] {
            let data = sample(len);
            let meta = fx.uploader.upload_bytes(data.clone(), request("a.mp4", "video/mp4")).await.unwrap();
            let served = fx.reader.serve(meta.blob_id, None).await.unwrap();
            assert_eq!(served.status, ServeStatus::Full);
            assert_eq!(served.content_length(), len as u64);
            assert!(served.content_range().is_none());
            assert_eq!(served.into_buffered().await.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_ranged_reads_match_original_bytes() {
        let fx = fixture(100);
        let data = sample(1050);
        let meta = fx.uploader.upload_bytes(data.clone(), request("a.mp4", "video/mp4")).await.unwrap();
        let cases = [(0u64, 0u64), (10, 60), (99, 100), (100, 199), (150, 1049), (1000, 1049), (0, 1049)];
        for (start, end) in cases {
            let header = format!("bytes={}-{}", start, end);
            let served = fx.reader.serve(meta.blob_id, Some(&header)).await.unwrap();
            assert_eq!(served.status, ServeStatus::Partial);
            assert_eq!(served.content_length(), end - start + 1);
            assert_eq!(served.content_range().unwrap(), format!("bytes {}-{}/1050", start, end));
            let body = served.into_buffered().await.unwrap();
            assert_eq!(body, data.slice(start as usize..=end as usize), "{}", header);
        }
    }

    #[tokio::test]
    async fn test_two_mebibyte_audio_scenario() {
        let fx = fixture(256 * 1024);
        let data = sample(2 * 1024 * 1024);
        let meta = fx.uploader.upload_bytes(data.clone(), request("talk.mp3", "audio/mpeg")).await.unwrap();
        assert_eq!(meta.media_kind, MediaKind::Audio);
        assert_eq!(fx.chunks.chunk_count(meta.blob_id) as u64, meta.chunk_count(256 * 1024));
        assert_eq!(meta.chunk_count(256 * 1024), 8);

        let served = fx.reader.serve(meta.blob_id, Some("bytes=300000-500000")).await.unwrap();
        assert_eq!(served.content_length(), 200_001);
        let body = served.into_buffered().await.unwrap();
        assert_eq!(body.len(), 200_001);
        assert_eq!(body, data.slice(300_000..=500_000));
    }

    #[tokio::test]
    async fn test_empty_blob_serves_empty_body() {
        let fx = fixture(16);
        let meta = fx.uploader.upload_bytes(Bytes::new(), request("empty.wav", "audio/wav")).await.unwrap();
        assert_eq!(meta.length, 0);
        assert_eq!(fx.chunks.chunk_count(meta.blob_id), 0);

        let served = fx.reader.serve(meta.blob_id, None).await.unwrap();
        assert_eq!(served.status.code(), 200);
        assert_eq!(served.content_length(), 0);
        assert!(served.headers().contains(&("Content-Length", "0".to_string())));
        assert!(served.into_buffered().await.unwrap().is_empty());

        let err = fx.reader.serve(meta.blob_id, Some("bytes=0-")).await.err().unwrap();
        assert!(matches!(err, BlobError::InvalidRange { length: 0, .. }));
    }

    #[tokio::test]
    async fn test_deleted_blob_is_not_found() {
        let fx = fixture(16);
        let meta = fx.uploader.upload_bytes(sample(100), request("a.mp4", "video/mp4")).await.unwrap();
        fx.binder.delete_blob(meta.blob_id).await.unwrap();

        assert!(fx.reader.serve(meta.blob_id, None).await.err().unwrap().is_not_found());
        assert!(fx.reader.serve(meta.blob_id, Some("bytes=0-10")).await.err().unwrap().is_not_found());
        assert_eq!(fx.chunks.chunk_count(meta.blob_id), 0);
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_is_rejected() {
        let fx = fixture(16);
        let meta = fx.uploader.upload_bytes(sample(100), request("a.mp4", "video/mp4")).await.unwrap();
        for header in ["bytes=100-", "bytes=50-10", "bytes=0-5,10-20", "lines=1-2"] {
            let err = fx.reader.serve(meta.blob_id, Some(header)).await.err().unwrap();
            assert!(matches!(err, BlobError::InvalidRange { length: 100, .. }), "{}", header);
        }
    }

    #[tokio::test]
    async fn test_headers_describe_blob() {
        let fx = fixture(16);
        let meta = fx.uploader.upload_bytes(sample(40), request("My \"talk\".mp3", "audio/mpeg")).await.unwrap();
        let served = fx.reader.serve(meta.blob_id, Some("bytes=4-")).await.unwrap();
        let headers = served.headers();
        let get = |name: &str| headers.iter().find(|(n, _)| *n == name).map(|(_, v)| v.clone());
        assert_eq!(get("Content-Type").unwrap(), "audio/mpeg");
        assert_eq!(get("Content-Length").unwrap(), "36");
        assert_eq!(get("Content-Range").unwrap(), "bytes 4-39/40");
        assert_eq!(get("Accept-Ranges").unwrap(), "bytes");
        assert_eq!(get("Content-Disposition").unwrap(), "inline; filename=\"My _talk_.mp3\"");
        assert_eq!(get("ETag").unwrap(), format!("\"{}\"", meta.sha256));
    }

    #[test]
    fn test_content_disposition_encodes_non_ascii() {
        assert_eq!(content_disposition("bayaan.mp3"), "inline; filename=\"bayaan.mp3\"");
        assert_eq!(
            content_disposition("é.mp3"),
            "inline; filename=\"_.mp3\"; filename*=UTF-8''%C3%A9.mp3"
        );
    }
}
