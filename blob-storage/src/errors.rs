use std::error::Error as StdError;
use thiserror::Error;
use crate::types::BlobId;

pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob {0} not found")]
    NotFound(BlobId),

    #[error("chunk {seq} of blob {blob_id} not found")]
    ChunkNotFound { blob_id: BlobId, seq: u64 },

    #[error("storage backend failure: {0}")]
    Store(#[source] Box<dyn StdError + Send + Sync>),

    #[error("failed to encode or decode a stored record")]
    Codec(#[from] serde_json::Error),

    #[error("upload of {attempted} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { limit: u64, attempted: u64 },

    /// Carries the blob length so a 416 answer can report `bytes */<length>`.
    #[error("unsatisfiable range: {reason}")]
    InvalidRange { reason: String, length: u64 },

    #[error("invalid upload input: {0}")]
    InvalidInput(String),

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("metadata for blob {0} is already committed")]
    AlreadyCommitted(BlobId),

    #[error("chunk {seq} of blob {blob_id} is shorter than its layout requires")]
    CorruptChunk { blob_id: BlobId, seq: u64 },
}

impl BlobError {
    pub fn store(message: impl Into<String>) -> Self {
        BlobError::Store(message.into().into())
    }

    pub(crate) fn invalid_range(reason: impl Into<String>, length: u64) -> Self {
        BlobError::InvalidRange { reason: reason.into(), length }
    }

    /// True for the not-found family, which readers surface as a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_) | BlobError::ChunkNotFound { .. })
    }
}

impl From<rocksdb::Error> for BlobError {
    fn from(e: rocksdb::Error) -> Self {
        BlobError::Store(Box::new(e))
    }
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        BlobError::Store(Box::new(e))
    }
}
