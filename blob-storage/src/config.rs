use crate::errors::{BlobError, BlobResult};

/// GridFS-compatible default of 255 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Settings fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum payload of one chunk. Every chunk but the last is exactly this long.
    pub chunk_size: usize,
    /// Largest blob an upload may produce.
    pub max_upload_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn new(chunk_size: usize, max_upload_size: u64) -> BlobResult<Self> {
        Self { chunk_size, max_upload_size }.validate()
    }

    pub fn validate(self) -> BlobResult<Self> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(BlobError::InvalidConfig(format!(
                "chunk size must be between 1 and {} bytes, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StoreConfig::default().validate().unwrap();
        assert_eq!(config.chunk_size, 261_120);
        assert_eq!(config.max_upload_size, 104_857_600);
    }

    #[test]
    fn test_rejects_out_of_bounds_chunk_size() {
        assert!(StoreConfig::new(0, 10).is_err());
        assert!(StoreConfig::new(MAX_CHUNK_SIZE + 1, 10).is_err());
        assert!(StoreConfig::new(MAX_CHUNK_SIZE, 10).is_ok());
    }
}
