use clap::{Parser, ValueEnum};
use blob_store::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_UPLOAD_SIZE};

/// How blob bodies travel between the store and the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeliveryMode {
    /// Slices are written to the connection as chunks are read.
    Streaming,
    /// The requested range is collected in memory before responding.
    Buffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChunkBackend {
    Rocks,
    Local,
    Memory,
}

#[derive(Parser, Debug, Clone)]
pub struct Args {
    #[clap(long, env = "HTTP_ADDR", default_value = "127.0.0.1:3000")]
    pub(crate) http_addr: String,
    #[clap(long, env = "DATA_DIR", default_value = "data")]
    pub(crate) data_dir: String,
    #[clap(long, env = "CHUNK_BACKEND", value_enum, default_value_t = ChunkBackend::Rocks)]
    pub(crate) chunk_backend: ChunkBackend,
    #[clap(long, env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub(crate) chunk_size: usize,
    #[clap(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    pub(crate) max_upload_bytes: u64,
    #[clap(long = "delivery", env = "DELIVERY_MODE", value_enum, default_value_t = DeliveryMode::Streaming)]
    pub(crate) delivery_mode: DeliveryMode,
    #[clap(long, env = "METADATA_CACHE_CAPACITY", default_value_t = 10_000)]
    pub(crate) metadata_cache_capacity: usize,
    #[clap(long, env = "JWT_SECRET", default_value = "change_this_secret", hide_env_values = true)]
    pub(crate) jwt_secret: String,
    #[clap(long, env = "ADMIN_PASSWORD", default_value = "changeme", hide_env_values = true)]
    pub(crate) admin_password: String,
}
