mod auth;
mod catalog;
mod errors;
mod params;
mod services;

use std::io;
use std::path::Path;
use std::sync::Arc;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use blob_store::chunk_storage::local::LocalChunkStore;
use blob_store::chunk_storage::memory::MemoryChunkStore;
use blob_store::chunk_storage::rocks::RocksChunkStore;
use blob_store::chunk_storage::store::ChunkStores;
use blob_store::config::StoreConfig;
use blob_store::metadata::memory::MemoryMetadataIndex;
use blob_store::storage::open_db;
use blob_store::{BlobResult, BlobServices, ChunkStore};
use crate::auth::JwtAuthorizer;
use crate::catalog::{MemoryLectureCatalog, RocksLectureCatalog, SharedCatalog, LECTURES_CF};
use crate::params::{Args, ChunkBackend};
use crate::services::AppState;

/// Opens the persistent stores under the data directory. The lecture catalog
/// shares the RocksDB handle with blob metadata.
async fn open_persistent(args: &Args, config: &StoreConfig) -> BlobResult<(BlobServices, SharedCatalog)> {
    let db = open_db(Path::new(&args.data_dir).join("db"), &[LECTURES_CF])?;
    let chunks = match args.chunk_backend {
        ChunkBackend::Local => {
            let directory = Path::new(&args.data_dir).join("chunks");
            ChunkStores::Local(LocalChunkStore::open(directory, config.chunk_size).await?)
        }
        _ => ChunkStores::Rocks(RocksChunkStore::open(db.clone(), config.chunk_size)?),
    };
    tracing::info!("{:?} chunk store ready with {} byte chunks", args.chunk_backend, chunks.as_trait().chunk_size());
    let blobs = BlobServices::with_rocks_index(chunks, db.clone(), config, args.metadata_cache_capacity);
    Ok((blobs, Arc::new(RocksLectureCatalog::new(db))))
}

/// Everything in process memory; nothing survives a restart.
fn open_ephemeral(config: &StoreConfig) -> (BlobServices, SharedCatalog) {
    tracing::warn!("using in-memory storage, data is lost on exit");
    let chunks = ChunkStores::Memory(MemoryChunkStore::new(config.chunk_size));
    let blobs = BlobServices::new(chunks.into_shared(), Arc::new(MemoryMetadataIndex::new()), config);
    (blobs, Arc::new(MemoryLectureCatalog::new()))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = StoreConfig::new(args.chunk_size, args.max_upload_bytes).map_err(io::Error::other)?;
    let (blobs, catalog) = match args.chunk_backend {
        ChunkBackend::Memory => open_ephemeral(&config),
        _ => open_persistent(&args, &config).await.map_err(io::Error::other)?,
    };
    tracing::info!("{:?} delivery, uploads limited to {} bytes", args.delivery_mode, config.max_upload_size);

    let state = web::Data::new(AppState {
        blobs,
        catalog,
        authorizer: Arc::new(JwtAuthorizer::new(&args.jwt_secret)),
        admin_password: args.admin_password.clone(),
        delivery_mode: args.delivery_mode,
    });

    tracing::info!("listening on {}", args.http_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Expose-Headers", "Content-Range, Content-Length, Accept-Ranges")),
            )
            .configure(services::configure)
    })
    .bind(args.http_addr.clone())?
    .run()
    .await
}
