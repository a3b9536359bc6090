use std::path::Path;
use std::sync::Arc;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, DB};
use crate::errors::{BlobError, BlobResult};

/// Store-wide settings such as the pinned chunk size.
pub const STORE_CF: &str = "store";
/// Chunk payloads keyed by blob id + big-endian sequence number.
pub const CHUNKS_CF: &str = "chunks";
/// JSON-encoded `BlobMetadata` keyed by blob id.
pub const METADATA_CF: &str = "metadata";

/// Opens (or creates) the RocksDB database backing the blob store.
///
/// The handle is meant to be opened once per process and shared. Callers that
/// keep their own records in the same database pass extra column family names.
///
/// # Arguments
/// * `db_path` - The path where the RocksDB database will be stored
/// * `extra_column_families` - Column families owned by the caller
pub fn open_db<P: AsRef<Path>>(db_path: P, extra_column_families: &[&str]) -> BlobResult<Arc<DB>> {
    let mut db_opts = Options::default();
    db_opts.create_missing_column_families(true);
    db_opts.create_if_missing(true);

    let descriptors = [STORE_CF, CHUNKS_CF, METADATA_CF]
        .iter()
        .chain(extra_column_families.iter())
        .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
        .collect::<Vec<_>>();

    let db = DB::open_cf_descriptors(&db_opts, db_path, descriptors)?;
    Ok(Arc::new(db))
}

/// Returns a handle to the named column family.
pub fn column_family<'a>(db: &'a DB, name: &str) -> BlobResult<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| BlobError::store(format!("column family {} is missing", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_db_creates_column_families() {
        let temp_dir = tempdir().unwrap();
        let db = open_db(temp_dir.path(), &["lectures"]).unwrap();
        for name in [STORE_CF, CHUNKS_CF, METADATA_CF, "lectures"] {
            assert!(column_family(&db, name).is_ok(), "missing {}", name);
        }
        assert!(column_family(&db, "nope").is_err());
    }
}
