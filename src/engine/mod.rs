//! Storage engine adapter: wraps a single-writer/multi-reader embedded transactional B-tree
//! engine ([`redb`]) with the four named sub-databases a dataset cache needs, and the handful of
//! open modes a dataset cache requires.
//!
//! `redb` differs from the LMDB-style engine the original cache was built on in two ways that
//! don't survive the port cleanly — see `DESIGN.md` for the resolved Open Questions:
//!
//! * `redb` has no fixed mmap "map size"; it grows its single backing file on demand. A
//!   `max_map_size` knob is still accepted at the [`crate::Cache`] level for interface parity, but
//!   has no effect here.
//! * `redb` has no explicit "disable OS locking" toggle for read-only opens. The `lock` flag
//!   accepted by [`crate::Cache::open_ro`] is likewise inert.

use crate::Error;

/// `info/product/<name>`, `info/metadata/<name>`, `info/version`, `info/zdict`.
pub(crate) const INFO: redb::TableDefinition<&[u8], &[u8]> = redb::TableDefinition::new("info");

/// `ds/<uuid bytes>` → zstd-compressed dataset JSON.
pub(crate) const DS: redb::TableDefinition<&[u8], &[u8]> = redb::TableDefinition::new("ds");

/// `groups/<encoded name>` → concatenated 16-byte UUIDs.
pub(crate) const GROUPS: redb::TableDefinition<&[u8], &[u8]> = redb::TableDefinition::new("groups");

/// Reserved for arbitrary user-supplied blobs; the core only creates and exposes this table.
pub(crate) const UDATA: redb::TableDefinition<&[u8], &[u8]> = redb::TableDefinition::new("udata");

/// Per-sub-database entry counts, as reported by the storage engine.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Stat {
    pub info: u64,
    pub ds: u64,
    pub groups: u64,
    pub udata: u64,
}

// -------------------------------------------------------------------------------------------------
//
/// A thin wrapper around a `redb::Database`, opened onto exactly the four sub-databases this
/// crate uses.
pub struct Database {
    redb: redb::Database,
}

impl Database {
    /// Creates a new database at `path` (or reinitializes an empty file at `path`), and ensures
    /// all four sub-databases exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying file cannot be created or initialized.
    pub(crate) fn create(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let redb = redb::Database::create(path)?;

        // Touch every sub-database so it exists even before the first write to it.
        let txn = redb.begin_write().map_err(Box::new)?;
        txn.open_table(INFO)?;
        txn.open_table(DS)?;
        txn.open_table(GROUPS)?;
        txn.open_table(UDATA)?;
        txn.commit()?;

        Ok(Self { redb })
    }

    /// Opens an existing database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotADatasetCache`] if the file exists but has no `info` sub-database.
    /// Returns an engine error if the file does not exist or cannot be opened.
    pub(crate) fn open_existing(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let redb = redb::Database::open(path)?;

        let txn = redb.begin_read().map_err(Box::new)?;
        match txn.open_table(INFO) {
            Ok(_) => {},
            Err(redb::TableError::TableDoesNotExist(_)) => {
                return Err(Error::NotADatasetCache { path: path.to_path_buf() });
            },
            Err(other) => return Err(other.into()),
        }

        Ok(Self { redb })
    }

    /// Begins a read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to start the transaction.
    pub(crate) fn read(&self) -> Result<redb::ReadTransaction, Error> {
        Ok(self.redb.begin_read().map_err(Box::new)?)
    }

    /// Begins a writable transaction.
    ///
    /// Only a single write transaction may be open at a time; acquiring this may block behind
    /// another writer of the same file.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to start the transaction.
    pub(crate) fn write(&self) -> Result<redb::WriteTransaction, Error> {
        Ok(self.redb.begin_write().map_err(Box::new)?)
    }

    /// Returns the entry count of each sub-database.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction or any table open fails.
    pub fn stat(&self) -> Result<Stat, Error> {
        let txn = self.read()?;
        Ok(Stat {
            info: txn.open_table(INFO)?.len()?,
            ds: txn.open_table(DS)?.len()?,
            groups: txn.open_table(GROUPS)?.len()?,
            udata: txn.open_table(UDATA)?.len()?,
        })
    }
}

/// Scans a table for every key starting with `prefix`, returning `(key, value)` pairs with the
/// prefix still attached. Used for the catalog's `metadata/` and `product/` prefix scans, and for
/// [`crate::Cache::groups`].
///
/// # Errors
///
/// Returns an error if the underlying range scan fails.
pub(crate) fn prefix_scan(
    table: &impl redb::ReadableTable<&'static [u8], &'static [u8]>,
    prefix: &[u8],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
    let start = prefix.to_vec();
    let mut out = Vec::new();
    for entry in table.range(start.as_slice()..)? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        out.push((key.to_vec(), value.value().to_vec()));
    }
    Ok(out)
}

/// Removes the on-disk database file at `path`, if it exists.
///
/// This is the only supported destructive operation: the core never exposes per-record delete.
/// Returns `true` if a file was removed, `false` if there was nothing to remove.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn destroy(path: impl AsRef<std::path::Path>) -> Result<bool, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path).map_err(|e| Error::wrap_external(e))?;
    Ok(true)
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::Database;

    #[test]
    fn create_initializes_all_four_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let db = Database::create(&path).unwrap();
        let stat = db.stat().unwrap();
        assert_eq!(stat.info, 0);
        assert_eq!(stat.ds, 0);
        assert_eq!(stat.groups, 0);
        assert_eq!(stat.udata, 0);
    }

    #[test]
    fn open_existing_rejects_non_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.redb");
        // An empty redb database has no sub-databases at all.
        redb::Database::create(&path).unwrap();
        let result = Database::open_existing(&path);
        assert!(matches!(result, Err(crate::Error::NotADatasetCache { .. })));
    }

    #[test]
    fn destroy_reports_whether_a_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        assert!(!super::destroy(&path).unwrap());
        Database::create(&path).unwrap();
        assert!(super::destroy(&path).unwrap());
        assert!(!path.exists());
    }
}
