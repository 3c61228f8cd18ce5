//! The public entry point: [`Cache`], its three open modes, and the dataset and group store
//! operations built on top of the storage engine, compression pipeline, key codec, and catalog.

use crate::catalog::{Catalog, MetadataType, Product};
use crate::compression::{Compressor, Decompressor, Dictionary, Level};
use crate::engine::{self, Database, DS, GROUPS, INFO};
use crate::key::Key;
use crate::model::{Dataset, NewDataset, RawDatasetDoc};
use crate::Error;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub(crate) const FORMAT_VERSION: &[u8; 4] = b"0001";
const VERSION_KEY: &[u8] = b"version";
const ZDICT_KEY: &[u8] = b"zdict";

/// Default batch size for [`Cache::tee`], matching the original writer's default.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

// -------------------------------------------------------------------------------------------------
//
/// Options accepted by [`Cache::create`], [`Cache::open_rw`], and [`Cache::open_ro`].
///
/// This groups the knobs the original interface passed as keyword arguments with defaults
/// (`complevel=6`, `zdict=None`, `max_db_sz=None`, `products=None`, `lock=False`).
#[derive(Clone, Debug, Default)]
pub struct CacheOptions {
    /// Compression level for new writes. Ignored when opening read-only. Defaults to
    /// [`Level::BALANCED`].
    pub level: Option<Level>,

    /// A trained dictionary. At [`Cache::create`] time this is persisted as `info/zdict` and used
    /// from then on; it has no effect at [`Cache::open_rw`] or [`Cache::open_ro`], since the
    /// dictionary actually used is always whichever one (if any) is already on disk.
    pub dictionary: Option<Dictionary>,

    /// Accepted for interface parity with the original map-size knob. `redb` grows its backing
    /// file on demand and never consults this value.
    pub max_map_size: Option<u64>,

    /// A catalog to use instead of the one stored on disk, for the lifetime of this handle. This
    /// is the escape hatch for consumers reinterpreting records against their own schema registry.
    pub products: Option<Catalog>,

    /// Accepted for interface parity with the original's explicit-OS-lock flag on readonly opens.
    /// `redb` has no equivalent toggle; this value has no effect.
    pub lock: bool,
}

// -------------------------------------------------------------------------------------------------
//
enum Mode {
    ReadWrite { compressor: Compressor, catalog: Mutex<Catalog> },
    ReadOnly { catalog: Catalog },
}

/// A handle onto an embedded dataset cache.
///
/// Obtained via [`Cache::create`], [`Cache::open_rw`], or [`Cache::open_ro`]. Dropping a writable
/// handle flushes the catalog one final time; any failure to do so is logged and swallowed, so a
/// caller's shutdown path is never interrupted by a stale catalog write.
pub struct Cache {
    database: Database,
    decompressor: Decompressor,
    mode: Mode,
    path: PathBuf,
}

impl Cache {
    /// Creates a new dataset cache at `path`, initializing all four sub-databases and persisting
    /// the format version (and, if supplied, a trained dictionary) before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying file cannot be created, or if the initial header write
    /// fails.
    pub fn create(path: impl AsRef<Path>, options: CacheOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let database = Database::create(&path)?;

        let txn = database.write()?;
        {
            let mut table = txn.open_table(INFO)?;
            table.insert(VERSION_KEY, FORMAT_VERSION.as_slice())?;
            if let Some(dictionary) = &options.dictionary {
                table.insert(ZDICT_KEY, dictionary.as_bytes())?;
            }
        }
        txn.commit()?;

        let level = options.level.unwrap_or_default();
        let compressor = Compressor::new(level, options.dictionary.clone());
        let decompressor = Decompressor::new(options.dictionary);
        let catalog = options.products.unwrap_or_default();

        Ok(Self {
            database,
            decompressor,
            mode: Mode::ReadWrite { compressor, catalog: Mutex::new(catalog) },
            path,
        })
    }

    /// Opens an existing dataset cache for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, is not a dataset cache, carries an
    /// unsupported format version, or if loading the on-disk catalog fails.
    pub fn open_rw(path: impl AsRef<Path>, options: CacheOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let database = Database::open_existing(&path)?;
        let (decompressor, dictionary) = read_header(&database)?;

        let level = options.level.unwrap_or_default();
        let compressor = Compressor::new(level, dictionary);
        let catalog = match options.products {
            Some(catalog) => catalog,
            None => Catalog::load(&database, &decompressor)?,
        };

        Ok(Self {
            database,
            decompressor,
            mode: Mode::ReadWrite { compressor, catalog: Mutex::new(catalog) },
            path,
        })
    }

    /// Opens an existing dataset cache for reading only. No [`Compressor`] is constructed; any
    /// write attempted through the returned handle fails with [`Error::ReadOnly`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, is not a dataset cache, carries an
    /// unsupported format version, or if loading the on-disk catalog fails.
    pub fn open_ro(path: impl AsRef<Path>, options: CacheOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let database = Database::open_existing(&path)?;
        let (decompressor, _dictionary) = read_header(&database)?;

        let catalog = match options.products {
            Some(catalog) => catalog,
            None => Catalog::load(&database, &decompressor)?,
        };

        Ok(Self { database, decompressor, mode: Mode::ReadOnly { catalog }, path })
    }

    /// Returns per-sub-database entry counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read transaction fails.
    pub fn stat(&self) -> Result<engine::Stat, Error> {
        self.database.stat()
    }

    /// Returns the number of datasets stored in `ds`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read transaction fails.
    pub fn count(&self) -> Result<u64, Error> {
        let txn = self.database.read()?;
        Ok(txn.open_table(DS)?.len()?)
    }

    /// Persists the in-memory catalog, if it has changed since the last sync. A no-op on a
    /// read-only handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write transaction fails.
    pub fn sync(&self) -> Result<(), Error> {
        match &self.mode {
            Mode::ReadWrite { compressor, catalog } => {
                let mut guard = catalog.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                guard.persist(&self.database, compressor, false)
            },
            Mode::ReadOnly { .. } => Ok(()),
        }
    }

    // --- dataset reads -----------------------------------------------------------------------

    /// Looks up a single dataset by UUID. Returns `Ok(None)` if no dataset with that id exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProduct`] if the stored record's product does not resolve in the
    /// active catalog, or an error if decompression, parsing, or the underlying read fails.
    pub fn get(&self, id: Uuid) -> Result<Option<Dataset>, Error> {
        let Some(raw) = self.fetch_raw(id.as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(self.materialize(id, raw)?))
    }

    /// Iterates every dataset in the cache, in the engine's natural key order (UUID lexicographic
    /// order).
    ///
    /// The ordered id list is resolved under one short read transaction; each dataset is then
    /// fetched through its own short read transaction as the iterator advances, so no transaction
    /// is held for the lifetime of the iterator. See the module-level design note in
    /// `crate::engine` and `DESIGN.md` for why.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving the id list fails.
    pub fn get_all(&self) -> Result<DatasetIter<'_>, Error> {
        let txn = self.database.read()?;
        let table = txn.open_table(DS)?;
        let mut ids = Vec::with_capacity(usize::try_from(table.len()?).unwrap_or(0));
        for entry in table.range(..)? {
            let (key, _) = entry?;
            ids.push(to_uuid_bytes(key.value())?);
        }
        Ok(DatasetIter { cache: self, ids: ids.into_iter() })
    }

    // --- dataset writes -----------------------------------------------------------------------

    /// Stores every dataset from `datasets` under one write transaction, auto-registering each
    /// dataset's product (and metadata type) the first time its name is seen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnly`] if called through a read-only handle, or an error if
    /// serialization, compression, or the underlying write transaction fails.
    pub fn bulk_save(&self, datasets: impl IntoIterator<Item = NewDataset>) -> Result<(), Error> {
        let compressor = self.compressor()?;
        let txn = self.database.write()?;
        {
            let mut table = txn.open_table(DS)?;
            for dataset in datasets {
                self.register_product(&dataset.product, &dataset.metadata_type)?;
                insert_dataset(&mut table, &dataset, compressor)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Stores every already-assembled raw document from `docs` under one write transaction. The
    /// key for each document is extracted from `metadata.id`; unlike [`Cache::bulk_save`], no
    /// product auto-registration happens on this path (matching the original writer, which never
    /// touches the in-memory catalog for raw-document ingest).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnly`] if called through a read-only handle, [`Error::MissingDatasetId`]
    /// if a document lacks a valid `metadata.id`, or an error if compression or the underlying
    /// write transaction fails.
    pub fn bulk_save_raw(&self, docs: impl IntoIterator<Item = RawDatasetDoc>) -> Result<(), Error> {
        let compressor = self.compressor()?;
        let txn = self.database.write()?;
        {
            let mut table = txn.open_table(DS)?;
            for doc in docs {
                let id = doc.id()?;
                let json = serde_json::to_vec(&doc)?;
                let compressed = compressor.compress(&json)?;
                table.insert(id.as_bytes().as_slice(), compressed.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// A lazy pass-through writer: persists datasets from `datasets` in batches of `batch_size`
    /// (defaulting to [`DEFAULT_BATCH_SIZE`] when `None`), yielding each dataset back to the
    /// caller only after the batch containing it has committed. A final [`Cache::sync`] runs once
    /// the input is exhausted.
    ///
    /// Each batch is a single write transaction: write-before-yield means a downstream consumer
    /// never sees a dataset the database did not actually persist, bounding worst-case loss on
    /// abrupt termination to one in-flight batch.
    pub fn tee<I>(&self, datasets: I, batch_size: Option<usize>) -> Tee<'_, I::IntoIter>
    where
        I: IntoIterator<Item = NewDataset>,
    {
        Tee {
            cache: self,
            input: datasets.into_iter(),
            batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    // --- groups -------------------------------------------------------------------------------

    /// Stores `uuids`, in order, as the membership of the group identified by `name`, overwriting
    /// any previous membership under the same key. `name` accepts anything the key codec covers
    /// (a string, raw bytes, a UUID, an integer, or a tuple of these), not just strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnly`] if called through a read-only handle, or an error if the
    /// underlying write transaction fails.
    pub fn put_group<'k>(&self, name: impl Into<Key<'k>>, uuids: &[Uuid]) -> Result<(), Error> {
        self.require_writable()?;
        let key = name.into().encode();
        let mut data = Vec::with_capacity(uuids.len() * 16);
        for uuid in uuids {
            data.extend_from_slice(uuid.as_bytes());
        }

        let txn = self.database.write()?;
        {
            let mut table = txn.open_table(GROUPS)?;
            table.insert(key.as_slice(), data.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Returns the ordered UUID membership of the group identified by `name`, or `Ok(None)` if no
    /// such group exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptGroup`] if the stored value's length is not a multiple of 16, or an
    /// error if the underlying read transaction fails.
    pub fn get_group<'k>(&self, name: impl Into<Key<'k>>) -> Result<Option<Vec<Uuid>>, Error> {
        let key = name.into().encode();
        let Some(bytes) = self.get_group_raw(&key)? else {
            return Ok(None);
        };
        if bytes.len() % 16 != 0 {
            return Err(Error::CorruptGroup { name: label(&key), len: bytes.len() });
        }
        Ok(Some(bytes.chunks_exact(16).map(bytes_to_uuid).collect()))
    }

    /// Lists `(name, member count)` pairs for every group whose encoded name starts with
    /// `prefix` (every group, if `prefix` is `None`).
    ///
    /// A group whose stored length is not a multiple of 16 is still listed (with its count
    /// truncated towards zero) and logged, rather than aborting the whole listing; unlike
    /// [`Cache::stream_group`], a prefix listing never has to materialize the group's datasets.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read transaction fails.
    pub fn groups(&self, prefix: Option<Key<'_>>) -> Result<Vec<(String, u64)>, Error> {
        let prefix_bytes = prefix.map_or_else(Vec::new, |p| p.encode());

        let txn = self.database.read()?;
        let table = txn.open_table(GROUPS)?;
        let mut out = Vec::new();
        for (key, value) in engine::prefix_scan(&table, &prefix_bytes)? {
            if value.len() % 16 != 0 {
                tracing::warn!(
                    name = %label(&key),
                    len = value.len(),
                    "corrupt group length encountered while listing groups",
                );
            }
            out.push((label(&key), (value.len() / 16) as u64));
        }
        Ok(out)
    }

    /// Iterates the datasets referenced by the group identified by `name`, in stored order, under
    /// independent short read transactions (see [`Cache::get_all`]'s design note — the same
    /// reasoning applies here).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchGroup`] if no group named `name` exists, or [`Error::CorruptGroup`]
    /// if the stored membership length is not a multiple of 16. Once iterating, a missing
    /// referenced dataset terminates the iterator with [`Error::MissingDataset`]; items already
    /// yielded remain valid.
    pub fn stream_group<'k>(&self, name: impl Into<Key<'k>>) -> Result<GroupIter<'_>, Error> {
        let key = name.into().encode();
        let label = label(&key);
        let bytes = self.get_group_raw(&key)?.ok_or_else(|| Error::NoSuchGroup(label.clone()))?;
        if bytes.len() % 16 != 0 {
            return Err(Error::CorruptGroup { name: label, len: bytes.len() });
        }
        let ids: Vec<[u8; 16]> = bytes.chunks_exact(16).map(chunk_to_array).collect();
        Ok(GroupIter { cache: self, name: label, ids: ids.into_iter() })
    }

    // --- internals ------------------------------------------------------------------------------

    fn get_group_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let txn = self.database.read()?;
        let table = txn.open_table(GROUPS)?;
        Ok(table.get(key)?.map(|value| value.value().to_vec()))
    }

    fn fetch_raw(&self, key: &[u8; 16]) -> Result<Option<RawDatasetDoc>, Error> {
        let txn = self.database.read()?;
        let table = txn.open_table(DS)?;
        let Some(value) = table.get(key.as_slice())? else {
            return Ok(None);
        };
        let bytes = self.decompressor.decompress(value.value())?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn materialize(&self, id: Uuid, raw: RawDatasetDoc) -> Result<Dataset, Error> {
        self.with_catalog(|catalog| Dataset::materialize(id, raw, catalog))
    }

    fn with_catalog<R>(&self, f: impl FnOnce(&Catalog) -> R) -> R {
        match &self.mode {
            Mode::ReadWrite { catalog, .. } => {
                let guard = catalog.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                f(&guard)
            },
            Mode::ReadOnly { catalog } => f(catalog),
        }
    }

    fn compressor(&self) -> Result<&Compressor, Error> {
        match &self.mode {
            Mode::ReadWrite { compressor, .. } => Ok(compressor),
            Mode::ReadOnly { .. } => Err(Error::ReadOnly),
        }
    }

    fn require_writable(&self) -> Result<(), Error> {
        self.compressor().map(|_| ())
    }

    fn register_product(&self, product: &Product, metadata_type: &MetadataType) -> Result<(), Error> {
        match &self.mode {
            Mode::ReadWrite { catalog, .. } => {
                let mut guard = catalog.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                guard.register_product(product.clone(), metadata_type.clone());
                Ok(())
            },
            Mode::ReadOnly { .. } => Err(Error::ReadOnly),
        }
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        if matches!(self.mode, Mode::ReadWrite { .. }) {
            if let Err(error) = self.sync() {
                tracing::warn!(
                    %error,
                    path = %self.path.display(),
                    "failed to persist catalog while closing dataset cache",
                );
            }
        }
    }
}

fn read_header(database: &Database) -> Result<(Decompressor, Option<Dictionary>), Error> {
    let txn = database.read()?;
    let table = txn.open_table(INFO)?;
    let version = table.get(VERSION_KEY)?.ok_or(Error::MissingVersion)?;
    let found = version.value().to_vec();
    if found != FORMAT_VERSION.as_slice() {
        return Err(Error::FormatVersion { found: String::from_utf8_lossy(&found).into_owned() });
    }
    let dictionary = table.get(ZDICT_KEY)?.map(|value| Dictionary::from_bytes(value.value().to_vec()));
    let decompressor = Decompressor::new(dictionary.clone());
    Ok((decompressor, dictionary))
}

fn insert_dataset(
    table: &mut redb::Table<&[u8], &[u8]>,
    dataset: &NewDataset,
    compressor: &Compressor,
) -> Result<(), Error> {
    let raw = dataset.to_raw();
    let json = serde_json::to_vec(&raw)?;
    let compressed = compressor.compress(&json)?;
    table.insert(dataset.id.as_bytes().as_slice(), compressed.as_slice())?;
    Ok(())
}

fn to_uuid_bytes(slice: &[u8]) -> Result<[u8; 16], Error> {
    slice.try_into().map_err(|_| Error::UnsupportedKey)
}

fn chunk_to_array(chunk: &[u8]) -> [u8; 16] {
    let mut array = [0u8; 16];
    array.copy_from_slice(chunk);
    array
}

fn bytes_to_uuid(chunk: &[u8]) -> Uuid {
    Uuid::from_bytes(chunk_to_array(chunk))
}

/// Renders an encoded group key as a human-readable label for logging and error messages.
/// Exact for string-keyed groups (the common case); lossy for binary-keyed ones.
fn label(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

// -------------------------------------------------------------------------------------------------
//
/// Iterator returned by [`Cache::get_all`].
pub struct DatasetIter<'a> {
    cache: &'a Cache,
    ids: std::vec::IntoIter<[u8; 16]>,
}

impl Iterator for DatasetIter<'_> {
    type Item = Result<Dataset, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.ids.next()?;
        let id = Uuid::from_bytes(key);
        Some(match self.cache.fetch_raw(&key) {
            Ok(Some(raw)) => self.cache.materialize(id, raw),
            Ok(None) => Err(Error::wrap_external(std::io::Error::other(format!(
                "dataset {id} vanished during full scan"
            )))),
            Err(error) => Err(error),
        })
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Iterator returned by [`Cache::stream_group`].
pub struct GroupIter<'a> {
    cache: &'a Cache,
    name: String,
    ids: std::vec::IntoIter<[u8; 16]>,
}

impl Iterator for GroupIter<'_> {
    type Item = Result<Dataset, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.ids.next()?;
        let id = Uuid::from_bytes(key);
        Some(match self.cache.fetch_raw(&key) {
            Ok(Some(raw)) => self.cache.materialize(id, raw),
            Ok(None) => Err(Error::MissingDataset { name: self.name.clone(), id }),
            Err(error) => Err(error),
        })
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Lazy pass-through writer returned by [`Cache::tee`].
pub struct Tee<'a, I> {
    cache: &'a Cache,
    input: I,
    batch_size: usize,
    buffer: VecDeque<NewDataset>,
    done: bool,
}

impl<I: Iterator<Item = NewDataset>> Tee<'_, I> {
    fn fill_batch(&mut self) -> Result<bool, Error> {
        let compressor = self.cache.compressor()?;
        let txn = self.cache.database.write()?;
        let mut wrote_any = false;
        {
            let mut table = txn.open_table(DS)?;
            for _ in 0..self.batch_size {
                let Some(dataset) = self.input.next() else { break };
                self.cache.register_product(&dataset.product, &dataset.metadata_type)?;
                insert_dataset(&mut table, &dataset, compressor)?;
                self.buffer.push_back(dataset);
                wrote_any = true;
            }
        }
        txn.commit()?;
        Ok(wrote_any)
    }
}

impl<I: Iterator<Item = NewDataset>> Iterator for Tee<'_, I> {
    type Item = Result<NewDataset, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(dataset) = self.buffer.pop_front() {
            return Some(Ok(dataset));
        }
        if self.done {
            return None;
        }
        match self.fill_batch() {
            Ok(true) => self.buffer.pop_front().map(Ok),
            Ok(false) => {
                self.done = true;
                self.cache.sync().err().map(Err)
            },
            Err(error) => {
                self.done = true;
                Some(Err(error))
            },
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::{Cache, CacheOptions};
    use crate::catalog::{MetadataType, Product};
    use crate::model::NewDataset;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_product() -> (Product, MetadataType) {
        let metadata_type = MetadataType { name: "eo".into(), definition: json!({}) };
        let product =
            Product { name: "p".into(), metadata_type: "eo".into(), definition: json!({"metadata_type": "eo"}) };
        (product, metadata_type)
    }

    fn sample_dataset(id: Uuid, product: &Product, metadata_type: &MetadataType) -> NewDataset {
        NewDataset {
            id,
            product: product.clone(),
            metadata_type: metadata_type.clone(),
            uris: vec!["s3://a".into()],
            metadata: json!({"id": id.to_string()}),
        }
    }

    #[test]
    fn create_write_close_reopen_round_trips_one_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let (product, metadata_type) = sample_product();
        let id = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();

        {
            let cache = Cache::create(&path, CacheOptions::default()).unwrap();
            cache.bulk_save(vec![sample_dataset(id, &product, &metadata_type)]).unwrap();
        }

        let cache = Cache::open_ro(&path, CacheOptions::default()).unwrap();
        let found = cache.get(id).unwrap().unwrap();
        assert_eq!(found.uris, vec!["s3://a".to_string()]);
        assert_eq!(cache.count().unwrap(), 1);

        let missing = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();
        assert!(cache.get(missing).unwrap().is_none());
    }

    #[test]
    fn groups_round_trip_and_stream_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let (product, metadata_type) = sample_product();
        let ids: Vec<Uuid> = (1..=3)
            .map(|n| Uuid::parse_str(&format!("00000000-0000-0000-0000-{n:012}")).unwrap())
            .collect();

        let cache = Cache::create(&path, CacheOptions::default()).unwrap();
        let datasets = ids.iter().map(|id| sample_dataset(*id, &product, &metadata_type));
        cache.bulk_save(datasets).unwrap();
        cache.put_group("g", &ids).unwrap();

        assert_eq!(cache.get_group("g").unwrap().unwrap(), ids);
        assert_eq!(cache.groups(None).unwrap(), vec![("g".to_string(), 3)]);

        let streamed: Vec<Uuid> =
            cache.stream_group("g").unwrap().map(|result| result.unwrap().id).collect();
        assert_eq!(streamed, ids);
    }

    #[test]
    fn group_names_accept_non_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let (product, metadata_type) = sample_product();
        let id = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();

        let cache = Cache::create(&path, CacheOptions::default()).unwrap();
        cache.bulk_save(vec![sample_dataset(id, &product, &metadata_type)]).unwrap();
        cache.put_group(7u32, &[id]).unwrap();

        assert_eq!(cache.get_group(7u32).unwrap().unwrap(), vec![id]);
        let streamed: Vec<Uuid> =
            cache.stream_group(7u32).unwrap().map(|result| result.unwrap().id).collect();
        assert_eq!(streamed, vec![id]);
    }

    #[test]
    fn stream_group_reports_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let missing = Uuid::parse_str("00000000-0000-0000-0000-000000000099").unwrap();

        let cache = Cache::create(&path, CacheOptions::default()).unwrap();
        cache.put_group("g", &[missing]).unwrap();

        let mut iter = cache.stream_group("g").unwrap();
        assert!(matches!(iter.next(), Some(Err(crate::Error::MissingDataset { .. }))));
    }

    #[test]
    fn unknown_group_is_reported_distinctly_from_corrupt_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let cache = Cache::create(&path, CacheOptions::default()).unwrap();

        assert!(matches!(cache.stream_group("missing"), Err(crate::Error::NoSuchGroup(_))));
        assert!(cache.get_group("missing").unwrap().is_none());
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        Cache::create(&path, CacheOptions::default()).unwrap();

        let cache = Cache::open_ro(&path, CacheOptions::default()).unwrap();
        let (product, metadata_type) = sample_product();
        let id = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let result = cache.bulk_save(vec![sample_dataset(id, &product, &metadata_type)]);
        assert!(matches!(result, Err(crate::Error::ReadOnly)));
    }

    #[test]
    fn tee_yields_every_record_after_its_batch_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let (product, metadata_type) = sample_product();
        let ids: Vec<Uuid> = (1..=7)
            .map(|n| Uuid::parse_str(&format!("00000000-0000-0000-0000-{n:012}")).unwrap())
            .collect();

        let cache = Cache::create(&path, CacheOptions::default()).unwrap();
        let datasets: Vec<NewDataset> =
            ids.iter().map(|id| sample_dataset(*id, &product, &metadata_type)).collect();

        let yielded: Vec<Uuid> =
            cache.tee(datasets, Some(3)).map(|result| result.unwrap().id).collect();
        assert_eq!(yielded, ids);
        assert_eq!(cache.count().unwrap(), 7);
    }

    #[test]
    fn unknown_product_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let (product, metadata_type) = sample_product();
        let id = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();

        {
            let cache = Cache::create(&path, CacheOptions::default()).unwrap();
            cache.bulk_save(vec![sample_dataset(id, &product, &metadata_type)]).unwrap();
        }

        let empty_catalog = crate::catalog::Catalog::empty();
        let cache = Cache::open_ro(
            &path,
            CacheOptions { products: Some(empty_catalog), ..CacheOptions::default() },
        )
        .unwrap();

        assert!(matches!(cache.get(id), Err(crate::Error::UnknownProduct(_))));
    }
}
