//! An embedded, read-optimized cache for geospatial dataset catalogs.
//!
//! Datasets (opaque JSON documents identified by a UUID), the product and metadata-type
//! definitions they reference, and named groups of dataset UUIDs are all persisted in a single
//! file backed by [`redb`], compressed with zstd and an optional shared trained dictionary. The
//! cache is built once — typically by a single streaming writer ingesting many records — and then
//! opened many times by concurrent read-only consumers that look datasets up by UUID or by group
//! membership.
//!
//! ```no_run
//! # fn main() -> Result<(), dscache::Error> {
//! use dscache::{Cache, CacheOptions};
//!
//! let cache = Cache::create("catalog.redb", CacheOptions::default())?;
//! let id = uuid::Uuid::new_v4();
//! // ... build and bulk_save a NewDataset here ...
//! let _ = cache.get(id)?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic, clippy::style)]

mod cache;
mod catalog;
mod compression;
mod engine;
mod error;
mod key;
mod model;

pub use crate::cache::{Cache, CacheOptions, DatasetIter, GroupIter, Tee, DEFAULT_BATCH_SIZE};
pub use crate::catalog::{Catalog, MetadataType, Product};
pub use crate::compression::{train_dictionary, Compressor, Decompressor, Dictionary, Level};
pub use crate::engine::{destroy, Stat};
pub use crate::error::Error;
pub use crate::key::Key;
pub use crate::model::{Dataset, NewDataset, RawDatasetDoc};
