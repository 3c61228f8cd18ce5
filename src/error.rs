//! Error returned from the `dscache` crate. This includes key codec errors, compression errors,
//! storage engine errors, catalog errors, and so on.

// -------------------------------------------------------------------------------------------------
//
/// Error returned from the `dscache` crate.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The `info/version` value did not match the one format tag this crate understands.
    #[error("unsupported on-disk format version: expected `0001`, found `{found}`")]
    FormatVersion { found: String },

    /// The `info` sub-database had no `version` key at all.
    #[error("existing database is missing its format version field")]
    MissingVersion,

    /// A database was opened without `create`, but no `info` sub-database exists.
    #[error("existing database at `{path}` is not a dataset cache (no `info` sub-database)")]
    NotADatasetCache { path: std::path::PathBuf },

    /// A `groups/<name>` value's length was not a multiple of 16 bytes.
    #[error("group `{name}` has a corrupt length of {len} bytes (not a multiple of 16)")]
    CorruptGroup { name: String, len: usize },

    /// A raw ingest document had no usable `metadata.id` field.
    #[error("raw dataset document is missing a `metadata.id` field")]
    MissingDatasetId,

    /// A dataset's `product` field did not resolve to a catalog entry.
    #[error("no such product: `{0}`")]
    UnknownProduct(String),

    /// A product definition referenced a `metadata_type` not present in the catalog.
    #[error("product `{product}` references unknown metadata type `{metadata_type}`")]
    UnknownMetadataType { product: String, metadata_type: String },

    /// A product definition had no `metadata_type` key at all.
    #[error("product `{product}` has no `metadata_type` field")]
    MissingMetadataTypeLink { product: String },

    /// A group referenced a dataset UUID that does not exist in `ds`.
    #[error("group `{name}` references dataset `{id}` which does not exist")]
    MissingDataset { name: String, id: uuid::Uuid },

    /// `stream_group` (or a similar lookup) was asked for a group name with no stored membership.
    #[error("no such group: `{0}`")]
    NoSuchGroup(String),

    /// A write operation was attempted through a read-only cache handle.
    #[error("write attempted through a read-only dataset cache")]
    ReadOnly,

    /// A logical key variant isn't one the key codec accepts.
    #[error("unsupported logical key variant")]
    UnsupportedKey,

    /// [redb](https://www.redb.org/) [database error](https://docs.rs/redb/latest/redb/enum.DatabaseError.html).
    #[error(transparent)]
    RedbDatabase(#[from] redb::DatabaseError),

    /// [redb](https://www.redb.org/) [storage error](https://docs.rs/redb/latest/redb/enum.StorageError.html).
    #[error(transparent)]
    RedbStorage(#[from] redb::StorageError),

    /// [redb](https://www.redb.org/) [table error](https://docs.rs/redb/latest/redb/enum.TableError.html).
    #[error(transparent)]
    RedbTable(#[from] redb::TableError),

    /// [redb](https://www.redb.org/) [transaction error](https://docs.rs/redb/latest/redb/enum.TransactionError.html).
    #[error(transparent)]
    RedbTransaction(#[from] Box<redb::TransactionError>),

    /// [redb](https://www.redb.org/) [commit error](https://docs.rs/redb/latest/redb/enum.CommitError.html).
    #[error(transparent)]
    RedbCommit(#[from] redb::CommitError),

    /// Failure decoding or encoding a JSON document.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Failure training or running the zstd compressor/decompressor.
    #[error(transparent)]
    Zstd(#[from] std::io::Error),

    /// An external error supplied by the caller.
    #[error("external error: {0}")]
    External(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Error {
    /// Wraps a user-defined error in a boxed container for use with [`Error::External`].
    ///
    /// This is an escape hatch for callers who want to push their own error types through the same
    /// `Result<_, dscache::Error>` channel used by this crate.
    pub fn wrap_external<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        Self::External(Box::new(e))
    }

    #[cfg(feature = "anyhow")]
    /// Wraps an [`anyhow::Error`] into an [`Error::External`] variant.
    #[must_use]
    pub fn wrap_anyhow(err: anyhow::Error) -> Self {
        Self::External(err.into_boxed_dyn_error())
    }

    /// Attaches additional context to any existing error variant.
    ///
    /// This wraps the error (whatever its original variant) in [`Error::External`] with the context
    /// prepended, trading the original variant's type for a human-readable message.
    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        let context = context.into();
        let message = format!("{context}: {self}");
        Self::External(Box::new(std::io::Error::other(message)))
    }
}

#[cfg(feature = "anyhow")]
impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Self::External(error.into_boxed_dyn_error())
    }
}
