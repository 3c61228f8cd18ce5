//! A trained zstd dictionary, shared between a [`super::Compressor`] and a [`super::Decompressor`]
//! without any lifetime coupling between them.

// -------------------------------------------------------------------------------------------------
//
/// Immutable, reference-counted bytes of a trained zstd dictionary.
///
/// Persisted once as `info/zdict` at database creation time and never rotated: every record
/// already written is bound to it, so changing the dictionary would make those records
/// undecodable. Cloning a [`Dictionary`] is cheap (it bumps a reference count, not a copy).
#[derive(Clone)]
pub struct Dictionary(std::sync::Arc<[u8]>);

impl Dictionary {
    /// Wraps raw trained-dictionary bytes (for example, the value read back from `info/zdict`).
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw dictionary bytes, suitable for persisting as `info/zdict`.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary").field("len", &self.0.len()).finish()
    }
}
