//! Zstd compression pipeline, with support for an optional shared trained dictionary.
//!
//! A [`Compressor`] and a [`Decompressor`] each carry an optional, immutable [`Dictionary`]
//! reference. The dictionary is reference-counted so the two can share it without any lifetime
//! relationship between them, keeping the compressor and decompressor sides fully independent.

mod dictionary;
pub use dictionary::Dictionary;

mod level;
pub use level::Level;

use crate::Error;

/// Upper bound on a single decompressed payload, guarding against corrupt or hostile input
/// expanding without bound.
const MAX_DECOMPRESSED_SIZE: usize = u32::MAX as usize;

// -------------------------------------------------------------------------------------------------
//
/// Compresses byte buffers at a configured level, optionally using a shared trained dictionary.
///
/// A read-only dataset cache has no [`Compressor`] at all — compression is a write-path concern,
/// and attempting to write through a read-only handle is a misuse error the caller hits before
/// ever needing one.
#[derive(Clone)]
pub struct Compressor {
    level: Level,
    dictionary: Option<Dictionary>,
}

impl Compressor {
    /// Creates a new compressor at the given level, optionally bound to a trained dictionary.
    #[must_use]
    pub const fn new(level: Level, dictionary: Option<Dictionary>) -> Self {
        Self { level, dictionary }
    }

    /// Compresses a buffer, returning the zstd frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying zstd encoder fails.
    pub fn compress(&self, uncompressed: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.dictionary {
            Some(dictionary) => {
                let mut compressor =
                    zstd::bulk::Compressor::with_dictionary(self.level.get(), dictionary.as_bytes())?;
                Ok(compressor.compress(uncompressed)?)
            },
            None => Ok(zstd::bulk::compress(uncompressed, self.level.get())?),
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Decompresses zstd frames, optionally using a shared trained dictionary.
///
/// Unlike [`Compressor`], every cache handle — read-only or writable — carries a [`Decompressor`],
/// since materializing a stored dataset always requires decompression.
#[derive(Clone)]
pub struct Decompressor {
    dictionary: Option<Dictionary>,
}

impl Decompressor {
    /// Creates a new decompressor, optionally bound to a trained dictionary.
    #[must_use]
    pub const fn new(dictionary: Option<Dictionary>) -> Self {
        Self { dictionary }
    }

    /// Decompresses a zstd frame back to its original bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is corrupt, was compressed with a different dictionary than
    /// the one configured here, or exceeds [`MAX_DECOMPRESSED_SIZE`].
    pub fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.dictionary {
            Some(dictionary) => {
                let mut decompressor =
                    zstd::bulk::Decompressor::with_dictionary(dictionary.as_bytes())?;
                Ok(decompressor.decompress(compressed, MAX_DECOMPRESSED_SIZE)?)
            },
            None => Ok(zstd::bulk::decompress(compressed, MAX_DECOMPRESSED_SIZE)?),
        }
    }
}

/// Trains a zstd dictionary from a set of sample record bodies.
///
/// Samples should already be in their final on-wire form (i.e. the same JSON bytes that will
/// later be compressed). The returned dictionary is meant to be persisted once, at database
/// creation time, as `info/zdict` — dictionaries are immutable for the life of a database, since
/// rotating one would strand every record already compressed against the old dictionary.
///
/// # Errors
///
/// Returns an error if zstd's dictionary trainer fails (for example, too few or too small samples
/// to produce a dictionary of the requested size).
pub fn train_dictionary<S: AsRef<[u8]>>(
    samples: impl IntoIterator<Item = S>,
    target_size: usize,
) -> Result<Dictionary, Error> {
    let samples: Vec<Vec<u8>> = samples.into_iter().map(|s| s.as_ref().to_vec()).collect();
    let bytes = zstd::dict::from_samples(&samples, target_size)?;
    Ok(Dictionary::from_bytes(bytes))
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::{Compressor, Decompressor, Level};

    #[test]
    fn round_trips_without_dictionary() {
        let compressor = Compressor::new(Level::default(), None);
        let decompressor = Decompressor::new(None);
        let data = b"hello dataset cache".repeat(64);

        let compressed = compressor.compress(&data).unwrap();
        let decompressed = decompressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn round_trips_with_dictionary() {
        let samples: Vec<Vec<u8>> = (0..200)
            .map(|i| format!(r#"{{"product":"p{i}","uris":["s3://a/{i}"],"metadata":{{"id":"{i}"}}}}"#).into_bytes())
            .collect();
        let dictionary = super::train_dictionary(samples, 4096).unwrap();

        let compressor = Compressor::new(Level::default(), Some(dictionary.clone()));
        let decompressor = Decompressor::new(Some(dictionary));

        let data = br#"{"product":"p1","uris":["s3://a/1"],"metadata":{"id":"1"}}"#;
        let compressed = compressor.compress(data).unwrap();
        let decompressed = decompressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn wrong_dictionary_fails_to_decompress() {
        let samples_a: Vec<Vec<u8>> =
            (0..200).map(|i| format!("alpha-sample-record-number-{i}").into_bytes()).collect();
        let samples_b: Vec<Vec<u8>> =
            (0..200).map(|i| format!("beta-sample-record-number-{i}").into_bytes()).collect();

        let dict_a = super::train_dictionary(samples_a, 4096).unwrap();
        let dict_b = super::train_dictionary(samples_b, 4096).unwrap();

        let compressor = Compressor::new(Level::default(), Some(dict_a));
        let decompressor = Decompressor::new(Some(dict_b));

        let compressed = compressor.compress(b"alpha-sample-record-number-1").unwrap();
        match decompressor.decompress(&compressed) {
            Err(_) => {},
            Ok(decompressed) => assert_ne!(decompressed, b"alpha-sample-record-number-1"),
        }
    }
}
