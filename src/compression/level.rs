//! Compression level configuration.

use crate::Error;

// -------------------------------------------------------------------------------------------------
//
/// A validated zstd compression level, in the accepted range `1..=22`.
///
/// Named presets are provided for the common cases; [`Level::new`] accepts any raw level in range
/// for callers who want finer control.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Level(i32);

impl Level {
    /// Prioritizes compression speed over ratio.
    pub const FAST: Self = Self(1);

    /// Balances compression speed and ratio. This is the default.
    pub const BALANCED: Self = Self(6);

    /// Prioritizes maximum compression ratio over speed.
    pub const MAXIMUM: Self = Self(20);

    /// Builds a [`Level`] from a raw zstd level.
    ///
    /// # Errors
    ///
    /// Returns an error if `level` is outside the `1..=22` range zstd accepts.
    pub fn new(level: i32) -> Result<Self, Error> {
        if (1..=22).contains(&level) {
            Ok(Self(level))
        } else {
            Err(Error::wrap_external(std::io::Error::other(format!(
                "compression level {level} is outside the supported range 1..=22"
            ))))
        }
    }

    /// Returns the raw zstd level.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::BALANCED
    }
}
