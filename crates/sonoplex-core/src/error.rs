//! Error types for the conversion pipeline.

use crate::SampleFormat;

/// Errors raised by [`crate::AudioConverter`] and the sample converters it builds on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Encountered `SampleFormat::Unknown` or a format code with no conversion routine.
    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(SampleFormat),

    /// A requested conversion has no supported implementation (e.g. a channel
    /// remix beyond mono/stereo, or an in-place conversion that isn't a same-size
    /// endian swap).
    #[error("audio conversion error: {0}")]
    Conversion(String),
}

/// Convenience result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
