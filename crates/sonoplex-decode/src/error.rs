//! Error type for I/O streams, decoders, and the registry.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying `std::io` failure from a file-backed stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Header parsing or unsupported-variant failure inside a decoder's `open`.
    #[error("format error: {detail}")]
    Format { detail: String },

    /// WAV container error surfaced by `hound`.
    #[error("wav error: {0}")]
    Hound(#[from] hound::Error),

    /// FLAC stream error surfaced by `claxon`.
    #[error("flac error: {0}")]
    Flac(#[from] claxon::Error),

    /// Vorbis stream error surfaced by `lewton`.
    #[error("vorbis error: {0}")]
    Vorbis(#[from] lewton::VorbisError),

    /// No registered decoder accepted the stream.
    #[error("no decoder recognized this stream")]
    DecoderNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for building a [`Error::Format`] variant.
    pub fn format(detail: impl Into<String>) -> Self {
        Self::Format {
            detail: detail.into(),
        }
    }
}
