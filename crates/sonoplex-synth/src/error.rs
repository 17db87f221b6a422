//! Error type for the MML compiler, PC-speaker stream, and chip decoders.

use crate::mml::MmlError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Strict-mode MML parse failure, with source position.
    #[error("mml parse error: {0}")]
    Mml(#[from] MmlError),

    /// Sequencer/chip-format header or event-stream failure.
    #[error("sequence error: {detail}")]
    Sequence { detail: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn sequence(detail: impl Into<String>) -> Self {
        Self::Sequence {
            detail: detail.into(),
        }
    }
}
