//! Error type for the resampler, stream/mixer engine, and device orchestration.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The platform backend reported a failure (device open/close/pause/resume).
    #[error("backend error: {0}")]
    Backend(String),

    /// An operation required a device but none was open.
    #[error("no device is open")]
    NoDevice,

    /// `open_device`/`switch_device` could not find the requested device id.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// An operation was attempted on a handle in the wrong lifecycle state
    /// (e.g. a property query on a closed device or stream).
    #[error("invalid state: {0}")]
    State(String),

    #[error(transparent)]
    Decode(#[from] sonoplex_decode::Error),

    #[error(transparent)]
    Core(#[from] sonoplex_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn backend(detail: impl Into<String>) -> Self {
        Self::Backend(detail.into())
    }

    pub fn state(detail: impl Into<String>) -> Self {
        Self::State(detail.into())
    }
}
