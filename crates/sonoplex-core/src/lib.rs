//! Sonoplex Core - shared audio data model
//!
//! Foundational types every other `sonoplex-*` crate builds on: the
//! `(format, channels, freq)` triple that describes a PCM stream, an owning
//! sample buffer, explicit endian helpers, and the format/channel/rate
//! conversion pipeline decoders and the mixer use to get audio into a common
//! shape.
//!
//! # Core Abstractions
//!
//! - [`SampleFormat`] / [`AudioSpec`] - what a PCM stream looks like
//! - [`Buffer`] - owning, resizable sample storage
//! - [`AudioConverter`] / [`StreamConverter`] - format/channel/rate conversion
//!
//! # Design Principles
//!
//! - No allocation in [`sample::to_float`]/[`sample::from_float`] — callers
//!   size buffers once and reuse them across the audio callback.
//! - Every endian-sensitive read names its endianness explicitly; there is no
//!   platform-conditional byte order.

pub mod buffer;
pub mod converter;
pub mod endian;
pub mod error;
pub mod resample;
pub mod sample;
pub mod spec;

pub use buffer::Buffer;
pub use converter::{AudioConverter, StreamConverter};
pub use error::{Error, Result};
pub use resample::{catmull_rom, resample_channel, resample_interleaved};
pub use spec::{AudioSpec, SampleFormat};
