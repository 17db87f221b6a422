//! Sonoplex Decode - codec implementations and auto-detection
//!
//! Every supported container/codec pair lives in its own module behind the
//! shared [`Decoder`] trait, fed by a seekable [`IoStream`]. [`registry`]
//! builds the ordered sniff table the engine consults when opening a file
//! or buffer without a caller-specified codec.
//!
//! # Supported formats
//!
//! - [`wav`] - RIFF/WAVE, via `hound`
//! - [`flac`] - FLAC, via `claxon`
//! - [`vorbis`] - Ogg Vorbis, via `lewton`
//! - [`aiff`] - AIFF/AIFC: PCM, `sowt`, `fl32`/`fl64`, A-law/mu-law, `ima4`
//! - [`voc`] - Creative Voice: PCM, Creative ADPCM, A-law/mu-law
//! - [`eightsvx`] - IFF 8SVX: PCM or Fibonacci-delta
//!
//! [`law`], [`adpcm`], and [`ima4`] hold codec math shared across containers
//! rather than owning a container format of their own.

pub mod adpcm;
pub mod aiff;
pub mod decoder;
pub mod eightsvx;
pub mod error;
pub mod flac;
pub mod ima4;
pub mod io;
pub mod law;
pub mod registry;
pub mod voc;
pub mod vorbis;
pub mod wav;

pub use decoder::Decoder;
pub use error::{Error, Result};
pub use io::{FileStream, IoStream, MemoryStream, MemoryStreamMut, Whence};
pub use registry::DecoderRegistry;

use aiff::AiffDecoder;
use eightsvx::EightSvxDecoder;
use flac::FlacDecoder;
use voc::VocDecoder;
use vorbis::VorbisDecoder;
use wav::WavDecoder;

/// Build the default registry, in the precedence order a stream should be
/// probed: formats with strong magic bytes first, the permissive VOC/AIFF
/// chunk walkers last.
#[must_use]
pub fn default_registry() -> DecoderRegistry {
    let mut registry = DecoderRegistry::new();
    registry.register(WavDecoder::sniff, || Box::new(WavDecoder::new()));
    registry.register(FlacDecoder::sniff, || Box::new(FlacDecoder::new()));
    registry.register(VorbisDecoder::sniff, || Box::new(VorbisDecoder::new()));
    registry.register(AiffDecoder::sniff, || Box::new(AiffDecoder::new()));
    registry.register(EightSvxDecoder::sniff, || Box::new(EightSvxDecoder::new()));
    registry.register(VocDecoder::sniff, || Box::new(VocDecoder::new()));
    registry
}
