//! The polymorphic decoder contract every codec implements.

use crate::{IoStream, Result};

/// Object-safe capability set every codec implements: open a stream, pull
/// interleaved float samples from it, reposition, and report its properties.
///
/// Mirrors the shape of an `Effect` in the upstream DSP crate this workspace
/// grew from — no inheritance chain, just a trait every decoder satisfies
/// independently.
pub trait Decoder: Send {
    /// Parse headers from `stream` and set `channels`/`rate`/`duration`/`name`.
    /// The decoder takes ownership of the stream for the rest of its life.
    fn open(&mut self, stream: Box<dyn IoStream>) -> Result<()>;

    /// Pull up to `dst.len()` interleaved float samples (not frames) at the
    /// decoder's native rate and channel count. Sets `*call_again = true`
    /// when more output is available immediately without further I/O.
    /// Returns `0` at logical EOF. `device_channels` is an advisory hint for
    /// decoders that can cheaply mix to a different channel count.
    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, device_channels: u8) -> usize;

    /// Seek to the logical start. Returns `false` if unsupported.
    fn rewind(&mut self) -> bool;

    /// Seek to a wall-time position in microseconds. Returns `false` if
    /// unsupported or the target is out of range.
    fn seek_to_time(&mut self, micros: u64) -> bool;

    /// Total duration in microseconds, or `0` if unknown.
    fn duration(&self) -> u64;

    /// Channel count. Valid only after a successful `open`.
    fn channels(&self) -> u8;

    /// Sample rate in Hz. Valid only after a successful `open`.
    fn rate(&self) -> u32;

    /// Short, human-readable codec name (e.g. `"wav"`, `"vorbis"`).
    fn name(&self) -> &str;

    /// Whether `open` has succeeded and the decoder has not been closed.
    fn is_open(&self) -> bool;
}
