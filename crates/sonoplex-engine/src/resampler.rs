//! Sits between a decoder and the mixer. Pulls from the decoder at its
//! native rate/channel count, resamples and channel-converts (mono<->stereo
//! only) to the device spec, and buffers converted output so the mixer's
//! pull can be served from whatever's already on hand.

use sonoplex_core::resample::resample_interleaved;
use sonoplex_decode::Decoder;
use std::collections::VecDeque;

/// Number of source frames requested from the decoder per refill.
const DEFAULT_CHUNK_FRAMES: usize = 1024;

fn channel_convert(src: &[f32], src_channels: usize, dst_channels: usize) -> Vec<f32> {
    if src_channels == dst_channels {
        return src.to_vec();
    }
    if src_channels == 1 && dst_channels == 2 {
        let mut out = Vec::with_capacity(src.len() * 2);
        for &s in src {
            out.push(s);
            out.push(s);
        }
        return out;
    }
    if src_channels == 2 && dst_channels == 1 {
        let frames = src.len() / 2;
        let mut out = Vec::with_capacity(frames);
        for frame in src.chunks_exact(2) {
            out.push((frame[0] + frame[1]) * 0.5);
        }
        return out;
    }
    // Unsupported remix (beyond mono/stereo): drop extra channels / pad with
    // silence rather than fail the real-time path. Decoders degrade rather
    // than panic; the resampler does the same for a channel count it
    // cannot remix.
    let frames = src.len() / src_channels.max(1);
    let mut out = vec![0.0f32; frames * dst_channels];
    for f in 0..frames {
        for c in 0..dst_channels.min(src_channels) {
            out[f * dst_channels + c] = src[f * src_channels + c];
        }
    }
    out
}

/// Pulls decoded audio at the decoder's native spec and delivers it at a
/// fixed destination channel count/rate, buffering whatever doesn't fit the
/// caller's current request.
pub struct Resampler {
    decoder: Box<dyn Decoder>,
    src_channels: u8,
    src_rate: u32,
    dst_channels: u8,
    dst_rate: u32,
    chunk_frames: usize,
    output: VecDeque<f32>,
    decode_scratch: Vec<f32>,
    eof: bool,
}

impl Resampler {
    /// Build a resampler pulling from an already-`open`ed `decoder`,
    /// delivering `dst_channels` channels at `dst_rate` Hz.
    #[must_use]
    pub fn new(decoder: Box<dyn Decoder>, dst_channels: u8, dst_rate: u32) -> Self {
        let src_channels = decoder.channels();
        let src_rate = decoder.rate();
        Self {
            decoder,
            src_channels,
            src_rate,
            dst_channels,
            dst_rate,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            output: VecDeque::new(),
            decode_scratch: vec![0.0; DEFAULT_CHUNK_FRAMES * 8],
            eof: false,
        }
    }

    #[must_use]
    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    pub fn decoder_mut(&mut self) -> &mut dyn Decoder {
        self.decoder.as_mut()
    }

    /// Resize the internal rings for a new destination chunk size. Buffers
    /// here are growable rather than fixed-capacity, so this only needs to
    /// remember the new chunk size used to size each refill from the
    /// decoder.
    pub fn set_spec(&mut self, dst_channels: u8, dst_rate: u32, chunk_size: usize) {
        self.flush_pending_at_old_spec();
        self.dst_channels = dst_channels;
        self.dst_rate = dst_rate;
        self.chunk_frames = chunk_size.max(1);
    }

    /// Drop any buffered output and reset decoder-spec tracking, without
    /// touching the decoder itself. Forwarded to from `AudioStream::rewind`.
    pub fn discard_pending_samples(&mut self) {
        self.output.clear();
        self.eof = false;
    }

    fn flush_pending_at_old_spec(&mut self) {
        // Pending output was already produced at the destination spec; a
        // spec change only affects future refills, so there is nothing to
        // re-render here. Kept as a named step so the "finish at the old
        // spec, then switch" ordering stays explicit at the call site.
    }

    fn refill(&mut self) {
        let needed = self.chunk_frames * self.src_channels.max(1) as usize;
        if self.decode_scratch.len() < needed {
            self.decode_scratch.resize(needed, 0.0);
        }

        let mut call_again = false;
        let produced = self
            .decoder
            .decode(&mut self.decode_scratch[..needed], &mut call_again, self.dst_channels);

        if produced == 0 {
            self.eof = true;
            return;
        }

        // A decoder may discover a different native channel count/rate than
        // it reported at `open` (e.g. a resampler-facing container that
        // renegotiates mid-stream). Re-derive from the decoder's live state
        // before converting this chunk.
        let live_channels = self.decoder.channels();
        let live_rate = self.decoder.rate();
        if live_channels != self.src_channels || live_rate != self.src_rate {
            tracing::debug!(
                old_channels = self.src_channels,
                new_channels = live_channels,
                old_rate = self.src_rate,
                new_rate = live_rate,
                "resampler: decoder spec changed mid-stream"
            );
            self.src_channels = live_channels;
            self.src_rate = live_rate;
        }

        let chunk = &self.decode_scratch[..produced];
        let channel_matched = channel_convert(chunk, self.src_channels.max(1) as usize, self.dst_channels.max(1) as usize);
        let resampled = resample_interleaved(
            &channel_matched,
            self.dst_channels.max(1) as usize,
            self.src_rate.max(1),
            self.dst_rate.max(1),
        );
        self.output.extend(resampled);
    }

    /// Pull `dst.len()` interleaved samples (at `dst_channels`/`dst_rate`)
    /// into `dst`, returning the number actually produced. Fewer than
    /// requested means the decoder reached logical EOF.
    pub fn pull(&mut self, dst: &mut [f32]) -> usize {
        while self.output.len() < dst.len() && !self.eof {
            self.refill();
        }

        let n = dst.len().min(self.output.len());
        for slot in dst.iter_mut().take(n) {
            *slot = self.output.pop_front().unwrap_or(0.0);
        }
        n
    }

    /// Forward to the decoder's rewind, discarding buffered output so the
    /// next `pull` starts clean.
    pub fn rewind(&mut self) -> bool {
        self.discard_pending_samples();
        self.decoder.rewind()
    }

    pub fn seek_to_time(&mut self, micros: u64) -> bool {
        self.discard_pending_samples();
        self.decoder.seek_to_time(micros)
    }
}
