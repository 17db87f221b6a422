//! Aggregates every live stream bound to one device and runs inside the
//! backend's periodic callback.

use crate::stream::AudioStream;
use sonoplex_core::sample::from_float;
use sonoplex_core::AudioSpec;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque key into a [`Mixer`]'s stream registry. The mixer stores streams
/// by handle rather than by back-reference: a stream never owns or points
/// at its mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

/// Aggregates all streams registered against one `device_spec`. Owned by an
/// [`crate::device::AudioDevice`]; invoked from the backend's audio callback.
pub struct Mixer {
    device_spec: AudioSpec,
    registry: Mutex<Vec<(StreamHandle, Arc<AudioStream>)>>,
    next_handle: Mutex<u64>,
    device_gain_bits: AtomicU32,
    global_muted: AtomicBool,
    supports_backend_mute: AtomicBool,
}

impl Mixer {
    #[must_use]
    pub fn new(device_spec: AudioSpec) -> Self {
        Self {
            device_spec,
            registry: Mutex::new(Vec::new()),
            next_handle: Mutex::new(1),
            device_gain_bits: AtomicU32::new(1.0f32.to_bits()),
            global_muted: AtomicBool::new(false),
            supports_backend_mute: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn device_spec(&self) -> AudioSpec {
        self.device_spec
    }

    /// Swaps the stream's registration into the list under a short lock;
    /// never touches decoder/resampler state — the lock only ever guards
    /// the registration list, never decoder work.
    pub fn add_stream(&self, stream: Arc<AudioStream>) -> StreamHandle {
        let mut next = self.next_handle.lock().expect("mixer handle counter poisoned");
        let handle = StreamHandle(*next);
        *next += 1;
        drop(next);

        let mut registry = self.registry.lock().expect("mixer registry poisoned");
        registry.push((handle, stream));
        tracing::debug!(handle = handle.0, "mixer: stream registered");
        handle
    }

    pub fn remove_stream(&self, handle: StreamHandle) -> Option<Arc<AudioStream>> {
        let mut registry = self.registry.lock().expect("mixer registry poisoned");
        let pos = registry.iter().position(|(h, _)| *h == handle)?;
        let (_, stream) = registry.remove(pos);
        tracing::debug!(handle = handle.0, "mixer: stream unregistered");
        Some(stream)
    }

    #[must_use]
    pub fn stream(&self, handle: StreamHandle) -> Option<Arc<AudioStream>> {
        let registry = self.registry.lock().expect("mixer registry poisoned");
        registry.iter().find(|(h, _)| *h == handle).map(|(_, s)| s.clone())
    }

    /// Removes a stream by identity rather than handle; used by device
    /// switching, which only has the `Arc<AudioStream>` handed back from
    /// `create_stream`.
    pub fn remove_stream_matching(&self, stream: &Arc<AudioStream>) -> Option<StreamHandle> {
        let mut registry = self.registry.lock().expect("mixer registry poisoned");
        let pos = registry.iter().position(|(_, s)| Arc::ptr_eq(s, stream))?;
        let (handle, _) = registry.remove(pos);
        Some(handle)
    }

    /// Every handle currently registered, oldest-first. Used by device
    /// switching to capture and move streams.
    #[must_use]
    pub fn handles(&self) -> Vec<StreamHandle> {
        self.registry.lock().expect("mixer registry poisoned").iter().map(|(h, _)| *h).collect()
    }

    pub fn set_device_gain(&self, gain: f32) {
        self.device_gain_bits.store(gain.max(0.0).to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn device_gain(&self) -> f32 {
        f32::from_bits(self.device_gain_bits.load(Ordering::Relaxed))
    }

    pub fn set_global_muted(&self, muted: bool) {
        self.global_muted.store(muted, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_global_muted(&self) -> bool {
        self.global_muted.load(Ordering::Relaxed)
    }

    /// Whether the backend handles mute itself; when `false` the mixer's own
    /// `run` applies the mute by zeroing output instead.
    pub fn set_backend_mute_supported(&self, supported: bool) {
        self.supports_backend_mute.store(supported, Ordering::Relaxed);
    }

    /// §4.7's five-step algorithm, run from the backend's periodic callback.
    /// `out` is the packed output buffer in `device_spec`'s format; `scratch`
    /// and `per_stream` are caller-owned float buffers reused every call so
    /// the callback thread never allocates.
    pub fn run(&self, out: &mut [u8], scratch: &mut Vec<f32>, per_stream: &mut Vec<f32>) {
        let channels = self.device_spec.channels.max(1) as usize;
        let bytes_per_frame = self.device_spec.format.byte_size() * channels;
        if bytes_per_frame == 0 {
            out.fill(0);
            return;
        }
        let frames = out.len() / bytes_per_frame;
        let n_samples = frames * channels;

        scratch.clear();
        scratch.resize(n_samples, 0.0);
        if per_stream.len() < n_samples {
            per_stream.resize(n_samples, 0.0);
        }

        let snapshot = {
            let registry = self.registry.lock().expect("mixer registry poisoned");
            registry.iter().map(|(_, s)| s.clone()).collect::<Vec<_>>()
        };

        for stream in &snapshot {
            per_stream[..n_samples].fill(0.0);
            let produced = stream.pull(&mut per_stream[..n_samples], frames, self.device_spec.channels);
            let produced_samples = produced * channels;
            for i in 0..produced_samples {
                scratch[i] += per_stream[i];
            }
        }

        let device_gain = self.device_gain();
        let muted = self.is_global_muted() && !self.supports_backend_mute.load(Ordering::Relaxed);
        if muted {
            scratch[..n_samples].fill(0.0);
        } else if device_gain != 1.0 {
            for s in scratch[..n_samples].iter_mut() {
                *s *= device_gain;
            }
        }

        for s in scratch[..n_samples].iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }

        if from_float(out, &scratch[..n_samples], n_samples, self.device_spec.format).is_err() {
            out.fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::AudioSource;
    use sonoplex_core::SampleFormat;
    use sonoplex_decode::{Decoder, IoStream, Result as DecodeResult};

    struct ConstantDecoder {
        remaining: usize,
    }

    impl Decoder for ConstantDecoder {
        fn open(&mut self, _stream: Box<dyn IoStream>) -> DecodeResult<()> {
            Ok(())
        }
        fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
            let n = dst.len().min(self.remaining);
            for s in dst.iter_mut().take(n) {
                *s = 0.25;
            }
            self.remaining -= n;
            *call_again = self.remaining > 0;
            n
        }
        fn rewind(&mut self) -> bool {
            true
        }
        fn seek_to_time(&mut self, _micros: u64) -> bool {
            true
        }
        fn duration(&self) -> u64 {
            0
        }
        fn channels(&self) -> u8 {
            2
        }
        fn rate(&self) -> u32 {
            44100
        }
        fn name(&self) -> &str {
            "constant"
        }
        fn is_open(&self) -> bool {
            true
        }
    }

    fn spec() -> AudioSpec {
        AudioSpec { format: SampleFormat::S16Le, channels: 2, freq: 44100 }
    }

    #[test]
    fn empty_mixer_produces_silence() {
        let mixer = Mixer::new(spec());
        let mut out = vec![0u8; 40];
        let mut scratch = Vec::new();
        let mut per_stream = Vec::new();
        mixer.run(&mut out, &mut scratch, &mut per_stream);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn registered_stream_contributes_nonzero_output() {
        let mixer = Mixer::new(spec());
        let decoder = Box::new(ConstantDecoder { remaining: 10_000 });
        let source = AudioSource::from_decoder(decoder);
        let stream = Arc::new(AudioStream::new(source, 2, 44100));
        stream.open().unwrap();
        stream.play(1, 0);
        let handle = mixer.add_stream(stream);
        assert!(mixer.stream(handle).is_some());

        let mut out = vec![0u8; 40];
        let mut scratch = Vec::new();
        let mut per_stream = Vec::new();
        mixer.run(&mut out, &mut scratch, &mut per_stream);
        assert!(out.iter().any(|&b| b != 0));
    }

    #[test]
    fn global_mute_zeroes_output_when_backend_cannot_mute() {
        let mixer = Mixer::new(spec());
        let decoder = Box::new(ConstantDecoder { remaining: 10_000 });
        let source = AudioSource::from_decoder(decoder);
        let stream = Arc::new(AudioStream::new(source, 2, 44100));
        stream.open().unwrap();
        stream.play(1, 0);
        mixer.add_stream(stream);
        mixer.set_global_muted(true);

        let mut out = vec![0u8; 40];
        let mut scratch = Vec::new();
        let mut per_stream = Vec::new();
        mixer.run(&mut out, &mut scratch, &mut per_stream);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn remove_stream_drops_it_from_future_runs() {
        let mixer = Mixer::new(spec());
        let decoder = Box::new(ConstantDecoder { remaining: 10_000 });
        let source = AudioSource::from_decoder(decoder);
        let stream = Arc::new(AudioStream::new(source, 2, 44100));
        stream.open().unwrap();
        stream.play(1, 0);
        let handle = mixer.add_stream(stream);
        assert!(mixer.remove_stream(handle).is_some());
        assert!(mixer.stream(handle).is_none());

        let mut out = vec![1u8; 40];
        let mut scratch = Vec::new();
        let mut per_stream = Vec::new();
        mixer.run(&mut out, &mut scratch, &mut per_stream);
        assert!(out.iter().all(|&b| b == 0));
    }
}
