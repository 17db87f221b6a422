//! C8: a playable instance wrapping one audio source. Lifecycle state
//! machine, gain/pan/fade/mute, loop/finish callbacks, and the processor
//! chain the mixer runs before summing this stream's output.

use crate::error::{Error, Result};
use crate::resampler::Resampler;
use arc_swap::ArcSwap;
use sonoplex_decode::Decoder;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Capability set run over a stream's produced buffer after decode+resample,
/// before the mixer sums it in. Implementations share themselves via `Arc`
/// and use interior mutability for any per-instance state, so the chain can
/// be read without locking on the callback thread (see [`AudioStream::add_processor`]).
pub trait Processor: Send + Sync {
    fn process(&self, samples: &mut [f32], channels: u8);
}

/// Wraps a decoder the mixer has never seen directly: `open`ing a source
/// consumes the io_stream, after which only `channels()`/`rate()` are
/// meaningful from the outside.
pub struct AudioSource {
    pub(crate) decoder: Box<dyn Decoder>,
}

impl AudioSource {
    #[must_use]
    pub fn from_decoder(decoder: Box<dyn Decoder>) -> Self {
        Self { decoder }
    }

    #[must_use]
    pub fn channels(&self) -> u8 {
        self.decoder.channels()
    }

    #[must_use]
    pub fn rate(&self) -> u32 {
        self.decoder.rate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    Closed = 0,
    Stopped = 1,
    Playing = 2,
    Paused = 3,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Closed,
            2 => Self::Playing,
            3 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum FadeState {
    None = 0,
    In = 1,
    Out = 2,
}

impl FadeState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::In,
            2 => Self::Out,
            _ => Self::None,
        }
    }
}

/// What a finished pull should do next, decided under the resampler lock and
/// acted on by the caller (mixer) without holding it.
enum IterationOutcome {
    Continue,
    Looped { next_iteration: u32 },
    Finished,
}

type FinishCallback = Box<dyn FnMut() + Send>;
type LoopCallback = Box<dyn FnMut(u32) + Send>;

/// A playable instance wrapping one [`AudioSource`], implementing a full
/// lifecycle state machine and pull protocol.
pub struct AudioStream {
    resampler: Mutex<Resampler>,
    state: AtomicU8,

    volume_bits: AtomicU32,
    pan_bits: AtomicU32,
    muted: AtomicBool,

    iterations_remaining: AtomicU32, // 0 == infinite
    current_iteration: AtomicU32,

    fade_state: AtomicU8,
    fade_gain_bits: AtomicU32,
    fade_duration_frames: AtomicU32,

    playback_tick: AtomicU64,
    playback_start_tick: AtomicU64,

    processors: ArcSwap<Vec<Arc<dyn Processor>>>,
    finish_callback: Mutex<Option<FinishCallback>>,
    loop_callback: Mutex<Option<LoopCallback>>,
}

impl AudioStream {
    #[must_use]
    pub fn new(source: AudioSource, device_channels: u8, device_rate: u32) -> Self {
        let resampler = Resampler::new(source.decoder, device_channels, device_rate);
        Self {
            resampler: Mutex::new(resampler),
            state: AtomicU8::new(StreamState::Closed as u8),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            pan_bits: AtomicU32::new(0.0f32.to_bits()),
            muted: AtomicBool::new(false),
            iterations_remaining: AtomicU32::new(1),
            current_iteration: AtomicU32::new(1),
            fade_state: AtomicU8::new(FadeState::None as u8),
            fade_gain_bits: AtomicU32::new(1.0f32.to_bits()),
            fade_duration_frames: AtomicU32::new(0),
            playback_tick: AtomicU64::new(0),
            playback_start_tick: AtomicU64::new(0),
            processors: ArcSwap::from_pointee(Vec::new()),
            finish_callback: Mutex::new(None),
            loop_callback: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// `Closed -> Stopped`. Never fails in this port: the decoder was
    /// already opened by whoever built the [`AudioSource`]; this only
    /// advances the lifecycle flag.
    pub fn open(&self) -> Result<()> {
        if self.state() != StreamState::Closed {
            return Err(Error::state("open() called on a stream that is not Closed"));
        }
        self.set_state(StreamState::Stopped);
        Ok(())
    }

    fn fade_duration_frames_for(&self, fade_ms: u32, device_rate: u32) -> u32 {
        ((u64::from(fade_ms) * u64::from(device_rate)) / 1000).max(1) as u32
    }

    /// Start (or resume/no-op) playback. `iterations == 0` means infinite.
    #[must_use]
    pub fn play(&self, iterations: u32, fade_in_ms: u32) -> bool {
        match self.state() {
            StreamState::Stopped => {
                self.iterations_remaining.store(iterations, Ordering::Relaxed);
                self.current_iteration.store(1, Ordering::Relaxed);
                self.playback_start_tick
                    .store(self.playback_tick.load(Ordering::Relaxed), Ordering::Relaxed);
                if fade_in_ms > 0 {
                    let dst_rate = self.resampler.lock().map(|r| r.decoder().rate()).unwrap_or(44100);
                    self.fade_duration_frames
                        .store(self.fade_duration_frames_for(fade_in_ms, dst_rate), Ordering::Relaxed);
                    self.fade_state.store(FadeState::In as u8, Ordering::Relaxed);
                    self.fade_gain_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
                } else {
                    self.fade_state.store(FadeState::None as u8, Ordering::Relaxed);
                    self.fade_gain_bits.store(1.0f32.to_bits(), Ordering::Relaxed);
                }
                self.set_state(StreamState::Playing);
                true
            }
            StreamState::Paused => self.resume(fade_in_ms),
            StreamState::Playing => true,
            StreamState::Closed => false,
        }
    }

    /// Immediate or fade-out stop. Immediate stop rewinds the decoder and
    /// fires the finish callback synchronously; a faded stop completes
    /// inside the next `pull` once `fade_gain` reaches zero.
    pub fn stop(&self, fade_out_ms: u32) {
        if matches!(self.state(), StreamState::Closed) {
            return;
        }
        if fade_out_ms == 0 {
            self.finalize_stop();
            return;
        }
        let dst_rate = self.resampler.lock().map(|r| r.decoder().rate()).unwrap_or(44100);
        self.fade_duration_frames
            .store(self.fade_duration_frames_for(fade_out_ms, dst_rate), Ordering::Relaxed);
        self.fade_state.store(FadeState::Out as u8, Ordering::Relaxed);
    }

    fn finalize_stop(&self) {
        if let Ok(mut r) = self.resampler.lock() {
            r.rewind();
        }
        self.set_state(StreamState::Stopped);
        self.fade_state.store(FadeState::None as u8, Ordering::Relaxed);
        self.fade_gain_bits.store(1.0f32.to_bits(), Ordering::Relaxed);
        if let Ok(mut cb) = self.finish_callback.lock() {
            if let Some(cb) = cb.as_mut() {
                cb();
            }
        }
    }

    pub fn pause(&self, fade_out_ms: u32) {
        if self.state() != StreamState::Playing {
            return;
        }
        if fade_out_ms == 0 {
            self.set_state(StreamState::Paused);
            return;
        }
        let dst_rate = self.resampler.lock().map(|r| r.decoder().rate()).unwrap_or(44100);
        self.fade_duration_frames
            .store(self.fade_duration_frames_for(fade_out_ms, dst_rate), Ordering::Relaxed);
        self.fade_state.store(FadeState::Out as u8, Ordering::Relaxed);
    }

    #[must_use]
    pub fn resume(&self, fade_in_ms: u32) -> bool {
        if self.state() != StreamState::Paused {
            return self.state() == StreamState::Playing;
        }
        if fade_in_ms > 0 {
            let dst_rate = self.resampler.lock().map(|r| r.decoder().rate()).unwrap_or(44100);
            self.fade_duration_frames
                .store(self.fade_duration_frames_for(fade_in_ms, dst_rate), Ordering::Relaxed);
            self.fade_state.store(FadeState::In as u8, Ordering::Relaxed);
            self.fade_gain_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
        }
        self.set_state(StreamState::Playing);
        true
    }

    pub fn rewind(&self) -> bool {
        self.playback_tick.store(0, Ordering::Relaxed);
        self.resampler.lock().map(|mut r| r.rewind()).unwrap_or(false)
    }

    pub fn set_volume(&self, v: f32) {
        self.volume_bits.store(v.max(0.0).to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_stereo_position(&self, p: f32) {
        self.pan_bits.store(p.clamp(-1.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn stereo_position(&self) -> f32 {
        f32::from_bits(self.pan_bits.load(Ordering::Relaxed))
    }

    pub fn mute(&self) {
        self.muted.store(true, Ordering::Relaxed);
    }

    pub fn unmute(&self) {
        self.muted.store(false, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self.state(), StreamState::Playing | StreamState::Paused)
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state() == StreamState::Paused
    }

    #[must_use]
    pub fn duration(&self) -> u64 {
        self.resampler.lock().map(|r| r.decoder().duration()).unwrap_or(0)
    }

    pub fn seek_to_time(&self, micros: u64) -> bool {
        self.resampler.lock().map(|mut r| r.seek_to_time(micros)).unwrap_or(false)
    }

    pub fn set_finish_callback(&self, f: impl FnMut() + Send + 'static) {
        if let Ok(mut cb) = self.finish_callback.lock() {
            *cb = Some(Box::new(f));
        }
    }

    pub fn remove_finish_callback(&self) {
        if let Ok(mut cb) = self.finish_callback.lock() {
            *cb = None;
        }
    }

    pub fn set_loop_callback(&self, f: impl FnMut(u32) + Send + 'static) {
        if let Ok(mut cb) = self.loop_callback.lock() {
            *cb = Some(Box::new(f));
        }
    }

    pub fn remove_loop_callback(&self) {
        if let Ok(mut cb) = self.loop_callback.lock() {
            *cb = None;
        }
    }

    /// Append-only add with removal by pointer identity; publishes a new
    /// immutable snapshot so the callback thread's reads stay lock-free.
    pub fn add_processor(&self, processor: Arc<dyn Processor>) {
        self.processors.rcu(|current| {
            let mut next = (**current).clone();
            next.push(processor.clone());
            next
        });
    }

    pub fn remove_processor(&self, processor: &Arc<dyn Processor>) {
        self.processors.rcu(|current| {
            current
                .iter()
                .filter(|p| !Arc::ptr_eq(p, processor))
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    pub fn clear_processors(&self) {
        self.processors.store(Arc::new(Vec::new()));
    }

    fn advance_fade(&self, frames: usize) -> f32 {
        let state = FadeState::from_u8(self.fade_state.load(Ordering::Relaxed));
        if state == FadeState::None {
            return f32::from_bits(self.fade_gain_bits.load(Ordering::Relaxed));
        }
        let duration = self.fade_duration_frames.load(Ordering::Relaxed).max(1);
        let mut gain = f32::from_bits(self.fade_gain_bits.load(Ordering::Relaxed));
        let delta = frames as f32 / duration as f32;
        match state {
            FadeState::In => {
                gain = (gain + delta).min(1.0);
                self.fade_gain_bits.store(gain.to_bits(), Ordering::Relaxed);
                if gain >= 1.0 {
                    self.fade_state.store(FadeState::None as u8, Ordering::Relaxed);
                }
            }
            FadeState::Out => {
                gain = (gain - delta).max(0.0);
                self.fade_gain_bits.store(gain.to_bits(), Ordering::Relaxed);
                if gain <= 0.0 {
                    self.fade_state.store(FadeState::None as u8, Ordering::Relaxed);
                    if self.state() == StreamState::Paused {
                        // fade-out-to-pause already landed in Paused via `pause()`.
                    } else {
                        self.finalize_stop();
                    }
                }
            }
            FadeState::None => unreachable!(),
        }
        gain
    }

    /// §4.6.2 pull protocol: produce up to `n_frames` frames (at
    /// `device_channels`) into `dst`, applying loop/finish semantics, the
    /// processor chain, fade envelope, stereo attenuation, volume, and mute.
    pub fn pull(&self, dst: &mut [f32], n_frames: usize, device_channels: u8) -> usize {
        let state = self.state();
        if matches!(state, StreamState::Closed | StreamState::Stopped) {
            return 0;
        }
        if state == StreamState::Paused {
            return 0;
        }

        let channels = device_channels.max(1) as usize;
        let requested = n_frames * channels;
        let buf = &mut dst[..requested.min(dst.len())];

        let mut produced = {
            let mut resampler = match self.resampler.lock() {
                Ok(r) => r,
                Err(_) => return 0,
            };
            resampler.pull(buf)
        };

        if produced < requested {
            match self.handle_iteration_boundary(buf, &mut produced, channels) {
                IterationOutcome::Looped { next_iteration } => {
                    if let Ok(mut cb) = self.loop_callback.lock() {
                        if let Some(cb) = cb.as_mut() {
                            cb(next_iteration);
                        }
                    }
                }
                IterationOutcome::Finished => {
                    self.finalize_stop();
                }
                IterationOutcome::Continue => {}
            }
        }

        let frames_out = produced / channels;
        for slot in buf[produced..].iter_mut() {
            *slot = 0.0;
        }

        let processors = self.processors.load();
        for p in processors.iter() {
            p.process(&mut buf[..produced], device_channels);
        }

        let fade_gain = self.advance_fade(frames_out);
        let volume = self.volume();
        let pan = self.stereo_position();
        let muted = self.is_muted();
        let left_gain = if pan > 0.0 { 1.0 - pan } else { 1.0 };
        let right_gain = if pan < 0.0 { 1.0 + pan } else { 1.0 };

        if muted {
            buf[..produced].fill(0.0);
        } else if channels >= 2 {
            for frame in buf[..produced].chunks_exact_mut(channels) {
                frame[0] *= fade_gain * volume * left_gain;
                frame[1] *= fade_gain * volume * right_gain;
                for s in frame.iter_mut().skip(2) {
                    *s *= fade_gain * volume;
                }
            }
        } else {
            for s in buf[..produced].iter_mut() {
                *s *= fade_gain * volume;
            }
        }

        self.playback_tick.fetch_add(frames_out as u64, Ordering::Relaxed);
        frames_out
    }

    fn handle_iteration_boundary(&self, buf: &mut [f32], produced: &mut usize, channels: usize) -> IterationOutcome {
        let remaining = self.iterations_remaining.load(Ordering::Relaxed);
        let infinite = remaining == 0;
        let more_iterations = infinite || remaining > 1;

        if !more_iterations {
            return IterationOutcome::Finished;
        }

        if !infinite {
            self.iterations_remaining.store(remaining - 1, Ordering::Relaxed);
        }
        let next_iteration = self.current_iteration.fetch_add(1, Ordering::Relaxed) + 1;

        let rewound = self.resampler.lock().map(|mut r| r.rewind()).unwrap_or(false);
        if !rewound {
            return IterationOutcome::Finished;
        }

        let shortfall = buf.len() - *produced;
        let fill_result = {
            let mut resampler = match self.resampler.lock() {
                Ok(r) => r,
                Err(_) => return IterationOutcome::Finished,
            };
            resampler.pull(&mut buf[*produced..*produced + shortfall])
        };
        *produced += fill_result;
        let _ = channels;
        IterationOutcome::Looped { next_iteration }
    }

    /// The decoder's native sample rate, needed by device switching to turn
    /// a captured `playback_tick` back into a time offset for `seek_to_time`.
    pub fn decoder_rate(&self) -> u32 {
        self.resampler.lock().map(|r| r.decoder().rate()).unwrap_or(44100)
    }
}

/// Everything `capture_state`/`restore_state` move across a device switch.
/// Plain data: no lock, no decoder reference.
#[derive(Debug, Clone, Copy)]
pub struct StreamSnapshot {
    pub playback_tick: u64,
    pub playback_start_tick: u64,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    pub fade_state: u8,
    pub fade_gain: f32,
    pub fade_duration_frames: u32,
    pub iterations_remaining: u32,
    pub current_iteration: u32,
    pub state: u8,
}

impl AudioStream {
    #[must_use]
    pub fn capture_state(&self) -> StreamSnapshot {
        StreamSnapshot {
            playback_tick: self.playback_tick.load(Ordering::Acquire),
            playback_start_tick: self.playback_start_tick.load(Ordering::Acquire),
            volume: self.volume(),
            pan: self.stereo_position(),
            muted: self.is_muted(),
            fade_state: self.fade_state.load(Ordering::Acquire),
            fade_gain: f32::from_bits(self.fade_gain_bits.load(Ordering::Acquire)),
            fade_duration_frames: self.fade_duration_frames.load(Ordering::Acquire),
            iterations_remaining: self.iterations_remaining.load(Ordering::Acquire),
            current_iteration: self.current_iteration.load(Ordering::Acquire),
            state: self.state.load(Ordering::Acquire),
        }
    }

    /// Writes a previously captured snapshot back into the stream. The
    /// caller is expected to have already repositioned the decoder via
    /// `seek_to_time(snapshot.playback_tick / old_rate)`.
    pub fn restore_state(&self, snapshot: StreamSnapshot) {
        self.playback_tick.store(snapshot.playback_tick, Ordering::Release);
        self.playback_start_tick.store(snapshot.playback_start_tick, Ordering::Release);
        self.set_volume(snapshot.volume);
        self.set_stereo_position(snapshot.pan);
        if snapshot.muted {
            self.mute();
        } else {
            self.unmute();
        }
        self.fade_state.store(snapshot.fade_state, Ordering::Release);
        self.fade_gain_bits.store(snapshot.fade_gain.to_bits(), Ordering::Release);
        self.fade_duration_frames.store(snapshot.fade_duration_frames, Ordering::Release);
        self.iterations_remaining.store(snapshot.iterations_remaining, Ordering::Release);
        self.current_iteration.store(snapshot.current_iteration, Ordering::Release);
        self.state.store(snapshot.state, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonoplex_decode::{IoStream, Result as DecodeResult};

    struct SilentDecoder {
        remaining: usize,
        open: bool,
    }

    impl Decoder for SilentDecoder {
        fn open(&mut self, _stream: Box<dyn IoStream>) -> DecodeResult<()> {
            self.open = true;
            Ok(())
        }
        fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
            let n = dst.len().min(self.remaining);
            for s in dst.iter_mut().take(n) {
                *s = 1.0;
            }
            self.remaining -= n;
            *call_again = self.remaining > 0;
            n
        }
        fn rewind(&mut self) -> bool {
            self.remaining = 100;
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
            "silent"
        }
        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn make_stream(remaining: usize) -> AudioStream {
        let decoder = Box::new(SilentDecoder { remaining, open: true });
        let source = AudioSource::from_decoder(decoder);
        AudioStream::new(source, 2, 44100)
    }

    #[test]
    fn closed_stream_pull_returns_zero() {
        let stream = make_stream(100);
        let mut out = vec![0.0f32; 20];
        assert_eq!(stream.pull(&mut out, 10, 2), 0);
    }

    #[test]
    fn open_then_play_transitions_to_playing() {
        let stream = make_stream(100);
        stream.open().unwrap();
        assert!(stream.play(1, 0));
        assert!(stream.is_playing());
        assert!(!stream.is_paused());
    }

    #[test]
    fn pause_then_resume_is_continuous() {
        let stream = make_stream(1000);
        stream.open().unwrap();
        stream.play(1, 0);
        stream.pull(&mut vec![0.0f32; 20], 10, 2);
        stream.pause(0);
        assert!(stream.is_paused());
        assert_eq!(stream.pull(&mut vec![0.0f32; 20], 10, 2), 0);
        assert!(stream.resume(0));
        assert!(stream.is_playing());
    }

    #[test]
    fn stop_rewinds_decoder_and_sets_stopped() {
        let stream = make_stream(1000);
        stream.open().unwrap();
        stream.play(1, 0);
        stream.pull(&mut vec![0.0f32; 20], 10, 2);
        stream.stop(0);
        assert!(!stream.is_playing());
    }

    #[test]
    fn finite_iteration_finish_fires_finish_callback() {
        let stream = Arc::new(make_stream(4));
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        stream.set_finish_callback(move || {
            fired_clone.store(true, Ordering::SeqCst);
        });
        stream.open().unwrap();
        stream.play(1, 0);
        let mut out = vec![0.0f32; 8];
        stream.pull(&mut out, 4, 2);
        assert!(fired.load(Ordering::SeqCst));
        assert!(!stream.is_playing());
    }

    #[test]
    fn multi_iteration_loop_callback_fires_between_iterations() {
        let stream = Arc::new(make_stream(4));
        let looped = Arc::new(AtomicBool::new(false));
        let looped_clone = looped.clone();
        stream.set_loop_callback(move |_iter| {
            looped_clone.store(true, Ordering::SeqCst);
        });
        stream.open().unwrap();
        stream.play(2, 0);
        let mut out = vec![0.0f32; 16];
        stream.pull(&mut out, 8, 2);
        assert!(looped.load(Ordering::SeqCst));
    }

    #[test]
    fn set_volume_and_mute_affect_pull_output() {
        let stream = make_stream(1000);
        stream.open().unwrap();
        stream.play(1, 0);
        stream.set_volume(0.0);
        let mut out = vec![1.0f32; 8];
        stream.pull(&mut out, 4, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
