//! PC-speaker synthetic decoder: a mutex-guarded tone queue consumed by a
//! phase-accumulator square-wave generator.

use crate::mml::{self, Articulation, Tone};
use sonoplex_decode::{Decoder, IoStream, Result};
use std::collections::VecDeque;
use std::sync::Mutex;

const AMPLITUDE: f32 = 0.3;
const OUTPUT_RATE: u32 = 44100;

/// One queued tone, expressed in samples rather than milliseconds once it
/// reaches the decoder (the queue itself stores milliseconds; the decoder
/// converts on pop so the sample rate stays a decoder-local concern).
#[derive(Debug, Clone, Copy)]
struct QueuedTone {
    hz: f32,
    remaining_samples: u64,
}

/// Mutex-guarded deque of tones, shared between control threads (via
/// [`PcSpeakerStream`]) and the real-time callback (via [`PcSpeakerDecoder`]).
#[derive(Default)]
pub struct ToneQueue {
    inner: Mutex<VecDeque<Tone>>,
}

impl ToneQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, tone: Tone) {
        if let Ok(mut q) = self.inner.lock() {
            q.push_back(tone);
        }
    }

    fn try_pop(&self) -> Option<Tone> {
        self.inner.try_lock().ok()?.pop_front()
    }

    fn clear(&self) {
        if let Ok(mut q) = self.inner.lock() {
            q.clear();
        }
    }
}

/// Control-thread handle to the tone queue: `sound`/`beep`/`silence`/
/// `clear_queue`/`play_mml`/`get_mml_warnings`, per the `pc_speaker_stream`
/// contract layered on top of the standard audio stream.
#[derive(Default)]
pub struct PcSpeakerStream {
    queue: std::sync::Arc<ToneQueue>,
    last_mml_warnings: Mutex<Vec<String>>,
}

impl PcSpeakerStream {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: std::sync::Arc::new(ToneQueue::new()),
            last_mml_warnings: Mutex::new(Vec::new()),
        }
    }

    /// A handle to the underlying queue, for constructing the paired decoder.
    #[must_use]
    pub fn queue_handle(&self) -> std::sync::Arc<ToneQueue> {
        self.queue.clone()
    }

    pub fn sound(&self, hz: f32, duration_ms: u32) {
        self.queue.push(Tone { hz, duration_ms });
    }

    pub fn beep(&self) {
        self.sound(1000.0, 200);
    }

    pub fn silence(&self, duration_ms: u32) {
        self.sound(0.0, duration_ms);
    }

    pub fn clear_queue(&self) {
        self.queue.clear();
    }

    /// Compile and enqueue `text`. Returns the number of tones enqueued.
    ///
    /// # Errors
    ///
    /// Returns an [`mml::MmlError`] only when `strict` is `true`.
    pub fn play_mml(&self, text: &str, strict: bool) -> std::result::Result<usize, mml::MmlError> {
        let program = mml::parse_mml(text, strict)?;
        let tones = mml::events_to_tones(&program.events, Articulation::Normal);
        let count = tones.len();
        for tone in &tones {
            self.queue.push(*tone);
        }
        if let Ok(mut warnings) = self.last_mml_warnings.lock() {
            *warnings = program.warnings;
        }
        Ok(count)
    }

    #[must_use]
    pub fn get_mml_warnings(&self) -> Vec<String> {
        self.last_mml_warnings.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

/// Decoder half of the PC-speaker stream: pulls tones from the shared
/// queue and renders them as a phase-continuous square wave.
pub struct PcSpeakerDecoder {
    queue: std::sync::Arc<ToneQueue>,
    current: Option<QueuedTone>,
    phase: f32,
    open: bool,
}

impl PcSpeakerDecoder {
    #[must_use]
    pub fn new(queue: std::sync::Arc<ToneQueue>) -> Self {
        Self {
            queue,
            current: None,
            phase: -1.0,
            open: false,
        }
    }

    fn advance_tone(&mut self) {
        loop {
            if let Some(tone) = self.current {
                if tone.remaining_samples > 0 {
                    return;
                }
            }
            match self.queue.try_pop() {
                Some(tone) => {
                    let samples =
                        (u64::from(tone.duration_ms) * u64::from(OUTPUT_RATE)) / 1000;
                    self.current = Some(QueuedTone {
                        hz: tone.hz,
                        remaining_samples: samples,
                    });
                }
                None => {
                    self.current = None;
                    return;
                }
            }
        }
    }
}

impl Decoder for PcSpeakerDecoder {
    fn open(&mut self, _stream: Box<dyn IoStream>) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, device_channels: u8) -> usize {
        *call_again = true;
        let channels = device_channels.max(1) as usize;
        let frames = dst.len() / channels;

        for frame in 0..frames {
            self.advance_tone();
            let sample = match self.current.as_mut() {
                Some(tone) if tone.hz > 0.0 => {
                    self.phase += 2.0 * tone.hz / OUTPUT_RATE as f32;
                    if self.phase >= 1.0 {
                        self.phase -= 2.0;
                    }
                    tone.remaining_samples -= 1;
                    if self.phase >= 0.0 { AMPLITUDE } else { -AMPLITUDE }
                }
                Some(tone) => {
                    tone.remaining_samples -= 1;
                    0.0
                }
                None => 0.0,
            };
            for ch in 0..channels {
                dst[frame * channels + ch] = sample;
            }
        }

        frames * channels
    }

    fn rewind(&mut self) -> bool {
        self.current = None;
        self.phase = -1.0;
        true
    }

    fn seek_to_time(&mut self, _micros: u64) -> bool {
        false
    }

    fn duration(&self) -> u64 {
        0
    }

    fn channels(&self) -> u8 {
        2
    }

    fn rate(&self) -> u32 {
        OUTPUT_RATE
    }

    fn name(&self) -> &str {
        "pc_speaker"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
