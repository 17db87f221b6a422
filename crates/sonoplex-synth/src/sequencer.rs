//! Standard MIDI File sequencing: parses `MThd`/`MTrk` chunks into a flat,
//! time-ordered event list and renders it through a small additive
//! sine-voice bank standing in for a full OPL FM emulator.
//!
//! MUS and XMI share this module's event model per the source format (both
//! are General MIDI-adjacent event streams) but are not independently
//! parsed here; only Standard MIDI File input is decoded today.

use crate::error::{Error, Result};
use sonoplex_decode::{Decoder, IoStream};

const OUTPUT_RATE: u32 = 44100;
const MAX_VOICES: usize = 16;

#[derive(Debug, Clone, Copy)]
struct ScheduledEvent {
    tick: u64,
    kind: EventKind,
}

#[derive(Debug, Clone, Copy)]
enum EventKind {
    NoteOn { note: u8 },
    NoteOff { note: u8 },
}

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    note: Option<u8>,
    phase: f32,
}

fn midi_note_hz(note: u8) -> f32 {
    440.0 * 2f32.powf((f32::from(note) - 69.0) / 12.0)
}

fn read_vlq(data: &[u8], pos: &mut usize) -> u32 {
    let mut value = 0u32;
    loop {
        let Some(&byte) = data.get(*pos) else { break };
        *pos += 1;
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            break;
        }
    }
    value
}

/// Parse a single `MTrk` chunk body into `(tick, event)` pairs. Only
/// Note On (0x9n) and Note Off (0x8n, and 0x9n with velocity 0) are
/// retained; all other MIDI and meta events are skipped by their declared
/// length (or to the next status byte for running status).
fn parse_track(data: &[u8]) -> Vec<ScheduledEvent> {
    let mut events = Vec::new();
    let mut pos = 0usize;
    let mut tick: u64 = 0;
    let mut running_status = 0u8;

    while pos < data.len() {
        let delta = read_vlq(data, &mut pos);
        tick += u64::from(delta);

        let Some(&byte) = data.get(pos) else { break };
        let status = if byte & 0x80 != 0 {
            pos += 1;
            running_status = byte;
            byte
        } else {
            running_status
        };

        match status & 0xF0 {
            0x80 => {
                let note = *data.get(pos).unwrap_or(&0);
                pos += 2;
                events.push(ScheduledEvent {
                    tick,
                    kind: EventKind::NoteOff { note },
                });
            }
            0x90 => {
                let note = *data.get(pos).unwrap_or(&0);
                let velocity = *data.get(pos + 1).unwrap_or(&0);
                pos += 2;
                let kind = if velocity == 0 {
                    EventKind::NoteOff { note }
                } else {
                    EventKind::NoteOn { note }
                };
                events.push(ScheduledEvent { tick, kind });
            }
            0xA0 | 0xB0 | 0xE0 => pos += 2,
            0xC0 | 0xD0 => pos += 1,
            0xF0 => {
                if status == 0xFF {
                    let _meta_type = *data.get(pos).unwrap_or(&0);
                    pos += 1;
                    let len = read_vlq(data, &mut pos) as usize;
                    pos += len;
                } else {
                    // SysEx or other F0-class event: length-prefixed.
                    let len = read_vlq(data, &mut pos) as usize;
                    pos += len;
                }
            }
            _ => pos += 1,
        }
    }

    events
}

/// Decoder for Standard MIDI Files, rendering note events through a fixed
/// 16-voice additive sine bank at 44100 Hz stereo.
pub struct SequencerDecoder {
    events: Vec<ScheduledEvent>,
    ticks_per_quarter: u32,
    micros_per_quarter: u32,
    next_event: usize,
    current_tick: u64,
    samples_until_next_tick: f64,
    voices: [Voice; MAX_VOICES],
    open: bool,
}

impl Default for SequencerDecoder {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            ticks_per_quarter: 480,
            micros_per_quarter: 500_000,
            next_event: 0,
            current_tick: 0,
            samples_until_next_tick: 0.0,
            voices: [Voice::default(); MAX_VOICES],
            open: false,
        }
    }
}

impl SequencerDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut header = [0u8; 4];
        let n = stream.read(&mut header);
        stream.seek(p0, sonoplex_decode::Whence::Set);
        n == 4 && &header == b"MThd"
    }

    fn samples_per_tick(&self) -> f64 {
        let seconds_per_tick =
            f64::from(self.micros_per_quarter) / 1_000_000.0 / f64::from(self.ticks_per_quarter);
        seconds_per_tick * f64::from(OUTPUT_RATE)
    }

    fn apply_event(&mut self, kind: EventKind) {
        match kind {
            EventKind::NoteOn { note } => {
                if let Some(voice) = self.voices.iter_mut().find(|v| v.note.is_none()) {
                    voice.note = Some(note);
                    voice.phase = 0.0;
                }
            }
            EventKind::NoteOff { note } => {
                for voice in &mut self.voices {
                    if voice.note == Some(note) {
                        voice.note = None;
                    }
                }
            }
        }
    }

    fn advance_one_sample(&mut self) -> f32 {
        if self.samples_until_next_tick <= 0.0 {
            while let Some(event) = self.events.get(self.next_event).copied() {
                if event.tick > self.current_tick {
                    break;
                }
                self.apply_event(event.kind);
                self.next_event += 1;
            }
            self.current_tick += 1;
            self.samples_until_next_tick = self.samples_per_tick();
        }
        self.samples_until_next_tick -= 1.0;

        let active = self.voices.iter().filter(|v| v.note.is_some()).count().max(1);
        let mut mix = 0.0f32;
        for voice in &mut self.voices {
            let Some(note) = voice.note else { continue };
            let hz = midi_note_hz(note);
            voice.phase += hz / OUTPUT_RATE as f32;
            voice.phase -= voice.phase.floor();
            mix += (voice.phase * std::f32::consts::TAU).sin();
        }
        mix / active as f32 * 0.2
    }
}

impl Decoder for SequencerDecoder {
    fn open(&mut self, mut stream: Box<dyn IoStream>) -> sonoplex_decode::Result<()> {
        let mut all = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = stream.read(&mut buf);
            if n == 0 {
                break;
            }
            all.extend_from_slice(&buf[..n]);
        }

        if all.len() < 14 || &all[0..4] != b"MThd" {
            return Err(sonoplex_decode::Error::format("not a Standard MIDI File"));
        }
        let ticks_per_quarter = u16::from_be_bytes([all[12], all[13]]) as u32;

        let mut events = Vec::new();
        let mut pos = 8 + u32::from_be_bytes([all[4], all[5], all[6], all[7]]) as usize;
        while pos + 8 <= all.len() {
            let chunk_id = &all[pos..pos + 4];
            let size =
                u32::from_be_bytes([all[pos + 4], all[pos + 5], all[pos + 6], all[pos + 7]]) as usize;
            let body_start = pos + 8;
            let body_end = (body_start + size).min(all.len());
            if chunk_id == b"MTrk" {
                events.extend(parse_track(&all[body_start..body_end]));
            }
            pos = body_end;
        }
        events.sort_by_key(|e| e.tick);

        self.events = events;
        self.ticks_per_quarter = ticks_per_quarter.max(1);
        self.micros_per_quarter = 500_000;
        self.next_event = 0;
        self.current_tick = 0;
        self.samples_until_next_tick = 0.0;
        self.voices = [Voice::default(); MAX_VOICES];
        self.open = true;
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        if !self.open {
            return 0;
        }
        let frames = dst.len() / 2;
        for frame in 0..frames {
            let sample = self.advance_one_sample();
            dst[frame * 2] = sample;
            dst[frame * 2 + 1] = sample;
        }
        *call_again = self.next_event < self.events.len();
        frames * 2
    }

    fn rewind(&mut self) -> bool {
        self.next_event = 0;
        self.current_tick = 0;
        self.samples_until_next_tick = 0.0;
        self.voices = [Voice::default(); MAX_VOICES];
        true
    }

    fn seek_to_time(&mut self, micros: u64) -> bool {
        self.rewind();
        let target_samples = micros * u64::from(OUTPUT_RATE) / 1_000_000;
        let mut sink = vec![0.0f32; 2];
        let mut produced = 0u64;
        while produced < target_samples {
            let mut call_again = false;
            self.decode(&mut sink, &mut call_again, 2);
            produced += 1;
            if !call_again && self.next_event >= self.events.len() {
                break;
            }
        }
        true
    }

    fn duration(&self) -> u64 {
        let Some(last) = self.events.last() else {
            return 0;
        };
        let seconds_per_tick =
            f64::from(self.micros_per_quarter) / 1_000_000.0 / f64::from(self.ticks_per_quarter);
        (last.tick as f64 * seconds_per_tick * 1_000_000.0) as u64
    }

    fn channels(&self) -> u8 {
        2
    }

    fn rate(&self) -> u32 {
        OUTPUT_RATE
    }

    fn name(&self) -> &str {
        "midi"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[must_use]
pub fn sequence_error(detail: impl Into<String>) -> Error {
    Error::sequence(detail)
}

pub type SequenceResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use sonoplex_decode::io::MemoryStream;

    fn build_smf(ticks_per_quarter: u16, track: &[u8]) -> Vec<u8> {
        let mut file = Vec::new();
        file.extend_from_slice(b"MThd");
        file.extend_from_slice(&6u32.to_be_bytes());
        file.extend_from_slice(&0u16.to_be_bytes()); // format 0
        file.extend_from_slice(&1u16.to_be_bytes()); // one track
        file.extend_from_slice(&ticks_per_quarter.to_be_bytes());

        file.extend_from_slice(b"MTrk");
        file.extend_from_slice(&(track.len() as u32).to_be_bytes());
        file.extend_from_slice(track);
        file
    }

    #[test]
    fn sniff_recognizes_mthd_magic() {
        let data = build_smf(480, &[0x00, 0xFF, 0x2F, 0x00]);
        let mut stream = MemoryStream::new(data);
        assert!(SequencerDecoder::sniff(&mut stream));
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn note_on_then_off_produces_audible_then_silent_output() {
        // delta 0, note-on ch0 note 69 vel 100; delta 480, note-off; end-of-track.
        let track = [
            0x00, 0x90, 69, 100, // note on A4
            0x83, 0x60, 0x80, 69, 0, // delta 480 (VLQ 0x83 0x60), note off
            0x00, 0xFF, 0x2F, 0x00, // end of track
        ];
        let data = build_smf(480, &track);
        let mut decoder = SequencerDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        assert_eq!(decoder.channels(), 2);
        assert_eq!(decoder.rate(), 44100);

        let mut out = [0.0f32; 2000];
        let mut call_again = true;
        let produced = decoder.decode(&mut out, &mut call_again, 2);
        assert_eq!(produced, 2000);
        assert!(out.iter().any(|&s| s.abs() > 0.0));
    }

    #[test]
    fn rewind_resets_voices_and_schedule() {
        let track = [0x00, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00];
        let data = build_smf(480, &track);
        let mut decoder = SequencerDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        let mut out = [0.0f32; 8];
        let mut call_again = true;
        decoder.decode(&mut out, &mut call_again, 2);
        assert!(decoder.rewind());
        assert_eq!(decoder.next_event, 0);
    }
}
