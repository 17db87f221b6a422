//! Chip-emulator-driven decoders: CMF, OPB, and VGM/VGZ.
//!
//! Per spec these formats are "chip-emulator driven, always stereo 44100";
//! reimplementing the OPL/YM chips bit-exactly is explicitly out of scope —
//! only the container parsing and the pull-based decoder contract matter
//! here. Each decoder turns its event/command stream into note-on/note-off
//! activity against a small additive voice bank, the same stand-in strategy
//! `sequencer::SequencerDecoder` uses for Standard MIDI Files.

use crate::error::{Error, Result as SynthResult};
use sonoplex_decode::{Decoder, IoStream, Whence};
use std::io::Read as _;

const OUTPUT_RATE: u32 = 44100;
const MAX_VOICES: usize = 9; // one per OPL2 melodic channel

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    hz: f32,
    phase: f32,
    active: bool,
}

impl Voice {
    fn render(&mut self) -> f32 {
        if !self.active || self.hz <= 0.0 {
            return 0.0;
        }
        self.phase += self.hz / OUTPUT_RATE as f32;
        self.phase -= self.phase.floor();
        (self.phase * std::f32::consts::TAU).sin() * 0.5
    }
}

fn mix_voices(voices: &mut [Voice; MAX_VOICES]) -> f32 {
    let active = voices.iter().filter(|v| v.active).count().max(1);
    let mut mix = 0.0f32;
    for v in voices.iter_mut() {
        mix += v.render();
    }
    mix / active as f32 * 0.5
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

fn read_all(mut stream: Box<dyn IoStream>) -> Vec<u8> {
    let mut all = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf);
        if n == 0 {
            break;
        }
        all.extend_from_slice(&buf[..n]);
    }
    all
}

// ---------------------------------------------------------------------
// Shared CMF/OPB event track: delta-time VLQ + MIDI-shaped status byte,
// same skeleton as sequencer::parse_track but timed in ticks-per-second
// rather than ticks-per-quarter-note + tempo.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ScheduledEvent {
    tick: u64,
    note: u8,
    on: bool,
}

fn parse_event_track(data: &[u8]) -> Vec<ScheduledEvent> {
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
                events.push(ScheduledEvent { tick, note, on: false });
            }
            0x90 => {
                let note = *data.get(pos).unwrap_or(&0);
                let velocity = *data.get(pos + 1).unwrap_or(&0);
                pos += 2;
                events.push(ScheduledEvent { tick, note, on: velocity != 0 });
            }
            0xA0 | 0xB0 | 0xE0 => pos += 2,
            0xC0 | 0xD0 => pos += 1,
            0xF0 => {
                if status == 0xFF {
                    pos += 1;
                    let len = read_vlq(data, &mut pos) as usize;
                    pos += len;
                } else {
                    let len = read_vlq(data, &mut pos) as usize;
                    pos += len;
                }
            }
            _ => pos += 1,
        }
    }

    events
}

fn midi_note_hz(note: u8) -> f32 {
    440.0 * 2f32.powf((f32::from(note) - 69.0) / 12.0)
}

/// Shared playback state for an event-track chip format (CMF/OPB): a
/// sorted `ScheduledEvent` list driven at `ticks_per_second` against the
/// `MAX_VOICES`-wide additive bank.
struct EventTrackPlayer {
    events: Vec<ScheduledEvent>,
    ticks_per_second: u32,
    next_event: usize,
    current_tick: u64,
    samples_until_next_tick: f64,
    voices: [Voice; MAX_VOICES],
}

impl EventTrackPlayer {
    fn new(events: Vec<ScheduledEvent>, ticks_per_second: u32) -> Self {
        Self {
            events,
            ticks_per_second: ticks_per_second.max(1),
            next_event: 0,
            current_tick: 0,
            samples_until_next_tick: 0.0,
            voices: [Voice::default(); MAX_VOICES],
        }
    }

    fn samples_per_tick(&self) -> f64 {
        f64::from(OUTPUT_RATE) / f64::from(self.ticks_per_second)
    }

    fn apply_event(&mut self, ev: ScheduledEvent) {
        if ev.on {
            if let Some(v) = self.voices.iter_mut().find(|v| !v.active) {
                v.active = true;
                v.hz = midi_note_hz(ev.note);
                v.phase = 0.0;
            }
        } else {
            for v in &mut self.voices {
                if v.active && (v.hz - midi_note_hz(ev.note)).abs() < 0.01 {
                    v.active = false;
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
                self.apply_event(event);
                self.next_event += 1;
            }
            self.current_tick += 1;
            self.samples_until_next_tick = self.samples_per_tick();
        }
        self.samples_until_next_tick -= 1.0;
        mix_voices(&mut self.voices)
    }

    fn rewind(&mut self) {
        self.next_event = 0;
        self.current_tick = 0;
        self.samples_until_next_tick = 0.0;
        self.voices = [Voice::default(); MAX_VOICES];
    }

    fn duration_micros(&self) -> u64 {
        let Some(last) = self.events.last() else {
            return 0;
        };
        (last.tick as f64 / f64::from(self.ticks_per_second) * 1_000_000.0) as u64
    }

    fn finished(&self) -> bool {
        self.next_event >= self.events.len()
    }
}

fn decode_stereo(player: &mut EventTrackPlayer, dst: &mut [f32], call_again: &mut bool) -> usize {
    let frames = dst.len() / 2;
    for frame in 0..frames {
        let sample = player.advance_one_sample();
        dst[frame * 2] = sample;
        dst[frame * 2 + 1] = sample;
    }
    *call_again = !player.finished();
    frames * 2
}

// ---------------------------------------------------------------------
// CMF (Creative Music File)
// ---------------------------------------------------------------------

/// Decoder for Creative Music Format files (`CTMF` magic): a CMF header
/// gives ticks-per-second directly (no separate tempo meta-event), and the
/// event track uses the same delta-time + status-byte shape as Standard
/// MIDI File tracks.
pub struct CmfDecoder {
    player: Option<EventTrackPlayer>,
    open: bool,
}

impl Default for CmfDecoder {
    fn default() -> Self {
        Self { player: None, open: false }
    }
}

impl CmfDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut magic = [0u8; 4];
        let n = stream.read(&mut magic);
        stream.seek(p0, Whence::Set);
        n == 4 && &magic == b"CTMF"
    }

    fn parse(data: &[u8]) -> SynthResult<EventTrackPlayer> {
        if data.len() < 20 || &data[0..4] != b"CTMF" {
            return Err(Error::sequence("not a Creative Music File"));
        }
        let music_offset = u16::from_le_bytes([data[6], data[7]]) as usize;
        let ticks_per_second = u16::from_le_bytes([data[10], data[11]]).max(1) as u32;
        let track = data.get(music_offset..).unwrap_or(&[]);
        let events = parse_event_track(track);
        Ok(EventTrackPlayer::new(events, ticks_per_second))
    }
}

impl Decoder for CmfDecoder {
    fn open(&mut self, stream: Box<dyn IoStream>) -> sonoplex_decode::Result<()> {
        let data = read_all(stream);
        let player =
            Self::parse(&data).map_err(|e| sonoplex_decode::Error::format(e.to_string()))?;
        self.player = Some(player);
        self.open = true;
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        let Some(player) = self.player.as_mut() else { return 0 };
        decode_stereo(player, dst, call_again)
    }

    fn rewind(&mut self) -> bool {
        if let Some(player) = self.player.as_mut() {
            player.rewind();
            true
        } else {
            false
        }
    }

    fn seek_to_time(&mut self, micros: u64) -> bool {
        self.rewind();
        let target_samples = micros * u64::from(OUTPUT_RATE) / 1_000_000;
        let mut sink = [0.0f32; 2];
        let mut produced = 0u64;
        while produced < target_samples {
            let mut call_again = false;
            if self.decode(&mut sink, &mut call_again, 2) == 0 {
                break;
            }
            produced += 1;
        }
        true
    }

    fn duration(&self) -> u64 {
        self.player.as_ref().map_or(0, EventTrackPlayer::duration_micros)
    }

    fn channels(&self) -> u8 {
        2
    }

    fn rate(&self) -> u32 {
        OUTPUT_RATE
    }

    fn name(&self) -> &str {
        "cmf"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ---------------------------------------------------------------------
// OPB (OPL bytecode)
// ---------------------------------------------------------------------

/// Decoder for `OPBi`-tagged OPL bytecode streams. The container shape
/// mirrors CMF closely enough (fixed header + delta-time event track) that
/// it reuses [`EventTrackPlayer`]; a dedicated chip emulator is intentionally
/// out of scope.
pub struct OpbDecoder {
    player: Option<EventTrackPlayer>,
    open: bool,
}

impl Default for OpbDecoder {
    fn default() -> Self {
        Self { player: None, open: false }
    }
}

impl OpbDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut magic = [0u8; 4];
        let n = stream.read(&mut magic);
        stream.seek(p0, Whence::Set);
        n == 4 && &magic == b"OPBi"
    }

    fn parse(data: &[u8]) -> SynthResult<EventTrackPlayer> {
        if data.len() < 12 || &data[0..4] != b"OPBi" {
            return Err(Error::sequence("not an OPB stream"));
        }
        // 4-byte magic, 1-byte version, 4-byte LE event-track byte length,
        // then the event track itself. Ticks run at a fixed 1000 Hz clock.
        let track_len = u32::from_le_bytes([data[5], data[6], data[7], data[8]]) as usize;
        let start = 9usize;
        let end = (start + track_len).min(data.len());
        let events = parse_event_track(data.get(start..end).unwrap_or(&[]));
        Ok(EventTrackPlayer::new(events, 1000))
    }
}

impl Decoder for OpbDecoder {
    fn open(&mut self, stream: Box<dyn IoStream>) -> sonoplex_decode::Result<()> {
        let data = read_all(stream);
        let player =
            Self::parse(&data).map_err(|e| sonoplex_decode::Error::format(e.to_string()))?;
        self.player = Some(player);
        self.open = true;
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        let Some(player) = self.player.as_mut() else { return 0 };
        decode_stereo(player, dst, call_again)
    }

    fn rewind(&mut self) -> bool {
        if let Some(player) = self.player.as_mut() {
            player.rewind();
            true
        } else {
            false
        }
    }

    fn seek_to_time(&mut self, micros: u64) -> bool {
        self.rewind();
        let target_samples = micros * u64::from(OUTPUT_RATE) / 1_000_000;
        let mut sink = [0.0f32; 2];
        let mut produced = 0u64;
        while produced < target_samples {
            let mut call_again = false;
            if self.decode(&mut sink, &mut call_again, 2) == 0 {
                break;
            }
            produced += 1;
        }
        true
    }

    fn duration(&self) -> u64 {
        self.player.as_ref().map_or(0, EventTrackPlayer::duration_micros)
    }

    fn channels(&self) -> u8 {
        2
    }

    fn rate(&self) -> u32 {
        OUTPUT_RATE
    }

    fn name(&self) -> &str {
        "opb"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ---------------------------------------------------------------------
// VGM / VGZ
// ---------------------------------------------------------------------

const VGM_WAIT_60TH: u32 = 735;
const VGM_WAIT_50TH: u32 = 882;

/// One (wait, register-write-seen) step extracted from a VGM command
/// stream. The tone is derived from the most recent chip register write
/// rather than a real OPL/YM emulation — see module docs.
#[derive(Debug, Clone, Copy)]
struct VgmStep {
    wait_samples: u32,
    reg_hash: u32,
}

fn parse_vgm_commands(data: &[u8], start: usize) -> Vec<VgmStep> {
    let mut steps = Vec::new();
    let mut pos = start;
    let mut reg_hash = 0u32;

    while pos < data.len() {
        let op = data[pos];
        match op {
            0x66 => break, // end of sound data
            0x61 => {
                let n = u16::from_le_bytes([
                    *data.get(pos + 1).unwrap_or(&0),
                    *data.get(pos + 2).unwrap_or(&0),
                ]);
                steps.push(VgmStep { wait_samples: u32::from(n), reg_hash });
                pos += 3;
            }
            0x62 => {
                steps.push(VgmStep { wait_samples: VGM_WAIT_60TH, reg_hash });
                pos += 1;
            }
            0x63 => {
                steps.push(VgmStep { wait_samples: VGM_WAIT_50TH, reg_hash });
                pos += 1;
            }
            0x70..=0x7F => {
                steps.push(VgmStep {
                    wait_samples: u32::from(op & 0x0F) + 1,
                    reg_hash,
                });
                pos += 1;
            }
            0x80..=0x8F => {
                reg_hash = reg_hash.wrapping_add(0x2A).wrapping_mul(2654435761);
                steps.push(VgmStep {
                    wait_samples: u32::from(op & 0x0F),
                    reg_hash,
                });
                pos += 1;
            }
            0x50 | 0x4F => {
                let val = *data.get(pos + 1).unwrap_or(&0);
                reg_hash = reg_hash.wrapping_add(u32::from(val)).wrapping_mul(2654435761);
                pos += 2;
            }
            0x51 | 0x52 | 0x53 | 0x54 | 0x5A | 0x5B | 0x5C | 0x5D | 0x5E | 0x5F => {
                let reg = *data.get(pos + 1).unwrap_or(&0);
                let val = *data.get(pos + 2).unwrap_or(&0);
                reg_hash = reg_hash
                    .wrapping_add(u32::from(reg) << 8 | u32::from(val))
                    .wrapping_mul(2654435761);
                pos += 3;
            }
            0x67 => {
                // data block: 0x67 0x66 <type> <size u32le> <data...>
                let size = u32::from_le_bytes([
                    *data.get(pos + 3).unwrap_or(&0),
                    *data.get(pos + 4).unwrap_or(&0),
                    *data.get(pos + 5).unwrap_or(&0),
                    *data.get(pos + 6).unwrap_or(&0),
                ]) as usize;
                pos += 7 + size;
            }
            0xE0 => pos += 5, // seek PCM
            0x30..=0x3F | 0x4E => pos += 2,
            _ => pos += 1,
        }
    }

    steps
}

fn reg_hash_to_hz(hash: u32) -> f32 {
    if hash == 0 {
        return 0.0;
    }
    110.0 + (hash % 880) as f32
}

/// Decoder for VGM (and gzip-wrapped VGZ) chip-tracker captures. Only the
/// command stream's wait/register-write shape is parsed; tone generation
/// stands in for the OPL/YM/PSG chip emulator the original relies on.
pub struct VgmDecoder {
    steps: Vec<VgmStep>,
    header_total_samples: u32,
    next_step: usize,
    samples_until_next_step: u32,
    voice: Voice,
    total_produced: u64,
    open: bool,
}

impl Default for VgmDecoder {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            header_total_samples: 0,
            next_step: 0,
            samples_until_next_step: 0,
            voice: Voice::default(),
            total_produced: 0,
            open: false,
        }
    }
}

impl VgmDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut magic = [0u8; 4];
        let n = stream.read(&mut magic);
        stream.seek(p0, Whence::Set);
        if n == 4 && &magic == b"Vgm " {
            return true;
        }
        // VGZ: gzip-wrapped VGM, magic 1f 8b 08.
        stream.seek(p0, Whence::Set);
        let mut gz = [0u8; 3];
        let n = stream.read(&mut gz);
        stream.seek(p0, Whence::Set);
        n == 3 && gz == [0x1f, 0x8b, 0x08]
    }

    fn maybe_inflate(data: Vec<u8>) -> Vec<u8> {
        if data.len() >= 3 && data[0] == 0x1f && data[1] == 0x8b && data[2] == 0x08 {
            let mut out = Vec::new();
            if flate2::read::GzDecoder::new(&data[..]).read_to_end(&mut out).is_ok() {
                return out;
            }
        }
        data
    }

    fn parse(data: &[u8]) -> SynthResult<(Vec<VgmStep>, u32)> {
        let data = Self::maybe_inflate(data.to_vec());
        if data.len() < 0x40 || &data[0..4] != b"Vgm " {
            return Err(Error::sequence("not a VGM stream"));
        }
        let version = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let total_samples = u32::from_le_bytes([data[0x18], data[0x19], data[0x1a], data[0x1b]]);
        let data_offset = if version >= 0x150 && data.len() > 0x37 {
            let rel = u32::from_le_bytes([data[0x34], data[0x35], data[0x36], data[0x37]]);
            0x34 + rel as usize
        } else {
            0x40
        };
        let start = data_offset.min(data.len());
        let steps = parse_vgm_commands(&data, start);
        Ok((steps, total_samples))
    }

    fn computed_total_samples(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.wait_samples)).sum()
    }
}

impl Decoder for VgmDecoder {
    fn open(&mut self, stream: Box<dyn IoStream>) -> sonoplex_decode::Result<()> {
        let data = read_all(stream);
        let (steps, total_samples) =
            Self::parse(&data).map_err(|e| sonoplex_decode::Error::format(e.to_string()))?;
        self.steps = steps;
        self.header_total_samples = total_samples;
        self.next_step = 0;
        self.samples_until_next_step = 0;
        self.voice = Voice::default();
        self.total_produced = 0;
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
            if self.samples_until_next_step == 0 {
                if let Some(step) = self.steps.get(self.next_step).copied() {
                    self.voice.hz = reg_hash_to_hz(step.reg_hash);
                    self.voice.active = self.voice.hz > 0.0;
                    self.samples_until_next_step = step.wait_samples.max(1);
                    self.next_step += 1;
                } else {
                    *call_again = false;
                    return frame * 2;
                }
            }
            self.samples_until_next_step -= 1;
            let sample = self.voice.render();
            dst[frame * 2] = sample;
            dst[frame * 2 + 1] = sample;
            self.total_produced += 1;
        }
        *call_again = self.next_step < self.steps.len();
        frames * 2
    }

    fn rewind(&mut self) -> bool {
        self.next_step = 0;
        self.samples_until_next_step = 0;
        self.voice = Voice::default();
        self.total_produced = 0;
        true
    }

    fn seek_to_time(&mut self, micros: u64) -> bool {
        self.rewind();
        let target_samples = micros * u64::from(OUTPUT_RATE) / 1_000_000;
        let mut sink = [0.0f32; 2];
        while self.total_produced < target_samples {
            let mut call_again = false;
            if self.decode(&mut sink, &mut call_again, 2) == 0 {
                break;
            }
        }
        true
    }

    fn duration(&self) -> u64 {
        // Header reports 0 for some captures; the original falls back to
        // silent playback to compute it. We derive the same number cheaply
        // from the already-parsed wait total instead of re-decoding, since
        // no emulator state needs warming up here.
        let samples = if self.header_total_samples > 0 {
            u64::from(self.header_total_samples)
        } else {
            self.computed_total_samples()
        };
        samples * 1_000_000 / u64::from(OUTPUT_RATE)
    }

    fn channels(&self) -> u8 {
        2
    }

    fn rate(&self) -> u32 {
        OUTPUT_RATE
    }

    fn name(&self) -> &str {
        "vgm"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonoplex_decode::io::MemoryStream;

    fn build_cmf(ticks_per_second: u16, track: &[u8]) -> Vec<u8> {
        let mut file = vec![0u8; 20];
        file[0..4].copy_from_slice(b"CTMF");
        let music_offset = 20u16;
        file[6..8].copy_from_slice(&music_offset.to_le_bytes());
        file[10..12].copy_from_slice(&ticks_per_second.to_le_bytes());
        file.extend_from_slice(track);
        file
    }

    #[test]
    fn cmf_sniff_recognizes_magic() {
        let data = build_cmf(100, &[0x00, 0xFF, 0x2F, 0x00]);
        let mut stream = MemoryStream::new(data);
        assert!(CmfDecoder::sniff(&mut stream));
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn cmf_note_on_produces_audible_output() {
        let track = [0x00, 0x90, 69, 100, 0x64, 0x80, 69, 0];
        let data = build_cmf(100, &track);
        let mut decoder = CmfDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        assert_eq!(decoder.channels(), 2);
        assert_eq!(decoder.rate(), 44100);

        let mut out = [0.0f32; 400];
        let mut call_again = true;
        let produced = decoder.decode(&mut out, &mut call_again, 2);
        assert_eq!(produced, 400);
        assert!(out.iter().any(|&s| s.abs() > 0.0));
    }

    #[test]
    fn opb_sniff_recognizes_magic() {
        let mut file = vec![0u8; 9];
        file[0..4].copy_from_slice(b"OPBi");
        file[4] = 1;
        let mut stream = MemoryStream::new(file);
        assert!(OpbDecoder::sniff(&mut stream));
    }

    #[test]
    fn vgm_sniff_recognizes_magic() {
        let mut file = vec![0u8; 0x40];
        file[0..4].copy_from_slice(b"Vgm ");
        let mut stream = MemoryStream::new(file);
        assert!(VgmDecoder::sniff(&mut stream));
    }

    fn build_vgm(total_samples: u32, commands: &[u8]) -> Vec<u8> {
        let mut file = vec![0u8; 0x40];
        file[0..4].copy_from_slice(b"Vgm ");
        file[0x18..0x1c].copy_from_slice(&total_samples.to_le_bytes());
        file[0x08..0x0c].copy_from_slice(&0x151u32.to_le_bytes());
        // data_offset relative to 0x34 -> point right after this header.
        let rel = 0x40u32 - 0x34;
        file[0x34..0x38].copy_from_slice(&rel.to_le_bytes());
        file.extend_from_slice(commands);
        file
    }

    #[test]
    fn vgm_decode_respects_wait_opcodes() {
        let commands = [0x5A, 0xA0, 0x20, 0x61, 0x10, 0x00, 0x66];
        let data = build_vgm(16, &commands);
        let mut decoder = VgmDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        let mut out = [0.0f32; 32];
        let mut call_again = true;
        let produced = decoder.decode(&mut out, &mut call_again, 2);
        assert_eq!(produced, 32);
        assert!(!call_again);
    }

    #[test]
    fn vgm_duration_falls_back_to_computed_total_when_header_is_zero() {
        let commands = [0x61, 0x64, 0x00, 0x66];
        let data = build_vgm(0, &commands);
        let mut decoder = VgmDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        assert!(decoder.duration() > 0);
    }

    #[test]
    fn vgz_gzip_wrapped_vgm_is_recognized_and_inflated() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write as _;

        let commands = [0x61, 0x0a, 0x00, 0x66];
        let inner = build_vgm(10, &commands);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&inner).unwrap();
        let gz = encoder.finish().unwrap();

        let mut stream = MemoryStream::new(gz.clone());
        assert!(VgmDecoder::sniff(&mut stream));

        let mut decoder = VgmDecoder::new();
        decoder.open(Box::new(MemoryStream::new(gz))).unwrap();
        assert_eq!(decoder.duration(), 10 * 1_000_000 / u64::from(OUTPUT_RATE));
    }
}
