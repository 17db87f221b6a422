//! IFF 8SVX: mono 8-bit PCM or Fibonacci-delta compressed.

use crate::{Decoder, Error, IoStream, Result};

/// Fibonacci-delta table: 16 signed deltas indexed by a 4-bit nibble code.
const FIBONACCI_DELTA: [i8; 16] = [-34, -21, -13, -8, -5, -3, -2, -1, 0, 1, 2, 3, 5, 8, 13, 21];

fn read_chunk_header(bytes: &[u8], pos: usize) -> Option<([u8; 4], u32)> {
    if pos + 8 > bytes.len() {
        return None;
    }
    let id = [bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]];
    let size = u32::from_be_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]);
    Some((id, size))
}

/// Decompress Fibonacci-delta encoded bytes, two 4-bit codes per byte,
/// high nibble first. `current` starts at `0` on open/rewind.
fn decode_fibonacci_delta(body: &[u8]) -> Vec<i8> {
    let mut out = Vec::with_capacity(body.len() * 2);
    let mut current: i8 = 0;
    for &byte in body {
        let high = (byte >> 4) & 0x0F;
        let low = byte & 0x0F;
        current = current.wrapping_add(FIBONACCI_DELTA[high as usize]);
        out.push(current);
        current = current.wrapping_add(FIBONACCI_DELTA[low as usize]);
        out.push(current);
    }
    out
}

/// Decoder for IFF `8SVX` sampled-voice files.
pub struct EightSvxDecoder {
    samples: Vec<i8>,
    pos: usize,
    rate: u32,
    one_shot: u32,
    repeat: u32,
    open: bool,
}

impl Default for EightSvxDecoder {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            pos: 0,
            rate: 0,
            one_shot: 0,
            repeat: 0,
            open: false,
        }
    }
}

impl EightSvxDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Peek at `stream` for a `FORM`/`8SVX` header without consuming it.
    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut header = [0u8; 12];
        let n = stream.read(&mut header);
        stream.seek(p0, crate::io::Whence::Set);
        n == 12 && &header[0..4] == b"FORM" && &header[8..12] == b"8SVX"
    }
}

impl Decoder for EightSvxDecoder {
    fn open(&mut self, mut stream: Box<dyn IoStream>) -> Result<()> {
        let mut all = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf);
            if n == 0 {
                break;
            }
            all.extend_from_slice(&buf[..n]);
        }

        if all.len() < 12 || &all[0..4] != b"FORM" || &all[8..12] != b"8SVX" {
            return Err(Error::format("not an 8SVX FORM"));
        }

        let mut pos = 12usize;
        let mut vhdr: Option<(u32, u32, u16, u8)> = None;
        let mut body_range: Option<(usize, usize)> = None;

        while let Some((id, size)) = read_chunk_header(&all, pos) {
            let data_start = pos + 8;
            let data_end = data_start + size as usize;
            if data_end > all.len() {
                break;
            }

            match &id {
                b"VHDR" => {
                    if size < 20 {
                        return Err(Error::format("VHDR chunk too short"));
                    }
                    let d = &all[data_start..data_end];
                    let one_shot = u32::from_be_bytes([d[0], d[1], d[2], d[3]]);
                    let repeat = u32::from_be_bytes([d[4], d[5], d[6], d[7]]);
                    let samples_per_sec = u16::from_be_bytes([d[12], d[13]]);
                    let compression = d[15];
                    vhdr = Some((one_shot, repeat, samples_per_sec, compression));
                }
                b"BODY" => {
                    body_range = Some((data_start, data_end));
                }
                _ => {}
            }

            pos = data_end + (size as usize % 2);
        }

        let (one_shot, repeat, samples_per_sec, compression) =
            vhdr.ok_or_else(|| Error::format("8SVX missing VHDR chunk"))?;
        let (body_start, body_end) =
            body_range.ok_or_else(|| Error::format("8SVX missing BODY chunk"))?;
        let body = &all[body_start..body_end];

        self.samples = match compression {
            0 => body.iter().map(|&b| b as i8).collect(),
            1 => decode_fibonacci_delta(body),
            other => return Err(Error::format(format!("unsupported 8SVX compression {other}"))),
        };
        self.rate = u32::from(samples_per_sec);
        self.one_shot = one_shot;
        self.repeat = repeat;
        self.pos = 0;
        self.open = true;
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        if !self.open || self.pos >= self.samples.len() {
            return 0;
        }

        let remaining = self.samples.len() - self.pos;
        let frames = dst.len().min(remaining);

        for i in 0..frames {
            dst[i] = f32::from(self.samples[self.pos + i]) / 128.0;
        }

        self.pos += frames;
        *call_again = self.pos < self.samples.len();
        frames
    }

    fn rewind(&mut self) -> bool {
        self.pos = 0;
        true
    }

    fn seek_to_time(&mut self, micros: u64) -> bool {
        if self.rate == 0 {
            return false;
        }
        let frame = (micros * u64::from(self.rate)) / 1_000_000;
        if frame as usize > self.samples.len() {
            return false;
        }
        self.pos = frame as usize;
        true
    }

    fn duration(&self) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        // One-shot plus one repeat cycle, per spec.
        let total_samples = u64::from(self.one_shot) + u64::from(self.repeat);
        total_samples * 1_000_000 / u64::from(self.rate)
    }

    fn channels(&self) -> u8 {
        1
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn name(&self) -> &str {
        "8svx"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
