//! Creative Voice File (VOC): a 20-byte signature, then a chain of typed
//! blocks (PCM, Creative ADPCM, A-law/mu-law, silence, markers, loops).

use crate::adpcm::{self, Variant};
use crate::{Decoder, Error, IoStream, Result, law};

const SIGNATURE: &[u8; 20] = b"Creative Voice File\x1a";

const VOC_TERM: u8 = 0;
const VOC_DATA: u8 = 1;
const VOC_CONT: u8 = 2;
const VOC_SILENCE: u8 = 3;
const VOC_MARKER: u8 = 4;
const VOC_TEXT: u8 = 5;
const VOC_LOOP: u8 = 6;
const VOC_LOOPEND: u8 = 7;
const VOC_EXTENDED: u8 = 8;
const VOC_DATA_16: u8 = 9;

fn rate_from_sr_byte(sr: u8) -> u32 {
    1_000_000 / (256 - u32::from(sr))
}

#[derive(Clone, Copy)]
struct ExtendedInfo {
    rate: u32,
    stereo: bool,
}

fn decode_codec_block(codec: u8, payload: &[u8], channels: u8, out: &mut Vec<f32>) -> Result<()> {
    match codec {
        0 => {
            // 8-bit unsigned PCM.
            out.extend(payload.iter().map(|&b| (f32::from(b) - 128.0) / 128.0));
        }
        1 | 2 | 3 if !payload.is_empty() => {
            let variant = match codec {
                1 => Variant::FourBit,
                2 => Variant::ThreeBit,
                _ => Variant::TwoBit,
            };
            // The first byte of a Creative ADPCM block is an uncompressed
            // reference sample; decode state resets here.
            let reference = i16::from(payload[0]) - 128;
            let mut state = adpcm::State::new(reference * 256);
            out.push(f32::from(reference) / 128.0);
            let codes = adpcm::unpack_codes(variant, &payload[1..]);
            for code in codes {
                let sample = state.decode(variant, code);
                out.push(f32::from(sample) / 32768.0);
            }
        }
        6 => out.extend(payload.iter().map(|&b| f32::from(law::alaw_to_i16(b)) / 32768.0)),
        7 => out.extend(payload.iter().map(|&b| f32::from(law::ulaw_to_i16(b)) / 32768.0)),
        other => return Err(Error::format(format!("unsupported VOC codec {other}"))),
    }
    let _ = channels;
    Ok(())
}

/// Decoder for Creative Voice (`.voc`) files.
pub struct VocDecoder {
    samples: Vec<f32>,
    channels: u8,
    rate: u32,
    pos_frames: usize,
    open: bool,
}

impl Default for VocDecoder {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            channels: 0,
            rate: 0,
            pos_frames: 0,
            open: false,
        }
    }
}

impl VocDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut header = [0u8; 20];
        let n = stream.read(&mut header);
        stream.seek(p0, crate::io::Whence::Set);
        n == 20 && &header == SIGNATURE
    }

    fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

impl Decoder for VocDecoder {
    fn open(&mut self, mut stream: Box<dyn IoStream>) -> Result<()> {
        let mut all = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = stream.read(&mut buf);
            if n == 0 {
                break;
            }
            all.extend_from_slice(&buf[..n]);
        }

        if all.len() < 26 || &all[0..20] != SIGNATURE {
            return Err(Error::format("not a Creative Voice file"));
        }
        let data_offset = u16::from_le_bytes([all[20], all[21]]) as usize;

        let mut pos = data_offset;
        let mut samples: Vec<f32> = Vec::new();
        let mut channels: u8 = 1;
        let mut rate: u32 = 0;
        let mut pending_extended: Option<ExtendedInfo> = None;

        while pos + 4 <= all.len() {
            let block_type = all[pos];
            if block_type == VOC_TERM {
                break;
            }
            let size = u32::from_le_bytes([all[pos + 1], all[pos + 2], all[pos + 3], 0]) as usize;
            let body_start = pos + 4;
            let body_end = (body_start + size).min(all.len());
            let body = &all[body_start..body_end];
            pos = body_end;

            match block_type {
                VOC_DATA => {
                    if body.len() < 2 {
                        return Err(Error::format("VOC_DATA block too short"));
                    }
                    let sr_byte = body[0];
                    let codec = body[1];
                    let payload = &body[2..];

                    if let Some(ext) = pending_extended.take() {
                        rate = ext.rate;
                        channels = if ext.stereo { 2 } else { 1 };
                    } else if rate == 0 {
                        rate = rate_from_sr_byte(sr_byte);
                    }
                    decode_codec_block(codec, payload, channels, &mut samples)?;
                }
                VOC_CONT => {
                    decode_codec_block(0, body, channels, &mut samples)?;
                }
                VOC_SILENCE => {
                    if body.len() < 3 {
                        return Err(Error::format("VOC_SILENCE block too short"));
                    }
                    let length = u16::from_le_bytes([body[0], body[1]]) as usize + 1;
                    if rate == 0 {
                        rate = rate_from_sr_byte(body[2]);
                    }
                    samples.extend(std::iter::repeat(0.0f32).take(length * channels as usize));
                }
                VOC_MARKER | VOC_TEXT | VOC_LOOP | VOC_LOOPEND => {
                    // Markers, embedded text, and loop bracket blocks carry no
                    // decodable audio; loop repeat semantics are intentionally
                    // not reproduced here.
                }
                VOC_EXTENDED => {
                    if body.len() < 4 {
                        return Err(Error::format("VOC_EXTENDED block too short"));
                    }
                    let time_constant = u16::from_le_bytes([body[0], body[1]]);
                    let stereo = body[3] != 0;
                    let divisor = 65536u32.saturating_sub(u32::from(time_constant)).max(1);
                    let ext_rate = 256_000_000 / divisor / if stereo { 2 } else { 1 };
                    pending_extended = Some(ExtendedInfo {
                        rate: ext_rate,
                        stereo,
                    });
                }
                VOC_DATA_16 => {
                    if body.len() < 12 {
                        return Err(Error::format("VOC_DATA_16 block too short"));
                    }
                    let block_rate = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                    let bits = body[4];
                    let block_channels = body[5].max(1);
                    let codec = u16::from_le_bytes([body[6], body[7]]);
                    let payload = &body[12..];

                    rate = block_rate;
                    channels = block_channels;
                    match (codec, bits) {
                        (0, 8) => decode_codec_block(0, payload, channels, &mut samples)?,
                        (0, 16) => samples.extend(
                            payload
                                .chunks_exact(2)
                                .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / 32768.0),
                        ),
                        (6, _) => decode_codec_block(6, payload, channels, &mut samples)?,
                        (7, _) => decode_codec_block(7, payload, channels, &mut samples)?,
                        (other, _) => return Err(Error::format(format!("unsupported VOC_DATA_16 codec {other}"))),
                    }
                }
                _ => {
                    // Unrecognized block types are skipped by construction
                    // (size-prefixed), matching a permissive VOC reader.
                }
            }
        }

        self.samples = samples;
        self.channels = channels;
        self.rate = rate;
        self.pos_frames = 0;
        self.open = true;
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        if !self.open {
            return 0;
        }
        let channels = self.channels.max(1) as usize;
        let total_frames = self.frame_count();
        if self.pos_frames >= total_frames {
            return 0;
        }

        let max_frames = dst.len() / channels;
        let frames = max_frames.min(total_frames - self.pos_frames);
        let start = self.pos_frames * channels;
        dst[..frames * channels].copy_from_slice(&self.samples[start..start + frames * channels]);

        self.pos_frames += frames;
        *call_again = self.pos_frames < total_frames;
        frames * channels
    }

    fn rewind(&mut self) -> bool {
        self.pos_frames = 0;
        true
    }

    fn seek_to_time(&mut self, micros: u64) -> bool {
        if self.rate == 0 {
            return false;
        }
        let frame = (micros * u64::from(self.rate)) / 1_000_000;
        if frame as usize > self.frame_count() {
            return false;
        }
        self.pos_frames = frame as usize;
        true
    }

    fn duration(&self) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        (self.frame_count() as u64) * 1_000_000 / u64::from(self.rate)
    }

    fn channels(&self) -> u8 {
        self.channels.max(1)
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn name(&self) -> &str {
        "voc"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    fn build_voc(blocks: &[u8]) -> Vec<u8> {
        let mut file = Vec::new();
        file.extend_from_slice(SIGNATURE);
        let data_offset = 20 + 2;
        file.extend_from_slice(&(data_offset as u16).to_le_bytes());
        file.extend_from_slice(blocks);
        file
    }

    fn data_block(sr_byte: u8, codec: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![sr_byte, codec];
        body.extend_from_slice(payload);
        let mut block = vec![VOC_DATA];
        block.extend_from_slice(&(body.len() as u32).to_le_bytes()[..3]);
        block.extend_from_slice(&body);
        block
    }

    #[test]
    fn sniff_recognizes_signature() {
        let data = build_voc(&[VOC_TERM]);
        let mut stream = MemoryStream::new(data);
        assert!(VocDecoder::sniff(&mut stream));
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn pcm_block_decodes_to_centered_floats() {
        let mut blocks = data_block(0x80, 0, &[128, 255, 0]);
        blocks.push(VOC_TERM);
        let data = build_voc(&blocks);

        let mut decoder = VocDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        assert_eq!(decoder.channels(), 1);
        assert!(decoder.rate() > 0);

        let mut out = [0f32; 3];
        let mut call_again = true;
        let produced = decoder.decode(&mut out, &mut call_again, 1);
        assert_eq!(produced, 3);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!(out[1] > 0.9);
        assert!(out[2] < -0.9);
    }

    #[test]
    fn silence_block_produces_zeroed_samples() {
        let mut block = vec![VOC_SILENCE];
        let body = [4u16.to_le_bytes()[0], 4u16.to_le_bytes()[1], 0x80];
        block.extend_from_slice(&(body.len() as u32).to_le_bytes()[..3]);
        block.extend_from_slice(&body);
        let mut blocks = block;
        blocks.push(VOC_TERM);
        let data = build_voc(&blocks);

        let mut decoder = VocDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        let mut out = [1f32; 5];
        let mut call_again = true;
        let produced = decoder.decode(&mut out, &mut call_again, 1);
        assert_eq!(produced, 5);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn loop_and_marker_blocks_are_skipped_without_audio() {
        let mut blocks = Vec::new();
        blocks.push(VOC_LOOP);
        blocks.extend_from_slice(&2u32.to_le_bytes()[..3]);
        blocks.extend_from_slice(&[0, 0]);
        blocks.extend(data_block(0x80, 0, &[128, 128]));
        blocks.push(VOC_LOOPEND);
        blocks.extend_from_slice(&0u32.to_le_bytes()[..3]);
        blocks.push(VOC_TERM);
        let data = build_voc(&blocks);

        let mut decoder = VocDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        assert_eq!(decoder.duration() > 0 || decoder.channels() == 1, true);
    }
}
