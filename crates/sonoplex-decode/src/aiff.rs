//! AIFF/AIFC: FORM/COMM/SSND chunk walk over PCM, float, law, and IMA4 data.

use crate::{Decoder, Error, IoStream, Result, ima4, law};
use sonoplex_core::endian::ieee_extended_to_u32;

/// Byte offset into a channel's IMA4 stream for frame `frame`, derived
/// from the fixed packet stride used for seeking.
#[must_use]
pub fn ima4_block_offset(frame: u64, channels: u8) -> u64 {
    let block = frame / ima4::FRAMES_PER_PACKET as u64;
    block * ima4::PACKET_BYTES as u64 * u64::from(channels)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Sowt,
    Fl32,
    Fl64,
    Alaw,
    Ulaw,
    Ima4,
}

fn compression_from_fourcc(tag: &[u8; 4]) -> Compression {
    match tag {
        b"sowt" => Compression::Sowt,
        b"fl32" | b"FL32" => Compression::Fl32,
        b"fl64" | b"FL64" => Compression::Fl64,
        b"ALAW" | b"alaw" => Compression::Alaw,
        b"ULAW" | b"ulaw" => Compression::Ulaw,
        b"ima4" => Compression::Ima4,
        _ => Compression::None,
    }
}

struct Comm {
    channels: u16,
    num_frames: u32,
    sample_size: u16,
    sample_rate: u32,
    compression: Compression,
}

fn find_chunk<'a>(bytes: &'a [u8], id: &[u8; 4]) -> Option<(&'a [u8], usize)> {
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let size = u32::from_be_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]) as usize;
        let data_start = pos + 8;
        let data_end = (data_start + size).min(bytes.len());
        if chunk_id == id {
            return Some((&bytes[data_start..data_end], data_start));
        }
        pos = data_end + (size % 2);
    }
    None
}

fn parse_comm(data: &[u8], is_aifc: bool) -> Result<Comm> {
    if data.len() < 18 {
        return Err(Error::format("COMM chunk too short"));
    }
    let channels = u16::from_be_bytes([data[0], data[1]]);
    let num_frames = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
    let sample_size = u16::from_be_bytes([data[6], data[7]]);
    let mut rate_bytes = [0u8; 10];
    rate_bytes.copy_from_slice(&data[8..18]);
    let sample_rate = ieee_extended_to_u32(&rate_bytes);

    let compression = if is_aifc && data.len() >= 22 {
        let tag: [u8; 4] = [data[18], data[19], data[20], data[21]];
        compression_from_fourcc(&tag)
    } else {
        Compression::None
    };

    Ok(Comm {
        channels,
        num_frames,
        sample_size,
        sample_rate,
        compression,
    })
}

/// Unpack big-endian 12-bit samples, two samples packed into three bytes.
fn unpack_12bit(data: &[u8]) -> Vec<i16> {
    let mut out = Vec::with_capacity(data.len() / 3 * 2);
    for chunk in data.chunks_exact(3) {
        let v0 = (u16::from(chunk[0]) << 4) | (u16::from(chunk[1]) >> 4);
        let v1 = (u16::from(chunk[1] & 0x0F) << 8) | u16::from(chunk[2]);
        out.push(sign_extend_12(v0));
        out.push(sign_extend_12(v1));
    }
    out
}

fn sign_extend_12(v: u16) -> i16 {
    let v = v & 0x0FFF;
    if v & 0x0800 != 0 {
        (v as i16) - 0x1000
    } else {
        v as i16
    }
}

fn decode_24bit(data: &[u8]) -> Vec<i32> {
    data.chunks_exact(3)
        .map(|c| {
            let v = (u32::from(c[0]) << 16) | (u32::from(c[1]) << 8) | u32::from(c[2]);
            let v = v << 8;
            (v as i32) >> 8
        })
        .collect()
}

/// Decoder for AIFF/AIFC sampled-sound files.
pub struct AiffDecoder {
    samples: Vec<f32>,
    channels: u8,
    rate: u32,
    pos_frames: usize,
    open: bool,
}

impl Default for AiffDecoder {
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

impl AiffDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut header = [0u8; 12];
        let n = stream.read(&mut header);
        stream.seek(p0, crate::io::Whence::Set);
        n == 12 && &header[0..4] == b"FORM" && (&header[8..12] == b"AIFF" || &header[8..12] == b"AIFC")
    }

    fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

impl Decoder for AiffDecoder {
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

        if all.len() < 12 || &all[0..4] != b"FORM" {
            return Err(Error::format("not an AIFF FORM"));
        }
        let is_aifc = &all[8..12] == b"AIFC";
        if !is_aifc && &all[8..12] != b"AIFF" {
            return Err(Error::format("unknown AIFF form type"));
        }

        let (comm_data, _) = find_chunk(&all, b"COMM").ok_or_else(|| Error::format("missing COMM chunk"))?;
        let comm = parse_comm(comm_data, is_aifc)?;

        let (ssnd_data, _) = find_chunk(&all, b"SSND").ok_or_else(|| Error::format("missing SSND chunk"))?;
        if ssnd_data.len() < 8 {
            return Err(Error::format("SSND chunk too short"));
        }
        let data_offset = u32::from_be_bytes([ssnd_data[0], ssnd_data[1], ssnd_data[2], ssnd_data[3]]) as usize;
        let audio = &ssnd_data[8 + data_offset..];

        let channels = comm.channels as u8;
        let samples: Vec<f32> = match comm.compression {
            Compression::None => match comm.sample_size {
                8 => audio.iter().map(|&b| f32::from(b as i8) / 128.0).collect(),
                12 => unpack_12bit(audio).into_iter().map(|v| f32::from(v) / 2048.0).collect(),
                16 => audio
                    .chunks_exact(2)
                    .map(|c| f32::from(i16::from_be_bytes([c[0], c[1]])) / 32768.0)
                    .collect(),
                24 => decode_24bit(audio).into_iter().map(|v| v as f32 / 8_388_608.0).collect(),
                32 => audio
                    .chunks_exact(4)
                    .map(|c| (i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64 / 2_147_483_648.0) as f32)
                    .collect(),
                other => return Err(Error::format(format!("unsupported AIFF sample size {other}"))),
            },
            Compression::Sowt => audio
                .chunks_exact(2)
                .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / 32768.0)
                .collect(),
            Compression::Fl32 => audio
                .chunks_exact(4)
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            Compression::Fl64 => audio
                .chunks_exact(8)
                .map(|c| {
                    f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32
                })
                .collect(),
            Compression::Alaw => audio
                .iter()
                .map(|&b| f32::from(law::alaw_to_i16(b)) / 32768.0)
                .collect(),
            Compression::Ulaw => audio
                .iter()
                .map(|&b| f32::from(law::ulaw_to_i16(b)) / 32768.0)
                .collect(),
            Compression::Ima4 => {
                let packet_stride = ima4::PACKET_BYTES * channels.max(1) as usize;
                let mut out = Vec::new();
                for block in audio.chunks_exact(packet_stride) {
                    let mut channel_frames: Vec<[i16; ima4::FRAMES_PER_PACKET]> =
                        Vec::with_capacity(channels as usize);
                    for c in 0..channels.max(1) as usize {
                        let start = c * ima4::PACKET_BYTES;
                        channel_frames.push(ima4::decode_packet(&block[start..start + ima4::PACKET_BYTES]));
                    }
                    for frame in 0..ima4::FRAMES_PER_PACKET {
                        for ch in &channel_frames {
                            out.push(f32::from(ch[frame]) / 32768.0);
                        }
                    }
                }
                out
            }
        };

        self.channels = channels.max(1);
        self.rate = comm.sample_rate;
        self.samples = samples;
        self.pos_frames = 0;
        self.open = true;

        // `comm.num_frames` is the authoritative frame count per the format;
        // if decoding produced a different count (truncated tail block) trust
        // what was actually decoded.
        let _ = comm.num_frames;
        let _ = comm.sample_size;

        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        if !self.open {
            return 0;
        }
        let channels = self.channels as usize;
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
        self.channels
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn name(&self) -> &str {
        "aiff"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    fn ieee_extended_44100() -> [u8; 10] {
        sonoplex_core::endian::u32_to_ieee_extended(44100)
    }

    fn build_aiff_pcm16(channels: u16, frames: &[i16]) -> Vec<u8> {
        let mut comm = Vec::new();
        comm.extend_from_slice(&channels.to_be_bytes());
        comm.extend_from_slice(&((frames.len() as u32 / channels as u32)).to_be_bytes());
        comm.extend_from_slice(&16u16.to_be_bytes());
        comm.extend_from_slice(&ieee_extended_44100());

        let mut ssnd = Vec::new();
        ssnd.extend_from_slice(&0u32.to_be_bytes()); // offset
        ssnd.extend_from_slice(&0u32.to_be_bytes()); // block size
        for s in frames {
            ssnd.extend_from_slice(&s.to_be_bytes());
        }

        let mut form_body = Vec::new();
        form_body.extend_from_slice(b"AIFF");
        form_body.extend_from_slice(b"COMM");
        form_body.extend_from_slice(&(comm.len() as u32).to_be_bytes());
        form_body.extend_from_slice(&comm);
        form_body.extend_from_slice(b"SSND");
        form_body.extend_from_slice(&(ssnd.len() as u32).to_be_bytes());
        form_body.extend_from_slice(&ssnd);

        let mut file = Vec::new();
        file.extend_from_slice(b"FORM");
        file.extend_from_slice(&(form_body.len() as u32).to_be_bytes());
        file.extend_from_slice(&form_body);
        file
    }

    #[test]
    fn sniff_recognizes_aiff_and_aifc() {
        let data = build_aiff_pcm16(1, &[0, 1, 2]);
        let mut stream = MemoryStream::new(data);
        assert!(AiffDecoder::sniff(&mut stream));
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn pcm16_mono_round_trips_through_decode() {
        let frames = [1000i16, -2000, 3000, -4000];
        let data = build_aiff_pcm16(1, &frames);
        let mut decoder = AiffDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        assert_eq!(decoder.channels(), 1);
        assert_eq!(decoder.rate(), 44100);

        let mut out = [0f32; 4];
        let mut call_again = true;
        let produced = decoder.decode(&mut out, &mut call_again, 1);
        assert_eq!(produced, 4);
        assert!(!call_again);
        for (o, f) in out.iter().zip(frames.iter()) {
            assert!((o - f32::from(*f) / 32768.0).abs() < 1e-6);
        }
    }

    #[test]
    fn ima4_block_offset_matches_packet_stride() {
        assert_eq!(ima4_block_offset(0, 2), 0);
        assert_eq!(ima4_block_offset(64, 2), 34 * 2);
        assert_eq!(ima4_block_offset(127, 2), 0); // still in block 0
        assert_eq!(ima4_block_offset(128, 1), 34 * 2);
    }

    #[test]
    fn sign_extend_12_handles_negative_values() {
        assert_eq!(sign_extend_12(0x800), -2048);
        assert_eq!(sign_extend_12(0x7FF), 2047);
        assert_eq!(sign_extend_12(0), 0);
    }
}
