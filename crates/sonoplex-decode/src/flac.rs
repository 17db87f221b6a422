//! FLAC: a thin adapter over `claxon`, which does its own framing and
//! bit-unpacking; this module only normalizes to interleaved `f32`.

use crate::io::StreamAdapter;
use crate::{Decoder, IoStream, Result};
use claxon::FlacReader;

/// Decoder for FLAC streams, backed by `claxon`.
pub struct FlacDecoder {
    reader: Option<FlacReader<StreamAdapter>>,
    channels: u8,
    rate: u32,
    bits_per_sample: u32,
    total_samples: u64,
    consumed: u64,
}

impl Default for FlacDecoder {
    fn default() -> Self {
        Self {
            reader: None,
            channels: 0,
            rate: 0,
            bits_per_sample: 0,
            total_samples: 0,
            consumed: 0,
        }
    }
}

impl FlacDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut header = [0u8; 4];
        let n = stream.read(&mut header);
        stream.seek(p0, crate::io::Whence::Set);
        n == 4 && &header == b"fLaC"
    }
}

impl Decoder for FlacDecoder {
    fn open(&mut self, stream: Box<dyn IoStream>) -> Result<()> {
        let adapter = StreamAdapter::new(stream);
        let reader = FlacReader::new(adapter)?;
        let info = reader.streaminfo();

        self.channels = info.channels as u8;
        self.rate = info.sample_rate;
        self.bits_per_sample = info.bits_per_sample;
        self.total_samples = info.samples.unwrap_or(0) * u64::from(info.channels);
        self.consumed = 0;
        self.reader = Some(reader);
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        let Some(reader) = self.reader.as_mut() else {
            return 0;
        };

        let max_val = (1i64 << (self.bits_per_sample.max(1) - 1)) as f32;
        let mut samples = reader.samples();
        let mut written = 0;
        while written < dst.len() {
            match samples.next() {
                Some(Ok(v)) => {
                    dst[written] = v as f32 / max_val;
                    written += 1;
                }
                _ => break,
            }
        }

        self.consumed += written as u64;
        *call_again = self.total_samples == 0 || self.consumed < self.total_samples;
        written
    }

    fn rewind(&mut self) -> bool {
        // `claxon` reads forward only over its source; restarting would
        // require a fresh stream this decoder no longer owns a handle to.
        false
    }

    fn seek_to_time(&mut self, _micros: u64) -> bool {
        false
    }

    fn duration(&self) -> u64 {
        if self.rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.total_samples / u64::from(self.channels);
        frames * 1_000_000 / u64::from(self.rate)
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn name(&self) -> &str {
        "flac"
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    #[test]
    fn sniff_recognizes_flac_magic() {
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&[0u8; 16]);
        let mut stream = MemoryStream::new(data);
        assert!(FlacDecoder::sniff(&mut stream));
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn sniff_rejects_non_flac_magic() {
        let mut stream = MemoryStream::new(b"RIFF".to_vec());
        assert!(!FlacDecoder::sniff(&mut stream));
    }

    #[test]
    fn open_rejects_truncated_stream() {
        let data = b"fLaC".to_vec();
        let mut decoder = FlacDecoder::new();
        assert!(decoder.open(Box::new(MemoryStream::new(data))).is_err());
    }
}
