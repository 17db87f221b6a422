//! WAV/RIFF: a thin adapter over `hound`, carrying its native sample
//! format through to the engine as interleaved `f32`.

use crate::io::StreamAdapter;
use crate::{Decoder, IoStream, Result};
use hound::{SampleFormat, WavReader};
use std::io::BufReader;

/// Decoder for RIFF/WAVE files, backed by `hound`.
pub struct WavDecoder {
    reader: Option<WavReader<BufReader<StreamAdapter>>>,
    channels: u8,
    rate: u32,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    total_samples: u64,
    consumed: u64,
}

impl Default for WavDecoder {
    fn default() -> Self {
        Self {
            reader: None,
            channels: 0,
            rate: 0,
            bits_per_sample: 0,
            sample_format: SampleFormat::Int,
            total_samples: 0,
            consumed: 0,
        }
    }
}

impl WavDecoder {
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
        n == 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE"
    }
}

impl Decoder for WavDecoder {
    fn open(&mut self, stream: Box<dyn IoStream>) -> Result<()> {
        let adapter = StreamAdapter::new(stream);
        let reader = WavReader::new(BufReader::new(adapter))?;
        let spec = reader.spec();

        self.channels = spec.channels as u8;
        self.rate = spec.sample_rate;
        self.bits_per_sample = spec.bits_per_sample;
        self.sample_format = spec.sample_format;
        self.total_samples = reader.len() as u64;
        self.consumed = 0;
        self.reader = Some(reader);
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        let Some(reader) = self.reader.as_mut() else {
            return 0;
        };

        let max_int = (1i64 << (self.bits_per_sample.max(1) - 1)) as f32;
        let mut written = 0;
        match self.sample_format {
            SampleFormat::Float => {
                let mut samples = reader.samples::<f32>();
                while written < dst.len() {
                    match samples.next() {
                        Some(Ok(v)) => {
                            dst[written] = v;
                            written += 1;
                        }
                        _ => break,
                    }
                }
            }
            SampleFormat::Int => {
                let mut samples = reader.samples::<i32>();
                while written < dst.len() {
                    match samples.next() {
                        Some(Ok(v)) => {
                            dst[written] = v as f32 / max_int;
                            written += 1;
                        }
                        _ => break,
                    }
                }
            }
        }

        self.consumed += written as u64;
        *call_again = self.consumed < self.total_samples;
        written
    }

    fn rewind(&mut self) -> bool {
        let Some(reader) = self.reader.as_mut() else {
            return false;
        };
        if reader.seek(0).is_ok() {
            self.consumed = 0;
            true
        } else {
            false
        }
    }

    fn seek_to_time(&mut self, micros: u64) -> bool {
        if self.rate == 0 || self.channels == 0 {
            return false;
        }
        let frame = (micros * u64::from(self.rate)) / 1_000_000;
        let Some(reader) = self.reader.as_mut() else {
            return false;
        };
        if reader.seek(frame as u32).is_ok() {
            self.consumed = frame * u64::from(self.channels);
            true
        } else {
            false
        }
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
        "wav"
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    fn build_wav_pcm16(channels: u16, rate: u32, frames: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in frames {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn sniff_recognizes_riff_wave() {
        let data = build_wav_pcm16(1, 44100, &[0, 1, 2]);
        let mut stream = MemoryStream::new(data);
        assert!(WavDecoder::sniff(&mut stream));
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn pcm16_decodes_to_normalized_floats() {
        let frames = [16384i16, -16384, 0];
        let data = build_wav_pcm16(1, 22050, &frames);
        let mut decoder = WavDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        assert_eq!(decoder.channels(), 1);
        assert_eq!(decoder.rate(), 22050);

        let mut out = [0f32; 3];
        let mut call_again = true;
        let produced = decoder.decode(&mut out, &mut call_again, 1);
        assert_eq!(produced, 3);
        assert!(!call_again);
        assert!((out[0] - 0.5).abs() < 0.01);
        assert!((out[1] + 0.5).abs() < 0.01);
    }

    #[test]
    fn rewind_replays_from_the_start() {
        let data = build_wav_pcm16(1, 44100, &[100, 200, 300]);
        let mut decoder = WavDecoder::new();
        decoder.open(Box::new(MemoryStream::new(data))).unwrap();
        let mut out = [0f32; 1];
        let mut call_again = false;
        decoder.decode(&mut out, &mut call_again, 1);
        assert!(decoder.rewind());
        let mut out2 = [0f32; 3];
        let produced = decoder.decode(&mut out2, &mut call_again, 1);
        assert_eq!(produced, 3);
    }
}
