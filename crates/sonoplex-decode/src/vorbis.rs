//! Ogg Vorbis: a thin adapter over `lewton`, which already hands back
//! interleaved `i16` packets; this module only rescales to `f32`.

use crate::io::StreamAdapter;
use crate::{Decoder, IoStream, Result};
use lewton::inside_ogg::OggStreamReader;

/// Decoder for Ogg Vorbis streams, backed by `lewton`.
pub struct VorbisDecoder {
    reader: Option<OggStreamReader<StreamAdapter>>,
    channels: u8,
    rate: u32,
    pending: Vec<f32>,
    pending_pos: usize,
}

impl Default for VorbisDecoder {
    fn default() -> Self {
        Self {
            reader: None,
            channels: 0,
            rate: 0,
            pending: Vec::new(),
            pending_pos: 0,
        }
    }
}

impl VorbisDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sniff(stream: &mut dyn IoStream) -> bool {
        let p0 = stream.tell();
        let mut header = [0u8; 35];
        let n = stream.read(&mut header);
        stream.seek(p0, crate::io::Whence::Set);
        n >= 35 && &header[0..4] == b"OggS" && &header[28..35] == b"\x01vorbis"
    }

    fn refill(&mut self) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        while let Ok(Some(packet)) = reader.read_dec_packet_itl() {
            if packet.is_empty() {
                continue;
            }
            self.pending = packet.into_iter().map(|s| f32::from(s) / 32768.0).collect();
            self.pending_pos = 0;
            return;
        }
        self.pending.clear();
        self.pending_pos = 0;
    }
}

impl Decoder for VorbisDecoder {
    fn open(&mut self, stream: Box<dyn IoStream>) -> Result<()> {
        let adapter = StreamAdapter::new(stream);
        let reader = OggStreamReader::new(adapter)?;
        self.channels = reader.ident_hdr.audio_channels;
        self.rate = reader.ident_hdr.audio_sample_rate;
        self.reader = Some(reader);
        self.pending.clear();
        self.pending_pos = 0;
        Ok(())
    }

    fn decode(&mut self, dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
        *call_again = false;
        if self.reader.is_none() {
            return 0;
        }

        let mut written = 0;
        while written < dst.len() {
            if self.pending_pos >= self.pending.len() {
                self.refill();
                if self.pending.is_empty() {
                    break;
                }
            }
            let available = self.pending.len() - self.pending_pos;
            let take = available.min(dst.len() - written);
            dst[written..written + take]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + take]);
            self.pending_pos += take;
            written += take;
        }

        *call_again = self.pending_pos < self.pending.len();
        written
    }

    fn rewind(&mut self) -> bool {
        false
    }

    fn seek_to_time(&mut self, _micros: u64) -> bool {
        false
    }

    fn duration(&self) -> u64 {
        0
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn name(&self) -> &str {
        "vorbis"
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
    fn sniff_rejects_short_or_non_ogg_streams() {
        let mut stream = MemoryStream::new(vec![0u8; 4]);
        assert!(!VorbisDecoder::sniff(&mut stream));

        let mut stream = MemoryStream::new(b"RIFFxxxxWAVE".to_vec());
        assert!(!VorbisDecoder::sniff(&mut stream));
    }

    #[test]
    fn open_rejects_non_ogg_data() {
        let mut decoder = VorbisDecoder::new();
        let data = vec![0u8; 64];
        assert!(decoder.open(Box::new(MemoryStream::new(data))).is_err());
    }
}
