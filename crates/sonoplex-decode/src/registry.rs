//! Codec auto-detection: an ordered table of sniff/construct pairs.

use crate::{Decoder, IoStream};

/// Peek at `stream` to decide whether this codec recognizes it. Must leave
/// the stream at its original position regardless of the result.
pub type SniffFn = fn(&mut dyn IoStream) -> bool;

/// Build a fresh, unopened decoder instance for this codec.
pub type ConstructFn = fn() -> Box<dyn Decoder>;

/// Ordered table of `(sniff, construct)` pairs. Insertion order determines
/// precedence when more than one sniffer would accept the same stream.
#[derive(Default)]
pub struct DecoderRegistry {
    entries: Vec<(SniffFn, ConstructFn)>,
}

impl DecoderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec's sniff/construct pair at the end of the table.
    pub fn register(&mut self, sniff: SniffFn, construct: ConstructFn) {
        self.entries.push((sniff, construct));
    }

    /// Find the first registered codec that accepts `stream`, and construct
    /// an unopened decoder for it. The caller is responsible for calling
    /// `open` on the returned decoder with (ownership of) the same stream.
    ///
    /// Leaves `stream` at the position it had on entry, whether or not a
    /// decoder was found.
    pub fn find_decoder(&self, stream: &mut dyn IoStream) -> Option<Box<dyn Decoder>> {
        let p0 = stream.tell();

        for (sniff, construct) in &self.entries {
            if sniff(stream) {
                stream.seek(p0, crate::io::Whence::Set);
                return Some(construct());
            }
        }

        stream.seek(p0, crate::io::Whence::Set);
        None
    }

    /// Number of registered codecs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStream;

    struct DummyDecoder;
    impl Decoder for DummyDecoder {
        fn open(&mut self, _stream: Box<dyn IoStream>) -> crate::Result<()> {
            Ok(())
        }
        fn decode(&mut self, _dst: &mut [f32], call_again: &mut bool, _device_channels: u8) -> usize {
            *call_again = false;
            0
        }
        fn rewind(&mut self) -> bool {
            true
        }
        fn seek_to_time(&mut self, _micros: u64) -> bool {
            true
        }
        fn duration(&self) -> u64 {
            0
        }
        fn channels(&self) -> u8 {
            1
        }
        fn rate(&self) -> u32 {
            44100
        }
        fn name(&self) -> &str {
            "dummy"
        }
        fn is_open(&self) -> bool {
            true
        }
    }

    fn sniff_always(_: &mut dyn IoStream) -> bool {
        true
    }

    fn sniff_never(_: &mut dyn IoStream) -> bool {
        false
    }

    fn construct_dummy() -> Box<dyn Decoder> {
        Box::new(DummyDecoder)
    }

    #[test]
    fn find_decoder_restores_position_on_success() {
        let mut registry = DecoderRegistry::new();
        registry.register(sniff_always, construct_dummy);

        let mut stream = MemoryStream::new(vec![0u8; 16]);
        stream.seek(4, crate::io::Whence::Set);
        let found = registry.find_decoder(&mut stream);
        assert!(found.is_some());
        assert_eq!(stream.tell(), 4);
    }

    #[test]
    fn find_decoder_restores_position_on_failure() {
        let mut registry = DecoderRegistry::new();
        registry.register(sniff_never, construct_dummy);

        let mut stream = MemoryStream::new(vec![0u8; 16]);
        stream.seek(7, crate::io::Whence::Set);
        let found = registry.find_decoder(&mut stream);
        assert!(found.is_none());
        assert_eq!(stream.tell(), 7);
    }

    #[test]
    fn insertion_order_determines_precedence() {
        let mut registry = DecoderRegistry::new();
        registry.register(sniff_never, construct_dummy);
        registry.register(sniff_always, construct_dummy);

        let mut stream = MemoryStream::new(vec![0u8; 4]);
        assert!(registry.find_decoder(&mut stream).is_some());
        assert_eq!(registry.len(), 2);
    }
}
