//! Cross-module integration tests for `sonoplex-decode`: the registry's
//! stream-position invariant across real codecs, the `io_from_memory`
//! round-trip law, and the rewind-reproduces-first-decode property for a
//! non-synthesized decoder.

use sonoplex_decode::io::MemoryStream;
use sonoplex_decode::{Decoder, IoStream, Whence};

const EIGHTSVX_VHDR_COMPRESSION_NONE: u8 = 0;
const VOC_SIGNATURE: &[u8; 20] = b"Creative Voice File\x1a";
const VOC_TERM: u8 = 0;
const VOC_DATA: u8 = 1;

fn build_wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in [100i16, -200, 300, -400, 500, -600] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn build_8svx_bytes(body: &[u8]) -> Vec<u8> {
    let mut vhdr = Vec::new();
    vhdr.extend_from_slice(&0u32.to_be_bytes()); // oneShot
    vhdr.extend_from_slice(&0u32.to_be_bytes()); // repeat
    vhdr.extend_from_slice(&0u32.to_be_bytes()); // samplesPerHiCycle
    vhdr.extend_from_slice(&8000u16.to_be_bytes()); // samplesPerSec
    vhdr.push(0); // ctOctave
    vhdr.push(EIGHTSVX_VHDR_COMPRESSION_NONE);
    while vhdr.len() < 20 {
        vhdr.push(0);
    }

    let mut form_body = Vec::new();
    form_body.extend_from_slice(b"8SVX");
    form_body.extend_from_slice(b"VHDR");
    form_body.extend_from_slice(&(vhdr.len() as u32).to_be_bytes());
    form_body.extend_from_slice(&vhdr);
    form_body.extend_from_slice(b"BODY");
    form_body.extend_from_slice(&(body.len() as u32).to_be_bytes());
    form_body.extend_from_slice(body);
    if body.len() % 2 == 1 {
        form_body.push(0);
    }

    let mut file = Vec::new();
    file.extend_from_slice(b"FORM");
    file.extend_from_slice(&(form_body.len() as u32).to_be_bytes());
    file.extend_from_slice(&form_body);
    file
}

fn build_voc_bytes(payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x80u8, 0u8]; // sample-rate byte, codec 0 = PCM u8
    body.extend_from_slice(payload);
    let mut blocks = vec![VOC_DATA];
    blocks.extend_from_slice(&(body.len() as u32).to_le_bytes()[..3]);
    blocks.extend_from_slice(&body);
    blocks.push(VOC_TERM);

    let mut file = Vec::new();
    file.extend_from_slice(VOC_SIGNATURE);
    file.extend_from_slice(&22u16.to_le_bytes());
    file.extend_from_slice(&blocks);
    file
}

/// `find_decoder` restores the stream position on both the success and
/// failure branches, for every container the registry recognizes.
#[test]
fn find_decoder_restores_position_on_success_and_failure() {
    let registry = sonoplex_decode::default_registry();

    for data in [build_wav_bytes(), build_8svx_bytes(&[0, 64, 128, 192]), build_voc_bytes(&[1, 2, 3])]
    {
        let mut stream = MemoryStream::new(data);
        let p0 = stream.tell();
        let decoder = registry.find_decoder(&mut stream);
        assert!(decoder.is_some());
        assert_eq!(stream.tell(), p0);
    }

    // Garbage that no sniffer accepts.
    let mut stream = MemoryStream::new(vec![0xDE, 0xAD, 0xBE, 0xEF, 1, 2, 3, 4]);
    let p0 = stream.tell();
    assert!(registry.find_decoder(&mut stream).is_none());
    assert_eq!(stream.tell(), p0);
}

/// `io_from_memory` round-trip law: `seek(0, Set); read(n); tell() == n`.
#[test]
fn memory_stream_tell_matches_bytes_read() {
    let data: Vec<u8> = (0..64u32).map(|i| i as u8).collect();
    let mut stream = MemoryStream::new(data);

    for n in [0usize, 1, 17, 63, 64] {
        assert_eq!(stream.seek(0, Whence::Set), 0);
        let mut buf = vec![0u8; n];
        let read = stream.read(&mut buf);
        assert_eq!(read, n);
        assert_eq!(stream.tell(), n as i64);
    }
}

/// `rewind()` followed by a full decode of the same length as the first
/// decode produces identical float output for a non-synthesized decoder.
#[test]
fn rewind_reproduces_first_decode_for_wav() {
    let registry = sonoplex_decode::default_registry();
    let mut stream = MemoryStream::new(build_wav_bytes());
    let mut decoder = registry.find_decoder(&mut stream).expect("wav recognized");
    decoder.open(Box::new(stream)).unwrap();

    let mut first = [0f32; 6];
    let mut call_again = false;
    let produced_first = decoder.decode(&mut first, &mut call_again, 1);

    assert!(decoder.rewind());

    let mut second = [0f32; 6];
    let produced_second = decoder.decode(&mut second, &mut call_again, 1);

    assert_eq!(produced_first, produced_second);
    assert_eq!(first, second);
}

/// `decode(buf, 0, ...)` returns 0 with `call_again` left untouched/false.
#[test]
fn decode_with_zero_length_buffer_returns_zero() {
    let registry = sonoplex_decode::default_registry();
    let mut stream = MemoryStream::new(build_wav_bytes());
    let mut decoder = registry.find_decoder(&mut stream).expect("wav recognized");
    decoder.open(Box::new(stream)).unwrap();

    let mut call_again = false;
    let produced = decoder.decode(&mut [], &mut call_again, 1);
    assert_eq!(produced, 0);
}
