//! Integration tests for `sonoplex-core`: the literal seed scenarios from
//! spec §8 and the streaming/one-shot converter equivalence law.

use sonoplex_core::{AudioConverter, AudioSpec, SampleFormat, StreamConverter};

fn spec(format: SampleFormat, channels: u8, freq: u32) -> AudioSpec {
    AudioSpec::new(format, channels, freq)
}

/// Seed scenario 1: u8 mono -> s16le mono, same rate.
#[test]
fn seed_u8_to_s16le_mono() {
    let src = spec(SampleFormat::U8, 1, 44100);
    let dst = spec(SampleFormat::S16Le, 1, 44100);
    let input = [0u8, 64, 128, 192, 255];

    let out = AudioConverter::convert(src, &input, dst).unwrap();
    let got: Vec<i16> = out.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();

    assert_eq!(got, vec![-32768, -16384, 0, 16384, 32512]);
}

/// Seed scenario 2: s16le -> s16be byte swap, stereo.
#[test]
fn seed_s16le_to_s16be_swap() {
    let le = spec(SampleFormat::S16Le, 2, 44100);
    let be = spec(SampleFormat::S16Be, 2, 44100);
    let input = [0x02, 0x01, 0x04, 0x03];

    let out = AudioConverter::convert(le, &input, be).unwrap();
    assert_eq!(out, vec![0x01, 0x02, 0x03, 0x04]);
    assert!(AudioConverter::has_fast_path(le, be));
}

/// Seed scenario 3: mono -> stereo duplication, s16le.
#[test]
fn seed_mono_to_stereo_duplication() {
    let mono = spec(SampleFormat::S16Le, 1, 44100);
    let stereo = spec(SampleFormat::S16Le, 2, 44100);
    let input: Vec<u8> = [100i16, 200, 300].iter().flat_map(|s| s.to_le_bytes()).collect();

    let out = AudioConverter::convert(mono, &input, stereo).unwrap();
    let got: Vec<i16> = out.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();

    assert_eq!(got, vec![100, 100, 200, 200, 300, 300]);
}

/// Seed scenario 4: stereo -> mono averaging, s16le.
#[test]
fn seed_stereo_to_mono_averaging() {
    let stereo = spec(SampleFormat::S16Le, 2, 44100);
    let mono = spec(SampleFormat::S16Le, 1, 44100);
    let input: Vec<u8> =
        [1000i16, 2000, 3000, 4000, -1000, 1000].iter().flat_map(|s| s.to_le_bytes()).collect();

    let out = AudioConverter::convert(stereo, &input, mono).unwrap();
    let got: Vec<i16> = out.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();

    assert_eq!(got, vec![1500, 3500, 0]);
}

/// Arbitrary channel remix beyond mono/stereo is rejected.
#[test]
fn channel_remix_beyond_stereo_is_rejected() {
    let quad = spec(SampleFormat::S16Le, 4, 44100);
    let stereo = spec(SampleFormat::S16Le, 2, 44100);
    let input = vec![0u8; 4 * 2];
    assert!(AudioConverter::convert(quad, &input, stereo).is_err());
}

/// `stream_converter` equivalence (no rate change): partitioning the input
/// into arbitrary chunks and concatenating `process_chunk` + `flush` output
/// matches the one-shot conversion byte-for-byte.
#[test]
fn stream_converter_matches_one_shot_without_resampling() {
    let src = spec(SampleFormat::S16Le, 2, 44100);
    let dst = spec(SampleFormat::U8, 2, 44100);
    let input: Vec<u8> = (0..2000u32).map(|i| (i % 256) as u8).collect();

    let one_shot = AudioConverter::convert(src, &input, dst).unwrap();

    let mut converter = StreamConverter::new(src, dst).unwrap();
    let mut streamed = Vec::new();
    for chunk in input.chunks(37) {
        streamed.extend(converter.process_chunk(chunk).unwrap());
    }
    streamed.extend(converter.flush().unwrap());

    assert_eq!(streamed, one_shot);
}

/// `process_chunk` on an empty slice is a no-op.
#[test]
fn stream_converter_empty_chunk_is_noop() {
    let src = spec(SampleFormat::S16Le, 1, 44100);
    let dst = spec(SampleFormat::U8, 1, 22050);
    let mut converter = StreamConverter::new(src, dst).unwrap();
    assert!(converter.process_chunk(&[]).unwrap().is_empty());
}

/// `reset` clears buffered state: converting the same chunk twice after a
/// reset produces the same output both times.
#[test]
fn stream_converter_reset_is_idempotent() {
    let src = spec(SampleFormat::S16Le, 1, 44100);
    let dst = spec(SampleFormat::S16Le, 1, 22050);
    let input: Vec<u8> = (0..400u32).map(|i| (i % 256) as u8).collect();

    let mut converter = StreamConverter::new(src, dst).unwrap();
    let mut first = converter.process_chunk(&input).unwrap();
    first.extend(converter.flush().unwrap());

    converter.reset();
    let mut second = converter.process_chunk(&input).unwrap();
    second.extend(converter.flush().unwrap());

    assert_eq!(first, second);
}
