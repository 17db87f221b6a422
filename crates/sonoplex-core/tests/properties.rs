//! Property-based tests for the §8 quantified invariants of the audio
//! converter and sample converters.

use proptest::prelude::*;
use sonoplex_core::{AudioConverter, AudioSpec, SampleFormat};

fn pcm_spec(format: SampleFormat, channels: u8, freq: u32) -> AudioSpec {
    AudioSpec::new(format, channels, freq)
}

/// Build `n_frames` of random bytes for `spec`, frame-aligned.
fn arb_frames(spec: AudioSpec, n_frames: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), n_frames * spec.frame_size())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Converting a buffer to its own spec is the identity.
    #[test]
    fn convert_identity(
        channels in 1u8..=2,
        freq in prop::sample::select(vec![8000u32, 22050, 44100, 48000]),
        n_frames in 0usize..64,
    ) {
        let spec = pcm_spec(SampleFormat::S16Le, channels, freq);
        let data = (0..n_frames * spec.frame_size()).map(|i| (i % 256) as u8).collect::<Vec<_>>();
        let out = AudioConverter::convert(spec, &data, spec).unwrap();
        prop_assert_eq!(out, data);
    }

    /// `estimate_output_size` upper-bounds the real conversion length, tight
    /// to within four destination frames.
    #[test]
    fn estimate_output_size_upper_bounds_actual(
        src_channels in 1u8..=2,
        dst_channels in 1u8..=2,
        src_freq in prop::sample::select(vec![8000u32, 22050, 44100, 48000]),
        dst_freq in prop::sample::select(vec![8000u32, 22050, 44100, 48000]),
        n_frames in 1usize..64,
    ) {
        // Only mono<->stereo remixes are supported by the general pipeline.
        prop_assume!(src_channels == dst_channels || src_channels == 1 || dst_channels == 1);

        let src_spec = pcm_spec(SampleFormat::S16Le, src_channels, src_freq);
        let dst_spec = pcm_spec(SampleFormat::S16Le, dst_channels, dst_freq);
        let data = (0..n_frames * src_spec.frame_size()).map(|i| (i % 256) as u8).collect::<Vec<_>>();

        let estimate = AudioConverter::estimate_output_size(src_spec, data.len(), dst_spec).unwrap();
        let actual = AudioConverter::convert(src_spec, &data, dst_spec).unwrap().len();

        prop_assert!(actual <= estimate, "actual {actual} exceeded estimate {estimate}");
        let slack = estimate - actual;
        prop_assert!(
            slack <= 4 * dst_spec.frame_size(),
            "estimate {estimate} too loose vs actual {actual} (slack {slack})"
        );
    }

    /// s16le -> s16be -> s16le is a byte-swap round trip for any byte buffer.
    #[test]
    fn endian_round_trip(data in arb_frames(pcm_spec(SampleFormat::S16Le, 2, 44100), 1..64)) {
        let le = pcm_spec(SampleFormat::S16Le, 2, 44100);
        let be = pcm_spec(SampleFormat::S16Be, 2, 44100);
        let swapped = AudioConverter::convert(le, &data, be).unwrap();
        let back = AudioConverter::convert(be, &swapped, le).unwrap();
        prop_assert_eq!(back, data);
    }

    /// Mono -> stereo duplicates each frame as (m[i], m[i]); the reverse
    /// averages pairs back down, within float rounding for `f32le`.
    #[test]
    fn mono_stereo_duplicate_and_average_f32(
        samples in prop::collection::vec(-1.0f32..=1.0f32, 1..64),
    ) {
        let mono = pcm_spec(SampleFormat::F32Le, 1, 44100);
        let stereo = pcm_spec(SampleFormat::F32Le, 2, 44100);

        let mono_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let stereo_bytes = AudioConverter::convert(mono, &mono_bytes, stereo).unwrap();

        let stereo_samples: Vec<f32> = stereo_bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        for i in 0..samples.len() {
            prop_assert_eq!(stereo_samples[2 * i], samples[i]);
            prop_assert_eq!(stereo_samples[2 * i + 1], samples[i]);
        }

        let back_bytes = AudioConverter::convert(stereo, &stereo_bytes, mono).unwrap();
        let back_samples: Vec<f32> = back_bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        for (a, b) in samples.iter().zip(back_samples.iter()) {
            prop_assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    /// Empty input converts to empty output regardless of spec.
    #[test]
    fn empty_input_is_empty_output(
        channels in 1u8..=2,
        freq in prop::sample::select(vec![8000u32, 44100]),
    ) {
        let spec = pcm_spec(SampleFormat::S16Le, channels, freq);
        let out = AudioConverter::convert(spec, &[], spec).unwrap();
        prop_assert!(out.is_empty());
    }
}
