//! Per-format scalar sample conversion: packed PCM <-> interleaved `f32` in `[-1, 1]`.
//!
//! These functions convert *samples* (one scalar per channel slot), not
//! *frames* — a stereo frame is two samples. No allocation, no EOF handling:
//! callers size `dst`/`src` exactly.

use crate::{Error, Result, SampleFormat};

/// Unpack `n_samples` scalar samples from `src` (in `format`) into `dst` as
/// interleaved `f32` in `[-1, 1]`.
///
/// `u8` maps `0 -> -1.0`, `128 -> 0.0`, `255 -> ~+1.0`. Signed integer formats
/// use the standard asymmetric mapping (the most-negative value maps to
/// exactly `-1.0`; the most-positive maps to just under `+1.0`). Float
/// formats are copied (big-endian variants are byte-swapped first).
pub fn to_float(dst: &mut [f32], src: &[u8], n_samples: usize, format: SampleFormat) -> Result<()> {
    let bytes = format.byte_size();
    if bytes == 0 {
        return Err(Error::UnsupportedFormat(format));
    }
    assert!(src.len() >= n_samples * bytes, "src too short for n_samples");
    assert!(dst.len() >= n_samples, "dst too short for n_samples");

    match format {
        SampleFormat::U8 => {
            for i in 0..n_samples {
                dst[i] = (f32::from(src[i]) - 128.0) / 128.0;
            }
        }
        SampleFormat::S8 => {
            for i in 0..n_samples {
                dst[i] = f32::from(src[i] as i8) / 128.0;
            }
        }
        SampleFormat::S16Le => {
            for i in 0..n_samples {
                let v = i16::from_le_bytes([src[i * 2], src[i * 2 + 1]]);
                dst[i] = f32::from(v) / 32768.0;
            }
        }
        SampleFormat::S16Be => {
            for i in 0..n_samples {
                let v = i16::from_be_bytes([src[i * 2], src[i * 2 + 1]]);
                dst[i] = f32::from(v) / 32768.0;
            }
        }
        SampleFormat::S32Le => {
            for i in 0..n_samples {
                let o = i * 4;
                let v = i32::from_le_bytes([src[o], src[o + 1], src[o + 2], src[o + 3]]);
                dst[i] = (v as f64 / 2147483648.0) as f32;
            }
        }
        SampleFormat::S32Be => {
            for i in 0..n_samples {
                let o = i * 4;
                let v = i32::from_be_bytes([src[o], src[o + 1], src[o + 2], src[o + 3]]);
                dst[i] = (v as f64 / 2147483648.0) as f32;
            }
        }
        SampleFormat::F32Le => {
            for i in 0..n_samples {
                let o = i * 4;
                dst[i] = f32::from_le_bytes([src[o], src[o + 1], src[o + 2], src[o + 3]]);
            }
        }
        SampleFormat::F32Be => {
            for i in 0..n_samples {
                let o = i * 4;
                dst[i] = f32::from_be_bytes([src[o], src[o + 1], src[o + 2], src[o + 3]]);
            }
        }
        SampleFormat::Unknown => return Err(Error::UnsupportedFormat(format)),
    }
    Ok(())
}

/// Pack `n_samples` interleaved `f32` samples from `src` into `dst` in
/// `format`, clipping to the destination's legal range before quantization.
pub fn from_float(dst: &mut [u8], src: &[f32], n_samples: usize, format: SampleFormat) -> Result<()> {
    let bytes = format.byte_size();
    if bytes == 0 {
        return Err(Error::UnsupportedFormat(format));
    }
    assert!(dst.len() >= n_samples * bytes, "dst too short for n_samples");
    assert!(src.len() >= n_samples, "src too short for n_samples");

    match format {
        SampleFormat::U8 => {
            for i in 0..n_samples {
                let v = (src[i].clamp(-1.0, 1.0) * 128.0 + 128.0).round();
                dst[i] = v.clamp(0.0, 255.0) as u8;
            }
        }
        SampleFormat::S8 => {
            for i in 0..n_samples {
                let v = (src[i].clamp(-1.0, 1.0) * 128.0).round();
                dst[i] = v.clamp(-128.0, 127.0) as i8 as u8;
            }
        }
        SampleFormat::S16Le | SampleFormat::S16Be => {
            for i in 0..n_samples {
                let v = (src[i].clamp(-1.0, 1.0) * 32768.0).round();
                let s = v.clamp(-32768.0, 32767.0) as i16;
                let bytes = if format == SampleFormat::S16Le {
                    s.to_le_bytes()
                } else {
                    s.to_be_bytes()
                };
                dst[i * 2] = bytes[0];
                dst[i * 2 + 1] = bytes[1];
            }
        }
        SampleFormat::S32Le | SampleFormat::S32Be => {
            for i in 0..n_samples {
                let v = (f64::from(src[i].clamp(-1.0, 1.0)) * 2147483648.0).round();
                let s = v.clamp(-2147483648.0, 2147483647.0) as i32;
                let bytes = if format == SampleFormat::S32Le {
                    s.to_le_bytes()
                } else {
                    s.to_be_bytes()
                };
                dst[i * 4..i * 4 + 4].copy_from_slice(&bytes);
            }
        }
        SampleFormat::F32Le | SampleFormat::F32Be => {
            for i in 0..n_samples {
                let v = src[i].clamp(-1.0, 1.0);
                let bytes = if format == SampleFormat::F32Le {
                    v.to_le_bytes()
                } else {
                    v.to_be_bytes()
                };
                dst[i * 4..i * 4 + 4].copy_from_slice(&bytes);
            }
        }
        SampleFormat::Unknown => return Err(Error::UnsupportedFormat(format)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_mono_to_s16le_mono_seed_scenario() {
        // Seed scenario 1 from the testable-properties section: u8 -> s16le.
        let src = [0u8, 64, 128, 192, 255];
        let mut floats = [0f32; 5];
        to_float(&mut floats, &src, 5, SampleFormat::U8).unwrap();

        let mut packed = [0u8; 10];
        from_float(&mut packed, &floats, 5, SampleFormat::S16Le).unwrap();

        let expect = [-32768i16, -16384, 0, 16384, 32512];
        for (i, e) in expect.iter().enumerate() {
            let v = i16::from_le_bytes([packed[i * 2], packed[i * 2 + 1]]);
            assert!((i32::from(v) - i32::from(*e)).abs() <= 1, "sample {i}: {v} vs {e}");
        }
    }

    #[test]
    fn f32_identity_copy() {
        let src = [0.5f32, -0.25, 1.0, -1.0];
        let mut bytes = [0u8; 16];
        from_float(&mut bytes, &src, 4, SampleFormat::F32Le).unwrap();
        let mut back = [0f32; 4];
        to_float(&mut back, &bytes, 4, SampleFormat::F32Le).unwrap();
        for (a, b) in src.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn clipping_saturates_rather_than_wraps() {
        let src = [2.0f32, -2.0];
        let mut bytes = [0u8; 2];
        from_float(&mut bytes, &src, 2, SampleFormat::S8).unwrap();
        assert_eq!(bytes[0] as i8, 127);
        assert_eq!(bytes[1] as i8, -128);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut dst = [0f32; 1];
        let err = to_float(&mut dst, &[0u8], 1, SampleFormat::Unknown).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
