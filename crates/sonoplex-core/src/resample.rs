//! Catmull-Rom cubic resampling, shared by the one-shot/streaming converter
//! (this crate) and the per-stream resampler (`sonoplex-engine`).

/// Evaluate the Catmull-Rom cubic through four samples at fractional
/// position `t` in `[0, 1)` between `p1` and `p2`.
///
/// ```text
/// a = -0.5*p0 + 1.5*p1 - 1.5*p2 + 0.5*p3
/// b =      p0 - 2.5*p1 + 2.0*p2 - 0.5*p3
/// c = -0.5*p0          + 0.5*p2
/// d =           p1
/// out = a*t^3 + b*t^2 + c*t + d
/// ```
#[must_use]
pub fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;
    let t2 = t * t;
    let t3 = t2 * t;
    a * t3 + b * t2 + c * t + d
}

/// Fetch sample `i` from a single-channel slice `src`, clamping at both ends
/// by replicating the nearest endpoint sample (the boundary rule used for
/// Catmull-Rom resampling).
#[inline]
fn clamped(src: &[f32], i: isize) -> f32 {
    if src.is_empty() {
        return 0.0;
    }
    let last = src.len() as isize - 1;
    let idx = i.clamp(0, last);
    src[idx as usize]
}

/// Resample one channel's worth of samples (already de-interleaved) from
/// `src_rate` to `dst_rate` using Catmull-Rom cubic interpolation.
///
/// Output frame count is `round(src.len() * dst_rate / src_rate)`;
/// interpolation positions are the real-valued `i * src_rate / dst_rate`.
/// A no-op (straight copy) is used when `src_rate == dst_rate`.
#[must_use]
pub fn resample_channel(src: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || src.is_empty() {
        return src.to_vec();
    }

    let out_len =
        ((src.len() as f64 * f64::from(dst_rate) / f64::from(src_rate)).round()) as usize;
    let ratio = f64::from(src_rate) / f64::from(dst_rate);

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let x = i as f64 * ratio;
        let base = x.floor();
        let t = (x - base) as f32;
        let bi = base as isize;

        let p0 = clamped(src, bi - 1);
        let p1 = clamped(src, bi);
        let p2 = clamped(src, bi + 1);
        let p3 = clamped(src, bi + 2);
        out.push(catmull_rom(p0, p1, p2, p3, t));
    }
    out
}

/// Resample interleaved multi-channel `f32` audio from `src_rate` to
/// `dst_rate`, one channel at a time.
#[must_use]
pub fn resample_interleaved(src: &[f32], channels: usize, src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if channels == 0 || src.is_empty() {
        return Vec::new();
    }
    if src_rate == dst_rate {
        return src.to_vec();
    }

    let frames = src.len() / channels;
    let mut deinterleaved: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for frame in src.chunks_exact(channels) {
        for (c, &s) in frame.iter().enumerate() {
            deinterleaved[c].push(s);
        }
    }

    let resampled: Vec<Vec<f32>> = deinterleaved
        .iter()
        .map(|ch| resample_channel(ch, src_rate, dst_rate))
        .collect();

    let out_frames = resampled.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        for ch in &resampled {
            out.push(ch[i]);
        }
    }
    out
}
