//! One-shot and streaming format/channel/sample-rate conversion.

use crate::{AudioSpec, Buffer, Error, Result, SampleFormat, endian, resample, sample};

fn decode_int_sample(bytes: &[u8], format: SampleFormat) -> i64 {
    match format {
        SampleFormat::U8 => i64::from(bytes[0]),
        SampleFormat::S8 => i64::from(bytes[0] as i8),
        SampleFormat::S16Le => i64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
        SampleFormat::S16Be => i64::from(i16::from_be_bytes([bytes[0], bytes[1]])),
        SampleFormat::S32Le => {
            i64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        SampleFormat::S32Be => {
            i64::from(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        SampleFormat::F32Le | SampleFormat::F32Be | SampleFormat::Unknown => 0,
    }
}

fn encode_int_sample(value: i64, format: SampleFormat, out: &mut [u8]) {
    match format {
        SampleFormat::U8 => out[0] = value.clamp(0, 255) as u8,
        SampleFormat::S8 => out[0] = value.clamp(-128, 127) as i8 as u8,
        SampleFormat::S16Le => out[..2].copy_from_slice(&(value.clamp(-32768, 32767) as i16).to_le_bytes()),
        SampleFormat::S16Be => out[..2].copy_from_slice(&(value.clamp(-32768, 32767) as i16).to_be_bytes()),
        SampleFormat::S32Le => {
            out[..4].copy_from_slice(&(value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32).to_le_bytes());
        }
        SampleFormat::S32Be => {
            out[..4].copy_from_slice(&(value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32).to_be_bytes());
        }
        SampleFormat::F32Le | SampleFormat::F32Be | SampleFormat::Unknown => {}
    }
}

fn decode_f32_sample(bytes: &[u8], format: SampleFormat) -> f32 {
    match format {
        SampleFormat::F32Le => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        SampleFormat::F32Be => f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => 0.0,
    }
}

fn encode_f32_sample(value: f32, format: SampleFormat, out: &mut [u8]) {
    let bytes = if format == SampleFormat::F32Be {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    out[..4].copy_from_slice(&bytes);
}

/// Duplicate every mono sample (raw bytes, format width) into an interleaved
/// L/R stereo buffer.
fn mono_to_stereo_bytes(data: &[u8], format: SampleFormat) -> Vec<u8> {
    let w = format.byte_size();
    let n = data.len() / w;
    let mut out = vec![0u8; n * 2 * w];
    for i in 0..n {
        let src = &data[i * w..i * w + w];
        out[i * 2 * w..i * 2 * w + w].copy_from_slice(src);
        out[i * 2 * w + w..i * 2 * w + 2 * w].copy_from_slice(src);
    }
    out
}

/// Average interleaved L/R pairs down to mono. `s32` divides each channel
/// by two before summing to avoid overflow, per spec.
fn stereo_to_mono_bytes(data: &[u8], format: SampleFormat) -> Vec<u8> {
    let w = format.byte_size();
    let n = data.len() / (2 * w);
    let mut out = vec![0u8; n * w];

    for i in 0..n {
        let l = &data[i * 2 * w..i * 2 * w + w];
        let r = &data[i * 2 * w + w..i * 2 * w + 2 * w];
        let dst = &mut out[i * w..i * w + w];

        if format.is_float() {
            let avg = (decode_f32_sample(l, format) + decode_f32_sample(r, format)) * 0.5;
            encode_f32_sample(avg, format, dst);
        } else if matches!(format, SampleFormat::S32Le | SampleFormat::S32Be) {
            let avg = decode_int_sample(l, format) / 2 + decode_int_sample(r, format) / 2;
            encode_int_sample(avg, format, dst);
        } else {
            let avg = (decode_int_sample(l, format) + decode_int_sample(r, format)) / 2;
            encode_int_sample(avg, format, dst);
        }
    }
    out
}

/// Convert every scalar sample in `data` from `from` to `to`, keeping the
/// channel/frame count unchanged (stage (a) of the general pipeline).
fn convert_format(data: &[u8], from: SampleFormat, to: SampleFormat) -> Result<Vec<u8>> {
    if from.byte_size() == 0 {
        return Err(Error::UnsupportedFormat(from));
    }
    if to.byte_size() == 0 {
        return Err(Error::UnsupportedFormat(to));
    }
    if from == to {
        return Ok(data.to_vec());
    }

    let n_samples = data.len() / from.byte_size();
    let mut floats = vec![0f32; n_samples];
    sample::to_float(&mut floats, data, n_samples, from)?;

    let mut out = vec![0u8; n_samples * to.byte_size()];
    sample::from_float(&mut out, &floats, n_samples, to)?;
    Ok(out)
}

fn is_endian_swap_pair(from: SampleFormat, to: SampleFormat) -> bool {
    from.byte_size() == to.byte_size() && from != to && from.swapped_endian() == to
}

/// Stateless converter over `(format, channels, freq)` specs, implementing
/// the staged format -> channels -> rate conversion pipeline.
pub struct AudioConverter;

impl AudioConverter {
    /// Convert `src_data` (in `src_spec`) to `dst_spec`, following the
    /// staged pipeline: short-circuit on empty input, then fast paths
    /// (identity copy, endian swap, mono<->stereo duplication/averaging),
    /// then the general format -> channel -> rate pipeline.
    pub fn convert(src_spec: AudioSpec, src_data: &[u8], dst_spec: AudioSpec) -> Result<Vec<u8>> {
        if src_data.is_empty() {
            return Ok(Vec::new());
        }

        // Fast path 1: identical specs.
        if src_spec == dst_spec {
            return Ok(src_data.to_vec());
        }

        // Fast path 2: endian swap only.
        if src_spec.channels == dst_spec.channels
            && src_spec.freq == dst_spec.freq
            && is_endian_swap_pair(src_spec.format, dst_spec.format)
        {
            let mut out = src_data.to_vec();
            if src_spec.format.byte_size() == 2 {
                endian::swap16_inplace(&mut out);
            } else {
                endian::swap32_inplace(&mut out);
            }
            return Ok(out);
        }

        // Fast path 3: mono<->stereo only.
        if src_spec.format == dst_spec.format && src_spec.freq == dst_spec.freq {
            if src_spec.channels == 1 && dst_spec.channels == 2 {
                return Ok(mono_to_stereo_bytes(src_data, src_spec.format));
            }
            if src_spec.channels == 2 && dst_spec.channels == 1 {
                return Ok(stereo_to_mono_bytes(src_data, src_spec.format));
            }
        }

        // General pipeline.
        let mut working = src_data.to_vec();
        let mut working_spec = src_spec;

        if working_spec.format != dst_spec.format {
            working = convert_format(&working, working_spec.format, dst_spec.format)?;
            working_spec.format = dst_spec.format;
        }

        if working_spec.channels != dst_spec.channels {
            if working_spec.channels == 1 && dst_spec.channels == 2 {
                working = mono_to_stereo_bytes(&working, working_spec.format);
            } else if working_spec.channels == 2 && dst_spec.channels == 1 {
                working = stereo_to_mono_bytes(&working, working_spec.format);
            } else {
                return Err(Error::Conversion(format!(
                    "unsupported channel remix: {} -> {} channels",
                    working_spec.channels, dst_spec.channels
                )));
            }
            working_spec.channels = dst_spec.channels;
        }

        if working_spec.freq != dst_spec.freq {
            working = resample_to(&working, working_spec, dst_spec.freq)?;
            working_spec.freq = dst_spec.freq;
        }

        Ok(working)
    }

    /// Whether `convert(from, _, to)` takes one of the cheap fast paths
    /// (identity, endian swap, mono<->stereo) instead of the general pipeline.
    #[must_use]
    pub fn has_fast_path(from: AudioSpec, to: AudioSpec) -> bool {
        if from == to {
            return true;
        }
        if from.channels == to.channels
            && from.freq == to.freq
            && is_endian_swap_pair(from.format, to.format)
        {
            return true;
        }
        if from.format == to.format && from.freq == to.freq {
            if from.channels == 1 && to.channels == 2 {
                return true;
            }
            if from.channels == 2 && to.channels == 1 {
                return true;
            }
        }
        false
    }

    /// In-place conversion, permitted only when it does not change the
    /// buffer's byte length — presently the 16-bit and 32-bit endian swaps.
    pub fn convert_in_place(spec: &mut AudioSpec, data: &mut [u8], dst_spec: AudioSpec) -> Result<()> {
        if spec.channels == dst_spec.channels
            && spec.freq == dst_spec.freq
            && is_endian_swap_pair(spec.format, dst_spec.format)
        {
            if spec.format.byte_size() == 2 {
                endian::swap16_inplace(data);
            } else {
                endian::swap32_inplace(data);
            }
            spec.format = dst_spec.format;
            return Ok(());
        }
        Err(Error::Conversion(
            "in-place conversion not possible for this format combination".to_string(),
        ))
    }

    /// Upper bound on `convert(src_spec, _, dst_spec).len()` for any input of
    /// length `src_len`, tight to within `4 * bytes_per_frame(dst_spec)`.
    pub fn estimate_output_size(src_spec: AudioSpec, src_len: usize, dst_spec: AudioSpec) -> Result<usize> {
        if src_spec.format.byte_size() == 0 {
            return Err(Error::UnsupportedFormat(src_spec.format));
        }
        if dst_spec.format.byte_size() == 0 {
            return Err(Error::UnsupportedFormat(dst_spec.format));
        }

        let src_frame = src_spec.frame_size();
        if src_frame == 0 {
            return Err(Error::UnsupportedFormat(src_spec.format));
        }

        let mut num_frames = src_len / src_frame;
        if src_spec.freq != dst_spec.freq && src_spec.freq > 0 {
            num_frames = (num_frames * dst_spec.freq as usize) / src_spec.freq as usize;
            num_frames += 4;
        }

        let dst_frame = dst_spec.frame_size();
        if dst_frame == 0 {
            return Err(Error::UnsupportedFormat(dst_spec.format));
        }
        Ok(num_frames * dst_frame)
    }

    /// Convert into a caller-owned buffer, growing it if needed, and return
    /// the number of bytes written.
    pub fn convert_into(
        src_spec: AudioSpec,
        src_data: &[u8],
        dst_spec: AudioSpec,
        dst_buffer: &mut Buffer<u8>,
    ) -> Result<usize> {
        let result = Self::convert(src_spec, src_data, dst_spec)?;
        if dst_buffer.len() < result.len() {
            dst_buffer.resize(result.len());
        }
        dst_buffer.as_mut_slice()[..result.len()].copy_from_slice(&result);
        Ok(result.len())
    }
}

/// Resample `data` (already at the destination format/channel count, per
/// `spec`, but `spec.freq` still the source rate) using the converter's
/// general pipeline. Exposed as a free function because `AudioConverter` is
/// a stateless marker type (its methods take specs, not `self`).
fn resample_to(data: &[u8], spec: AudioSpec, dst_freq: u32) -> Result<Vec<u8>> {
    let n_samples = data.len() / spec.format.byte_size();
    let mut floats = vec![0f32; n_samples];
    sample::to_float(&mut floats, data, n_samples, spec.format)?;

    let resampled = resample::resample_interleaved(&floats, spec.channels as usize, spec.freq, dst_freq);

    let mut out = vec![0u8; resampled.len() * spec.format.byte_size()];
    sample::from_float(&mut out, &resampled, resampled.len(), spec.format)?;
    Ok(out)
}

impl AudioConverter {
    /// Sample-rate conversion stage: Catmull-Rom cubic interpolation per
    /// channel at the current format/channel count. Exposed directly for
    /// callers (e.g. the streaming converter) that need the rate stage
    /// without the full format/channel pipeline.
    pub fn resample(data: &[u8], spec: AudioSpec, dst_freq: u32) -> Result<Vec<u8>> {
        resample_to(data, spec, dst_freq)
    }
}

/// Number of trailing source frames a [`StreamConverter`] retains across
/// `process_chunk` calls to give Catmull-Rom interpolation the context it
/// needs at a chunk boundary.
const RESAMPLE_CONTEXT_FRAMES: usize = 3;

/// Stateful wrapper around [`AudioConverter`] for callers that receive audio
/// in chunks (decoder output, network reads) rather than all at once.
///
/// Buffers incoming bytes until there is enough to convert, and — when
/// resampling — holds back the last few source frames so the next call's
/// interpolation has the context it needs rather than starting cold at every
/// chunk boundary.
pub struct StreamConverter {
    src_spec: AudioSpec,
    dst_spec: AudioSpec,
    carry: Vec<u8>,
}

impl StreamConverter {
    /// Build a converter from `src_spec` to `dst_spec`. Returns an error if
    /// either spec uses an unsupported sample format.
    pub fn new(src_spec: AudioSpec, dst_spec: AudioSpec) -> Result<Self> {
        if src_spec.format.byte_size() == 0 {
            return Err(Error::UnsupportedFormat(src_spec.format));
        }
        if dst_spec.format.byte_size() == 0 {
            return Err(Error::UnsupportedFormat(dst_spec.format));
        }
        Ok(Self {
            src_spec,
            dst_spec,
            carry: Vec::new(),
        })
    }

    /// Feed `data` in and get back however much converted output is ready.
    /// When resampling, the trailing `RESAMPLE_CONTEXT_FRAMES` source frames
    /// are always held back until more data (or [`Self::flush`]) arrives.
    pub fn process_chunk(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.carry.extend_from_slice(data);

        let src_frame = self.src_spec.frame_size();
        if src_frame == 0 {
            return Err(Error::UnsupportedFormat(self.src_spec.format));
        }

        let total_frames = self.carry.len() / src_frame;
        let resampling = self.src_spec.freq != self.dst_spec.freq;
        let hold_back = if resampling { RESAMPLE_CONTEXT_FRAMES } else { 0 };

        if total_frames <= hold_back {
            return Ok(Vec::new());
        }

        let consume_frames = total_frames - hold_back;
        let consume_bytes = consume_frames * src_frame;
        let chunk = self.carry.drain(..consume_bytes).collect::<Vec<u8>>();

        AudioConverter::convert(self.src_spec, &chunk, self.dst_spec)
    }

    /// Convert and return whatever is left buffered, including any
    /// held-back interpolation context, then reset internal state.
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        if self.carry.is_empty() {
            return Ok(Vec::new());
        }
        let chunk = std::mem::take(&mut self.carry);
        AudioConverter::convert(self.src_spec, &chunk, self.dst_spec)
    }

    /// Discard buffered input without producing output, e.g. after a seek.
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}
