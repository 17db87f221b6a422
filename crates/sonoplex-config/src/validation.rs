//! Validation for [`crate::DeviceProfile`] and [`crate::MixerConfig`].

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("channel count must be nonzero (got {0})")]
    ZeroChannels(u8),

    #[error("channel count {0} exceeds the supported maximum of 8")]
    TooManyChannels(u8),

    #[error("sample rate must be nonzero")]
    ZeroFrequency,

    #[error("buffer size in frames must be nonzero")]
    ZeroBufferFrames,

    #[error("unknown sample format: {0}")]
    UnknownFormat(String),

    #[error("device gain must be non-negative (got {0})")]
    NegativeGain(f32),
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn validate_device_profile(profile: &crate::DeviceProfile) -> ValidationResult<()> {
    if profile.channels == 0 {
        return Err(ValidationError::ZeroChannels(0));
    }
    if profile.channels > 8 {
        return Err(ValidationError::TooManyChannels(profile.channels));
    }
    if profile.sample_rate == 0 {
        return Err(ValidationError::ZeroFrequency);
    }
    if profile.buffer_frames == 0 {
        return Err(ValidationError::ZeroBufferFrames);
    }
    crate::sample_format_from_str(&profile.format).ok_or_else(|| ValidationError::UnknownFormat(profile.format.clone()))?;
    Ok(())
}

pub fn validate_mixer_config(config: &crate::MixerConfig) -> ValidationResult<()> {
    if config.device_gain < 0.0 {
        return Err(ValidationError::NegativeGain(config.device_gain));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceProfile, MixerConfig};

    #[test]
    fn zero_channels_rejected() {
        let profile = DeviceProfile { channels: 0, ..DeviceProfile::default() };
        assert!(matches!(validate_device_profile(&profile), Err(ValidationError::ZeroChannels(_))));
    }

    #[test]
    fn zero_frequency_rejected() {
        let profile = DeviceProfile { sample_rate: 0, ..DeviceProfile::default() };
        assert!(matches!(validate_device_profile(&profile), Err(ValidationError::ZeroFrequency)));
    }

    #[test]
    fn too_many_channels_rejected() {
        let profile = DeviceProfile { channels: 9, ..DeviceProfile::default() };
        assert!(matches!(validate_device_profile(&profile), Err(ValidationError::TooManyChannels(9))));
    }

    #[test]
    fn default_profile_is_valid() {
        assert!(validate_device_profile(&DeviceProfile::default()).is_ok());
    }

    #[test]
    fn negative_gain_rejected() {
        let config = MixerConfig { device_gain: -0.5, ..MixerConfig::default() };
        assert!(matches!(validate_mixer_config(&config), Err(ValidationError::NegativeGain(_))));
    }

    #[test]
    fn unknown_format_rejected() {
        let profile = DeviceProfile { format: "nope".to_string(), ..DeviceProfile::default() };
        assert!(matches!(validate_device_profile(&profile), Err(ValidationError::UnknownFormat(_))));
    }
}
