//! Sonoplex Config - device and mixer configuration
//!
//! The ambient configuration layer sonoplex-engine consumes: a
//! [`DeviceProfile`] describing the desired audio spec/backend/buffer size
//! to open a device with, and a [`MixerConfig`] describing the mixer's
//! starting device gain and mute default. Both are loadable from a single
//! TOML file located via the platform config directory ([`dirs::config_dir`]).

mod error;
pub mod paths;
pub mod validation;

pub use error::{ConfigError, Result};
pub use validation::{validate_device_profile, validate_mixer_config, ValidationError, ValidationResult};

use serde::{Deserialize, Serialize};
use sonoplex_core::SampleFormat;
use std::path::Path;

/// Text representation of a [`SampleFormat`] used in TOML; `sonoplex-core`
/// doesn't derive `serde` traits on its own types, so config stores the
/// human-readable name and converts at load time.
#[must_use]
pub fn sample_format_from_str(s: &str) -> Option<SampleFormat> {
    match s {
        "u8" => Some(SampleFormat::U8),
        "s8" => Some(SampleFormat::S8),
        "s16le" => Some(SampleFormat::S16Le),
        "s16be" => Some(SampleFormat::S16Be),
        "s32le" => Some(SampleFormat::S32Le),
        "s32be" => Some(SampleFormat::S32Be),
        "f32le" => Some(SampleFormat::F32Le),
        "f32be" => Some(SampleFormat::F32Be),
        _ => None,
    }
}

#[must_use]
pub fn sample_format_to_str(format: SampleFormat) -> &'static str {
    match format {
        SampleFormat::U8 => "u8",
        SampleFormat::S8 => "s8",
        SampleFormat::S16Le => "s16le",
        SampleFormat::S16Be => "s16be",
        SampleFormat::S32Le => "s32le",
        SampleFormat::S32Be => "s32be",
        SampleFormat::F32Le => "f32le",
        SampleFormat::F32Be => "f32be",
        SampleFormat::Unknown => "unknown",
    }
}

/// Desired spec and backend settings to open a device with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Backend-specific device identifier; empty string means "default device".
    pub device_id: String,
    /// Which `AudioBackend` implementation to use (e.g. `"cpal"`).
    pub backend: String,
    pub format: String,
    pub channels: u8,
    pub sample_rate: u32,
    /// Requested callback chunk size, in frames.
    pub buffer_frames: u32,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            backend: "cpal".to_string(),
            format: "f32le".to_string(),
            channels: 2,
            sample_rate: 44100,
            buffer_frames: 1024,
        }
    }
}

impl DeviceProfile {
    /// The `(format, channels, freq)` triple this profile describes, or
    /// `None` if `format` isn't a recognized sample format name.
    #[must_use]
    pub fn to_audio_spec(&self) -> Option<sonoplex_core::AudioSpec> {
        Some(sonoplex_core::AudioSpec {
            format: sample_format_from_str(&self.format)?,
            channels: self.channels,
            freq: self.sample_rate,
        })
    }
}

/// Mixer-level defaults applied when a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub device_gain: f32,
    pub global_mute_default: bool,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self { device_gain: 1.0, global_mute_default: false }
    }
}

/// The full contents of sonoplex's configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonoplexConfig {
    pub device: DeviceProfile,
    pub mixer: MixerConfig,
}

impl SonoplexConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config: Self = toml::from_str(&text)?;
        validate_device_profile(&config.device)?;
        validate_mixer_config(&config.mixer)?;
        Ok(config)
    }

    /// Load from [`paths::default_config_path`], or fall back to
    /// [`SonoplexConfig::default`] if no config file exists yet.
    pub fn load_or_default() -> Result<Self> {
        let path = paths::default_config_path();
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
            }
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| ConfigError::write_file(path, e))
    }
}
