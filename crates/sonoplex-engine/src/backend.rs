//! The platform backend interface the engine consumes.
//!
//! Concrete bindings (a real OS audio subsystem) are intentionally out of
//! scope for the core; [`crate::cpal_backend::CpalBackend`] is kept small
//! and gated behind the `cpal-backend` feature as the example/reference
//! binding.

use crate::error::Result;
use sonoplex_core::AudioSpec;
use std::fmt;

/// Opaque handle to a device opened through an [`AudioBackend`]. The engine
/// never inspects its value; backends are free to key it however they like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// One entry from [`AudioBackend::enumerate_devices`] / `default_device`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub id: String,
    pub is_default: bool,
    pub channels: u8,
    pub sample_rate: u32,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device_info{{name=\"{}\", id=\"{}\", is_default={}, channels={}, sample_rate={}}}",
            self.name, self.id, self.is_default, self.channels, self.sample_rate
        )
    }
}

/// The periodic callback the backend invokes to fill an output buffer, or
/// consume an input buffer. The engine's mixer is the only thing ever
/// wrapped in this closure; it never re-enters the backend from inside the
/// callback.
pub type AudioCallback = Box<dyn FnMut(&mut [u8]) + Send>;

/// Device-level operations a platform audio subsystem must provide.
///
/// A device goes through `open_device` -> `create_stream` ->
/// (`bind_to_device` + `resume` on the returned [`BackendStream`]) to start
/// callback flow.
pub trait AudioBackend: Send {
    fn init(&mut self) -> Result<()>;
    fn shutdown(&mut self);
    fn is_initialized(&self) -> bool;
    fn name(&self) -> &str;

    fn enumerate_devices(&self, playback: bool) -> Result<Vec<DeviceInfo>>;
    fn default_device(&self, playback: bool) -> Result<DeviceInfo>;

    /// `device_id` may be empty to request the default device.
    fn open_device(&mut self, device_id: &str, desired_spec: AudioSpec) -> Result<(DeviceHandle, AudioSpec)>;
    fn close_device(&mut self, handle: DeviceHandle) -> Result<()>;

    fn device_format(&self, handle: DeviceHandle) -> Result<AudioSpec>;
    fn device_gain(&self, handle: DeviceHandle) -> Result<f32>;
    fn set_device_gain(&mut self, handle: DeviceHandle, gain: f32) -> Result<()>;

    fn pause_device(&mut self, handle: DeviceHandle) -> Result<()>;
    fn resume_device(&mut self, handle: DeviceHandle) -> Result<()>;
    fn is_device_paused(&self, handle: DeviceHandle) -> Result<bool>;

    /// Whether this backend can mute a device itself. When `false`, the
    /// engine falls back to zeroing the mixer's output after mixing.
    fn supports_mute(&self) -> bool {
        false
    }
    fn mute_device(&mut self, _handle: DeviceHandle) -> Result<()> {
        Ok(())
    }
    fn unmute_device(&mut self, _handle: DeviceHandle) -> Result<()> {
        Ok(())
    }
    fn is_device_muted(&self, _handle: DeviceHandle) -> Result<bool> {
        Ok(false)
    }

    /// Register `callback` as the periodic producer for `handle`, returning
    /// a [`BackendStream`] the caller uses to start/stop callback delivery.
    fn create_stream(
        &mut self,
        handle: DeviceHandle,
        spec: AudioSpec,
        callback: AudioCallback,
    ) -> Result<Box<dyn BackendStream>>;

    fn supports_recording(&self) -> bool {
        false
    }
    fn max_open_devices(&self) -> usize {
        1
    }
}

/// The object `create_stream` hands back. The engine drives
/// playback with `bind_to_device` + `resume`, and stops it with `pause` +
/// `unbind_from_device`. `put_data`/`get_data` are for the backend's
/// queue-mode operation when no callback is registered; the engine does not
/// use them since it always registers a callback.
pub trait BackendStream: Send {
    fn put_data(&mut self, data: &[u8]) -> usize {
        let _ = data;
        0
    }
    fn get_data(&mut self, out: &mut [u8]) -> usize {
        let _ = out;
        0
    }
    fn clear(&mut self) {}

    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn is_paused(&self) -> bool;
    fn queued_size(&self) -> usize {
        0
    }

    fn bind_to_device(&mut self, handle: DeviceHandle) -> Result<()>;
    fn unbind_from_device(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_info_display_matches_expected_shape() {
        let info = DeviceInfo {
            name: "Speakers".into(),
            id: "default".into(),
            is_default: true,
            channels: 2,
            sample_rate: 44100,
        };
        let rendered = info.to_string();
        assert!(rendered.starts_with("device_info{"));
        assert!(rendered.contains("name=\"Speakers\""));
        assert!(rendered.contains("sample_rate=44100"));
    }
}
