//! Reference `AudioBackend`/`BackendStream` binding over `cpal`. Gated
//! behind the `cpal-backend` feature: a concrete platform binding is
//! intentionally out of scope for the core, so this is kept small and is
//! not where the mixer/stream/device logic lives.

use crate::backend::{AudioBackend, AudioCallback, BackendStream, DeviceHandle, DeviceInfo};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use sonoplex_core::{AudioSpec, SampleFormat};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct RegisteredDevice {
    device: cpal::Device,
    spec: AudioSpec,
    gain: f32,
    paused: bool,
}

/// Binds the engine's backend traits to the host's default audio API via
/// `cpal`. Always negotiates `SampleFormat::F32Le` streams; integer device
/// formats are converted by the data callback.
pub struct CpalBackend {
    host: cpal::Host,
    initialized: bool,
    devices: Mutex<HashMap<u64, RegisteredDevice>>,
    next_handle: AtomicU64,
}

impl CpalBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            initialized: false,
            devices: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    fn device_info_for(device: &cpal::Device, is_default: bool) -> Option<DeviceInfo> {
        let name = device.name().ok()?;
        let config = device.default_output_config().ok()?;
        Some(DeviceInfo {
            name: name.clone(),
            id: name,
            is_default,
            channels: config.channels() as u8,
            sample_rate: config.sample_rate().0,
        })
    }

    fn find_device(&self, device_id: &str) -> Result<cpal::Device> {
        if device_id.is_empty() {
            return self
                .host
                .default_output_device()
                .ok_or_else(|| Error::DeviceNotFound("<default>".to_string()));
        }
        self.host
            .output_devices()
            .map_err(|e| Error::backend(e.to_string()))?
            .find(|d| d.name().map(|n| n == device_id).unwrap_or(false))
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        self.devices.lock().expect("device map poisoned").clear();
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &str {
        "cpal"
    }

    fn enumerate_devices(&self, playback: bool) -> Result<Vec<DeviceInfo>> {
        if !playback {
            return Ok(Vec::new());
        }
        let default_name = self.host.default_output_device().and_then(|d| d.name().ok());
        let devices = self.host.output_devices().map_err(|e| Error::backend(e.to_string()))?;
        Ok(devices
            .filter_map(|d| {
                let is_default = d.name().ok().as_deref() == default_name.as_deref();
                Self::device_info_for(&d, is_default)
            })
            .collect())
    }

    fn default_device(&self, playback: bool) -> Result<DeviceInfo> {
        if !playback {
            return Err(Error::NoDevice);
        }
        let device = self.host.default_output_device().ok_or(Error::NoDevice)?;
        Self::device_info_for(&device, true).ok_or(Error::NoDevice)
    }

    fn open_device(&mut self, device_id: &str, desired_spec: AudioSpec) -> Result<(DeviceHandle, AudioSpec)> {
        let device = self.find_device(device_id)?;
        let config = device.default_output_config().map_err(|e| Error::backend(e.to_string()))?;
        let obtained_spec = AudioSpec {
            format: SampleFormat::F32Le,
            channels: if desired_spec.channels > 0 { desired_spec.channels } else { config.channels() as u8 },
            freq: if desired_spec.freq > 0 { desired_spec.freq } else { config.sample_rate().0 },
        };

        let handle_id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let handle = DeviceHandle(handle_id);
        self.devices
            .lock()
            .expect("device map poisoned")
            .insert(handle_id, RegisteredDevice { device, spec: obtained_spec, gain: 1.0, paused: false });
        Ok((handle, obtained_spec))
    }

    fn close_device(&mut self, handle: DeviceHandle) -> Result<()> {
        self.devices.lock().expect("device map poisoned").remove(&handle.0);
        Ok(())
    }

    fn device_format(&self, handle: DeviceHandle) -> Result<AudioSpec> {
        self.devices
            .lock()
            .expect("device map poisoned")
            .get(&handle.0)
            .map(|d| d.spec)
            .ok_or(Error::NoDevice)
    }

    fn device_gain(&self, handle: DeviceHandle) -> Result<f32> {
        self.devices
            .lock()
            .expect("device map poisoned")
            .get(&handle.0)
            .map(|d| d.gain)
            .ok_or(Error::NoDevice)
    }

    fn set_device_gain(&mut self, handle: DeviceHandle, gain: f32) -> Result<()> {
        self.devices
            .lock()
            .expect("device map poisoned")
            .get_mut(&handle.0)
            .map(|d| d.gain = gain.max(0.0))
            .ok_or(Error::NoDevice)
    }

    fn pause_device(&mut self, handle: DeviceHandle) -> Result<()> {
        self.devices
            .lock()
            .expect("device map poisoned")
            .get_mut(&handle.0)
            .map(|d| d.paused = true)
            .ok_or(Error::NoDevice)
    }

    fn resume_device(&mut self, handle: DeviceHandle) -> Result<()> {
        self.devices
            .lock()
            .expect("device map poisoned")
            .get_mut(&handle.0)
            .map(|d| d.paused = false)
            .ok_or(Error::NoDevice)
    }

    fn is_device_paused(&self, handle: DeviceHandle) -> Result<bool> {
        self.devices
            .lock()
            .expect("device map poisoned")
            .get(&handle.0)
            .map(|d| d.paused)
            .ok_or(Error::NoDevice)
    }

    fn create_stream(&mut self, handle: DeviceHandle, spec: AudioSpec, mut callback: AudioCallback) -> Result<Box<dyn BackendStream>> {
        let devices = self.devices.lock().expect("device map poisoned");
        let registered = devices.get(&handle.0).ok_or(Error::NoDevice)?;
        let device = registered.device.clone();
        drop(devices);

        let config = cpal::StreamConfig {
            channels: u16::from(spec.channels.max(1)),
            sample_rate: cpal::SampleRate(spec.freq.max(1)),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut scratch: Vec<u8> = Vec::new();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let byte_len = data.len() * 4;
                    if scratch.len() != byte_len {
                        scratch.resize(byte_len, 0);
                    }
                    callback(&mut scratch);
                    for (sample, bytes) in data.iter_mut().zip(scratch.chunks_exact(4)) {
                        *sample = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    }
                },
                |err| {
                    tracing::error!(%err, "cpal output stream error");
                },
                None,
            )
            .map_err(|e| Error::backend(e.to_string()))?;

        Ok(Box::new(CpalStream { stream, bound_handle: None, paused: AtomicBool::new(true) }))
    }
}

/// The `BackendStream` handed back by [`CpalBackend::create_stream`]; owns
/// the underlying `cpal::Stream` and tracks pause/bind state the engine
/// queries between callbacks.
struct CpalStream {
    stream: cpal::Stream,
    bound_handle: Option<DeviceHandle>,
    paused: AtomicBool,
}

impl BackendStream for CpalStream {
    fn pause(&mut self) -> Result<()> {
        self.stream.pause().map_err(|e| Error::backend(e.to_string()))?;
        self.paused.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.stream.play().map_err(|e| Error::backend(e.to_string()))?;
        self.paused.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn bind_to_device(&mut self, handle: DeviceHandle) -> Result<()> {
        self.bound_handle = Some(handle);
        Ok(())
    }

    fn unbind_from_device(&mut self) {
        self.bound_handle = None;
    }
}
