//! Opens a backend device, owns its mixer, and orchestrates switching to a
//! different device by moving streams across without losing playback
//! position.

use crate::backend::{AudioBackend, AudioCallback, BackendStream, DeviceHandle, DeviceInfo};
use crate::error::{Error, Result};
use crate::mixer::Mixer;
use crate::stream::{AudioSource, AudioStream};
use sonoplex_core::AudioSpec;
use std::sync::{Arc, Mutex};

type SharedBackend = Arc<Mutex<Box<dyn AudioBackend>>>;

/// One open hardware device: a backend handle, the mixer bound to its
/// negotiated spec, and the running callback stream. `device_spec` never
/// changes for the lifetime of this handle — switching devices replaces
/// the `AudioDevice`, not its spec.
pub struct AudioDevice {
    backend: SharedBackend,
    backend_handle: DeviceHandle,
    device_spec: AudioSpec,
    name: String,
    mixer: Arc<Mixer>,
    backend_stream: Mutex<Box<dyn BackendStream>>,
    last_output_snapshot: Arc<Mutex<Vec<f32>>>,
    supports_hw_mute: bool,
}

impl AudioDevice {
    fn open_with(backend: SharedBackend, device_id: &str, desired_spec: AudioSpec) -> Result<Self> {
        let (backend_handle, obtained_spec, supports_hw_mute) = {
            let mut guard = backend.lock().expect("backend lock poisoned");
            let (handle, spec) = guard.open_device(device_id, desired_spec)?;
            (handle, spec, guard.supports_mute())
        };

        let mixer = Arc::new(Mixer::new(obtained_spec));
        mixer.set_backend_mute_supported(supports_hw_mute);
        let last_output_snapshot: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));

        let mixer_for_callback = mixer.clone();
        let snapshot_for_callback = last_output_snapshot.clone();
        let mut scratch = Vec::new();
        let mut per_stream = Vec::new();
        let callback: AudioCallback = Box::new(move |out: &mut [u8]| {
            mixer_for_callback.run(out, &mut scratch, &mut per_stream);
            if let Ok(mut snapshot) = snapshot_for_callback.lock() {
                snapshot.clear();
                snapshot.extend_from_slice(&scratch);
            }
        });

        let mut backend_stream = {
            let mut guard = backend.lock().expect("backend lock poisoned");
            guard.create_stream(backend_handle, obtained_spec, callback)?
        };
        backend_stream.bind_to_device(backend_handle)?;
        backend_stream.resume()?;

        let name = if device_id.is_empty() { "default".to_string() } else { device_id.to_string() };

        tracing::debug!(device = %name, channels = obtained_spec.channels, freq = obtained_spec.freq, "audio device opened");

        Ok(Self {
            backend,
            backend_handle,
            device_spec: obtained_spec,
            name,
            mixer,
            backend_stream: Mutex::new(backend_stream),
            last_output_snapshot,
            supports_hw_mute,
        })
    }

    #[must_use]
    pub fn channels(&self) -> u8 {
        self.device_spec.channels
    }

    #[must_use]
    pub fn freq(&self) -> u32 {
        self.device_spec.freq
    }

    #[must_use]
    pub fn device_spec(&self) -> AudioSpec {
        self.device_spec
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    /// Most recent post-mix float buffer, for visualization.
    #[must_use]
    pub fn last_output_snapshot(&self) -> Vec<f32> {
        self.last_output_snapshot.lock().expect("snapshot lock poisoned").clone()
    }

    pub fn set_gain(&self, gain: f32) {
        self.mixer.set_device_gain(gain);
    }

    #[must_use]
    pub fn gain(&self) -> f32 {
        self.mixer.device_gain()
    }

    pub fn resume(&self) -> Result<()> {
        self.backend_stream.lock().expect("stream lock poisoned").resume()
    }

    pub fn pause(&self) -> Result<()> {
        self.backend_stream.lock().expect("stream lock poisoned").pause()
    }

    #[must_use]
    pub fn has_hardware_mute(&self) -> bool {
        self.supports_hw_mute
    }

    pub fn mute_all(&self) -> Result<()> {
        if self.supports_hw_mute {
            self.backend.lock().expect("backend lock poisoned").mute_device(self.backend_handle)
        } else {
            self.mixer.set_global_muted(true);
            Ok(())
        }
    }

    pub fn unmute_all(&self) -> Result<()> {
        if self.supports_hw_mute {
            self.backend.lock().expect("backend lock poisoned").unmute_device(self.backend_handle)
        } else {
            self.mixer.set_global_muted(false);
            Ok(())
        }
    }

    #[must_use]
    pub fn is_all_muted(&self) -> bool {
        if self.supports_hw_mute {
            self.backend
                .lock()
                .expect("backend lock poisoned")
                .is_device_muted(self.backend_handle)
                .unwrap_or(false)
        } else {
            self.mixer.is_global_muted()
        }
    }

    /// Moves a source into a new stream and installs it in this device's
    /// mixer in `Closed` state.
    pub fn create_stream(&self, source: AudioSource) -> Arc<AudioStream> {
        let stream = Arc::new(AudioStream::new(source, self.device_spec.channels, self.device_spec.freq));
        self.mixer.add_stream(stream.clone());
        stream
    }

    /// Convenience wrapper over `create_stream` for the PC-speaker tone
    /// generator: returns the playable stream alongside the control handle
    /// used to queue tones.
    #[must_use]
    pub fn create_pc_speaker_stream(&self) -> (Arc<AudioStream>, Arc<sonoplex_synth::PcSpeakerStream>) {
        let control = Arc::new(sonoplex_synth::PcSpeakerStream::new());
        let decoder = Box::new(sonoplex_synth::PcSpeakerDecoder::new(control.queue_handle()));
        let stream = self.create_stream(AudioSource::from_decoder(decoder));
        (stream, control)
    }

    fn close(&self) {
        let _ = self.backend_stream.lock().expect("stream lock poisoned").pause();
        self.backend_stream.lock().expect("stream lock poisoned").unbind_from_device();
        let _ = self.backend.lock().expect("backend lock poisoned").close_device(self.backend_handle);
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Process-wide entry point: owns the one backend slot, opens/switches
/// devices against it, and delegates enumeration.
pub struct AudioSystem {
    backend: SharedBackend,
}

impl AudioSystem {
    pub fn init(backend: Box<dyn AudioBackend>) -> Result<Self> {
        let mut backend = backend;
        backend.init()?;
        Ok(Self { backend: Arc::new(Mutex::new(backend)) })
    }

    pub fn done(&self) {
        self.backend.lock().expect("backend lock poisoned").shutdown();
    }

    pub fn enumerate_devices(&self, playback: bool) -> Result<Vec<DeviceInfo>> {
        self.backend.lock().expect("backend lock poisoned").enumerate_devices(playback)
    }

    pub fn open_default_device(&self, desired_spec: AudioSpec) -> Result<AudioDevice> {
        AudioDevice::open_with(self.backend.clone(), "", desired_spec)
    }

    pub fn open_device(&self, device_id: &str, desired_spec: AudioSpec) -> Result<AudioDevice> {
        if device_id.is_empty() {
            return Err(Error::DeviceNotFound(device_id.to_string()));
        }
        AudioDevice::open_with(self.backend.clone(), device_id, desired_spec)
    }

    /// Moves every stream from `old` onto a freshly opened device: pause,
    /// capture + reposition, move, restore, resume. Returns the new device;
    /// `old` is left with no streams and is dropped by the caller (closing
    /// it).
    pub fn switch_device(&self, old: &AudioDevice, new_device_id: &str, desired_spec: AudioSpec) -> Result<AudioDevice> {
        old.pause()?;

        let old_rate_by_handle: Vec<_> = old
            .mixer
            .handles()
            .into_iter()
            .filter_map(|h| old.mixer.stream(h).map(|s| (h, s)))
            .collect();

        let mut moved = Vec::with_capacity(old_rate_by_handle.len());
        for (_, stream) in &old_rate_by_handle {
            let snapshot = stream.capture_state();
            let old_rate = stream.decoder_rate().max(1);
            let micros = (snapshot.playback_tick * 1_000_000) / u64::from(old_rate);
            stream.seek_to_time(micros);
            moved.push((stream.clone(), snapshot));
        }

        let new_device = AudioDevice::open_with(self.backend.clone(), new_device_id, desired_spec)?;

        for (stream, _) in &old_rate_by_handle {
            old.mixer.remove_stream_matching(stream);
        }

        for (stream, snapshot) in moved {
            new_device.mixer.add_stream(stream.clone());
            stream.restore_state(snapshot);
        }

        new_device.resume()?;
        Ok(new_device)
    }
}
