//! Sonoplex Engine - resampler, stream lifecycle, mixer, and device
//! orchestration
//!
//! Sits above `sonoplex-core`/`sonoplex-decode`/`sonoplex-synth`: takes an
//! opened [`Decoder`](sonoplex_decode::Decoder), resamples it to a device's
//! spec (C7), wraps it in a playable [`stream::AudioStream`] with
//! gain/pan/fade/mute and a processor chain (C8), mixes an arbitrary number
//! of these into one device's output buffer (C9), and manages device
//! lifecycle including hot-switching a live playback session to a different
//! device (C10).
//!
//! The platform backend itself ([`backend::AudioBackend`]) is an interface
//! this crate consumes, not something it fully owns; [`cpal_backend`]
//! provides a small reference binding over `cpal`, gated behind the
//! `cpal-backend` feature.

pub mod backend;
pub mod device;
pub mod error;
pub mod mixer;
pub mod resampler;
pub mod stream;

#[cfg(feature = "cpal-backend")]
pub mod cpal_backend;

pub use backend::{AudioBackend, AudioCallback, BackendStream, DeviceHandle, DeviceInfo};
pub use device::{AudioDevice, AudioSystem};
pub use error::{Error, Result};
pub use mixer::{Mixer, StreamHandle};
pub use resampler::Resampler;
pub use stream::{AudioSource, AudioStream, Processor, StreamSnapshot, StreamState};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalBackend;
