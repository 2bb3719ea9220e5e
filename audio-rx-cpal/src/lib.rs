//! # audio-rx-cpal
//!
//! cpal backend for audio-rx.
//!
//! Provides:
//! - `CpalMicCapture`: microphone capture delivering PCM in the session's format
//! - `device_enumerator`: input device listing
//! - `permissions`: microphone access probe
//! - `PlaybackController`: plays back a recorded WAV file
//!
//! ## Usage
//! ```no_run
//! use audio_rx_core::AudioRx;
//! use audio_rx_cpal::CpalMicCapture;
//!
//! let mut rx = AudioRx::new(CpalMicCapture::default_device());
//! ```

pub mod device_enumerator;
pub mod mic;
pub mod permissions;
pub mod playback;

pub use device_enumerator::{find_input_device, list_input_devices};
pub use mic::CpalMicCapture;
pub use permissions::check_microphone_permission;
pub use playback::{LoadedAsset, PlaybackController, PlaybackError};
