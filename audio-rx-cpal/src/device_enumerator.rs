//! Input device enumeration through the default cpal host.
//!
//! cpal exposes no stable device identifier, so the device name doubles as
//! the `AudioSource` id and is what [`find_input_device`] matches on.

use cpal::traits::{DeviceTrait, HostTrait};

use audio_rx_core::models::audio_models::AudioSource;
use audio_rx_core::models::error::CaptureError;

/// List input devices of the default host, default device flagged.
pub fn list_input_devices() -> Result<Vec<AudioSource>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceError(format!("failed to enumerate input devices: {}", e)))?;

    let names = devices.map(|device| device.name().unwrap_or_else(|_| "Unknown Device".into()));
    Ok(describe(names, default_name.as_deref()))
}

/// Resolve a device by name, or the default input device for `None`.
pub fn find_input_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    let Some(name) = name else {
        return host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceError("no default input device".into()));
    };

    let mut devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceError(format!("failed to enumerate input devices: {}", e)))?;
    devices
        .find(|device| device.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| CaptureError::DeviceError(format!("input device not found: {}", name)))
}

fn describe(names: impl Iterator<Item = String>, default_name: Option<&str>) -> Vec<AudioSource> {
    names
        .map(|name| AudioSource {
            is_default: default_name == Some(name.as_str()),
            id: name.clone(),
            name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_only_the_default_device() {
        let names = ["USB Mic", "Built-in", "Headset"].map(String::from);
        let sources = describe(names.into_iter(), Some("Built-in"));

        assert_eq!(sources.len(), 3);
        assert_eq!(sources.iter().filter(|s| s.is_default).count(), 1);
        assert!(sources[1].is_default);
        assert_eq!(sources[0].id, "USB Mic");
    }

    #[test]
    fn no_default_device() {
        let sources = describe(std::iter::once("Only".to_string()), None);
        assert!(!sources[0].is_default);
    }
}
