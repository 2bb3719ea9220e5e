//! Microphone access probe.
//!
//! cpal has no permission API. Access is inferred from whether the default
//! input device can be queried for a stream configuration, which fails when
//! the OS privacy settings block the application.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::DefaultStreamConfigError;

use audio_rx_core::models::error::CaptureError;

/// Check if microphone access is available.
pub fn check_microphone_permission() -> Result<bool, CaptureError> {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        return Ok(false); // No capture device
    };

    match device.default_input_config() {
        Ok(_) => Ok(true),
        Err(DefaultStreamConfigError::DeviceNotAvailable) => Ok(false),
        Err(e) => {
            log::warn!("unexpected error checking microphone access: {}", e);
            Ok(false)
        }
    }
}

/// Like [`check_microphone_permission`], but a denied probe is an error.
pub fn require_microphone_permission() -> Result<(), CaptureError> {
    if check_microphone_permission()? {
        Ok(())
    } else {
        Err(CaptureError::PermissionDenied)
    }
}
