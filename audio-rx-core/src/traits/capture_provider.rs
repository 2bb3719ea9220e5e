use std::sync::Arc;

use crate::models::audio_models::AudioSource;
use crate::models::config::PcmFormat;
use crate::models::error::CaptureError;

/// Callback invoked from the audio thread with interleaved PCM bytes in the
/// format passed to [`CaptureProvider::start`]. Always whole packets.
pub type PcmCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Callback invoked when the device fails while running (unplugged, stream
/// invalidated). Must not block; the session only records it.
pub type DeviceErrorCallback = Arc<dyn Fn(CaptureError) + Send + Sync + 'static>;

/// Interface for microphone backends.
///
/// Implemented by:
/// - `CpalMicCapture` (audio-rx-cpal)
/// - [`ToneSource`](crate::sources::tone::ToneSource) (synthetic)
pub trait CaptureProvider: Send {
    /// Whether this capture source is currently available.
    fn is_available(&self) -> bool;

    /// Start capturing audio in `format`, delivering buffers via `on_data`.
    ///
    /// The callback fires on a real-time audio thread; keep processing minimal.
    /// Fails with `DeviceError` if the input cannot be opened.
    fn start(
        &mut self,
        format: PcmFormat,
        on_data: PcmCallback,
        on_error: DeviceErrorCallback,
    ) -> Result<(), CaptureError>;

    /// Stop capturing and release the device. No callback fires afterwards.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Information about the audio device backing this provider.
    fn device_info(&self) -> AudioSource;
}
