//! Synthetic capture source producing a sine tone.
//!
//! Stands in for a microphone in tests and demos: it delivers PCM in the
//! exact format the session asks for, from its own thread, the same way a
//! hardware callback would.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::models::audio_models::AudioSource;
use crate::models::config::PcmFormat;
use crate::models::error::CaptureError;
use crate::processing::sample_convert;
use crate::traits::capture_provider::{CaptureProvider, DeviceErrorCallback, PcmCallback};

/// How fast chunks are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One chunk per chunk duration, like a real device.
    RealTime,
    /// As fast as the thread can generate them.
    Unthrottled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToneSettings {
    pub frequency_hz: f64,
    /// Peak amplitude in `0.0..=1.0`; 0 produces digital silence.
    pub amplitude: f64,
    pub chunk_duration: Duration,
    pub pacing: Pacing,
    /// Report a device error after this many chunks and go quiet.
    pub fail_after_chunks: Option<u64>,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.5,
            chunk_duration: Duration::from_millis(10),
            pacing: Pacing::RealTime,
            fail_after_chunks: None,
        }
    }
}

pub struct ToneSource {
    settings: ToneSettings,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ToneSource {
    pub fn new(settings: ToneSettings) -> Self {
        Self {
            settings,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn settings(&self) -> &ToneSettings {
        &self.settings
    }
}

impl Default for ToneSource {
    fn default() -> Self {
        Self::new(ToneSettings::default())
    }
}

impl CaptureProvider for ToneSource {
    fn is_available(&self) -> bool {
        true
    }

    fn start(
        &mut self,
        format: PcmFormat,
        on_data: PcmCallback,
        on_error: DeviceErrorCallback,
    ) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceError("tone source already running".into()));
        }
        // A previous run may have ended on its own (injected failure).
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let settings = self.settings.clone();

        let handle = thread::Builder::new()
            .name("audio-rx-tone".into())
            .spawn(move || tone_loop(running, settings, format, on_data, on_error))
            .map_err(|e| CaptureError::DeviceError(format!("failed to spawn tone thread: {}", e)))?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "tone".into(),
            name: format!("Tone {} Hz", self.settings.frequency_hz),
            is_default: false,
        }
    }
}

impl Drop for ToneSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn tone_loop(
    running: Arc<AtomicBool>,
    settings: ToneSettings,
    format: PcmFormat,
    on_data: PcmCallback,
    on_error: DeviceErrorCallback,
) {
    let chunk_samples = ((format.sample_rate as f64 * settings.chunk_duration.as_secs_f64()) as usize).max(1);
    let step = TAU * settings.frequency_hz / format.sample_rate as f64;
    let channels = format.channels as usize;

    let mut phase = 0.0f64;
    let mut samples = Vec::with_capacity(chunk_samples * channels);
    let mut bytes = Vec::with_capacity(chunk_samples * format.packet_size());
    let mut chunks = 0u64;
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        samples.clear();
        for _ in 0..chunk_samples {
            let value = (settings.amplitude * phase.sin()) as f32;
            samples.extend(std::iter::repeat(value).take(channels));
            phase = (phase + step) % TAU;
        }
        bytes.clear();
        sample_convert::encode_pcm(&samples, format.byte_depth, &mut bytes);
        on_data(&bytes);
        chunks += 1;

        if settings.fail_after_chunks == Some(chunks) {
            on_error(CaptureError::DeviceError("tone source failure injected".into()));
            break;
        }

        match settings.pacing {
            Pacing::RealTime => {
                let deadline = started + settings.chunk_duration.mul_f64(chunks as f64);
                if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
            }
            Pacing::Unthrottled => thread::yield_now(),
        }
    }
    running.store(false, Ordering::SeqCst);
}
