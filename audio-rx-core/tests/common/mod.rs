#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use audio_rx_core::{
    CaptureConfig, CaptureError, CaptureProvider, EventSink, FrameDataEvent, Pacing, StopEvent, ToneSettings,
    ToneSource, VolumeEvent,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

/// Sink that keeps every event and signals the stop event.
pub struct Recorder {
    pub frames: Mutex<Vec<FrameDataEvent>>,
    pub volumes: Mutex<Vec<VolumeEvent>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub stops: Mutex<Vec<StopEvent>>,
    stop_tx: Sender<StopEvent>,
    stop_rx: Receiver<StopEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::unbounded();
        Self {
            frames: Mutex::new(Vec::new()),
            volumes: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
            stop_tx,
            stop_rx,
        }
    }

    pub fn wait_for_stop(&self, timeout: Duration) -> StopEvent {
        self.stop_rx
            .recv_timeout(timeout)
            .unwrap_or_else(|_| panic!("no stop event within {:?}", timeout))
    }

    pub fn frame_sequences(&self) -> Vec<u64> {
        self.frames.lock().iter().map(|f| f.sequence).collect()
    }
}

impl EventSink for Recorder {
    fn on_frame_data(&self, event: &FrameDataEvent) {
        self.frames.lock().push(event.clone());
    }

    fn on_volume(&self, event: &VolumeEvent) {
        self.volumes.lock().push(*event);
    }

    fn on_stop(&self, event: &StopEvent) {
        self.stops.lock().push(event.clone());
        let _ = self.stop_tx.send(event.clone());
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }
}

pub fn config(output: &Path) -> CaptureConfig {
    CaptureConfig {
        sample_rate: 8000,
        num_channels: 1,
        byte_depth: 2,
        max_duration_secs: 10.0,
        output_path: output.to_path_buf(),
        ..Default::default()
    }
}

pub fn tone() -> ToneSource {
    ToneSource::default()
}

pub fn tone_with(settings: ToneSettings) -> ToneSource {
    ToneSource::new(settings)
}

/// A source that floods the ring buffer as fast as it can.
pub fn flood() -> ToneSource {
    ToneSource::new(ToneSettings {
        chunk_duration: Duration::from_millis(200),
        pacing: Pacing::Unthrottled,
        ..Default::default()
    })
}

/// Samples per channel and header fields of a WAV file, read with hound.
pub fn read_wav(path: &Path) -> (u32, hound::WavSpec) {
    let reader = hound::WavReader::open(path).expect("readable wav");
    (reader.duration(), reader.spec())
}

/// Provider whose device can never be opened.
pub struct BrokenDevice;

impl CaptureProvider for BrokenDevice {
    fn is_available(&self) -> bool {
        false
    }

    fn start(
        &mut self,
        _format: audio_rx_core::PcmFormat,
        _on_data: audio_rx_core::PcmCallback,
        _on_error: audio_rx_core::DeviceErrorCallback,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::DeviceError("no input device".into()))
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn device_info(&self) -> audio_rx_core::AudioSource {
        audio_rx_core::AudioSource {
            id: "broken".into(),
            name: "Broken".into(),
            is_default: false,
        }
    }
}
