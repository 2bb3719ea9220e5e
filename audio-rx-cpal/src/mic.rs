//! cpal microphone capture provider.
//!
//! Opens an input stream on a dedicated thread (cpal streams are not `Send`
//! on every platform) and delivers PCM in exactly the format the session
//! requested. When the device supports that format natively the samples are
//! passed through; otherwise the device default config is used and the
//! callback adapts channels, rate and sample type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::Sender;

use audio_rx_core::models::audio_models::AudioSource;
use audio_rx_core::models::config::PcmFormat;
use audio_rx_core::models::error::CaptureError;
use audio_rx_core::processing::sample_convert::{self, Resampler};
use audio_rx_core::traits::capture_provider::{CaptureProvider, DeviceErrorCallback, PcmCallback};

use crate::device_enumerator::find_input_device;

/// How long `start` waits for the capture thread to open the stream.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// cpal microphone capture.
pub struct CpalMicCapture {
    device_name: Option<String>,
    running: Arc<AtomicBool>,
    capture_handle: Option<thread::JoinHandle<()>>,
}

impl CpalMicCapture {
    /// Create a capture for the system default microphone.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: None,
        }
    }

    /// Create a capture for a specific microphone by device name.
    pub fn with_device(name: impl Into<String>) -> Self {
        let mut capture = Self::default_device();
        capture.device_name = Some(name.into());
        capture
    }
}

impl CaptureProvider for CpalMicCapture {
    fn is_available(&self) -> bool {
        find_input_device(self.device_name.as_deref()).is_ok()
    }

    fn start(
        &mut self,
        format: PcmFormat,
        on_data: PcmCallback,
        on_error: DeviceErrorCallback,
    ) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceError("mic capture already running".into()));
        }
        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.join();
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let device_name = self.device_name.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("audio-rx-mic".into())
            .spawn(move || {
                mic_capture_loop(&running, device_name.as_deref(), format, on_data, on_error, ready_tx);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::DeviceError(format!("failed to spawn mic thread: {}", e))
            })?;
        self.capture_handle = Some(handle);

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.stop()?;
                Err(e)
            }
            Err(_) => {
                // Leave the thread to exit on its own once the open returns.
                self.running.store(false, Ordering::SeqCst);
                self.capture_handle.take();
                Err(CaptureError::DeviceError("timed out opening input device".into()))
            }
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: self.device_name.clone().unwrap_or_else(|| "default-mic".into()),
            name: self.device_name.clone().unwrap_or_else(|| "Default Microphone".into()),
            is_default: self.device_name.is_none(),
        }
    }
}

impl Drop for CpalMicCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Owns the stream for its whole life; dropping it on exit stops callbacks.
fn mic_capture_loop(
    running: &AtomicBool,
    device_name: Option<&str>,
    format: PcmFormat,
    on_data: PcmCallback,
    on_error: DeviceErrorCallback,
    ready: Sender<Result<(), CaptureError>>,
) {
    let opened = open_stream(device_name, format, on_data, on_error).and_then(|stream| {
        stream
            .play()
            .map_err(|e| CaptureError::DeviceError(format!("failed to start input stream: {}", e)))?;
        Ok(stream)
    });
    let stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(10));
    }
    drop(stream);
    log::debug!("input stream closed");
}

fn open_stream(
    device_name: Option<&str>,
    format: PcmFormat,
    on_data: PcmCallback,
    on_error: DeviceErrorCallback,
) -> Result<cpal::Stream, CaptureError> {
    let device = find_input_device(device_name)?;
    log::info!("using input device {}", device.name().unwrap_or_default());
    let err_fn = move |err: cpal::StreamError| on_error(CaptureError::DeviceError(err.to_string()));

    if let Some(config) = exact_config(&device, format) {
        log::debug!("native input stream: {:?}", config);
        return if format.byte_depth == 1 {
            build(&device, &config, move |data: &[u8], _: &cpal::InputCallbackInfo| on_data(data), err_fn)
        } else {
            let mut scratch = Vec::new();
            let data_fn = move |data: &[i16], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                for sample in data {
                    scratch.extend_from_slice(&sample.to_le_bytes());
                }
                on_data(&scratch);
            };
            build(&device, &config, data_fn, err_fn)
        };
    }

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceError(format!("no usable input config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    log::info!(
        "converting input from {} Hz, {} ch, {:?}",
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    let converter = Converter::new(config.channels, config.sample_rate.0, format);
    match sample_format {
        SampleFormat::I8 => build_converting::<i8>(&device, &config, converter, on_data, err_fn),
        SampleFormat::I16 => build_converting::<i16>(&device, &config, converter, on_data, err_fn),
        SampleFormat::I32 => build_converting::<i32>(&device, &config, converter, on_data, err_fn),
        SampleFormat::U8 => build_converting::<u8>(&device, &config, converter, on_data, err_fn),
        SampleFormat::U16 => build_converting::<u16>(&device, &config, converter, on_data, err_fn),
        SampleFormat::F32 => build_converting::<f32>(&device, &config, converter, on_data, err_fn),
        SampleFormat::F64 => build_converting::<f64>(&device, &config, converter, on_data, err_fn),
        other => Err(CaptureError::DeviceError(format!("unsupported sample format {:?}", other))),
    }
}

fn build<T, D, E>(device: &cpal::Device, config: &StreamConfig, data_fn: D, err_fn: E) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    D: FnMut(&[T], &cpal::InputCallbackInfo) + Send + 'static,
    E: FnMut(cpal::StreamError) + Send + 'static,
{
    device
        .build_input_stream(config, data_fn, err_fn, None)
        .map_err(|e| CaptureError::DeviceError(format!("failed to build input stream: {}", e)))
}

fn build_converting<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut converter: Converter,
    on_data: PcmCallback,
    err_fn: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let data_fn = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let bytes = converter.convert(data);
        if !bytes.is_empty() {
            on_data(bytes);
        }
    };
    build(device, config, data_fn, err_fn)
}

/// The native sample type for a byte depth.
fn native_sample_format(byte_depth: u16) -> SampleFormat {
    if byte_depth == 1 {
        SampleFormat::U8
    } else {
        SampleFormat::I16
    }
}

fn matches_format(range: &SupportedStreamConfigRange, format: PcmFormat) -> bool {
    range.channels() == format.channels
        && range.sample_format() == native_sample_format(format.byte_depth)
        && range.min_sample_rate().0 <= format.sample_rate
        && format.sample_rate <= range.max_sample_rate().0
}

fn exact_config(device: &cpal::Device, format: PcmFormat) -> Option<StreamConfig> {
    let mut ranges = device.supported_input_configs().ok()?;
    let range = ranges.find(|range| matches_format(range, format))?;
    Some(range.with_sample_rate(cpal::SampleRate(format.sample_rate)).config())
}

/// Turns device-native buffers into PCM bytes of the session format.
///
/// Every intermediate buffer is reused between callbacks, and the
/// resampler carries its phase from one callback to the next.
struct Converter {
    source_channels: usize,
    format: PcmFormat,
    resampler: Resampler,
    floats: Vec<f32>,
    adapted: Vec<f32>,
    resampled: Vec<f32>,
    bytes: Vec<u8>,
}

impl Converter {
    fn new(source_channels: u16, source_rate: u32, format: PcmFormat) -> Self {
        Self {
            source_channels: source_channels as usize,
            format,
            resampler: Resampler::new(format.channels as usize, source_rate, format.sample_rate),
            floats: Vec::new(),
            adapted: Vec::new(),
            resampled: Vec::new(),
            bytes: Vec::new(),
        }
    }

    fn convert<T>(&mut self, data: &[T]) -> &[u8]
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let target_channels = self.format.channels as usize;

        self.floats.clear();
        self.floats.extend(data.iter().map(|&s| f32::from_sample(s)));

        self.adapted.clear();
        sample_convert::adapt_channels_into(&self.floats, self.source_channels, target_channels, &mut self.adapted);
        let output = if self.resampler.is_passthrough() {
            &self.adapted
        } else {
            self.resampled.clear();
            self.resampler.process_into(&self.adapted, &mut self.resampled);
            &self.resampled
        };

        self.bytes.clear();
        sample_convert::encode_pcm(output, self.format.byte_depth, &mut self.bytes);
        &self.bytes
    }
}
