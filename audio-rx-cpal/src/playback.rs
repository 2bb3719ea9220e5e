//! Playback of recorded WAV files through the default cpal output device.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use thiserror::Error;

use audio_rx_core::processing::sample_convert;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to read {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("no output device available")]
    NoOutputDevice,

    #[error("output stream error: {0}")]
    Stream(String),

    #[error("no asset loaded")]
    NotLoaded,
}

/// A decoded WAV file and, while playing, its output stream.
pub struct LoadedAsset {
    path: PathBuf,
    spec: hound::WavSpec,
    samples: Vec<f32>,
    stream: Option<cpal::Stream>,
    position: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
}

impl LoadedAsset {
    /// Decode `path` into interleaved samples in `[-1.0, 1.0]`.
    pub fn open(path: &Path) -> Result<Self, PlaybackError> {
        let decode_error = |e: hound::Error| PlaybackError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut reader = hound::WavReader::open(path).map_err(decode_error)?;
        let spec = reader.spec();
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>(),
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()
            }
        }
        .map_err(decode_error)?;

        log::debug!(
            "loaded {} ({} Hz, {} ch, {} samples)",
            path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            spec,
            samples,
            stream: None,
            position: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn spec(&self) -> hound::WavSpec {
        self.spec
    }

    pub fn duration_secs(&self) -> f64 {
        let frames = self.samples.len() / self.spec.channels.max(1) as usize;
        frames as f64 / self.spec.sample_rate as f64
    }

    pub fn is_playing(&self) -> bool {
        self.stream.is_some() && !self.finished.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("stopped playback of {}", self.path.display());
        }
        self.position.store(0, Ordering::Relaxed);
        self.finished.store(false, Ordering::Relaxed);
    }
}

/// Plays one asset at a time.
///
/// Holds a cpal stream while playing, so it stays on the thread that
/// created it.
#[derive(Default)]
pub struct PlaybackController {
    current: Option<LoadedAsset>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current asset. The previous one is stopped and released
    /// before the new file is decoded.
    pub fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        self.release();
        self.current = Some(LoadedAsset::open(path)?);
        Ok(())
    }

    pub fn current(&self) -> Option<&LoadedAsset> {
        self.current.as_ref()
    }

    /// Stop and drop the current asset.
    pub fn release(&mut self) {
        if let Some(mut asset) = self.current.take() {
            asset.stop();
        }
    }

    /// Play the current asset from the start on the default output device.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        let asset = self.current.as_mut().ok_or(PlaybackError::NotLoaded)?;
        asset.stop();

        let device = cpal::default_host()
            .default_output_device()
            .ok_or(PlaybackError::NoOutputDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let rendered_channels = (config.channels as usize).clamp(1, 2);
        let adapted =
            sample_convert::adapt_channels(&asset.samples, asset.spec.channels as usize, rendered_channels);
        let rendered = Arc::new(sample_convert::resample(
            &adapted,
            rendered_channels,
            asset.spec.sample_rate,
            config.sample_rate.0,
        ));

        let output = Output {
            rendered,
            rendered_channels,
            out_channels: config.channels as usize,
            position: Arc::clone(&asset.position),
            finished: Arc::clone(&asset.finished),
        };
        let stream = match sample_format {
            SampleFormat::F32 => build_output::<f32>(&device, &config, output),
            SampleFormat::I16 => build_output::<i16>(&device, &config, output),
            SampleFormat::U16 => build_output::<u16>(&device, &config, output),
            other => return Err(PlaybackError::Stream(format!("unsupported sample format {:?}", other))),
        }?;
        stream.play().map_err(|e| PlaybackError::Stream(e.to_string()))?;

        log::info!("playing {}", asset.path.display());
        asset.stream = Some(stream);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(asset) = self.current.as_mut() {
            asset.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.as_ref().is_some_and(LoadedAsset::is_playing)
    }
}

struct Output {
    rendered: Arc<Vec<f32>>,
    rendered_channels: usize,
    out_channels: usize,
    position: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
}

fn build_output<T>(device: &cpal::Device, config: &StreamConfig, output: Output) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let start = output.position.load(Ordering::Relaxed);
                let (position, exhausted) =
                    fill_frames(data, output.out_channels, &output.rendered, output.rendered_channels, start);
                output.position.store(position, Ordering::Relaxed);
                if exhausted {
                    output.finished.store(true, Ordering::Relaxed);
                }
            },
            |err| log::error!("playback stream error: {}", err),
            None,
        )
        .map_err(|e| PlaybackError::Stream(e.to_string()))
}

/// Copy rendered frames into `data` starting at `position`, padding with
/// silence past the end. Output channels beyond the rendered ones repeat
/// the last rendered channel.
fn fill_frames<T>(
    data: &mut [T],
    out_channels: usize,
    rendered: &[f32],
    rendered_channels: usize,
    mut position: usize,
) -> (usize, bool)
where
    T: Sample + FromSample<f32>,
{
    let mut exhausted = false;
    for frame in data.chunks_mut(out_channels) {
        if position + rendered_channels <= rendered.len() {
            for (ch, out) in frame.iter_mut().enumerate() {
                *out = T::from_sample(rendered[position + ch.min(rendered_channels - 1)]);
            }
            position += rendered_channels;
        } else {
            frame.fill(T::EQUILIBRIUM);
            exhausted = true;
        }
    }
    (position, exhausted)
}
