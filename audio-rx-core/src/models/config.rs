use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// How much of each frame a `frameDataEvent` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDataMode {
    /// The whole frame payload.
    #[default]
    FullFrame,
    /// Only the first packet (one sample per channel).
    FirstSample,
}

/// PCM layout shared by the capture backend, the frame processor and the
/// file writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub byte_depth: u16,
}

impl PcmFormat {
    /// Bytes for one sample on every channel.
    pub fn packet_size(&self) -> usize {
        self.byte_depth as usize * self.channels as usize
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.byte_depth * 8
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.packet_size()
    }
}

/// Configuration for a capture session.
///
/// The first seven fields are the host-facing contract and are required in
/// JSON input; the remaining ones tune buffering and reporting and fall back
/// to defaults when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// 1 (mono) or 2 (interleaved stereo).
    pub num_channels: u16,

    /// 1 (unsigned 8-bit) or 2 (signed 16-bit little-endian).
    pub byte_depth: u16,

    /// Recording stops with a timeout code once this much audio is captured.
    #[serde(rename = "maxDuration")]
    pub max_duration_secs: f64,

    pub record_to_file: bool,
    pub report_volume: bool,
    pub report_frame_data: bool,

    /// Where the WAV file is written when `record_to_file` is set.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default = "default_frame_duration_ms")]
    pub frame_duration_ms: u32,

    /// Ring buffer size expressed as seconds of audio.
    #[serde(default = "default_ring_buffer_secs")]
    pub ring_buffer_secs: f64,

    /// Consecutive consumer iterations with fresh overruns tolerated before
    /// the session is failed with a device error.
    #[serde(default = "default_overrun_threshold")]
    pub overrun_escalation_threshold: u32,

    #[serde(default)]
    pub frame_data_mode: FrameDataMode,

    /// Frames dropped right after start (device start-up click). They are
    /// not written and do not count toward `max_duration_secs`.
    #[serde(default)]
    pub skip_leading_frames: u32,

    /// Floor reported for silent frames instead of -inf.
    #[serde(default = "default_min_volume_dbfs")]
    pub min_volume_dbfs: f64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Write `<file>.metadata.json` next to the recording.
    #[serde(default)]
    pub write_metadata: bool,
}

fn default_output_path() -> PathBuf {
    std::env::temp_dir().join("audio-rx.wav")
}

fn default_frame_duration_ms() -> u32 {
    20
}

fn default_ring_buffer_secs() -> f64 {
    1.0
}

fn default_overrun_threshold() -> u32 {
    8
}

fn default_min_volume_dbfs() -> f64 {
    -96.0
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        let invalid = |msg: String| Err(CaptureError::InvalidConfig(msg));

        if self.sample_rate == 0 {
            return invalid("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.num_channels) {
            return invalid(format!("unsupported channel count: {}", self.num_channels));
        }
        if ![1, 2].contains(&self.byte_depth) {
            return invalid(format!("unsupported byte depth: {}", self.byte_depth));
        }
        if !self.max_duration_secs.is_finite() || self.max_duration_secs <= 0.0 {
            return invalid(format!("max duration must be positive, got {}", self.max_duration_secs));
        }
        if self.frame_duration_ms == 0 {
            return invalid("frame duration must be positive".into());
        }
        if !self.ring_buffer_secs.is_finite() || self.ring_buffer_secs <= 0.0 {
            return invalid(format!("ring buffer length must be positive, got {}", self.ring_buffer_secs));
        }
        if self.overrun_escalation_threshold == 0 {
            return invalid("overrun escalation threshold must be at least 1".into());
        }
        if !self.min_volume_dbfs.is_finite() || self.min_volume_dbfs >= 0.0 {
            return invalid(format!("volume floor must be below 0 dBFS, got {}", self.min_volume_dbfs));
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll interval must be positive".into());
        }
        if self.record_to_file && self.output_path.as_os_str().is_empty() {
            return invalid("output path is empty".into());
        }
        Ok(())
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.num_channels,
            byte_depth: self.byte_depth,
        }
    }

    /// Samples (per channel) in one frame.
    pub fn frame_sample_count(&self) -> usize {
        let count = self.sample_rate as u64 * self.frame_duration_ms as u64 / 1000;
        count.max(1) as usize
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_sample_count() * self.format().packet_size()
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_sample_count() as f64 / self.sample_rate as f64)
    }

    /// Ring buffer capacity in bytes, rounded up to whole frames and never
    /// smaller than two frames.
    pub fn ring_buffer_capacity(&self) -> usize {
        let frame_bytes = self.frame_bytes();
        let wanted = (self.ring_buffer_secs * self.format().bytes_per_second() as f64).ceil() as usize;
        let frames = wanted.div_ceil(frame_bytes).max(2);
        frames * frame_bytes
    }

    /// Number of samples (per channel) after which the session times out.
    pub fn max_samples(&self) -> u64 {
        let samples = (self.sample_rate as f64 * self.max_duration_secs).round() as u64;
        samples.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfig(format!("failed to parse config: {}", e)))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::InvalidConfig(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            num_channels: 1,
            byte_depth: 2,
            max_duration_secs: 10.0,
            record_to_file: true,
            report_volume: false,
            report_frame_data: false,
            output_path: default_output_path(),
            frame_duration_ms: default_frame_duration_ms(),
            ring_buffer_secs: default_ring_buffer_secs(),
            overrun_escalation_threshold: default_overrun_threshold(),
            frame_data_mode: FrameDataMode::default(),
            skip_leading_frames: 0,
            min_volume_dbfs: default_min_volume_dbfs(),
            poll_interval_ms: default_poll_interval_ms(),
            write_metadata: false,
        }
    }
}
