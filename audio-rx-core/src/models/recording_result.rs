use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::PcmFormat;
use super::state::StopCode;

/// What the file writer reports once the WAV file is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub file_path: PathBuf,
    pub format: PcmFormat,
    pub data_bytes: u64,
    pub checksum: String,
}

impl RecordingSummary {
    /// Samples per channel in the data chunk.
    pub fn sample_count(&self) -> u64 {
        self.data_bytes / self.format.packet_size() as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.sample_count() as f64 / self.format.sample_rate as f64
    }
}

/// Metadata stored alongside a recording as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_bytes: u64,
    pub frame_count: u64,
    pub checksum: String,
    pub stop_code: StopCode,
}

impl RecordingMetadata {
    pub fn new(summary: &RecordingSummary, frame_count: u64, stop_code: StopCode) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: summary.file_path.to_string_lossy().to_string(),
            duration_secs: summary.duration_secs(),
            sample_rate: summary.format.sample_rate,
            channels: summary.format.channels,
            bits_per_sample: summary.format.bits_per_sample(),
            data_bytes: summary.data_bytes,
            frame_count,
            checksum: summary.checksum.clone(),
            stop_code,
        }
    }
}
