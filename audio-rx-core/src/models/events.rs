use std::borrow::Cow;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use super::error::CaptureError;
use super::state::StopCode;

/// Placeholder reported instead of a path when no file was produced.
pub const FILE_PATH_NA: &str = "FILE_PATH_NA";

/// Event kinds a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FrameData,
    Volume,
    Stop,
    Error,
}

impl EventKind {
    /// Wire name used by hosts.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrameData => "frameDataEvent",
            Self::Volume => "volumeEvent",
            Self::Stop => "stopEvent",
            Self::Error => "errorEvent",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "frameDataEvent" => Some(Self::FrameData),
            "volumeEvent" => Some(Self::Volume),
            "stopEvent" => Some(Self::Stop),
            "errorEvent" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Raw PCM payload of one processed frame, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDataEvent {
    pub sequence: u64,
    pub data: String,
    pub first_sample: Option<i32>,
}

impl FrameDataEvent {
    pub fn new(sequence: u64, payload: &[u8], first_sample: Option<i32>) -> Self {
        Self {
            sequence,
            data: STANDARD.encode(payload),
            first_sample,
        }
    }

    /// Decode the payload back into raw PCM bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeEvent {
    pub sequence: u64,
    pub dbfs: f64,
}

/// Emitted exactly once per completed session, after the file is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    pub code: StopCode,
    pub file_path: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopEventPayload<'a> {
    code: StopCode,
    file_path: Cow<'a, str>,
}

impl StopEvent {
    /// The path as hosts see it, `FILE_PATH_NA` when there is none.
    pub fn file_path_or_na(&self) -> Cow<'_, str> {
        match &self.file_path {
            Some(path) => path.to_string_lossy(),
            None => Cow::Borrowed(FILE_PATH_NA),
        }
    }

    /// `{"code": "...", "filePath": "..."}`
    pub fn to_json(&self) -> String {
        let payload = StopEventPayload {
            code: self.code,
            file_path: self.file_path_or_na(),
        };
        // Serializing a struct of two strings cannot fail.
        serde_json::to_string(&payload).unwrap_or_default()
    }
}

/// Everything the session reports to its sink.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    FrameData(FrameDataEvent),
    Volume(VolumeEvent),
    Stop(StopEvent),
    Error(CaptureError),
}

impl CaptureEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FrameData(_) => EventKind::FrameData,
            Self::Volume(_) => EventKind::Volume,
            Self::Stop(_) => EventKind::Stop,
            Self::Error(_) => EventKind::Error,
        }
    }
}
