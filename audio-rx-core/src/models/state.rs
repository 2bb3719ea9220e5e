use serde::{Deserialize, Serialize};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopCode {
    #[serde(rename = "STOP_CODE_NORMAL")]
    Normal,
    #[serde(rename = "STOP_CODE_ERROR")]
    Error,
    #[serde(rename = "STOP_CODE_TIMEOUT")]
    Timeout,
}

impl StopCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "STOP_CODE_NORMAL",
            Self::Error => "STOP_CODE_ERROR",
            Self::Timeout => "STOP_CODE_TIMEOUT",
        }
    }
}

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording → stopping → stopped(code)
///            ↑                       │
///            └──────── start ────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopping,
    Stopped(StopCode),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Recording or shutting down; a new session cannot start.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Stopping)
    }

    pub fn stop_code(&self) -> Option<StopCode> {
        match self {
            Self::Stopped(code) => Some(*code),
            _ => None,
        }
    }
}
