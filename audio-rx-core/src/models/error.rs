use thiserror::Error;

/// Errors that can occur during audio receive operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("a session is already recording")]
    AlreadyRecording,

    #[error("not initialized: call init() before start()")]
    NotInitialized,

    #[error("failed to open output file: {0}")]
    FileOpenError(String),

    #[error("capture device error: {0}")]
    DeviceError(String),

    #[error("buffer overrun: {overruns} overrun(s), {dropped_bytes} byte(s) dropped")]
    BufferOverrun { overruns: u64, dropped_bytes: u64 },

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("timed out waiting for the session to stop")]
    StopTimeout,
}

impl CaptureError {
    /// Whether the error ends the session it was raised in.
    ///
    /// `BufferOverrun` is soft: it is reported and counted, and only the
    /// consumer's escalation turns sustained overruns into a `DeviceError`.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::BufferOverrun { .. })
    }
}
