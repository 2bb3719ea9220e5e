//! # audio-rx-core
//!
//! Platform-agnostic audio receive core library.
//!
//! Captures microphone PCM into a ring buffer, slices it into fixed-size
//! frames, meters their volume, streams them to a WAV file and reports
//! frame, volume, error and stop events. Platform backends (cpal) implement
//! the `CaptureProvider` trait and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! audio-rx-core (this crate)
//! ├── traits/       ← CaptureProvider, EventSink
//! ├── models/       ← CaptureError, CaptureState, CaptureConfig, events, etc.
//! ├── processing/   ← RingBuffer, FrameProcessor, volume, sample conversion, WAV headers
//! ├── session/      ← CaptureSession (state machine), AudioRx (control surface)
//! ├── events/       ← EventDispatcher, Listeners
//! ├── storage/      ← WavFileWriter, metadata sidecar
//! └── sources/      ← ToneSource (synthetic provider)
//! ```

pub mod events;
pub mod models;
pub mod processing;
pub mod session;
pub mod sources;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use events::listeners::{Listeners, Subscription};
pub use models::audio_models::{AudioSource, CaptureDiagnostics, PcmFrame};
pub use models::config::{CaptureConfig, FrameDataMode, PcmFormat};
pub use models::error::CaptureError;
pub use models::events::{CaptureEvent, EventKind, FrameDataEvent, StopEvent, VolumeEvent, FILE_PATH_NA};
pub use models::recording_result::{RecordingMetadata, RecordingSummary};
pub use models::state::{CaptureState, StopCode};
pub use processing::frame_processor::FrameProcessor;
pub use processing::ring_buffer::RingBuffer;
pub use session::capture::CaptureSession;
pub use session::controller::AudioRx;
pub use sources::tone::{Pacing, ToneSettings, ToneSource};
pub use storage::wav_writer::WavFileWriter;
pub use traits::capture_provider::{CaptureProvider, DeviceErrorCallback, PcmCallback};
pub use traits::event_sink::EventSink;
