use crate::models::error::CaptureError;
use crate::models::events::{FrameDataEvent, StopEvent, VolumeEvent};

/// Receiver for capture session notifications.
///
/// All methods are called from the session's event thread, never from the
/// audio callback or the consumer loop. Implementations should marshal to a
/// UI thread if needed.
pub trait EventSink: Send + Sync {
    /// Called per processed frame when frame data reporting is enabled.
    fn on_frame_data(&self, event: &FrameDataEvent);

    /// Called per processed frame when volume reporting is enabled.
    fn on_volume(&self, event: &VolumeEvent);

    /// Called exactly once per session, after the output file is final.
    fn on_stop(&self, event: &StopEvent);

    /// Called for overruns and for the failure that ends a session.
    fn on_error(&self, error: &CaptureError) {
        log::warn!("unhandled capture error: {}", error);
    }
}
