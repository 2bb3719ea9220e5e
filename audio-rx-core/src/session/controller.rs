use std::sync::Arc;
use std::time::Duration;

use crate::events::listeners::{Listeners, Subscription};
use crate::models::audio_models::{AudioSource, CaptureDiagnostics};
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::events::{EventKind, FrameDataEvent, StopEvent, VolumeEvent};
use crate::models::recording_result::RecordingSummary;
use crate::models::state::CaptureState;
use crate::session::capture::CaptureSession;
use crate::traits::capture_provider::CaptureProvider;

/// Host-facing control surface: `init`, `start`, `stop` plus one typed
/// listener per event kind.
///
/// ```no_run
/// use audio_rx_core::{AudioRx, CaptureConfig, ToneSource};
///
/// let mut rx = AudioRx::new(ToneSource::default());
/// rx.on_stop(|event| println!("{}", event.to_json()));
/// rx.init(CaptureConfig { max_duration_secs: 2.0, ..Default::default() })?;
/// rx.start()?;
/// # Ok::<(), audio_rx_core::CaptureError>(())
/// ```
pub struct AudioRx<P: CaptureProvider + 'static> {
    session: CaptureSession<P>,
    listeners: Arc<Listeners>,
    config: Option<CaptureConfig>,
}

impl<P: CaptureProvider + 'static> AudioRx<P> {
    pub fn new(provider: P) -> Self {
        let listeners = Arc::new(Listeners::new());
        Self {
            session: CaptureSession::new(provider, listeners.clone()),
            listeners,
            config: None,
        }
    }

    /// Store the configuration used by the following `start` calls.
    pub fn init(&mut self, config: CaptureConfig) -> Result<(), CaptureError> {
        if self.session.state().is_active() {
            return Err(CaptureError::AlreadyRecording);
        }
        config.validate()?;
        log::debug!("initialized with {:?}", config);
        self.config = Some(config);
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        let config = self.config.clone().ok_or(CaptureError::NotInitialized)?;
        self.session.start(config)
    }

    pub fn stop(&mut self) -> Result<(), CaptureError> {
        self.session.stop()
    }

    pub fn config(&self) -> Option<&CaptureConfig> {
        self.config.as_ref()
    }

    pub fn state(&self) -> CaptureState {
        self.session.state()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.session.diagnostics()
    }

    pub fn elapsed(&self) -> Duration {
        self.session.elapsed()
    }

    pub fn last_recording(&self) -> Option<RecordingSummary> {
        self.session.last_recording()
    }

    pub fn device_info(&self) -> AudioSource {
        self.session.device_info()
    }

    // --- Listeners ---

    pub fn on_frame_data<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FrameDataEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe_frame_data(callback)
    }

    pub fn on_volume<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&VolumeEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe_volume(callback)
    }

    pub fn on_stop<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StopEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe_stop(callback)
    }

    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CaptureError) + Send + Sync + 'static,
    {
        self.listeners.subscribe_error(callback)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    pub fn clear_listener(&self, kind: EventKind) {
        self.listeners.clear(kind)
    }

    /// The registry itself, for hosts that register from other threads.
    pub fn listeners(&self) -> Arc<Listeners> {
        Arc::clone(&self.listeners)
    }
}
