use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::events::dispatcher::{EventDispatcher, EventEmitter};
use crate::models::audio_models::{AudioSource, CaptureDiagnostics, PcmFrame};
use crate::models::config::{CaptureConfig, FrameDataMode, PcmFormat};
use crate::models::error::CaptureError;
use crate::models::events::{CaptureEvent, FrameDataEvent, StopEvent, VolumeEvent};
use crate::models::recording_result::{RecordingMetadata, RecordingSummary};
use crate::models::state::{CaptureState, StopCode};
use crate::processing::frame_processor::FrameProcessor;
use crate::processing::ring_buffer::RingBuffer;
use crate::storage::metadata;
use crate::storage::wav_writer::WavFileWriter;
use crate::traits::capture_provider::{CaptureProvider, DeviceErrorCallback, PcmCallback};
use crate::traits::event_sink::EventSink;

/// How long `stop()` waits for the consumer to finish shutting down.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra wall-clock time allowed past `max_duration` before a session that
/// stopped receiving audio is failed.
pub const STALL_GRACE: Duration = Duration::from_secs(2);

/// Mutable session state, protected by `parking_lot::Mutex`.
struct SessionState {
    state: CaptureState,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    last_recording: Option<RecordingSummary>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            started_at: None,
            stopped_at: None,
            last_recording: None,
        }
    }
}

/// Counters updated from the audio callback and the consumer without locks.
#[derive(Default)]
struct Counters {
    callback_count: AtomicU64,
    bytes_captured: AtomicU64,
    frames_processed: AtomicU64,
    bytes_written: AtomicU64,
    overrun_count: AtomicU64,
    dropped_bytes: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [
            &self.callback_count,
            &self.bytes_captured,
            &self.frames_processed,
            &self.bytes_written,
            &self.overrun_count,
            &self.dropped_bytes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            callback_count: self.callback_count.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            overrun_count: self.overrun_count.load(Ordering::Relaxed),
            dropped_bytes: self.dropped_bytes.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    session: Mutex<SessionState>,
    counters: Counters,
}

impl Shared {
    fn set_state(&self, state: CaptureState) {
        let mut s = self.session.lock();
        log::debug!("capture state {:?} -> {:?}", s.state, state);
        s.state = state;
        if matches!(state, CaptureState::Stopped(_)) {
            s.stopped_at = Some(Instant::now());
        }
    }
}

/// Flags shared between the control thread, the audio callback and the
/// consumer for one recording.
struct RunControl {
    accepting: AtomicBool,
    stop_requested: AtomicBool,
    fault: Mutex<Option<CaptureError>>,
}

impl RunControl {
    fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
            fault: Mutex::new(None),
        }
    }

    /// Keep the first fault; later ones are usually consequences of it.
    fn raise(&self, error: CaptureError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(error);
        }
    }

    fn take_fault(&self) -> Option<CaptureError> {
        self.fault.lock().take()
    }
}

/// Handles to the threads of the current (or last) recording.
struct ActiveRun {
    control: Arc<RunControl>,
    wake: Sender<()>,
    done: Receiver<()>,
    consumer: Option<thread::JoinHandle<()>>,
    dispatcher: Option<EventDispatcher>,
}

impl ActiveRun {
    /// Join the consumer, then let the dispatcher deliver what is queued.
    fn reap(mut self) {
        if let Some(handle) = self.consumer.take() {
            if handle.join().is_err() {
                log::error!("capture consumer thread panicked");
            }
        }
        drop(self.dispatcher.take());
    }
}

/// Single-microphone capture session.
///
/// Generic over the capture backend via the `CaptureProvider` trait. The
/// provider's callback only copies into a ring buffer; a consumer thread
/// slices frames, appends them to the WAV file and queues events, which an
/// event thread delivers to the sink.
///
/// ```text
/// [Provider callback] → [RingBuffer] → [consumer: FrameProcessor] ─┬→ [WavFileWriter]
///                                                                 └→ [EventDispatcher] → [EventSink]
/// ```
///
/// Every way a recording can end (manual stop, timeout, device or storage
/// failure, sustained overruns) runs the same shutdown on the consumer
/// thread: close the device, drain (manual stop only), write the leftover
/// samples, finalize the file, set `Stopped`, then emit the stop event.
pub struct CaptureSession<P: CaptureProvider + 'static> {
    provider: Arc<Mutex<P>>,
    sink: Arc<dyn EventSink>,
    shared: Arc<Shared>,
    run: Option<ActiveRun>,
}

impl<P: CaptureProvider + 'static> CaptureSession<P> {
    pub fn new(provider: P, sink: Arc<dyn EventSink>) -> Self {
        Self {
            provider: Arc::new(Mutex::new(provider)),
            sink,
            shared: Arc::new(Shared {
                session: Mutex::new(SessionState::new()),
                counters: Counters::default(),
            }),
            run: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.shared.session.lock().state
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.shared.counters.snapshot()
    }

    /// Wall-clock time of the current recording, or of the last one once it
    /// has stopped.
    pub fn elapsed(&self) -> Duration {
        let s = self.shared.session.lock();
        match (s.started_at, s.stopped_at) {
            (Some(start), Some(stop)) if stop >= start => stop - start,
            (Some(start), _) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Summary of the last finalized WAV file.
    pub fn last_recording(&self) -> Option<RecordingSummary> {
        self.shared.session.lock().last_recording.clone()
    }

    pub fn device_info(&self) -> AudioSource {
        self.provider.lock().device_info()
    }

    /// Start a recording. Transitions: idle/stopped → recording.
    ///
    /// Returns once the device is running; audio is processed in the
    /// background until [`stop`](Self::stop) or an internal stop condition.
    pub fn start(&mut self, config: CaptureConfig) -> Result<(), CaptureError> {
        if self.state().is_active() {
            return Err(CaptureError::AlreadyRecording);
        }
        config.validate()?;

        if let Some(previous) = self.run.take() {
            previous.reap();
        }

        let format = config.format();
        log::debug!(
            "starting capture: {} Hz, {} ch, {}-bit, frame {} samples, ring {} bytes, max {} samples",
            format.sample_rate,
            format.channels,
            format.bits_per_sample(),
            config.frame_sample_count(),
            config.ring_buffer_capacity(),
            config.max_samples()
        );

        let writer = if config.record_to_file {
            Some(WavFileWriter::create(config.output_path.clone(), format)?)
        } else {
            None
        };

        let dispatcher = match EventDispatcher::spawn(Arc::clone(&self.sink)) {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                discard_writer(writer);
                return Err(CaptureError::DeviceError(format!("failed to spawn event thread: {}", e)));
            }
        };
        let Some(emitter) = dispatcher.emitter() else {
            discard_writer(writer);
            return Err(CaptureError::DeviceError("event dispatcher closed".into()));
        };

        let ring = Arc::new(Mutex::new(RingBuffer::new(config.ring_buffer_capacity())));
        let control = Arc::new(RunControl::new());
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        self.shared.counters.reset();

        let on_data = producer_callback(
            Arc::clone(&ring),
            Arc::clone(&control),
            Arc::clone(&self.shared),
            wake_tx.clone(),
            config.frame_bytes(),
        );
        let on_error: DeviceErrorCallback = {
            let control = Arc::clone(&control);
            let wake = wake_tx.clone();
            Arc::new(move |error: CaptureError| {
                control.raise(error);
                let _ = wake.try_send(());
            })
        };

        if let Err(e) = self.provider.lock().start(format, on_data, on_error) {
            log::error!("failed to start capture device: {}", e);
            control.accepting.store(false, Ordering::SeqCst);
            discard_writer(writer);
            return Err(e);
        }

        {
            let mut s = self.shared.session.lock();
            s.state = CaptureState::Recording;
            s.started_at = Some(Instant::now());
            s.stopped_at = None;
        }

        let consumer = Consumer {
            processor: FrameProcessor::new(format, config.frame_sample_count()),
            max_samples: config.max_samples(),
            skip_bytes: config.skip_leading_frames as usize * config.frame_bytes(),
            config,
            format,
            provider: Arc::clone(&self.provider),
            ring,
            shared: Arc::clone(&self.shared),
            control: Arc::clone(&control),
            wake: wake_rx,
            emitter,
            writer,
            samples_consumed: 0,
            frame_count: 0,
            overrun_streak: 0,
            started: Instant::now(),
        };

        let spawned = thread::Builder::new()
            .name("audio-rx-consumer".into())
            .spawn(move || consumer.run(done_tx));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // The closure (and the writer inside it) was dropped by the
                // failed spawn, which finalizes the file.
                control.accepting.store(false, Ordering::SeqCst);
                let _ = self.provider.lock().stop();
                self.shared.set_state(CaptureState::Idle);
                return Err(CaptureError::DeviceError(format!("failed to spawn consumer thread: {}", e)));
            }
        };

        log::info!("capture started");
        self.run = Some(ActiveRun {
            control,
            wake: wake_tx,
            done: done_rx,
            consumer: Some(handle),
            dispatcher: Some(dispatcher),
        });
        Ok(())
    }

    /// Stop the recording. No-op unless recording.
    ///
    /// Blocks until the file is finalized and the stop event queued, or
    /// [`STOP_TIMEOUT`] expires.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.state().is_recording() {
            return Ok(());
        }
        let Some(run) = self.run.take() else {
            return Ok(());
        };

        run.control.stop_requested.store(true, Ordering::SeqCst);
        let _ = run.wake.try_send(());

        match run.done.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                run.reap();
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!("capture did not stop within {:?}", STOP_TIMEOUT);
                self.run = Some(run);
                Err(CaptureError::StopTimeout)
            }
        }
    }
}

impl<P: CaptureProvider + 'static> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("failed to stop capture on drop: {}", e);
            // Leave the consumer detached rather than block here.
            if let Some(mut run) = self.run.take() {
                run.consumer.take();
                if let Some(dispatcher) = run.dispatcher.take() {
                    dispatcher.detach();
                }
            }
            return;
        }
        if let Some(run) = self.run.take() {
            run.reap();
        }
    }
}

fn producer_callback(
    ring: Arc<Mutex<RingBuffer>>,
    control: Arc<RunControl>,
    shared: Arc<Shared>,
    wake: Sender<()>,
    frame_bytes: usize,
) -> PcmCallback {
    Arc::new(move |bytes: &[u8]| {
        if !control.accepting.load(Ordering::Acquire) {
            return;
        }
        let buffered = {
            let mut ring = ring.lock();
            ring.write(bytes);
            ring.count()
        };
        shared.counters.callback_count.fetch_add(1, Ordering::Relaxed);
        shared.counters.bytes_captured.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        if buffered >= frame_bytes {
            let _ = wake.try_send(());
        }
    })
}

/// Remove a file that was opened for a recording that never started.
fn discard_writer(writer: Option<WavFileWriter>) {
    let Some(writer) = writer else {
        return;
    };
    let path = writer.file_path().to_path_buf();
    drop(writer);
    if let Err(e) = fs::remove_file(&path) {
        log::warn!("failed to remove {}: {}", path.display(), e);
    }
}

enum Flow {
    Continue,
    LimitReached,
}

/// State owned by the consumer thread for one recording.
struct Consumer<P: CaptureProvider + 'static> {
    config: CaptureConfig,
    format: PcmFormat,
    provider: Arc<Mutex<P>>,
    ring: Arc<Mutex<RingBuffer>>,
    shared: Arc<Shared>,
    control: Arc<RunControl>,
    wake: Receiver<()>,
    emitter: EventEmitter,
    processor: FrameProcessor,
    writer: Option<WavFileWriter>,
    max_samples: u64,
    samples_consumed: u64,
    /// Leading bytes still to discard; never counted toward `max_samples`.
    skip_bytes: usize,
    frame_count: u64,
    overrun_streak: u32,
    started: Instant,
}

impl<P: CaptureProvider + 'static> Consumer<P> {
    fn run(mut self, done: Sender<()>) {
        let poll = self.config.poll_interval();
        let stall_limit = Duration::from_secs_f64(self.config.max_duration_secs) + STALL_GRACE;

        let (code, failure) = loop {
            match self.wake.recv_timeout(poll) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(poll),
            }

            if self.control.stop_requested.load(Ordering::SeqCst) {
                break (StopCode::Normal, None);
            }
            if let Some(fault) = self.control.take_fault() {
                break (StopCode::Error, Some(fault));
            }
            match self.pump() {
                Ok(Flow::Continue) => {}
                Ok(Flow::LimitReached) => break (StopCode::Timeout, None),
                Err(e) => break (StopCode::Error, Some(e)),
            }
            if self.started.elapsed() > stall_limit {
                let error = CaptureError::DeviceError(format!(
                    "only {} of {} samples received after {:?}",
                    self.samples_consumed, self.max_samples, stall_limit
                ));
                break (StopCode::Error, Some(error));
            }
        };

        self.shutdown(code, failure);
        let _ = done.send(());
    }

    /// Move everything buffered into frames, up to the sample limit.
    ///
    /// Leading frames still being skipped are read on top of the limit.
    fn pump(&mut self) -> Result<Flow, CaptureError> {
        self.check_overruns()?;

        let packet_size = self.format.packet_size();
        let remaining = (self.max_samples - self.samples_consumed) as usize * packet_size;
        let chunk = self.ring.lock().read(self.skip_bytes + remaining);
        if chunk.is_empty() {
            return Ok(Flow::Continue);
        }

        let skipped = chunk.len().min(self.skip_bytes);
        if skipped > 0 {
            self.skip_bytes -= skipped;
            // Through the processor so the skipped frames keep their sequence numbers.
            let discarded = self.processor.process(&chunk[..skipped]);
            if !discarded.is_empty() {
                log::debug!("skipped {} leading frame(s)", discarded.len());
            }
        }
        let kept = &chunk[skipped..];
        if kept.is_empty() {
            return Ok(Flow::Continue);
        }

        self.samples_consumed += (kept.len() / packet_size) as u64;
        let frames = self.processor.process(kept);
        self.handle_frames(frames)?;

        if self.samples_consumed >= self.max_samples {
            Ok(Flow::LimitReached)
        } else {
            Ok(Flow::Continue)
        }
    }

    fn check_overruns(&mut self) -> Result<(), CaptureError> {
        let report = self.ring.lock().take_overruns();
        if report.is_empty() {
            self.overrun_streak = 0;
            return Ok(());
        }

        self.overrun_streak += 1;
        let gap = self.processor.note_overrun(report.dropped_bytes);
        if self.skip_bytes > 0 {
            // The frame being skipped was cut short; the rest of it is gone.
            self.skip_bytes -= self.skip_bytes % self.processor.frame_bytes();
        } else {
            self.append_to_file(&gap.salvaged)?;
        }
        let counters = &self.shared.counters;
        counters.overrun_count.fetch_add(report.overruns, Ordering::Relaxed);
        counters.dropped_bytes.fetch_add(report.dropped_bytes, Ordering::Relaxed);

        log::warn!(
            "ring buffer overrun: {} byte(s) dropped, {} frame(s) skipped",
            report.dropped_bytes,
            gap.skipped_frames
        );
        self.emitter.emit(CaptureEvent::Error(CaptureError::BufferOverrun {
            overruns: report.overruns,
            dropped_bytes: report.dropped_bytes,
        }));

        if self.overrun_streak >= self.config.overrun_escalation_threshold {
            return Err(CaptureError::DeviceError(format!(
                "consumer fell behind for {} consecutive polls",
                self.overrun_streak
            )));
        }
        Ok(())
    }

    /// Append to the recording, if there is one.
    fn append_to_file(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        if bytes.is_empty() {
            return Ok(());
        }
        writer.append(bytes)?;
        self.shared
            .counters
            .bytes_written
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn handle_frames(&mut self, frames: Vec<PcmFrame>) -> Result<(), CaptureError> {
        for frame in frames {
            self.append_to_file(&frame.data)?;
            self.frame_count += 1;
            self.shared.counters.frames_processed.fetch_add(1, Ordering::Relaxed);

            if self.config.report_volume {
                let dbfs = frame.volume_dbfs(&self.format, self.config.min_volume_dbfs);
                self.emitter.emit(CaptureEvent::Volume(VolumeEvent { sequence: frame.sequence, dbfs }));
            }
            if self.config.report_frame_data {
                let payload = match self.config.frame_data_mode {
                    FrameDataMode::FullFrame => &frame.data[..],
                    FrameDataMode::FirstSample => &frame.data[..self.format.packet_size()],
                };
                let first_sample = frame.first_sample(&self.format);
                self.emitter
                    .emit(CaptureEvent::FrameData(FrameDataEvent::new(frame.sequence, payload, first_sample)));
            }
        }
        Ok(())
    }

    /// Move whatever is still buffered after the device stopped.
    fn drain(&mut self) -> Result<(), CaptureError> {
        while self.samples_consumed < self.max_samples {
            if matches!(self.pump()?, Flow::LimitReached) || self.ring.lock().is_empty() {
                break;
            }
        }
        Ok(())
    }

    fn shutdown(&mut self, mut code: StopCode, failure: Option<CaptureError>) {
        self.control.accepting.store(false, Ordering::SeqCst);
        self.shared.set_state(CaptureState::Stopping);

        if let Some(error) = failure {
            log::error!("capture failed: {}", error);
            self.emitter.emit(CaptureEvent::Error(error));
        }

        log::debug!("stopping capture device");
        if let Err(e) = self.provider.lock().stop() {
            log::warn!("capture device did not stop cleanly: {}", e);
        }

        if code == StopCode::Normal {
            if let Err(e) = self.drain() {
                log::error!("failed while draining: {}", e);
                self.emitter.emit(CaptureEvent::Error(e));
                code = StopCode::Error;
            }
        }

        let remainder = self.processor.take_remainder();
        if !remainder.is_empty() && self.skip_bytes == 0 {
            log::debug!("writing {} leftover byte(s)", remainder.len());
            if let Err(e) = self.append_to_file(&remainder) {
                self.emitter.emit(CaptureEvent::Error(e));
                code = StopCode::Error;
            }
        }

        let mut file_path = None;
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(summary) => {
                    if self.config.write_metadata {
                        let meta = RecordingMetadata::new(&summary, self.frame_count, code);
                        if let Err(e) = metadata::write_metadata(&meta, &summary.file_path) {
                            log::warn!("failed to write metadata: {}", e);
                        }
                    }
                    file_path = Some(summary.file_path.clone());
                    self.shared.session.lock().last_recording = Some(summary);
                }
                Err(e) => {
                    log::error!("failed to finalize recording: {}", e);
                    self.emitter.emit(CaptureEvent::Error(e));
                    code = StopCode::Error;
                }
            }
        }
        if code == StopCode::Error {
            file_path = None;
        }

        self.shared.set_state(CaptureState::Stopped(code));
        log::info!(
            "capture stopped: {} ({} samples, {} frames)",
            code.as_str(),
            self.samples_consumed,
            self.frame_count
        );
        self.emitter.emit(CaptureEvent::Stop(StopEvent { code, file_path }));
    }
}

impl<P: CaptureProvider + 'static> Drop for Consumer<P> {
    fn drop(&mut self) {
        // Only reachable with an active state if the consumer panicked.
        if self.shared.session.lock().state.is_active() {
            self.control.accepting.store(false, Ordering::SeqCst);
            self.shared.set_state(CaptureState::Stopped(StopCode::Error));
        }
    }
}
