use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::models::events::CaptureEvent;
use crate::traits::event_sink::EventSink;

/// Fire-and-forget handle for queuing events from the consumer thread.
#[derive(Clone)]
pub struct EventEmitter {
    sender: Sender<CaptureEvent>,
}

impl EventEmitter {
    /// Queue an event. Never blocks; a closed dispatcher only logs.
    pub fn emit(&self, event: CaptureEvent) {
        if let Err(e) = self.sender.send(event) {
            log::warn!("event dispatcher closed, dropping {:?} event", e.into_inner().kind());
        }
    }
}

/// Delivers capture events to an [`EventSink`] on a dedicated thread.
///
/// Events are delivered in the order they were emitted. A panicking sink is
/// logged and the dispatcher keeps running. Dropping the dispatcher closes
/// the queue, delivers what is already queued, and joins the thread.
pub struct EventDispatcher {
    sender: Option<Sender<CaptureEvent>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EventDispatcher {
    pub fn spawn(sink: Arc<dyn EventSink>) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("audio-rx-events".into())
            .spawn(move || dispatch_loop(receiver, sink))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn emitter(&self) -> Option<EventEmitter> {
        self.sender.as_ref().map(|sender| EventEmitter { sender: sender.clone() })
    }

    /// Close the queue without waiting for the event thread.
    pub fn detach(mut self) {
        self.sender = None;
        self.handle.take();
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            // Dropped from inside a sink callback: the thread exits on its own.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn dispatch_loop(receiver: Receiver<CaptureEvent>, sink: Arc<dyn EventSink>) {
    for event in receiver {
        let kind = event.kind();
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| deliver(sink.as_ref(), &event)));
        if delivered.is_err() {
            log::error!("event sink panicked while handling {}", kind.name());
        }
    }
    log::debug!("event dispatcher exiting");
}

fn deliver(sink: &dyn EventSink, event: &CaptureEvent) {
    match event {
        CaptureEvent::FrameData(e) => sink.on_frame_data(e),
        CaptureEvent::Volume(e) => sink.on_volume(e),
        CaptureEvent::Stop(e) => sink.on_stop(e),
        CaptureEvent::Error(e) => sink.on_error(e),
    }
}
