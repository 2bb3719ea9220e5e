use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::error::CaptureError;
use crate::models::events::{EventKind, FrameDataEvent, StopEvent, VolumeEvent};
use crate::traits::event_sink::EventSink;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

struct Slot<E> {
    id: u64,
    callback: Callback<E>,
}

struct Slots {
    frame_data: Option<Slot<FrameDataEvent>>,
    volume: Option<Slot<VolumeEvent>>,
    stop: Option<Slot<StopEvent>>,
    error: Option<Slot<CaptureError>>,
}

/// Token returned by a subscription; pass it to [`Listeners::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Typed listener registry with one slot per event kind.
///
/// At most one listener is registered per kind: subscribing replaces the
/// previous listener of that kind. Unsubscribing with a stale token (one
/// whose listener was already replaced) leaves the current listener alone.
///
/// Callbacks run on the session's event thread and may subscribe or
/// unsubscribe from inside a callback.
pub struct Listeners {
    slots: RwLock<Slots>,
    next_id: AtomicU64,
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots {
                frame_data: None,
                volume: None,
                stop: None,
                error: None,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe_frame_data<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FrameDataEvent) + Send + Sync + 'static,
    {
        let callback: Callback<FrameDataEvent> = Arc::new(callback);
        let id = self.next_id();
        replace(&mut self.slots.write().frame_data, id, callback, EventKind::FrameData)
    }

    pub fn subscribe_volume<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&VolumeEvent) + Send + Sync + 'static,
    {
        let callback: Callback<VolumeEvent> = Arc::new(callback);
        let id = self.next_id();
        replace(&mut self.slots.write().volume, id, callback, EventKind::Volume)
    }

    pub fn subscribe_stop<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StopEvent) + Send + Sync + 'static,
    {
        let callback: Callback<StopEvent> = Arc::new(callback);
        let id = self.next_id();
        replace(&mut self.slots.write().stop, id, callback, EventKind::Stop)
    }

    pub fn subscribe_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CaptureError) + Send + Sync + 'static,
    {
        let callback: Callback<CaptureError> = Arc::new(callback);
        let id = self.next_id();
        replace(&mut self.slots.write().error, id, callback, EventKind::Error)
    }

    /// Remove the listener registered by `subscription`, if it is still the
    /// current one. Returns whether a listener was removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut slots = self.slots.write();
        match subscription.kind {
            EventKind::FrameData => remove_if(&mut slots.frame_data, subscription.id),
            EventKind::Volume => remove_if(&mut slots.volume, subscription.id),
            EventKind::Stop => remove_if(&mut slots.stop, subscription.id),
            EventKind::Error => remove_if(&mut slots.error, subscription.id),
        }
    }

    /// Remove whatever listener is registered for `kind`.
    pub fn clear(&self, kind: EventKind) {
        let mut slots = self.slots.write();
        match kind {
            EventKind::FrameData => slots.frame_data = None,
            EventKind::Volume => slots.volume = None,
            EventKind::Stop => slots.stop = None,
            EventKind::Error => slots.error = None,
        }
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        let slots = self.slots.read();
        match kind {
            EventKind::FrameData => slots.frame_data.is_some(),
            EventKind::Volume => slots.volume.is_some(),
            EventKind::Stop => slots.stop.is_some(),
            EventKind::Error => slots.error.is_some(),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

fn replace<E>(slot: &mut Option<Slot<E>>, id: u64, callback: Callback<E>, kind: EventKind) -> Subscription {
    if slot.is_some() {
        log::debug!("replacing existing {} listener", kind.name());
    }
    *slot = Some(Slot { id, callback });
    Subscription { kind, id }
}

fn remove_if<E>(slot: &mut Option<Slot<E>>, id: u64) -> bool {
    if slot.as_ref().is_some_and(|s| s.id == id) {
        *slot = None;
        true
    } else {
        false
    }
}

// Callbacks are cloned out of the lock before running so they can touch the
// registry themselves.
fn current<E>(slot: &Option<Slot<E>>) -> Option<Callback<E>> {
    slot.as_ref().map(|s| Arc::clone(&s.callback))
}

impl EventSink for Listeners {
    fn on_frame_data(&self, event: &FrameDataEvent) {
        let callback = current(&self.slots.read().frame_data);
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn on_volume(&self, event: &VolumeEvent) {
        let callback = current(&self.slots.read().volume);
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn on_stop(&self, event: &StopEvent) {
        let callback = current(&self.slots.read().stop);
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn on_error(&self, error: &CaptureError) {
        let callback = current(&self.slots.read().error);
        match callback {
            Some(callback) => callback(error),
            None => log::warn!("capture error with no listener: {}", error),
        }
    }
}
