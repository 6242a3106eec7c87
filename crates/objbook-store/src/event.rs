//! Change notification.
//!
//! Handlers run synchronously on the thread that raised the event. While
//! the bus is suspended, events are queued and delivered as a single
//! [`ChangeEvent::Batch`] when the outermost `resume` runs, so no handler
//! ever observes a multi-step operation half done.

use std::fmt;

use tracing::debug;

use crate::instance::Entity;

/// A change to a book's contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(Entity),
    Modified(Entity),
    Destroyed(Entity),
    /// Events raised while the bus was suspended, in order.
    Batch(Vec<ChangeEvent>),
}

impl ChangeEvent {
    /// Number of non-batch events this carries.
    pub fn len(&self) -> usize {
        match self {
            Self::Batch(events) => events.iter().map(Self::len).sum(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Handler = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Synchronous fan-out of [`ChangeEvent`]s.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(HandlerId, Handler)>,
    next_id: u64,
    suspended: u32,
    queued: Vec<ChangeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> HandlerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if the handler was not registered.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(hid, _)| *hid != id);
        self.handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Hold events until the matching [`EventBus::resume`]. Nests.
    pub fn suspend(&mut self) {
        self.suspended += 1;
    }

    /// Undo one [`EventBus::suspend`]. When the last one is undone, queued
    /// events are delivered as one batch. Extra calls are ignored.
    pub fn resume(&mut self) {
        let Some(level) = self.suspended.checked_sub(1) else {
            return;
        };
        self.suspended = level;
        if level == 0 && !self.queued.is_empty() {
            let batch = ChangeEvent::Batch(std::mem::take(&mut self.queued));
            debug!(events = batch.len(), "delivering batched change events");
            self.deliver(&batch);
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended > 0
    }

    pub fn emit(&mut self, event: ChangeEvent) {
        if self.is_suspended() {
            self.queued.push(event);
        } else {
            self.deliver(&event);
        }
    }

    fn deliver(&self, event: &ChangeEvent) {
        for (_, handler) in &self.handlers {
            handler(event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .field("suspended", &self.suspended)
            .field("queued", &self.queued.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use objbook_types::{Guid, TypeTag};

    use super::*;

    fn entity() -> Entity {
        Entity::new(TypeTag::new("invoice"), Guid::new())
    }

    fn recording_bus() -> (EventBus, Arc<Mutex<Vec<ChangeEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        (bus, seen)
    }

    #[test]
    fn delivers_immediately_when_live() {
        let (mut bus, seen) = recording_bus();
        let e = entity();
        bus.emit(ChangeEvent::Created(e.clone()));
        assert_eq!(*seen.lock().unwrap(), vec![ChangeEvent::Created(e)]);
    }

    #[test]
    fn suspended_events_coalesce_into_one_batch() {
        let (mut bus, seen) = recording_bus();
        let (a, b) = (entity(), entity());
        bus.suspend();
        bus.suspend();
        bus.emit(ChangeEvent::Created(a.clone()));
        bus.resume();
        bus.emit(ChangeEvent::Modified(b.clone()));
        assert!(seen.lock().unwrap().is_empty());
        bus.resume();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            ChangeEvent::Batch(vec![ChangeEvent::Created(a), ChangeEvent::Modified(b)])
        );
        assert_eq!(seen[0].len(), 2);
    }

    #[test]
    fn empty_suspension_delivers_nothing() {
        let (mut bus, seen) = recording_bus();
        bus.suspend();
        bus.resume();
        bus.resume();
        assert!(seen.lock().unwrap().is_empty());
        assert!(!bus.is_suspended());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (mut bus, seen) = recording_bus();
        let extra = bus.subscribe(|_| {});
        assert_eq!(bus.handler_count(), 2);
        assert!(bus.unsubscribe(extra));
        assert!(!bus.unsubscribe(extra));
        bus.emit(ChangeEvent::Destroyed(entity()));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
