//! Synchronous multi-subscriber event delivery
//!
//! Subscribers run on the caller's thread, in registration order, while the
//! emitting extension is mid-update. They must return quickly and must not
//! call back into the table or registry that is emitting.

use std::fmt;

/// Handle returned by [`EventBus::subscribe`]
pub type SubscriberId = u64;

struct ListenerEntry<E> {
    id: SubscriberId,
    listener: Box<dyn FnMut(&E)>,
    enabled: bool,
}

/// Ordered list of event subscribers
pub struct EventBus<E> {
    next_id: SubscriberId,
    listeners: Vec<ListenerEntry<E>>,
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Register a listener; it receives every event emitted after this call
    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) -> SubscriberId {
        let id = self.next_id;
        self.listeners.push(ListenerEntry {
            id,
            listener: Box::new(listener),
            enabled: true,
        });
        self.next_id += 1;
        id
    }

    /// Re-enable a muted listener
    pub fn enable(&mut self, id: SubscriberId) {
        if let Some(entry) = self.listeners.iter_mut().find(|e| e.id == id) {
            entry.enabled = true;
        }
    }

    /// Mute a listener without removing it
    pub fn disable(&mut self, id: SubscriberId) {
        if let Some(entry) = self.listeners.iter_mut().find(|e| e.id == id) {
            entry.enabled = false;
        }
    }

    /// Remove a listener. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|e| e.id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver one event to every enabled listener
    pub fn emit(&mut self, event: &E) {
        for entry in self.listeners.iter_mut().filter(|e| e.enabled) {
            (entry.listener)(event);
        }
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_bus() -> (EventBus<u32>, Rc<RefCell<Vec<(char, u32)>>>) {
        let seen: Rc<RefCell<Vec<(char, u32)>>> = Rc::default();
        let mut bus = EventBus::new();
        let a = seen.clone();
        bus.subscribe(move |e: &u32| a.borrow_mut().push(('a', *e)));
        let b = seen.clone();
        bus.subscribe(move |e: &u32| b.borrow_mut().push(('b', *e)));
        (bus, seen)
    }

    #[test]
    fn emit_follows_registration_order() {
        let (mut bus, seen) = recording_bus();
        bus.emit(&7);
        assert_eq!(*seen.borrow(), vec![('a', 7), ('b', 7)]);
    }

    #[test]
    fn disabled_listener_is_skipped() {
        let (mut bus, seen) = recording_bus();
        bus.disable(0);
        bus.emit(&1);
        bus.enable(0);
        bus.emit(&2);
        assert_eq!(*seen.borrow(), vec![('b', 1), ('a', 2), ('b', 2)]);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let (mut bus, seen) = recording_bus();
        assert!(bus.unsubscribe(1));
        assert!(!bus.unsubscribe(1));
        bus.emit(&3);
        assert_eq!(*seen.borrow(), vec![('a', 3)]);
        assert_eq!(bus.len(), 1);
    }
}
