//! Zone event signals
//!
//! Each zone owns one [`Signal`] per event name. Handlers register on the
//! signal they care about and are only called for that event; there is no
//! global bus and no consumption, every handler sees every payload.
//! Destroying a zone drops its signals and every handler with them.

use crate::containment::Item;
use crate::scene::{BodyId, PlayerId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(0);

/// Identifier returned by [`Signal::connect`], unique across all signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

type Handler<T> = Box<dyn FnMut(&T)>;

/// Publish/subscribe channel for one event name
pub struct Signal<T> {
    handlers: Vec<(ConnectionId, Handler<T>)>,
}

impl<T> Signal<T> {
    /// Create a signal with no handlers
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler, called in registration order
    pub fn connect<F>(&mut self, handler: F) -> ConnectionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = ConnectionId(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed));
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler, returning false if it was not connected
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Call every handler with `payload`
    pub fn fire(&mut self, payload: &T) {
        self.fire_unless(payload, || false);
    }

    /// Call handlers in order until `halted` reports true
    ///
    /// Checked before each handler, so a handler that destroys its zone
    /// stops the remaining ones from seeing the event.
    pub fn fire_unless<H>(&mut self, payload: &T, halted: H)
    where
        H: Fn() -> bool,
    {
        for (_, handler) in &mut self.handlers {
            if halted() {
                return;
            }
            handler(payload);
        }
    }

    /// Number of connected handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nobody is listening
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Disconnect every handler
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Every enter/exit signal of a zone, one pair per granularity
#[derive(Debug, Default)]
pub struct ZoneSignals {
    /// A player's character entered
    pub player_entered: Signal<PlayerId>,
    /// A player's character exited
    pub player_exited: Signal<PlayerId>,
    /// An untracked scene body entered
    pub body_entered: Signal<BodyId>,
    /// An untracked scene body exited
    pub body_exited: Signal<BodyId>,
    /// A tracked item entered
    pub item_entered: Signal<Item>,
    /// A tracked item exited
    pub item_exited: Signal<Item>,
    pub(crate) local_player_entered: Signal<PlayerId>,
    pub(crate) local_player_exited: Signal<PlayerId>,
}

impl ZoneSignals {
    /// Whether anything listens for body transitions
    ///
    /// Body discovery queries the scene for every body near the zone, so
    /// zones skip it entirely while nobody is subscribed.
    pub fn wants_bodies(&self) -> bool {
        !self.body_entered.is_empty() || !self.body_exited.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.player_entered.clear();
        self.player_exited.clear();
        self.body_entered.clear();
        self.body_exited.clear();
        self.item_entered.clear();
        self.item_exited.clear();
        self.local_player_entered.clear();
        self.local_player_exited.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_handlers_called_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut signal = Signal::new();

        let first = Rc::clone(&seen);
        signal.connect(move |value: &u32| first.borrow_mut().push(("first", *value)));
        let second = Rc::clone(&seen);
        signal.connect(move |value: &u32| second.borrow_mut().push(("second", *value)));

        signal.fire(&7);
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_disconnect() {
        let count = Rc::new(RefCell::new(0));
        let mut signal = Signal::new();
        let counter = Rc::clone(&count);
        let id = signal.connect(move |_: &()| *counter.borrow_mut() += 1);

        signal.fire(&());
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.fire(&());

        assert_eq!(*count.borrow(), 1);
        assert!(signal.is_empty());
    }

    #[test]
    fn test_halted_fire_skips_remaining() {
        let stop = Rc::new(Cell::new(false));
        let calls = Rc::new(Cell::new(0));
        let mut signal = Signal::new();

        let (first_stop, first_calls) = (Rc::clone(&stop), Rc::clone(&calls));
        signal.connect(move |_: &()| {
            first_calls.set(first_calls.get() + 1);
            first_stop.set(true);
        });
        let second_calls = Rc::clone(&calls);
        signal.connect(move |_: &()| second_calls.set(second_calls.get() + 1));

        signal.fire_unless(&(), || stop.get());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_wants_bodies_tracks_subscribers() {
        let mut signals = ZoneSignals::default();
        assert!(!signals.wants_bodies());

        let id = signals.body_exited.connect(|_| {});
        assert!(signals.wants_bodies());

        signals.body_exited.disconnect(id);
        assert!(!signals.wants_bodies());
    }
}
