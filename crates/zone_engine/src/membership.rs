//! Membership tracking
//!
//! Each zone records, per occupant, whether it was inside at the last
//! evaluation and which zone parts it touched. A fresh containment result
//! is compared against that record; only a change of the inside flag is a
//! transition. Forgetting a record is never a transition.

use crate::containment::{Containment, Item};
use crate::scene::{BodyId, PlayerId};
use bitflags::bitflags;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Anything a zone keeps a membership record for
///
/// Players, untracked bodies and tracked items are independent keys: a
/// body tracked as an item and also seen by body discovery has two
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occupant {
    /// A connected player, judged by their character
    Player(PlayerId),
    /// A scene body found by body discovery
    Body(BodyId),
    /// An explicitly tracked item
    Item(Item),
}

impl Occupant {
    /// Signal granularities a transition of this occupant is published to
    pub fn channels(&self, local_player: Option<PlayerId>) -> Channels {
        match self {
            Self::Player(player) if Some(*player) == local_player => {
                Channels::PLAYER | Channels::LOCAL_OBSERVER
            }
            Self::Player(_) => Channels::PLAYER,
            Self::Body(_) => Channels::BODY,
            Self::Item(_) => Channels::ITEM,
        }
    }
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => id.fmt(f),
            Self::Body(id) => id.fmt(f),
            Self::Item(item) => write!(f, "item {item}"),
        }
    }
}

bitflags! {
    /// Subscriber granularities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Channels: u8 {
        /// `item_entered` / `item_exited`
        const ITEM = 1 << 0;
        /// `body_entered` / `body_exited`
        const BODY = 1 << 1;
        /// `player_entered` / `player_exited`
        const PLAYER = 1 << 2;
        /// `local_player_entered` / `local_player_exited`
        const LOCAL_OBSERVER = 1 << 3;
    }
}

/// Direction of a membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Outside to inside
    Entered,
    /// Inside to outside
    Exited,
}

/// Recorded inside state for every occupant of one zone
#[derive(Debug, Clone, Default)]
pub struct Membership {
    inside: BTreeMap<Occupant, BTreeSet<BodyId>>,
}

impl Membership {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `occupant` was recorded inside
    pub fn is_inside(&self, occupant: &Occupant) -> bool {
        self.inside.contains_key(occupant)
    }

    /// Zone parts `occupant` was recorded touching
    pub fn touching(&self, occupant: &Occupant) -> Option<&BTreeSet<BodyId>> {
        self.inside.get(occupant)
    }

    /// The transition a fresh result implies, without recording it
    pub fn diff(&self, occupant: &Occupant, result: &Containment) -> Option<TransitionKind> {
        match (self.is_inside(occupant), result.is_inside()) {
            (false, true) => Some(TransitionKind::Entered),
            (true, false) => Some(TransitionKind::Exited),
            _ => None,
        }
    }

    /// Record a fresh result
    ///
    /// Callers that filter transitions (settings groups) diff first and
    /// only record what they let through.
    pub fn record(&mut self, occupant: Occupant, result: Containment) {
        if result.is_inside() {
            self.inside.insert(occupant, result.into_touching());
        } else {
            self.inside.remove(&occupant);
        }
    }

    /// Drop the record for `occupant`, returning whether it was inside
    pub fn forget(&mut self, occupant: &Occupant) -> bool {
        self.inside.remove(occupant).is_some()
    }

    /// Keep only the records matching `keep`
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Occupant) -> bool,
    {
        self.inside.retain(|occupant, _| keep(occupant));
    }

    /// Every occupant recorded inside, in key order
    pub fn occupants(&self) -> impl Iterator<Item = &Occupant> + '_ {
        self.inside.keys()
    }

    /// Union of the zone parts touched by any occupant
    pub fn touched_parts(&self) -> BTreeSet<BodyId> {
        self.inside.values().flatten().copied().collect()
    }

    /// Number of occupants recorded inside
    pub fn len(&self) -> usize {
        self.inside.len()
    }

    /// Whether nothing is recorded inside
    pub fn is_empty(&self) -> bool {
        self.inside.is_empty()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.inside.clear();
    }
}

/// Identifier of a pending one-shot registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OneShotId(u64);

struct PendingOneShot {
    id: OneShotId,
    item: Item,
    kind: TransitionKind,
    callback: Box<dyn FnOnce()>,
}

/// Callbacks waiting for one item's next enter or exit
///
/// Firing removes the entry; cancelling is explicit removal.
#[derive(Default)]
pub struct OneShots {
    next_id: u64,
    pending: Vec<PendingOneShot>,
}

impl OneShots {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `callback` for the next `kind` transition of `item`
    pub fn push(&mut self, item: Item, kind: TransitionKind, callback: Box<dyn FnOnce()>) -> OneShotId {
        let id = OneShotId(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingOneShot {
            id,
            item,
            kind,
            callback,
        });
        id
    }

    /// Remove and return every callback waiting on this transition
    pub fn take(&mut self, item: Item, kind: TransitionKind) -> Vec<Box<dyn FnOnce()>> {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|entry| entry.item == item && entry.kind == kind);
        self.pending = waiting;
        due.into_iter().map(|entry| entry.callback).collect()
    }

    /// Cancel a registration, returning false if it already fired
    pub fn cancel(&mut self, id: OneShotId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|entry| entry.id != id);
        self.pending.len() != before
    }

    /// Drop every registration for `item`
    pub fn discard(&mut self, item: Item) {
        self.pending.retain(|entry| entry.item != item);
    }

    /// Number of registrations still waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every registration without calling it
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl fmt::Debug for OneShots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShots")
            .field("pending", &self.pending.len())
            .finish()
    }
}
