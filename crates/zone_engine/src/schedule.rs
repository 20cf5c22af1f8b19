//! Update scheduling
//!
//! One clock per accuracy tier decides which tiers are due on a heartbeat;
//! every zone of a due tier is evaluated in that pass. A zone's own state
//! machine guards against overlapping evaluations, and its recompute queue
//! debounces structural changes.

use crate::tiers::Accuracy;
use log::trace;

/// Slack for accumulated frame-time round-off
const TIME_EPSILON: f64 = 1e-9;

/// Per-tier tick clocks shared by every zone in a registry
#[derive(Debug, Clone, Default)]
pub struct UpdateScheduler {
    last_tick: [Option<f64>; 4],
}

impl UpdateScheduler {
    /// Create a scheduler whose tiers are all due on the first heartbeat
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiers due at `now`, marking them as ticked
    ///
    /// `Precise` is due on every heartbeat with a later timestamp than the
    /// previous one, so it runs at most once per frame.
    pub fn due_tiers(&mut self, now: f64) -> Vec<Accuracy> {
        let mut due = Vec::new();
        for tier in Accuracy::ALL {
            let slot = &mut self.last_tick[tier.index()];
            let is_due = match *slot {
                None => true,
                Some(last) if tier.interval() == 0.0 => now > last,
                Some(last) => now - last + TIME_EPSILON >= tier.interval(),
            };
            if is_due {
                *slot = Some(now);
                due.push(tier);
            }
        }
        due
    }

    /// Time the tier last ticked
    pub fn last_tick(&self, tier: Accuracy) -> Option<f64> {
        self.last_tick[tier.index()]
    }
}

/// Evaluation state of a single zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalState {
    /// Waiting for its tier to tick
    #[default]
    Idle,
    /// Its tier ticked and the pass has not reached it yet
    Scheduled,
    /// An evaluation is running
    Evaluating,
}

impl EvalState {
    /// Move to `Scheduled`; ignored unless idle
    pub fn schedule(&mut self) {
        if *self == Self::Idle {
            *self = Self::Scheduled;
        }
    }

    /// Move to `Evaluating`, returning false if an evaluation is already
    /// running
    pub fn begin(&mut self) -> bool {
        if *self == Self::Evaluating {
            return false;
        }
        *self = Self::Evaluating;
        true
    }

    /// Return to `Idle`
    pub fn finish(&mut self) {
        *self = Self::Idle;
    }
}

/// Debounce state for structural recomputation of one zone
#[derive(Debug, Clone, Default)]
pub struct RecomputeQueue {
    last_recompute: Option<f64>,
    pending: bool,
}

impl RecomputeQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// A structural change arrived at `now`
    ///
    /// Returns true when the recomputation should run right away. With
    /// `immediate` off (auto-update disabled) the request always waits
    /// for the zone's next tick; with `respect_queue` on it waits while
    /// the last recomputation is younger than `interval`.
    pub fn request(&mut self, now: f64, interval: f64, immediate: bool, respect_queue: bool) -> bool {
        if immediate && !(respect_queue && self.within_window(now, interval)) {
            self.pending = false;
            self.last_recompute = Some(now);
            return true;
        }
        trace!("Coalescing recompute request at {now:.3}s");
        self.pending = true;
        false
    }

    /// Whether a coalesced request may run on a tick at `now`
    ///
    /// Consumes the pending flag when it returns true.
    pub fn take_due(&mut self, now: f64, interval: f64, respect_queue: bool) -> bool {
        if !self.pending || (respect_queue && self.within_window(now, interval)) {
            return false;
        }
        self.pending = false;
        self.last_recompute = Some(now);
        true
    }

    /// Whether a request is waiting
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn within_window(&self, now: f64, interval: f64) -> bool {
        self.last_recompute
            .is_some_and(|last| now - last + TIME_EPSILON < interval)
    }
}
