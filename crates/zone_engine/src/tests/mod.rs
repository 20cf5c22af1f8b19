//! Whole-registry tests
//!
//! These drive real registries through the heartbeat against the
//! in-memory scene, the way a host would.

mod scenarios;

use crate::events::Signal;
use crate::foundation::math::{Transform, Vec3};
use crate::scene::memory::MemoryScene;
use crate::scene::BodyId;
use std::cell::RefCell;
use std::rc::Rc;

/// One frame at 60 Hz
pub(crate) const FRAME: f64 = 1.0 / 60.0;

/// (label, payload) pairs written by signal handlers
pub(crate) type EventLog<T> = Rc<RefCell<Vec<(&'static str, T)>>>;

pub(crate) fn new_log<T>() -> EventLog<T> {
    Rc::new(RefCell::new(Vec::new()))
}

/// Append every payload `signal` fires to `log` under `label`
pub(crate) fn record<T: Copy + 'static>(signal: &mut Signal<T>, log: &EventLog<T>, label: &'static str) {
    let log = Rc::clone(log);
    signal.connect(move |payload| log.borrow_mut().push((label, *payload)));
}

pub(crate) fn cube_at(scene: &mut MemoryScene, position: Vec3, size: f32) -> BodyId {
    scene.add_block(Transform::from_position(position), Vec3::new(size, size, size))
}

/// Labels of a log, in firing order
pub(crate) fn labels<T>(log: &EventLog<T>) -> Vec<&'static str> {
    log.borrow().iter().map(|(label, _)| *label).collect()
}
