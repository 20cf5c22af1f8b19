//! Foundation types shared by every zone module
//!
//! - `math`: vector, quaternion and rigid transform aliases over nalgebra
//! - `time`: fixed-step frame clock for driving heartbeats
//! - `logging`: log macro re-exports and logger setup

pub mod logging;
pub mod math;
pub mod time;
