//! # Zone Engine
//!
//! Spatial zones for real-time 3D scenes: volumes bounded by scene bodies
//! that report what is inside them and when that changes.
//!
//! ## Features
//!
//! - **Regions**: zones from one body, a body list, a container, or a
//!   transform and size (split into boxes no larger than the scene allows)
//! - **Containment**: point, body and character tests with bounding-box
//!   rejection and per-part exact geometry
//! - **Polling tiers**: Low / Medium / High / Precise evaluation cadence
//!   per zone, changeable on a live zone
//! - **Detection levels**: whole-body, centre-only, or automatic switching
//!   on player population, set separately for entering and exiting
//! - **Signals**: enter/exit events per player, body, tracked item and
//!   local observer, plus fire-once waits for a single item
//! - **Settings groups**: mutually exclusive occupancy across zones that
//!   share a border
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zone_engine::prelude::*;
//!
//! fn main() -> Result<(), ZoneError> {
//!     let mut scene = MemoryScene::new();
//!     let floor = scene.add_block(Transform::identity(), Vec3::new(10.0, 10.0, 10.0));
//!     let character = scene.add_character(Vec3::zeros(), Vec3::new(1.0, 2.0, 1.0));
//!     scene.add_player(Some(character));
//!
//!     let mut registry = ZoneRegistry::new(ZoneConfig::default())?;
//!     let zone = registry.create_from_body(&scene, floor)?;
//!     registry
//!         .zone_mut(zone)?
//!         .signals_mut()
//!         .player_entered
//!         .connect(|player| println!("{player} entered"));
//!
//!     let mut clock = FrameClock::default();
//!     for _ in 0..60 {
//!         registry.heartbeat(&scene, clock.tick());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod geometry;
pub mod scene;

pub mod config;
pub mod containment;
pub mod error;
pub mod events;
pub mod groups;
pub mod membership;
pub mod registry;
pub mod schedule;
pub mod tiers;
pub mod zone;

#[cfg(test)]
mod tests;

pub use containment::{Containment, Item, Target};
pub use error::{Result, ZoneError};
pub use registry::{ZoneId, ZoneRegistry};
pub use zone::{DestroyHandle, Zone};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ZoneConfig},
        containment::{Containment, Item, Target},
        error::ZoneError,
        events::{ConnectionId, Signal},
        foundation::{
            math::{Quat, Transform, Vec3},
            time::FrameClock,
        },
        groups::SettingsGroupProperties,
        registry::{ZoneId, ZoneRegistry},
        scene::{
            memory::MemoryScene, BodyId, CharacterId, ContainerId, PlayerId, RegionBuilder,
            SceneQuery,
        },
        tiers::{Accuracy, Detection},
        zone::{DestroyHandle, Zone},
    };
}
