//! Scene collaborator interfaces
//!
//! The zone engine never owns bodies or characters. It reads them through
//! [`SceneQuery`], asks [`RegionBuilder`] to synthesize geometry for
//! region-described zones, and is told about structural changes by the host
//! through the registry's `notify_*` methods.
//!
//! [`memory::MemoryScene`] is a complete in-process implementation of both
//! traits used by tests and headless hosts.

pub mod memory;

use crate::foundation::math::{Transform, Vec3};
use crate::geometry::OrientedBox;
use std::fmt;

macro_rules! scene_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

scene_id!(
    /// Identifier of a rigid body in the host scene
    BodyId, "Body"
);
scene_id!(
    /// Identifier of an articulated character (player or NPC)
    CharacterId, "Character"
);
scene_id!(
    /// Identifier of a connected player
    PlayerId, "Player"
);
scene_id!(
    /// Identifier of a scene node that groups bodies
    ContainerId, "Container"
);

/// Collision shape of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyShape {
    /// A box filling the body's size
    Block,
    /// A sphere whose diameter is the smallest component of the size
    Ball,
}

/// Snapshot of a body's placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// World transform of the body centre
    pub transform: Transform,
    /// Full size along each local axis
    pub size: Vec3,
    /// Collision shape
    pub shape: BodyShape,
}

impl BodyState {
    /// Box enclosing the body
    pub fn obb(&self) -> OrientedBox {
        OrientedBox::new(self.transform, self.size)
    }
}

/// Snapshot of a character's placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterState {
    /// Root reference point (the single Centre sample)
    pub root: Vec3,
    /// Box enclosing the whole character (the WholeBody samples)
    pub bounds: OrientedBox,
}

/// Which side of a client/server split the engine runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// Authoritative simulation, no local player
    Server,
    /// A client with a local observing player
    Client,
}

/// Failure reported by a scene primitive
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// The queried object no longer exists
    #[error("{0} no longer exists")]
    Missing(String),

    /// A primitive could not complete
    #[error("{primitive} failed: {reason}")]
    Primitive {
        /// Name of the primitive
        primitive: &'static str,
        /// Host-provided reason
        reason: String,
    },
}

/// Read access to the host scene graph
///
/// Every query is a snapshot; the engine never caches a result across
/// ticks except for the region geometry it recomputes on change.
pub trait SceneQuery {
    /// Current state of a body, `None` once it has been torn down
    fn body(&self, id: BodyId) -> Option<BodyState>;

    /// Current state of a character, `None` once it has been torn down
    fn character(&self, id: CharacterId) -> Option<CharacterState>;

    /// Every connected player
    fn players(&self) -> Vec<PlayerId>;

    /// The character a player currently controls
    fn player_character(&self, player: PlayerId) -> Option<CharacterId>;

    /// Context the engine is running in
    fn context(&self) -> ExecutionContext;

    /// The observing player on a client context
    fn local_player(&self) -> Option<PlayerId>;

    /// All bodies below a container, recursively, `None` for an unknown
    /// container
    fn descendant_bodies(&self, container: ContainerId) -> Option<Vec<BodyId>>;

    /// Bodies currently overlapping `body`
    fn touching_bodies(&self, body: BodyId) -> Result<Vec<BodyId>, SceneError>;

    /// Bodies overlapping a world-space box
    fn bodies_in_box(&self, volume: &OrientedBox) -> Result<Vec<BodyId>, SceneError>;
}

/// Geometry synthesis for zones described by a transform and size
pub trait RegionBuilder {
    /// Create one block body per box, in order
    fn synthesize(&mut self, boxes: &[OrientedBox]) -> Result<Vec<BodyId>, SceneError>;

    /// Move bodies into a non-rendered, non-colliding container outside the
    /// primary scene; there is no way back
    fn relocate(&mut self, bodies: &[BodyId]) -> Result<(), SceneError>;
}
