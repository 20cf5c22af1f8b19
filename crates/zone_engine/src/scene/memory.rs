//! In-memory scene
//!
//! A small scene graph that answers every [`SceneQuery`] and
//! [`RegionBuilder`] call from plain maps. Blocks overlap by separating
//! axis test, balls by sphere/box closest-point distance. Relocated bodies
//! live in their own world: they only touch each other.

use super::{
    BodyId, BodyShape, BodyState, CharacterId, CharacterState, ContainerId, ExecutionContext,
    PlayerId, RegionBuilder, SceneError, SceneQuery,
};
use crate::foundation::math::{Transform, Vec3};
use crate::geometry::OrientedBox;
use std::cell::Cell;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct SceneBody {
    state: BodyState,
    parent: Option<ContainerId>,
    relocated: bool,
}

#[derive(Debug, Clone, Default)]
struct ContainerNode {
    parent: Option<ContainerId>,
}

/// Scene graph held entirely in process memory
#[derive(Debug, Clone)]
pub struct MemoryScene {
    next_id: u64,
    bodies: BTreeMap<BodyId, SceneBody>,
    containers: BTreeMap<ContainerId, ContainerNode>,
    characters: BTreeMap<CharacterId, CharacterState>,
    players: BTreeMap<PlayerId, Option<CharacterId>>,
    context: ExecutionContext,
    local_player: Option<PlayerId>,
    failing: bool,
    box_queries: Cell<u64>,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    /// Create an empty server-context scene
    pub fn new() -> Self {
        Self {
            next_id: 1,
            bodies: BTreeMap::new(),
            containers: BTreeMap::new(),
            characters: BTreeMap::new(),
            players: BTreeMap::new(),
            context: ExecutionContext::Server,
            local_player: None,
            failing: false,
            box_queries: Cell::new(0),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a body with an explicit state
    pub fn add_body(&mut self, state: BodyState) -> BodyId {
        let id = BodyId(self.allocate());
        self.bodies.insert(
            id,
            SceneBody {
                state,
                parent: None,
                relocated: false,
            },
        );
        id
    }

    /// Add a block body
    pub fn add_block(&mut self, transform: Transform, size: Vec3) -> BodyId {
        self.add_body(BodyState {
            transform,
            size,
            shape: BodyShape::Block,
        })
    }

    /// Add a ball body
    pub fn add_ball(&mut self, transform: Transform, size: Vec3) -> BodyId {
        self.add_body(BodyState {
            transform,
            size,
            shape: BodyShape::Ball,
        })
    }

    /// Move a body, returning false if it does not exist
    pub fn set_body_transform(&mut self, id: BodyId, transform: Transform) -> bool {
        self.bodies
            .get_mut(&id)
            .map(|body| body.state.transform = transform)
            .is_some()
    }

    /// Resize a body, returning false if it does not exist
    pub fn set_body_size(&mut self, id: BodyId, size: Vec3) -> bool {
        self.bodies
            .get_mut(&id)
            .map(|body| body.state.size = size)
            .is_some()
    }

    /// Tear a body down
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    /// Add a container, optionally nested under another
    pub fn add_container(&mut self, parent: Option<ContainerId>) -> ContainerId {
        let id = ContainerId(self.allocate());
        self.containers.insert(id, ContainerNode { parent });
        id
    }

    /// Parent a body under a container (or detach it with `None`)
    pub fn set_body_parent(&mut self, id: BodyId, parent: Option<ContainerId>) -> bool {
        self.bodies
            .get_mut(&id)
            .map(|body| body.parent = parent)
            .is_some()
    }

    /// Add a character whose bounds are a box of `size` centred on `root`
    pub fn add_character(&mut self, root: Vec3, size: Vec3) -> CharacterId {
        let id = CharacterId(self.allocate());
        self.characters.insert(
            id,
            CharacterState {
                root,
                bounds: OrientedBox::new(Transform::from_position(root), size),
            },
        );
        id
    }

    /// Move a character's root, carrying its bounds along
    pub fn move_character(&mut self, id: CharacterId, root: Vec3) -> bool {
        self.characters
            .get_mut(&id)
            .map(|character| {
                let offset = character.bounds.center() - character.root;
                character.root = root;
                character.bounds.transform.position = root + offset;
            })
            .is_some()
    }

    /// Tear a character down
    pub fn remove_character(&mut self, id: CharacterId) -> bool {
        self.characters.remove(&id).is_some()
    }

    /// Connect a player controlling `character`
    pub fn add_player(&mut self, character: Option<CharacterId>) -> PlayerId {
        let id = PlayerId(self.allocate());
        self.players.insert(id, character);
        id
    }

    /// Disconnect a player
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        self.players.remove(&id).is_some()
    }

    /// Switch to a client context observed by `local_player`
    pub fn set_client(&mut self, local_player: PlayerId) {
        self.context = ExecutionContext::Client;
        self.local_player = Some(local_player);
    }

    /// Switch to a server context
    pub fn set_server(&mut self) {
        self.context = ExecutionContext::Server;
        self.local_player = None;
    }

    /// Make the collision primitives fail until turned off again
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Whether a body has been relocated out of the primary scene
    pub fn is_relocated(&self, id: BodyId) -> bool {
        self.bodies.get(&id).is_some_and(|body| body.relocated)
    }

    /// Number of `bodies_in_box` calls answered so far
    pub fn box_queries(&self) -> u64 {
        self.box_queries.get()
    }

    fn check_primitive(&self, primitive: &'static str) -> Result<(), SceneError> {
        if self.failing {
            return Err(SceneError::Primitive {
                primitive,
                reason: "scene is failing on purpose".to_string(),
            });
        }
        Ok(())
    }

    fn is_descendant(&self, mut node: Option<ContainerId>, ancestor: ContainerId) -> bool {
        while let Some(current) = node {
            if current == ancestor {
                return true;
            }
            node = self.containers.get(&current).and_then(|c| c.parent);
        }
        false
    }
}

/// Exact overlap between two body shapes
fn shapes_overlap(a: &BodyState, b: &BodyState) -> bool {
    let (obb_a, obb_b) = (a.obb(), b.obb());
    match (a.shape, b.shape) {
        (BodyShape::Block, BodyShape::Block) => obb_a.intersects(&obb_b),
        (BodyShape::Block, BodyShape::Ball) => {
            obb_a.intersects_sphere(obb_b.center(), obb_b.inscribed_radius())
        }
        (BodyShape::Ball, BodyShape::Block) => {
            obb_b.intersects_sphere(obb_a.center(), obb_a.inscribed_radius())
        }
        (BodyShape::Ball, BodyShape::Ball) => {
            let reach = obb_a.inscribed_radius() + obb_b.inscribed_radius();
            (obb_a.center() - obb_b.center()).magnitude_squared() <= reach * reach
        }
    }
}

impl SceneQuery for MemoryScene {
    fn body(&self, id: BodyId) -> Option<BodyState> {
        self.bodies.get(&id).map(|body| body.state)
    }

    fn character(&self, id: CharacterId) -> Option<CharacterState> {
        self.characters.get(&id).copied()
    }

    fn players(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    fn player_character(&self, player: PlayerId) -> Option<CharacterId> {
        self.players.get(&player).copied().flatten()
    }

    fn context(&self) -> ExecutionContext {
        self.context
    }

    fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    fn descendant_bodies(&self, container: ContainerId) -> Option<Vec<BodyId>> {
        if !self.containers.contains_key(&container) {
            return None;
        }
        Some(
            self.bodies
                .iter()
                .filter(|(_, body)| self.is_descendant(body.parent, container))
                .map(|(&id, _)| id)
                .collect(),
        )
    }

    fn touching_bodies(&self, id: BodyId) -> Result<Vec<BodyId>, SceneError> {
        self.check_primitive("touching_bodies")?;
        let target = self
            .bodies
            .get(&id)
            .ok_or_else(|| SceneError::Missing(id.to_string()))?;

        Ok(self
            .bodies
            .iter()
            .filter(|(&other, body)| {
                other != id
                    && body.relocated == target.relocated
                    && shapes_overlap(&target.state, &body.state)
            })
            .map(|(&other, _)| other)
            .collect())
    }

    fn bodies_in_box(&self, volume: &OrientedBox) -> Result<Vec<BodyId>, SceneError> {
        self.check_primitive("bodies_in_box")?;
        self.box_queries.set(self.box_queries.get() + 1);
        let query = BodyState {
            transform: volume.transform,
            size: volume.size(),
            shape: BodyShape::Block,
        };

        Ok(self
            .bodies
            .iter()
            .filter(|(_, body)| !body.relocated && shapes_overlap(&query, &body.state))
            .map(|(&id, _)| id)
            .collect())
    }
}

impl RegionBuilder for MemoryScene {
    fn synthesize(&mut self, boxes: &[OrientedBox]) -> Result<Vec<BodyId>, SceneError> {
        self.check_primitive("synthesize")?;
        Ok(boxes
            .iter()
            .map(|obb| self.add_block(obb.transform, obb.size()))
            .collect())
    }

    fn relocate(&mut self, bodies: &[BodyId]) -> Result<(), SceneError> {
        for id in bodies {
            let body = self
                .bodies
                .get_mut(id)
                .ok_or_else(|| SceneError::Missing(id.to_string()))?;
            body.relocated = true;
            body.parent = None;
        }
        Ok(())
    }
}
