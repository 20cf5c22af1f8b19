//! Containment testing
//!
//! A single entry point, [`test`], answers "is this target inside the
//! region" for points, bodies and characters. Every path rejects against
//! the region bounds first, then runs the exact per-part geometry.
//!
//! The result always satisfies `touching.is_empty() == !inside`: a
//! [`Containment`] can only be built from its touching set.

use crate::error::Result;
use crate::foundation::math::Vec3;
use crate::geometry::{OrientedBox, PartVolume, Region};
use crate::scene::{BodyId, BodyShape, BodyState, CharacterId, SceneError, SceneQuery};
use crate::tiers::Sampling;
use std::collections::BTreeSet;
use std::fmt;

/// Something a zone can be asked to observe explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Item {
    /// A rigid body
    Body(BodyId),
    /// An articulated character
    Character(CharacterId),
}

impl Item {
    /// Whether the item still exists in the scene
    pub fn exists(&self, scene: &dyn SceneQuery) -> bool {
        match *self {
            Self::Body(id) => scene.body(id).is_some(),
            Self::Character(id) => scene.character(id).is_some(),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(id) => id.fmt(f),
            Self::Character(id) => id.fmt(f),
        }
    }
}

impl From<Item> for Target {
    fn from(item: Item) -> Self {
        match item {
            Item::Body(id) => Self::Body(id),
            Item::Character(id) => Self::Character(id),
        }
    }
}

/// What a containment test is run against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// A raw world-space point
    Point(Vec3),
    /// A rigid body
    Body(BodyId),
    /// A character, sampled according to the detection level
    Character(CharacterId),
}

/// Outcome of a containment test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Containment {
    touching: BTreeSet<BodyId>,
}

impl Containment {
    /// Not inside, touching nothing
    pub fn outside() -> Self {
        Self::default()
    }

    /// Build from the set of touched zone parts
    pub fn from_touching(touching: BTreeSet<BodyId>) -> Self {
        Self { touching }
    }

    /// Whether the target is inside the region
    pub fn is_inside(&self) -> bool {
        !self.touching.is_empty()
    }

    /// Zone parts the target touches, empty when outside
    pub fn touching(&self) -> &BTreeSet<BodyId> {
        &self.touching
    }

    /// Consume into the touching set
    pub fn into_touching(self) -> BTreeSet<BodyId> {
        self.touching
    }
}

/// How ambiguous body/part overlaps are settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapConfirmation {
    /// Ask the scene's touching primitive
    Scene,
    /// Resolve from cached geometry; used once the zone's parts have been
    /// relocated out of the scene the primitive sees
    Geometry,
}

/// Test `target` against `region`
///
/// `sampling` only matters for character targets.
pub fn test(
    scene: &dyn SceneQuery,
    region: &Region,
    target: Target,
    sampling: Sampling,
    confirmation: OverlapConfirmation,
) -> Result<Containment> {
    match target {
        Target::Point(point) => Ok(test_point(region, point)),
        Target::Body(id) => {
            let state = scene
                .body(id)
                .ok_or_else(|| SceneError::Missing(id.to_string()))?;
            test_body(scene, region, id, &state, confirmation)
        }
        Target::Character(id) => {
            let state = scene
                .character(id)
                .ok_or_else(|| SceneError::Missing(id.to_string()))?;
            let samples = match sampling {
                Sampling::Centre => vec![state.root],
                Sampling::WholeBody => {
                    if !state.bounds.aabb().intersects(region.bounds()) {
                        return Ok(Containment::outside());
                    }
                    whole_body_samples(&state.bounds)
                }
            };
            Ok(test_samples(region, &samples))
        }
    }
}

/// Point-in-region test
pub fn test_point(region: &Region, point: Vec3) -> Containment {
    Containment::from_touching(region.parts_containing(point).into_iter().collect())
}

/// Union of the parts containing any of `samples`
pub fn test_samples(region: &Region, samples: &[Vec3]) -> Containment {
    let touching = samples
        .iter()
        .flat_map(|&sample| region.parts_containing(sample))
        .collect();
    Containment::from_touching(touching)
}

/// Centre plus the eight corners of a character's bounds
pub fn whole_body_samples(bounds: &OrientedBox) -> Vec<Vec3> {
    let mut samples = Vec::with_capacity(9);
    samples.push(bounds.center());
    samples.extend(bounds.corners());
    samples
}

fn test_body(
    scene: &dyn SceneQuery,
    region: &Region,
    id: BodyId,
    state: &BodyState,
    confirmation: OverlapConfirmation,
) -> Result<Containment> {
    // A zone's own parts are never its occupants
    if region.has_part(id) {
        return Ok(Containment::outside());
    }

    let obb = state.obb();
    if !obb.aabb().intersects(region.bounds()) {
        return Ok(Containment::outside());
    }

    let mut touching = BTreeSet::new();
    let mut ambiguous = Vec::new();
    for part in region.parts() {
        if !part.obb.intersects(&obb) {
            continue;
        }
        if part.is_box_exact() && state.shape == BodyShape::Block {
            touching.insert(part.body);
        } else {
            ambiguous.push(part);
        }
    }

    if !ambiguous.is_empty() {
        match confirmation {
            OverlapConfirmation::Scene => {
                let confirmed: BTreeSet<BodyId> =
                    scene.touching_bodies(id)?.into_iter().collect();
                touching.extend(
                    ambiguous
                        .iter()
                        .map(|part| part.body)
                        .filter(|body| confirmed.contains(body)),
                );
            }
            OverlapConfirmation::Geometry => {
                touching.extend(
                    ambiguous
                        .iter()
                        .filter(|part| rounded_overlap(part, state))
                        .map(|part| part.body),
                );
            }
        }
    }

    Ok(Containment::from_touching(touching))
}

/// Exact overlap when at least one side is a ball
fn rounded_overlap(part: &PartVolume, body: &BodyState) -> bool {
    let body_obb = body.obb();
    match (part.shape, body.shape) {
        (BodyShape::Ball, BodyShape::Block) => {
            body_obb.intersects_sphere(part.obb.center(), part.obb.inscribed_radius())
        }
        (BodyShape::Block, BodyShape::Ball) => {
            part.obb.intersects_sphere(body_obb.center(), body_obb.inscribed_radius())
        }
        (BodyShape::Ball, BodyShape::Ball) => {
            let reach = part.obb.inscribed_radius() + body_obb.inscribed_radius();
            (part.obb.center() - body_obb.center()).magnitude_squared() <= reach * reach
        }
        (BodyShape::Block, BodyShape::Block) => part.obb.intersects(&body_obb),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::geometry::CellLimits;
    use crate::scene::memory::MemoryScene;

    fn cube() -> Vec3 {
        Vec3::new(10.0, 10.0, 10.0)
    }

    fn zone_region(scene: &mut MemoryScene) -> (BodyId, Region) {
        let part = scene.add_block(Transform::identity(), cube());
        let region = Region::resolve(scene, &[part], CellLimits::default()).unwrap();
        (part, region)
    }

    #[test]
    fn test_point_inside_and_far_away() {
        let mut scene = MemoryScene::new();
        let (part, region) = zone_region(&mut scene);

        let inside = test_point(&region, Vec3::zeros());
        assert!(inside.is_inside());
        assert!(inside.touching().contains(&part));

        let outside = test_point(&region, Vec3::new(100.0, 0.0, 0.0));
        assert!(!outside.is_inside());
        assert!(outside.touching().is_empty());
    }

    #[test]
    fn test_body_overlap_and_fast_path() {
        let mut scene = MemoryScene::new();
        let (part, region) = zone_region(&mut scene);
        let near = scene.add_block(Transform::from_position(Vec3::new(5.5, 0.0, 0.0)), cube() * 0.2);
        let far = scene.add_block(Transform::from_position(Vec3::new(50.0, 0.0, 0.0)), cube() * 0.2);

        let result = test(&scene, &region, Target::Body(near), Sampling::Centre, OverlapConfirmation::Scene)
            .unwrap();
        assert_eq!(result.touching().iter().copied().collect::<Vec<_>>(), vec![part]);

        // Fast path never consults the touching primitive
        scene.set_failing(true);
        let result = test(&scene, &region, Target::Body(far), Sampling::Centre, OverlapConfirmation::Scene)
            .unwrap();
        assert!(!result.is_inside());
    }

    #[test]
    fn test_ball_overlap_confirmed_by_scene() {
        let mut scene = MemoryScene::new();
        let (_, region) = zone_region(&mut scene);
        // Box-level overlap with the zone corner, but the sphere misses it
        let ball = scene.add_ball(Transform::from_position(Vec3::new(5.8, 5.8, 5.8)), Vec3::new(2.0, 2.0, 2.0));

        let result = test(&scene, &region, Target::Body(ball), Sampling::Centre, OverlapConfirmation::Scene)
            .unwrap();
        assert!(!result.is_inside());

        let result = test(&scene, &region, Target::Body(ball), Sampling::Centre, OverlapConfirmation::Geometry)
            .unwrap();
        assert!(!result.is_inside());

        scene.set_failing(true);
        assert!(test(&scene, &region, Target::Body(ball), Sampling::Centre, OverlapConfirmation::Scene).is_err());
    }

    #[test]
    fn test_zone_part_is_not_an_occupant() {
        let mut scene = MemoryScene::new();
        let (part, region) = zone_region(&mut scene);
        let result = test(&scene, &region, Target::Body(part), Sampling::Centre, OverlapConfirmation::Scene)
            .unwrap();
        assert!(!result.is_inside());
    }

    #[test]
    fn test_character_sampling() {
        let mut scene = MemoryScene::new();
        let (_, region) = zone_region(&mut scene);
        // Root outside, but the top of the bounds reaches into the zone
        let character = scene.add_character(Vec3::new(0.0, 6.5, 0.0), Vec3::new(1.0, 4.0, 1.0));

        let centre = test(&scene, &region, Target::Character(character), Sampling::Centre, OverlapConfirmation::Scene)
            .unwrap();
        assert!(!centre.is_inside());

        let whole = test(&scene, &region, Target::Character(character), Sampling::WholeBody, OverlapConfirmation::Scene)
            .unwrap();
        assert!(whole.is_inside());
    }

    #[test]
    fn test_missing_targets_error() {
        let mut scene = MemoryScene::new();
        let (_, region) = zone_region(&mut scene);
        let err = test(&scene, &region, Target::Character(CharacterId(77)), Sampling::Centre, OverlapConfirmation::Scene);
        assert!(err.is_err());
    }
}
