//! Region resolution
//!
//! Turns the ordered list of bodies that make up a zone into the cached
//! geometry every containment test runs against: one oriented volume per
//! part, the enclosing bounds, the broad-phase cells used for body
//! discovery and the summed volume.
//!
//! Cells follow the parts, not the enclosing bounds, so zones whose parts
//! lie far apart cost one cell per part. Only a part larger than the
//! scene's maximum body size is split further.

use super::aabb::AABB;
use super::obb::OrientedBox;
use crate::error::{Result, ZoneError};
use crate::foundation::math::{Transform, Vec3};
use crate::scene::{BodyId, BodyShape, SceneQuery};

/// Geometry of a single constituent body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartVolume {
    /// The body this volume was resolved from
    pub body: BodyId,
    /// Collision shape of the body
    pub shape: BodyShape,
    /// World-space box of the body
    pub obb: OrientedBox,
}

impl PartVolume {
    /// Exact point test against the part's shape
    pub fn contains_point(&self, point: Vec3) -> bool {
        match self.shape {
            BodyShape::Block => self.obb.contains_point(point),
            BodyShape::Ball => self.obb.sphere_contains_point(point),
        }
    }

    /// Whether a box-level overlap with this part is exact
    ///
    /// Ball parts only overlap a box test conservatively, so callers must
    /// confirm with the scene's touching primitive.
    pub fn is_box_exact(&self) -> bool {
        matches!(self.shape, BodyShape::Block)
    }

    /// Volume of the box random points are drawn from before rejection
    ///
    /// A ball samples the cube around its inscribed sphere, so a
    /// stretched ball draws from less than its full box.
    pub fn sampling_volume(&self) -> f32 {
        match self.shape {
            BodyShape::Block => self.obb.volume(),
            BodyShape::Ball => (2.0 * self.obb.inscribed_radius()).powi(3),
        }
    }
}

/// Bounds on splitting a box into cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLimits {
    /// Largest extent a single cell may have
    pub max_part_size: f32,
    /// Most cells one box may be split into
    pub max_cells: usize,
}

impl CellLimits {
    /// Create limits from a maximum cell extent and cell count
    pub fn new(max_part_size: f32, max_cells: usize) -> Self {
        Self {
            max_part_size,
            max_cells,
        }
    }
}

impl Default for CellLimits {
    fn default() -> Self {
        Self::new(2048.0, 4096)
    }
}

/// Cached geometry for one zone
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    parts: Vec<PartVolume>,
    bounds: AABB,
    cells: Vec<OrientedBox>,
    volume: f32,
}

impl Region {
    /// Resolve the region for `bodies` by querying their current state
    ///
    /// Duplicate bodies are dropped, keeping first occurrence order, so the
    /// result depends only on the ordered input.
    pub fn resolve(scene: &dyn SceneQuery, bodies: &[BodyId], limits: CellLimits) -> Result<Self> {
        let mut parts: Vec<PartVolume> = Vec::with_capacity(bodies.len());
        for &body in bodies {
            if parts.iter().any(|p| p.body == body) {
                continue;
            }
            let state = scene.body(body).ok_or_else(|| {
                ZoneError::construction(format!("body {body} does not exist in the scene"))
            })?;
            parts.push(PartVolume {
                body,
                shape: state.shape,
                obb: OrientedBox::new(state.transform, state.size),
            });
        }
        Self::from_parts(parts, limits)
    }

    /// Build a region from already-resolved parts
    ///
    /// Fails when a single part would need more than `limits.max_cells`
    /// cells.
    pub fn from_parts(parts: Vec<PartVolume>, limits: CellLimits) -> Result<Self> {
        let bounds = parts
            .iter()
            .map(|p| p.obb.aabb())
            .reduce(|acc, b| acc.union(&b))
            .ok_or_else(|| ZoneError::construction("a zone needs at least one body"))?;

        let volume = parts.iter().map(|p| p.obb.volume()).sum();
        let mut cells = Vec::with_capacity(parts.len());
        for part in &parts {
            cells.extend(decompose(&part.obb.transform, part.obb.size(), limits)?);
        }

        Ok(Self {
            parts,
            bounds,
            cells,
            volume,
        })
    }

    /// Per-part volumes in zone order
    pub fn parts(&self) -> &[PartVolume] {
        &self.parts
    }

    /// Bodies the region was resolved from, in zone order
    pub fn bodies(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.parts.iter().map(|p| p.body)
    }

    /// Enclosing axis-aligned bounds
    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    /// Broad-phase cells: each part, split where it exceeds the maximum
    /// body size
    pub fn cells(&self) -> &[OrientedBox] {
        &self.cells
    }

    /// Sum of part volumes
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Parts containing `point`, empty when outside
    ///
    /// Rejects against the bounds before touching any part.
    pub fn parts_containing(&self, point: Vec3) -> Vec<BodyId> {
        if !self.bounds.contains_point(point) {
            return Vec::new();
        }
        self.parts
            .iter()
            .filter(|p| p.contains_point(point))
            .map(|p| p.body)
            .collect()
    }

    /// Check whether the region contains the given body
    pub fn has_part(&self, body: BodyId) -> bool {
        self.parts.iter().any(|p| p.body == body)
    }
}

/// Split a box into equal sub-boxes whose every extent is at most
/// `limits.max_part_size`
///
/// Cells are emitted x-fastest, then y, then z, so the output is stable
/// for a given input. A non-positive size limit disables splitting. A box
/// needing more than `limits.max_cells` cells is a construction error.
pub fn decompose(transform: &Transform, size: Vec3, limits: CellLimits) -> Result<Vec<OrientedBox>> {
    let size = size.abs();
    let too_many = || {
        ZoneError::construction(format!(
            "box [{}, {}, {}] needs more than {} cells of at most {}",
            size.x, size.y, size.z, limits.max_cells, limits.max_part_size
        ))
    };
    let count = |extent: f32| -> Result<usize> {
        if !(limits.max_part_size > 0.0 && extent > limits.max_part_size) {
            return Ok(1);
        }
        let cells = (extent / limits.max_part_size).ceil();
        if !cells.is_finite() || cells > limits.max_cells as f32 {
            return Err(too_many());
        }
        Ok(cells as usize)
    };
    let (nx, ny, nz) = (count(size.x)?, count(size.y)?, count(size.z)?);
    let total = nx
        .checked_mul(ny)
        .and_then(|n| n.checked_mul(nz))
        .filter(|&n| n <= limits.max_cells)
        .ok_or_else(too_many)?;
    let cell = Vec3::new(size.x / nx as f32, size.y / ny as f32, size.z / nz as f32);
    let origin = -size * 0.5;

    let mut cells = Vec::with_capacity(total);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let local_center = origin
                    + Vec3::new(
                        cell.x * (x as f32 + 0.5),
                        cell.y * (y as f32 + 0.5),
                        cell.z * (z as f32 + 0.5),
                    );
                cells.push(OrientedBox::new(
                    Transform::from_position_rotation(
                        transform.transform_point(local_center),
                        transform.rotation,
                    ),
                    cell,
                ));
            }
        }
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::memory::MemoryScene;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_body_region() {
        let mut scene = MemoryScene::new();
        let body = scene.add_block(Transform::identity(), Vec3::new(10.0, 10.0, 10.0));

        let region = Region::resolve(&scene, &[body], CellLimits::default()).unwrap();
        assert_relative_eq!(region.volume(), 1000.0);
        assert_eq!(region.cells().len(), 1);
        assert_eq!(region.parts_containing(Vec3::zeros()), vec![body]);
        assert!(region.parts_containing(Vec3::new(100.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_duplicates_keep_first_order() {
        let mut scene = MemoryScene::new();
        let a = scene.add_block(Transform::identity(), Vec3::new(1.0, 1.0, 1.0));
        let b = scene.add_block(Transform::from_position(Vec3::new(5.0, 0.0, 0.0)), Vec3::new(1.0, 1.0, 1.0));

        let region = Region::resolve(&scene, &[b, a, b], CellLimits::default()).unwrap();
        assert_eq!(region.bodies().collect::<Vec<_>>(), vec![b, a]);
        assert_relative_eq!(region.bounds().min.x, -0.5);
        assert_relative_eq!(region.bounds().max.x, 5.5);
    }

    #[test]
    fn test_missing_body_is_construction_error() {
        let scene = MemoryScene::new();
        let err = Region::resolve(&scene, &[BodyId(42)], CellLimits::default()).unwrap_err();
        assert!(matches!(err, ZoneError::Construction { .. }));

        let err = Region::resolve(&scene, &[], CellLimits::default()).unwrap_err();
        assert!(matches!(err, ZoneError::Construction { .. }));
    }

    #[test]
    fn test_decompose_oversized_extent() {
        let cells = decompose(&Transform::identity(), Vec3::new(5000.0, 10.0, 10.0), CellLimits::default()).unwrap();
        assert_eq!(cells.len(), 3);
        for cell in &cells {
            assert!(cell.size().x <= 2048.0);
        }
        assert_relative_eq!(cells[0].center().x, -5000.0 / 3.0, epsilon = 1e-2);
        assert_relative_eq!(cells[2].center().x, 5000.0 / 3.0, epsilon = 1e-2);

        let total: f32 = cells.iter().map(OrientedBox::volume).sum();
        assert_relative_eq!(total, 5000.0 * 100.0, max_relative = 1e-4);
    }

    #[test]
    fn test_decompose_rejects_too_many_cells() {
        let limits = CellLimits::new(10.0, 8);
        let err = decompose(&Transform::identity(), Vec3::new(30.0, 10.0, 10.0), limits).unwrap_err();
        assert!(matches!(err, ZoneError::Construction { .. }));
        assert_eq!(
            decompose(&Transform::identity(), Vec3::new(20.0, 20.0, 20.0), limits).unwrap().len(),
            8
        );

        // Counts that would overflow on multiplication
        let huge = Vec3::new(1e12, 1e12, 1e12);
        let err = decompose(&Transform::identity(), huge, CellLimits::default()).unwrap_err();
        assert!(matches!(err, ZoneError::Construction { .. }));
        let err = decompose(&Transform::identity(), huge, CellLimits::new(1e-30, usize::MAX)).unwrap_err();
        assert!(matches!(err, ZoneError::Construction { .. }));
    }

    #[test]
    fn test_distant_parts_keep_one_cell_each() {
        let mut scene = MemoryScene::new();
        let near = scene.add_block(Transform::identity(), Vec3::new(1.0, 1.0, 1.0));
        let far = scene.add_block(
            Transform::from_position(Vec3::new(1e5, 1e5, 1e5)),
            Vec3::new(1.0, 1.0, 1.0),
        );

        let region = Region::resolve(&scene, &[near, far], CellLimits::default()).unwrap();
        assert_eq!(region.cells().len(), 2);
        assert_relative_eq!(region.cells()[1].center().x, 1e5);
    }

    #[test]
    fn test_oversized_part_is_split() {
        let mut scene = MemoryScene::new();
        let slab = scene.add_block(Transform::identity(), Vec3::new(300.0, 10.0, 10.0));
        let region = Region::resolve(&scene, &[slab], CellLimits::new(100.0, 64)).unwrap();
        assert_eq!(region.cells().len(), 3);

        let err = Region::resolve(&scene, &[slab], CellLimits::new(100.0, 2)).unwrap_err();
        assert!(matches!(err, ZoneError::Construction { .. }));
    }

    #[test]
    fn test_ball_sampling_volume_uses_inscribed_cube() {
        let mut scene = MemoryScene::new();
        let ball = scene.add_ball(Transform::identity(), Vec3::new(4.0, 4.0, 8.0));
        let region = Region::resolve(&scene, &[ball], CellLimits::default()).unwrap();
        let part = region.parts()[0];
        assert_relative_eq!(part.sampling_volume(), 64.0);
        assert_relative_eq!(part.obb.volume(), 128.0);
    }

    #[test]
    fn test_ball_part_excludes_corner() {
        let mut scene = MemoryScene::new();
        let ball = scene.add_ball(Transform::identity(), Vec3::new(2.0, 2.0, 2.0));
        let region = Region::resolve(&scene, &[ball], CellLimits::default()).unwrap();

        assert_eq!(region.parts_containing(Vec3::zeros()), vec![ball]);
        assert!(region.parts_containing(Vec3::new(0.9, 0.9, 0.9)).is_empty());
    }
}
