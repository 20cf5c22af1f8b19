//! Oriented boxes
//!
//! Every zone part, region cell and character bound is represented as a box
//! with a rigid transform and half-extents. Intersection uses the separating
//! axis theorem over the 15 candidate axes of two boxes.

use super::aabb::AABB;
use crate::foundation::math::{Transform, Vec3};

/// Tolerance used by containment tests so that points lying exactly on a
/// face survive float round-off from the inverse rotation
const CONTAINS_EPSILON: f32 = 1e-4;

/// A box with a transform and half-extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    /// Centre and orientation of the box
    pub transform: Transform,
    /// Half the size along each local axis
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// Create a box from its transform and full size
    pub fn new(transform: Transform, size: Vec3) -> Self {
        Self {
            transform,
            half_extents: size.abs() * 0.5,
        }
    }

    /// An axis-aligned box covering `aabb`
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            transform: Transform::from_position(aabb.center()),
            half_extents: aabb.extents(),
        }
    }

    /// Centre of the box in world space
    pub fn center(&self) -> Vec3 {
        self.transform.position
    }

    /// Full size along each local axis
    pub fn size(&self) -> Vec3 {
        self.half_extents * 2.0
    }

    /// Box volume
    pub fn volume(&self) -> f32 {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// The eight corners in world space
    pub fn corners(&self) -> [Vec3; 8] {
        let h = self.half_extents;
        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let local = Vec3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { -h.y } else { h.y },
                if i & 4 == 0 { -h.z } else { h.z },
            );
            *corner = self.transform.transform_point(local);
        }
        corners
    }

    /// World-space axis-aligned bounds
    pub fn aabb(&self) -> AABB {
        let [ax, ay, az] = self.transform.axes();
        let h = self.half_extents;
        let extents = ax.abs() * h.x + ay.abs() * h.y + az.abs() * h.z;
        AABB::from_center_extents(self.center(), extents)
    }

    /// Check if a world-space point lies inside (or on) the box
    pub fn contains_point(&self, point: Vec3) -> bool {
        let local = self.transform.inverse_transform_point(point);
        local.x.abs() <= self.half_extents.x + CONTAINS_EPSILON
            && local.y.abs() <= self.half_extents.y + CONTAINS_EPSILON
            && local.z.abs() <= self.half_extents.z + CONTAINS_EPSILON
    }

    /// Radius of the largest sphere centred in the box (the shape of a
    /// ball body with this size)
    pub fn inscribed_radius(&self) -> f32 {
        self.half_extents.min()
    }

    /// Check if a world-space point lies inside the inscribed sphere
    pub fn sphere_contains_point(&self, point: Vec3) -> bool {
        let radius = self.inscribed_radius();
        (point - self.center()).magnitude_squared() <= radius * radius + CONTAINS_EPSILON
    }

    /// Closest point on or in the box to a world-space point
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let local = self.transform.inverse_transform_point(point);
        let h = self.half_extents;
        let clamped = Vec3::new(
            local.x.clamp(-h.x, h.x),
            local.y.clamp(-h.y, h.y),
            local.z.clamp(-h.z, h.z),
        );
        self.transform.transform_point(clamped)
    }

    /// Check whether a sphere overlaps the box
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        (self.closest_point(center) - center).magnitude_squared() <= radius * radius
    }

    /// Map a point given in unit-box coordinates (each axis in [-1, 1]) to
    /// world space
    pub fn point_from_unit(&self, unit: Vec3) -> Vec3 {
        self.transform
            .transform_point(unit.component_mul(&self.half_extents))
    }

    /// Separating axis test against another box
    pub fn intersects(&self, other: &OrientedBox) -> bool {
        const EPSILON: f32 = 1e-6;

        // Project a box onto an axis and return its radius around the centre
        fn project_radius(obb: &OrientedBox, axes: &[Vec3; 3], axis: &Vec3) -> f32 {
            obb.half_extents.x * axes[0].dot(axis).abs()
                + obb.half_extents.y * axes[1].dot(axis).abs()
                + obb.half_extents.z * axes[2].dot(axis).abs()
        }

        let axes_a = self.transform.axes();
        let axes_b = other.transform.axes();
        let offset = other.center() - self.center();

        // Returns false if `axis` separates the boxes
        let overlaps_on = |axis: Vec3| -> bool {
            let len_sq = axis.magnitude_squared();
            if len_sq < EPSILON {
                return true; // Degenerate axis (parallel edges), skip
            }
            let axis = axis / len_sq.sqrt();
            let distance = offset.dot(&axis).abs();
            distance <= project_radius(self, &axes_a, &axis) + project_radius(other, &axes_b, &axis)
        };

        for axis in axes_a.iter().chain(axes_b.iter()) {
            if !overlaps_on(*axis) {
                return false;
            }
        }

        for a in &axes_a {
            for b in &axes_b {
                if !overlaps_on(a.cross(b)) {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_4;

    fn cube_at(position: Vec3, size: f32) -> OrientedBox {
        OrientedBox::new(Transform::from_position(position), Vec3::new(size, size, size))
    }

    #[test]
    fn test_contains_point_respects_rotation() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_4);
        let obb = OrientedBox::new(
            Transform::from_position_rotation(Vec3::zeros(), rotation),
            Vec3::new(2.0, 2.0, 2.0),
        );

        // A corner of the unrotated cube is outside once rotated 45 degrees
        assert!(!obb.contains_point(Vec3::new(0.99, 0.0, 0.99)));
        // But the rotated face extends further along x
        assert!(obb.contains_point(Vec3::new(1.3, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_of_rotated_box() {
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_4);
        let obb = OrientedBox::new(
            Transform::from_position_rotation(Vec3::zeros(), rotation),
            Vec3::new(2.0, 2.0, 2.0),
        );
        let aabb = obb.aabb();
        assert_relative_eq!(aabb.max.x, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(aabb.max.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_inscribed_sphere_excludes_corners() {
        let obb = cube_at(Vec3::zeros(), 2.0);
        assert!(obb.sphere_contains_point(Vec3::new(0.9, 0.0, 0.0)));
        assert!(!obb.sphere_contains_point(Vec3::new(0.9, 0.9, 0.9)));
        assert!(obb.contains_point(Vec3::new(0.9, 0.9, 0.9)));
    }

    #[test]
    fn test_sphere_overlap_uses_closest_point() {
        let obb = cube_at(Vec3::zeros(), 2.0);
        assert_eq!(obb.closest_point(Vec3::new(5.0, 0.5, 0.0)), Vec3::new(1.0, 0.5, 0.0));
        assert!(obb.intersects_sphere(Vec3::new(2.0, 0.0, 0.0), 1.0));
        // Diagonal distance from the corner is sqrt(2) > 1
        assert!(!obb.intersects_sphere(Vec3::new(2.0, 2.0, 0.0), 1.0));
    }

    #[test]
    fn test_separating_axis() {
        let a = cube_at(Vec3::zeros(), 2.0);
        let touching = cube_at(Vec3::new(2.0, 0.0, 0.0), 2.0);
        let apart = cube_at(Vec3::new(2.5, 0.0, 0.0), 2.0);
        assert!(a.intersects(&touching));
        assert!(!a.intersects(&apart));

        // Rotated box whose AABB overlaps but whose faces do not
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_4);
        let diamond = OrientedBox::new(
            Transform::from_position_rotation(Vec3::new(2.3, 2.3, 0.0), rotation),
            Vec3::new(2.0, 2.0, 2.0),
        );
        assert!(a.aabb().intersects(&diamond.aabb()));
        assert!(!a.intersects(&diamond));
    }

    #[test]
    fn test_corners_and_volume() {
        let obb = cube_at(Vec3::new(1.0, 1.0, 1.0), 2.0);
        let corners = obb.corners();
        assert_eq!(corners[0], Vec3::zeros());
        assert_eq!(corners[7], Vec3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(obb.volume(), 8.0);
    }
}
