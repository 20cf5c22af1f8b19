//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the rigid transform used for bodies,
//! characters and region boxes.

pub use nalgebra::{Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid transform (position + rotation)
///
/// Scene bodies carry their size separately, so unlike a render transform
/// this never scales.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Map a point from local space into world space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Map a world-space point into this transform's local space
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.position)
    }

    /// Rotate a direction into world space
    pub fn transform_vector(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    /// The three local axes expressed in world space (x, y, z)
    pub fn axes(&self) -> [Vec3; 3] {
        [
            self.rotation * Vec3::x(),
            self.rotation * Vec3::y(),
            self.rotation * Vec3::z(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_round_trip_local_world() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2);
        let transform = Transform::from_position_rotation(Vec3::new(5.0, 0.0, 0.0), rotation);

        let local = Vec3::new(1.0, 2.0, 3.0);
        let world = transform.transform_point(local);
        assert_relative_eq!(transform.inverse_transform_point(world), local, epsilon = 1e-5);
    }

    #[test]
    fn test_axes_follow_rotation() {
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2);
        let transform = Transform::from_position_rotation(Vec3::zeros(), rotation);

        let [x, y, _] = transform.axes();
        assert_relative_eq!(x, Vec3::y(), epsilon = 1e-5);
        assert_relative_eq!(y, -Vec3::x(), epsilon = 1e-5);
    }
}
