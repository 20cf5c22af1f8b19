//! Axis-aligned bounding boxes

use crate::foundation::math::Vec3;

/// Axis-Aligned Bounding Box for region bounds and fast-path rejection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest AABB enclosing every point, `None` for an empty input
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.inf(&p),
            max: acc.max.sup(&p),
        }))
    }

    /// Smallest AABB enclosing both boxes
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full size along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_encloses_all() {
        let aabb = AABB::from_points([
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-4.0, 5.0, 0.0),
        ])
        .unwrap();

        assert_eq!(aabb.min, Vec3::new(-4.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 5.0, 3.0));
        assert!(AABB::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_contains_and_intersects() {
        let a = AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let b = AABB::from_center_extents(Vec3::new(1.5, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let c = AABB::from_center_extents(Vec3::new(5.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(a.contains_point(Vec3::new(1.0, 1.0, 1.0)));
        assert!(!a.contains_point(Vec3::new(1.1, 0.0, 0.0)));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
