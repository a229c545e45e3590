//! Geometry primitives: local frames, box extents and world-space AABBs.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Default tolerance for geometric comparisons.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// A local coordinate frame: position plus rotation relative to a parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    isometry: Isometry3<f64>,
}

impl Frame {
    /// The identity frame.
    pub fn identity() -> Self {
        Self {
            isometry: Isometry3::identity(),
        }
    }

    /// Creates a frame from a position and a rotation.
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            isometry: Isometry3::from_parts(Translation3::from(position), rotation),
        }
    }

    /// Creates a frame translated to `position` without rotation.
    pub fn at(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Creates a frame from a dump pose: position plus Euler angles in degrees
    /// (X = roll, Y = pitch, Z = yaw).
    pub fn from_pose(position: [f64; 3], rotation_deg: [f64; 3]) -> Self {
        let rotation = UnitQuaternion::from_euler_angles(
            rotation_deg[0].to_radians(),
            rotation_deg[1].to_radians(),
            rotation_deg[2].to_radians(),
        );
        Self::new(Vector3::from(position), rotation)
    }

    /// Returns the frame origin in parent coordinates.
    pub fn position(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    /// Returns the frame rotation.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.isometry.rotation
    }

    /// Maps a point from this frame into the parent frame.
    pub fn to_parent(&self, local: &Point3<f64>) -> Point3<f64> {
        self.isometry.transform_point(local)
    }

    /// Maps a point from the parent frame into this frame.
    pub fn to_local(&self, parent: &Point3<f64>) -> Point3<f64> {
        self.isometry.inverse_transform_point(parent)
    }

    /// Maps a direction from this frame into the parent frame.
    pub fn vector_to_parent(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.isometry.transform_vector(local)
    }

    /// Expresses `self` (a frame in world coordinates) relative to `reference`
    /// (also in world coordinates).
    pub fn relative_to(&self, reference: &Frame) -> Frame {
        Frame {
            isometry: reference.isometry.inverse() * self.isometry,
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::identity()
    }
}

/// Box extents in a container's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extents {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

impl Extents {
    /// Creates extents from two corners.
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Zero-size extents at the origin.
    pub fn zero() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }

    /// Extents of an item with the given size whose origin is its bottom centre.
    pub fn bottom_centered(size: [f64; 3]) -> Self {
        let hx = size[0].abs() * 0.5;
        let hy = size[1].abs() * 0.5;
        Self {
            min: [-hx, -hy, 0.0],
            max: [hx, hy, size[2].abs()],
        }
    }

    /// Smallest extents containing every point, or `None` for no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut ext = Self {
            min: [first.x, first.y, first.z],
            max: [first.x, first.y, first.z],
        };
        for p in iter {
            for axis in 0..3 {
                ext.min[axis] = ext.min[axis].min(p[axis]);
                ext.max[axis] = ext.max[axis].max(p[axis]);
            }
        }
        Some(ext)
    }

    /// Size along each axis.
    pub fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Centre point.
    pub fn center(&self) -> Point3<f64> {
        Point3::new(
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        )
    }

    /// Footprint area (X × Y).
    pub fn footprint_area(&self) -> f64 {
        let size = self.size();
        size[0] * size[1]
    }

    /// Returns true when the footprint collapses below `tolerance`.
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        self.footprint_area() <= tolerance
    }

    /// The eight box corners.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], a[1], a[2]),
            Point3::new(b[0], b[1], a[2]),
            Point3::new(a[0], b[1], a[2]),
            Point3::new(a[0], a[1], b[2]),
            Point3::new(b[0], a[1], b[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(a[0], b[1], b[2]),
        ]
    }
}

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3D {
    /// Minimum corner (x, y, z)
    pub min: [f64; 3],
    /// Maximum corner (x, y, z)
    pub max: [f64; 3],
}

impl Aabb3D {
    /// Creates a new AABB.
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// World-space AABB of local extents placed by `frame`.
    pub fn from_extents(extents: &Extents, frame: &Frame) -> Self {
        let corners: Vec<Point3<f64>> = extents
            .corners()
            .iter()
            .map(|c| frame.to_parent(c))
            .collect();
        // Eight corners are always present.
        let ext = Extents::from_points(&corners).unwrap_or_else(Extents::zero);
        Self {
            min: ext.min,
            max: ext.max,
        }
    }

    /// Checks if this AABB is fully contained within another AABB.
    pub fn is_within(&self, other: &Aabb3D) -> bool {
        self.min[0] >= other.min[0]
            && self.min[1] >= other.min[1]
            && self.min[2] >= other.min[2]
            && self.max[0] <= other.max[0]
            && self.max[1] <= other.max[1]
            && self.max[2] <= other.max[2]
    }

    /// Expands this AABB by a margin on all sides.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min: [
                self.min[0] - margin,
                self.min[1] - margin,
                self.min[2] - margin,
            ],
            max: [
                self.max[0] + margin,
                self.max[1] + margin,
                self.max[2] + margin,
            ],
        }
    }
}
