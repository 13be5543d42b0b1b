//! Frustum culling for view-dependent draw lists.
//!
//! Extracts frustum planes from the view-projection matrix and tests
//! bounding volumes against them.

use bytemuck::{Pod, Zeroable};

use super::bounds::BoundingVolume;
use crate::math::Mat4;

/// A plane in 3D space (Ax + By + Cz + D = 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    /// Normal X component.
    pub a: f32,
    /// Normal Y component.
    pub b: f32,
    /// Normal Z component.
    pub c: f32,
    /// Distance from origin.
    pub d: f32,
}

impl Plane {
    /// Creates a new plane.
    #[must_use]
    pub const fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// Normalizes the plane.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = (self.a * self.a + self.b * self.b + self.c * self.c).sqrt();
        if len > 0.0 {
            Self {
                a: self.a / len,
                b: self.b / len,
                c: self.c / len,
                d: self.d / len,
            }
        } else {
            self
        }
    }

    /// Returns the signed distance from a point to the plane.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, p: [f32; 3]) -> f32 {
        self.a * p[0] + self.b * p[1] + self.c * p[2] + self.d
    }

    /// Converts to array format.
    #[must_use]
    pub const fn as_array(&self) -> [f32; 4] {
        [self.a, self.b, self.c, self.d]
    }
}

/// View frustum for culling.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Left plane index.
    pub const LEFT: usize = 0;
    /// Right plane index.
    pub const RIGHT: usize = 1;
    /// Bottom plane index.
    pub const BOTTOM: usize = 2;
    /// Top plane index.
    pub const TOP: usize = 3;
    /// Near plane index.
    pub const NEAR: usize = 4;
    /// Far plane index.
    pub const FAR: usize = 5;

    /// Extracts frustum planes from a view-projection matrix.
    ///
    /// The matrix is column-major (`m[column][row]`). Plane normals point
    /// inwards.
    #[must_use]
    pub fn from_view_projection(m: &Mat4) -> Self {
        let row = |r: usize| [m[0][r], m[1][r], m[2][r], m[3][r]];
        let w = row(3);

        let combine = |r: [f32; 4], sign: f32| {
            Plane::new(
                w[0] + sign * r[0],
                w[1] + sign * r[1],
                w[2] + sign * r[2],
                w[3] + sign * r[3],
            )
            .normalized()
        };

        let mut planes = [Plane::default(); 6];
        planes[Self::LEFT] = combine(row(0), 1.0);
        planes[Self::RIGHT] = combine(row(0), -1.0);
        planes[Self::BOTTOM] = combine(row(1), 1.0);
        planes[Self::TOP] = combine(row(1), -1.0);
        planes[Self::NEAR] = combine(row(2), 1.0);
        planes[Self::FAR] = combine(row(2), -1.0);

        Self { planes }
    }

    /// Converts planes to array format for GPU upload.
    #[must_use]
    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        self.planes.map(|plane| plane.as_array())
    }
}

/// Axis-aligned bounding box.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Aabb {
    /// Creates a new AABB.
    #[must_use]
    pub const fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all `points`.
    #[must_use]
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for p in points {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Self { min, max }
    }

    /// Returns the center of the AABB.
    #[must_use]
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Returns the half-extents of the AABB.
    #[must_use]
    pub fn half_extents(&self) -> [f32; 3] {
        [
            (self.max[0] - self.min[0]) * 0.5,
            (self.max[1] - self.min[1]) * 0.5,
            (self.max[2] - self.min[2]) * 0.5,
        ]
    }

    /// The eight corners.
    #[must_use]
    pub fn corners(&self) -> [[f32; 3]; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            [lo[0], lo[1], lo[2]],
            [hi[0], lo[1], lo[2]],
            [lo[0], hi[1], lo[2]],
            [hi[0], hi[1], lo[2]],
            [lo[0], lo[1], hi[2]],
            [hi[0], lo[1], hi[2]],
            [lo[0], hi[1], hi[2]],
            [hi[0], hi[1], hi[2]],
        ]
    }
}

/// Frustum culler for visibility testing.
#[derive(Debug, Clone, Default)]
pub struct FrustumCuller {
    frustum: Frustum,
}

impl FrustumCuller {
    /// Creates a new frustum culler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the frustum from a view-projection matrix.
    pub fn update(&mut self, view_projection: &Mat4) {
        self.frustum = Frustum::from_view_projection(view_projection);
    }

    /// Current frustum.
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Returns the current frustum planes for GPU upload.
    #[must_use]
    pub fn planes(&self) -> [[f32; 4]; 6] {
        self.frustum.as_arrays()
    }

    /// Tests if a sphere is visible (intersects the frustum).
    #[must_use]
    pub fn test_sphere(&self, center: [f32; 3], radius: f32) -> bool {
        self.frustum
            .planes
            .iter()
            .all(|plane| plane.distance_to_point(center) >= -radius)
    }

    /// Tests if an AABB is visible (intersects the frustum).
    #[must_use]
    pub fn test_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let half = aabb.half_extents();

        self.frustum.planes.iter().all(|plane| {
            // Projection interval radius of the box onto the plane normal
            let r = half[0] * plane.a.abs() + half[1] * plane.b.abs() + half[2] * plane.c.abs();
            plane.distance_to_point(center) >= -r
        })
    }

    /// Tests any bounding volume. `None` is always visible.
    #[must_use]
    pub fn test_volume(&self, volume: &BoundingVolume) -> bool {
        match volume {
            BoundingVolume::None => true,
            BoundingVolume::Sphere { center, radius } => self.test_sphere(*center, *radius),
            BoundingVolume::Box(aabb) => self.test_aabb(aabb),
        }
    }
}
