//! Bounding volumes attached to draws and instances.

use super::frustum::Aabb;
use crate::config::BoundingKind;
use crate::math::{self, Mat4};

/// Shape tested against the frustum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum BoundingVolume {
    /// Never culled.
    #[default]
    None,
    /// Sphere.
    Sphere {
        /// Center.
        center: [f32; 3],
        /// Radius.
        radius: f32,
    },
    /// Axis-aligned box.
    Box(Aabb),
}

impl BoundingVolume {
    /// Sphere shorthand.
    #[must_use]
    pub const fn sphere(center: [f32; 3], radius: f32) -> Self {
        Self::Sphere { center, radius }
    }

    /// Box shorthand.
    #[must_use]
    pub const fn aabb(min: [f32; 3], max: [f32; 3]) -> Self {
        Self::Box(Aabb::new(min, max))
    }

    /// Kind of this volume.
    #[must_use]
    pub const fn kind(&self) -> BoundingKind {
        match self {
            Self::None => BoundingKind::None,
            Self::Sphere { .. } => BoundingKind::Sphere,
            Self::Box(_) => BoundingKind::Box,
        }
    }

    /// Converts to the configured kind.
    ///
    /// A box becomes its circumscribed sphere, a sphere its enclosing box.
    /// Anything becomes `None` under `BoundingKind::None`, and `None` stays
    /// `None` (always visible) under any kind.
    #[must_use]
    pub fn to_kind(self, kind: BoundingKind) -> Self {
        match (self, kind) {
            (_, BoundingKind::None) | (Self::None, _) => Self::None,
            (Self::Sphere { .. }, BoundingKind::Sphere) | (Self::Box(_), BoundingKind::Box) => self,
            (Self::Box(aabb), BoundingKind::Sphere) => {
                let h = aabb.half_extents();
                Self::Sphere {
                    center: aabb.center(),
                    radius: (h[0] * h[0] + h[1] * h[1] + h[2] * h[2]).sqrt(),
                }
            }
            (Self::Sphere { center, radius }, BoundingKind::Box) => Self::Box(Aabb::new(
                center.map(|c| c - radius),
                center.map(|c| c + radius),
            )),
        }
    }

    /// Applies an affine transform.
    ///
    /// Spheres scale by the largest axis scale; boxes are re-fitted around
    /// their transformed corners.
    #[must_use]
    pub fn transformed(self, m: &Mat4) -> Self {
        match self {
            Self::None => Self::None,
            Self::Sphere { center, radius } => Self::Sphere {
                center: math::transform_point(m, center),
                radius: radius * math::max_axis_scale(m),
            },
            Self::Box(aabb) => {
                let corners = aabb.corners().map(|corner| math::transform_point(m, corner));
                Self::Box(Aabb::from_points(&corners))
            }
        }
    }
}
