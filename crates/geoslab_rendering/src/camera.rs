//! Camera abstraction consumed by the draw-spec passes.
//!
//! Building projection and view matrices is the caller's job; the allocators
//! only need the matrices and the eye position.

use crate::math::{self, Mat4};

/// Anything that can be culled against.
pub trait Camera {
    /// Projection matrix (view space to clip space).
    fn projection(&self) -> Mat4;

    /// View matrix (world space to view space).
    fn view(&self) -> Mat4;

    /// Eye position in world space.
    fn position(&self) -> [f32; 3];

    /// Combined `projection * view`.
    fn view_projection(&self) -> Mat4 {
        math::mul(&self.projection(), &self.view())
    }
}

/// Plain camera snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Projection matrix.
    pub projection: Mat4,
    /// View matrix.
    pub view: Mat4,
    /// Eye position in world space.
    pub position: [f32; 3],
}

impl CameraState {
    /// Creates a camera from explicit matrices.
    #[must_use]
    pub const fn new(projection: Mat4, view: Mat4, position: [f32; 3]) -> Self {
        Self {
            projection,
            view,
            position,
        }
    }

    /// Axis-aligned orthographic camera at `position`, looking down -Z.
    ///
    /// The visible box is `position ± (half_width, half_height)` across and
    /// `near..far` in front of the eye.
    #[must_use]
    pub fn orthographic(
        position: [f32; 3],
        half_width: f32,
        half_height: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            projection: math::orthographic(-half_width, half_width, -half_height, half_height, near, far),
            view: math::translation([-position[0], -position[1], -position[2]]),
            position,
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(math::IDENTITY, math::IDENTITY, [0.0; 3])
    }
}

impl Camera for CameraState {
    fn projection(&self) -> Mat4 {
        self.projection
    }

    fn view(&self) -> Mat4 {
        self.view
    }

    fn position(&self) -> [f32; 3] {
        self.position
    }
}
