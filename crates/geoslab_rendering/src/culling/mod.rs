//! Culling systems for draw-spec generation.
//!
//! Frustum tests against sphere or box volumes, plus the chunk-adjacency
//! occlusion search used by occlusion-enabled geometry allocators.

mod bounds;
mod frustum;
mod occlusion;

pub use bounds::BoundingVolume;
pub use frustum::{Aabb, Frustum, FrustumCuller, Plane};
pub use occlusion::{CellKey, Face, OcclusionGraph, PeekMask};
