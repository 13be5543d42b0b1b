//! # GEOSLAB Rendering
//!
//! Shared-buffer geometry allocation and per-frame visibility:
//! - Many meshes packed into one vertex/index buffer, dense per-draw records
//! - Instanced draw calls with per-instance attributes in texel arrays
//! - Frustum culling plus a chunk-adjacency occlusion search
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PER FRAME                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  FreeList ranges → Draw records → Frustum / Occlusion → Spec │
//! │                                          ↓                   │
//! │  Instance rows  →  In-place compaction  →  Instanced spec    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use geoslab_rendering::{CameraState, GeometryAllocator, GeometryAllocatorConfig, GeometryRequest};
//!
//! let mut slab = GeometryAllocator::new(GeometryAllocatorConfig::new(1024, 16))?;
//! let handle = slab.alloc(GeometryRequest::new(3, 3))?;
//! slab.write_indices(&handle, &[0, 1, 2])?;
//!
//! let spec = slab.draw_spec(&CameraState::default());
//! assert_eq!(spec.starts(), &[0]);
//! assert_eq!(spec.counts(), &[3]);
//!
//! slab.free(handle)?;
//! # Ok::<(), geoslab_rendering::RenderError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

use std::sync::atomic::{AtomicU32, Ordering};

pub mod attributes;
pub mod camera;
pub mod config;
pub mod culling;
pub mod error;
pub mod geometry;
pub mod instancing;
pub mod math;
pub mod pipeline;

pub use attributes::{AttributeSet, AttributeStore, Element};
pub use camera::{Camera, CameraState};
pub use config::{
    AttributeSpec, BoundingKind, ElementType, GeometryAllocatorConfig, InstancedAllocatorConfig,
    OcclusionConfig,
};
pub use culling::{Aabb, BoundingVolume, Face, Frustum, FrustumCuller, PeekMask};
pub use error::{RenderError, RenderResult};
pub use geometry::{DrawRecord, GeometryAllocator, GeometryHandle, GeometryRequest, OcclusionBounds};
pub use instancing::{BaseGeometry, DrawCallHandle, DrawCallMut, GeometryRange, InstancedAllocator};
pub use pipeline::{CullStats, DrawSpec, InstancedDrawSpec};

/// Allocator identities, so a handle is only accepted by the allocator that issued it.
static NEXT_OWNER_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_owner_id() -> u32 {
    NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed)
}
