//! # Geometry Slab Allocator
//!
//! Many independently sized meshes packed into one shared vertex and index
//! buffer. Each allocation reserves a vertex range and an index range and
//! appends one draw record; freeing swaps the last record into the hole so
//! the per-draw arrays stay dense.

mod allocator;
mod records;

pub use allocator::{GeometryAllocator, GeometryHandle, GeometryRequest, OcclusionBounds};
pub use records::DrawRecord;
