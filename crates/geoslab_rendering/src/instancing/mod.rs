//! # Instanced Draw-Call Allocator
//!
//! A fixed set of base geometries merged into one buffer, drawn many times
//! with per-instance attributes.
//!
//! ## Key Concepts
//!
//! - **Draw-call slot**: one of `geometries × max_draw_calls_per_geometry`
//!   slots, bound to a base geometry while allocated
//! - **Instance block**: every slot owns `max_instances_per_draw_call`
//!   consecutive rows in each instance attribute texture
//! - **Compaction**: culled instances are swapped behind the visible ones in
//!   place, so each slot draws one contiguous run

mod allocator;
mod handle;
mod merge;

pub use allocator::InstancedAllocator;
pub use handle::{DrawCallHandle, DrawCallMut};
pub use merge::{BaseGeometry, GeometryRange};
