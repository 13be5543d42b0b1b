//! Per-frame draw-spec output.
//!
//! The allocators fill these buffers once per frame; the renderer hands
//! them straight to a multi-draw call.

mod draw_spec;
mod stats;

pub use draw_spec::{DrawSpec, InstancedDrawSpec};
pub use stats::CullStats;
