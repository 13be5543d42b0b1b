//! # Memory Management
//!
//! Range allocation over fixed linear index spaces.
//!
//! ## Design Philosophy
//!
//! All capacity is decided once at construction. Afterwards:
//! - Allocation carves ranges out of the existing space
//! - Freed ranges merge back with their free neighbours
//! - Nothing ever resizes

mod free_list;

pub use free_list::{FreeList, Slot, SlotSpan};
