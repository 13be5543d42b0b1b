//! # GEOSLAB Core
//!
//! Fixed-capacity range allocation for shared GPU buffers:
//! - One linear index space per buffer, partitioned into used/free slots
//! - First-fit allocation, merge-on-free
//! - No growth path: exhaustion is reported, never papered over
//!
//! ## Example
//!
//! ```rust
//! use geoslab_core::FreeList;
//!
//! let mut list = FreeList::new(100)?;
//! let slot = list.alloc(30)?;
//! assert_eq!((slot.start(), slot.count()), (0, 30));
//! list.free(slot)?;
//! assert_eq!(list.free_space(), 100);
//! # Ok::<(), geoslab_core::AllocError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;

pub use error::{AllocError, AllocResult};
pub use memory::{FreeList, Slot, SlotSpan};
