//! # Allocation Error Types
//!
//! All errors that can occur while carving ranges out of a free list.

use thiserror::Error;

/// Errors that can occur in a range allocator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No free slot is large enough for the request.
    #[error("out of memory: requested {requested}, largest free slot is {largest_free}")]
    OutOfMemory {
        /// Number of units requested.
        requested: u32,
        /// Size of the largest free slot at the time of the request.
        largest_free: u32,
    },

    /// The request itself is malformed (zero-sized allocation, zero-sized list).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The slot is not a live allocation of this list (double free or foreign slot).
    #[error("invalid operation: slot at {start} is not allocated from this list")]
    InvalidOperation {
        /// Start of the offending slot.
        start: u32,
    },
}

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;
