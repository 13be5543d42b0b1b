//! # Rendering Error Types
//!
//! All errors that can occur while allocating geometry or building draw specs.

use geoslab_core::AllocError;
use thiserror::Error;

/// Errors that can occur in the geometry and instancing allocators.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A free-list operation failed (out of memory, zero size, double free).
    #[error(transparent)]
    Alloc(#[from] AllocError),

    /// An element type, bounding kind or capacity is not supported.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// No attribute store with this name exists.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// An argument is out of range for this allocator.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation does not apply to the allocator's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A base geometry does not match the declared vertex attributes.
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// The world transform has no inverse.
    #[error("world transform is not invertible")]
    SingularTransform,

    /// A TOML configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for rendering allocator operations.
pub type RenderResult<T> = Result<T, RenderError>;
