//! Core types shared across stackgraph
//!
//! This module holds the error system used by every other module:
//! - [`StackError`] - Enumerated error types covering every stackgraph failure mode
//! - [`ErrorContext`] - User-friendly wrapper with details and suggestions
//! - [`user_friendly_error`] - Convert any `anyhow::Error` for CLI display
//!
//! # Error Propagation
//!
//! Library operations return `Result<T, StackError>` so callers can match on the failure.
//! Application code (CLI, configuration loading) converts into `anyhow::Error` with `?`
//! and adds context; the binary turns the final error back into an [`ErrorContext`].
//!
//! ```rust
//! use stackgraph::core::{ErrorContext, StackError};
//!
//! let ctx = ErrorContext::new(StackError::ResourceNotFound {
//!     logical_id: "Bucket".to_string(),
//! })
//! .with_suggestion("Check the logical id spelling");
//! assert!(ctx.to_string().contains("Bucket"));
//! ```

pub mod error;

pub use error::{DocumentLocation, ErrorContext, StackError, user_friendly_error};

/// Result alias for library operations.
pub type Result<T, E = StackError> = std::result::Result<T, E>;
