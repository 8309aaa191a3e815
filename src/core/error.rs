//! Error handling for stackgraph
//!
//! This module provides the error type shared by every stackgraph operation and the
//! user-facing presentation layer used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can match on the failure mode
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`StackError`] - Enumerated error types for all failure cases
//! - [`ErrorContext`] - Wrapper that adds user-friendly details and suggestions
//!
//! # Error Categories
//!
//! - **Document-level** (abort immediately): [`StackError::Parse`],
//!   [`StackError::UnsupportedIntrinsic`], [`StackError::InvalidIntrinsic`]
//! - **Batch** (every problem in one pass): [`StackError::UnresolvedReferences`],
//!   [`StackError::UnknownProperties`]
//! - **Ordering**: [`StackError::CircularDependency`], [`StackError::SelfReference`],
//!   [`StackError::InvalidOrder`]
//!
//! Ambiguous heuristic matches are not errors; see
//! [`AmbiguousRecovery`](crate::graph::AmbiguousRecovery).
//!
//! # Examples
//!
//! ```rust,no_run
//! use stackgraph::core::{StackError, user_friendly_error};
//!
//! fn order_stack() -> anyhow::Result<()> {
//!     Err(StackError::CircularDependency {
//!         cycles: vec![vec!["A".to_string(), "B".to_string()]],
//!     }
//!     .into())
//! }
//!
//! if let Err(e) = order_stack() {
//!     let ctx = user_friendly_error(e);
//!     ctx.display(); // Shows colored error with suggestions
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::catalog::UnknownProperty;
use crate::graph::UnresolvedReference;
use crate::refs::IntrinsicKind;

/// Location inside a template document.
///
/// `path` is the structural path (`Resources.Bucket.Properties`); `line` and `column`
/// are only known for syntax errors reported by the underlying decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLocation {
    /// Structural path from the document root, empty for the root itself
    pub path: String,
    /// 1-based line number, when the decoder reported one
    pub line: Option<usize>,
    /// 1-based column number, when the decoder reported one
    pub column: Option<usize>,
}

impl DocumentLocation {
    /// Location identified by structural path only.
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            column: None,
        }
    }

    /// Location identified by line and column only.
    pub fn at_line(line: usize, column: usize) -> Self {
        Self {
            path: String::new(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        };
        match (self.line, self.column) {
            (Some(line), Some(column)) if self.path.is_empty() => {
                write!(f, "line {line}, column {column}")
            }
            (Some(line), Some(column)) => write!(f, "{path} (line {line}, column {column})"),
            (Some(line), None) => write!(f, "{path} (line {line})"),
            _ => write!(f, "{path}"),
        }
    }
}

/// The main error type for stackgraph operations
///
/// Document-level variants abort the operation that raised them because no partial
/// result can be trusted. Batch variants carry every problem found in one pass.
#[derive(Error, Debug)]
pub enum StackError {
    /// Malformed template document
    ///
    /// Raised for syntax errors, unknown top-level sections, resources without a type,
    /// duplicate logical ids and values of the wrong shape.
    #[error("Failed to parse template at {location}: {message}")]
    Parse {
        /// Where in the document the problem was found
        location: DocumentLocation,
        /// What is wrong
        message: String,
    },

    /// Intrinsic function tag outside the supported operation set
    #[error("Unsupported intrinsic function '{tag}' in {context}")]
    UnsupportedIntrinsic {
        /// The offending tag as written (`Fn::Foo`, `!Foo`)
        tag: String,
        /// Where the tag was found (resource id and property path)
        context: String,
    },

    /// Intrinsic node built with the wrong argument arity or shape
    #[error("Invalid arguments for {kind}: {reason}")]
    InvalidIntrinsic {
        /// The intrinsic being constructed
        kind: IntrinsicKind,
        /// Why the arguments were rejected
        reason: String,
    },

    /// References to logical ids that are not in scope
    ///
    /// Aggregated across the whole resource set so a single validation pass reports
    /// every broken reference.
    #[error(
        "{} unresolved reference(s):\n{}",
        .references.len(),
        format_lines(.references)
    )]
    UnresolvedReferences {
        /// Every unresolved reference, sorted by source, path and target
        references: Vec<UnresolvedReference>,
    },

    /// A resource that references itself directly
    #[error("Resource '{logical_id}' references itself at {path}")]
    SelfReference {
        /// The resource
        logical_id: String,
        /// The property path holding the self reference
        path: String,
    },

    /// Creation or deletion order requested for a cyclic resource set
    ///
    /// Names every member of every non-trivial strongly connected component.
    #[error("Circular dependency detected: {}", format_cycles(.cycles))]
    CircularDependency {
        /// Members of each offending component, sorted
        cycles: Vec<Vec<String>>,
    },

    /// Properties that the resource type catalog does not know
    #[error(
        "{} unknown property name(s):\n{}",
        .properties.len(),
        format_lines(.properties)
    )]
    UnknownProperties {
        /// Every unknown property found
        properties: Vec<UnknownProperty>,
    },

    /// Serialization order that is not a permutation of the resource set
    #[error("Invalid serialization order: {reason}")]
    InvalidOrder {
        /// Why the order was rejected
        reason: String,
    },

    /// Lookup of a logical id that does not exist
    #[error("Resource '{logical_id}' not found")]
    ResourceNotFound {
        /// The missing logical id
        logical_id: String,
    },

    /// Registrations under different names that carry the same logical id
    #[error("Logical id '{logical_id}' is declared by more than one registration: {}", .names.join(", "))]
    DuplicateLogicalId {
        /// The shared logical id
        logical_id: String,
        /// Registration names carrying it, sorted
        names: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML encoding error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Generic error for cases not covered by specific variants
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

fn format_lines<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|item| format!("  - {item}")).collect::<Vec<_>>().join("\n")
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles.iter().map(|members| format!("[{}]", members.join(", "))).collect::<Vec<_>>().join("; ")
}

impl StackError {
    /// Shorthand for a [`StackError::Parse`] at a structural path.
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            location: DocumentLocation::at(path),
            message: message.into(),
        }
    }

    /// All logical ids named by a [`StackError::CircularDependency`], sorted.
    pub fn cycle_members(&self) -> Vec<&str> {
        match self {
            Self::CircularDependency {
                cycles,
            } => {
                let mut members: Vec<&str> =
                    cycles.iter().flat_map(|c| c.iter().map(String::as_str)).collect();
                members.sort_unstable();
                members
            }
            _ => Vec::new(),
        }
    }
}

/// Error wrapper with user-facing details and a suggestion
///
/// Suggestions are actionable steps shown in green; details explain the failure and are
/// shown in yellow.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: StackError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no details or suggestion.
    #[must_use]
    pub const fn new(error: StackError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`StackError`] and [`std::io::Error`], including when they are wrapped in
/// `anyhow` context; the outermost context message is kept in the details.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let outer = error.to_string();

    let error = match error.downcast::<StackError>() {
        Ok(stack_error) => return with_outer_context(create_error_context(stack_error), outer),
        Err(error) => error,
    };

    let error = match error.downcast::<std::io::Error>() {
        Ok(io_error) => {
            let ctx = ErrorContext::new(StackError::IoError(io_error))
                .with_suggestion("Check that the file exists and is readable");
            return with_outer_context(ctx, outer);
        }
        Err(error) => error,
    };

    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let ctx = ErrorContext::new(StackError::Other {
        message: outer,
    });
    if chain.is_empty() {
        ctx
    } else {
        ctx.with_details(chain.join(": "))
    }
}

fn with_outer_context(mut ctx: ErrorContext, outer: String) -> ErrorContext {
    if ctx.error.to_string() != outer {
        ctx.details = Some(match ctx.details.take() {
            Some(details) => format!("{outer}\n{details}"),
            None => outer,
        });
    }
    ctx
}

fn create_error_context(error: StackError) -> ErrorContext {
    match &error {
        StackError::Parse {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the template syntax and section names")
            .with_details(
                "Known sections: AWSTemplateFormatVersion, Description, Metadata, Parameters, Rules, Mappings, Conditions, Transform, Resources, Outputs",
            ),
        StackError::UnsupportedIntrinsic {
            tag,
            ..
        } => {
            let details = format!("'{tag}' is not one of the supported intrinsic functions");
            ErrorContext::new(error)
                .with_suggestion("Rewrite the value with a supported intrinsic function")
                .with_details(details)
        }
        StackError::UnresolvedReferences {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Declare the missing resources or parameters, or fix the typo"),
        StackError::CircularDependency {
            cycles,
        } => {
            let details = format!(
                "{} resource(s) depend on each other and cannot be created in order",
                cycles.iter().map(Vec::len).sum::<usize>()
            );
            ErrorContext::new(error)
                .with_suggestion(
                    "Break the cycle by removing one reference, or use `stackgraph import` for cycle-tolerant ordering",
                )
                .with_details(details)
        }
        StackError::SelfReference {
            ..
        } => ErrorContext::new(error).with_suggestion("Remove the reference to the resource itself"),
        StackError::DuplicateLogicalId {
            ..
        } => ErrorContext::new(error).with_suggestion("Rename one of the resources so every logical id is unique"),
        StackError::ConfigError {
            ..
        }
        | StackError::TomlError(_) => ErrorContext::new(error)
            .with_suggestion("Check the configuration file at ~/.stackgraph/config.toml or --config"),
        _ => ErrorContext::new(error),
    }
}
