//! Error types for graph operations.

use loam_core::{NodeId, SourceSpan};
use thiserror::Error;

/// Errors raised by structural graph operations.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// Node not found.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A package already holds a child with this simple name.
    #[error("'{child}' already exists in the package '{package}'")]
    DuplicateChildName { package: String, child: String },

    /// Package segment names must be non-empty identifiers.
    #[error("Invalid package name: '{0}'")]
    InvalidPackageName(String),

    /// 'Root' is never a valid user-defined package segment.
    #[error("'{0}' is a reserved element name")]
    ReservedName(String),

    /// Pre-seeded top-level elements cannot be created or removed.
    #[error("Top level element '{0}' cannot be modified")]
    TopLevelImmutable(String),

    /// A property slot position that does not exist.
    #[error("No value at position {index} of '{property}' on '{node}'")]
    SlotNotFound {
        node: String,
        property: String,
        index: usize,
    },
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Classifier/type-variable inconsistency. Not user-recoverable mid-compile:
/// the pipeline is in an inconsistent state and the whole batch aborts.
#[derive(Debug, Clone)]
pub struct GraphStructureError {
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl GraphStructureError {
    pub fn new(message: impl Into<String>, span: Option<SourceSpan>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for GraphStructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(span) => write!(f, "Graph structure error at {}: {}", span, self.message),
            None => write!(f, "Graph structure error: {}", self.message),
        }
    }
}

impl std::error::Error for GraphStructureError {}

/// Index invariant violated: two distinct nodes mapped to the same key.
/// A programming / internal-consistency error, never a user error.
#[derive(Debug, Clone, Error)]
#[error("ID conflict for key '{key}'")]
pub struct IdConflictError {
    pub key: String,
}

impl IdConflictError {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}
