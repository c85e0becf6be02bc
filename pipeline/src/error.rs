//! Pipeline error types.

use loam_core::{CompilationError, ParseError};
use loam_graph::GraphStructureError;
use loam_transaction::TransactionError;
use thiserror::Error;

/// Failure of a pipeline phase. Parse and compilation errors are
/// user-actionable and located; structure and transaction errors indicate
/// the pipeline itself is in an inconsistent state and abort the whole
/// compile batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Structure(#[from] GraphStructureError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Result type for pipeline phases.
pub type PipelineResult<T> = Result<T, PipelineError>;
