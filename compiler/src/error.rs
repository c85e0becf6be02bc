//! Compiler error types.

use loam_core::{CompilationError, ParseError};
use loam_graph::{GraphError, GraphStructureError, IdConflictError};
use loam_pipeline::PipelineError;
use loam_transaction::TransactionError;
use thiserror::Error;

/// The full error taxonomy surfaced by the incremental compiler. Parse and
/// compilation errors carry file, line and column and surface verbatim after
/// the transaction rolls back; graph-structure, id-conflict and transaction
/// errors abort the whole compile batch and are never retried.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    GraphStructure(#[from] GraphStructureError),

    #[error(transparent)]
    IdConflict(#[from] IdConflictError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl From<PipelineError> for CompilerError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Parse(e) => CompilerError::Parse(e),
            PipelineError::Compilation(e) => CompilerError::Compilation(e),
            PipelineError::Structure(e) => CompilerError::GraphStructure(e),
            PipelineError::Transaction(e) => CompilerError::Transaction(e),
        }
    }
}

/// Result type for compiler operations.
pub type CompilerResult<T> = Result<T, CompilerError>;
