//! Transaction error types.

use crate::TransactionState;
use loam_graph::GraphError;
use thiserror::Error;

/// State-machine misuse or graph failure inside a transaction. State errors
/// are always programming errors, never expected in normal operation.
#[derive(Debug, Clone, Error)]
pub enum TransactionError {
    /// Commit was requested on a read-only transaction.
    #[error("Transaction is not committable")]
    NotCommittable,

    /// The transaction was not in the state the operation requires.
    #[error("Expected transaction state {expected}, found {actual}")]
    InvalidState {
        expected: TransactionState,
        actual: TransactionState,
    },

    /// A commit or rollback failed midway; the transaction must never be
    /// retried.
    #[error("Transaction is invalid and must not be retried")]
    Invalid,

    /// A second transaction was bound as current without releasing the first.
    #[error("A transaction is already bound as current")]
    AlreadyBound,

    /// An underlying graph operation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;
