//! LOAM Incremental Compiler
//!
//! Orchestrates compile cycles over source units: given a set of added,
//! updated or deleted sources, determine the minimal invalidation set,
//! re-run the parse, process and validate phases inside a transaction, and
//! commit or roll back as one atomic step. Repeated add/delete/reload cycles
//! are idempotent and deterministic regardless of ordering.

mod compiler;
mod context;
mod error;
mod snapshot;
mod source;

pub use compiler::*;
pub use context::*;
pub use error::*;
pub use snapshot::*;
pub use source::*;
