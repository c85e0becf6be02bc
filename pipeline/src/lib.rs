//! LOAM Matcher / Processor Pipeline
//!
//! Routes each graph node to its registered handlers across four phases:
//! processors (resolve stub references, compute derived edges), validators
//! (semantic rules plus the generic deep property validator), unload walkers
//! (collect everything a deleted source must clean) and unbinders (detach
//! edges a processor created). Also defines the parser contract the
//! incremental compiler consumes.

mod error;
mod library;
mod matcher;
mod processor;
mod unbind;
mod unload;
mod validator;

pub use error::*;
pub use library::*;
pub use matcher::*;
pub use processor::*;
pub use unbind::*;
pub use unload::*;
pub use validator::*;
