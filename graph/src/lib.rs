//! LOAM Instance Graph
//!
//! The mutable node store holding every compiled model element (classes,
//! properties, functions, enum values, packages) as nodes with named, ordered
//! edge-lists to other nodes. Provides identity, property access,
//! validation-marking, the pre-seeded package tree and metamodel, and the
//! auxiliary index layer.

mod error;
mod graph;
mod index;
mod node;
mod package;

pub use error::*;
pub use graph::*;
pub use index::*;
pub use node::*;
pub use package::*;
