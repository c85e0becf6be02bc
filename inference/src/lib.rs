//! LOAM Type & Multiplicity Inference
//!
//! Matching and unification over generic-type and multiplicity terms: given
//! a signature's declared parameter types and multiplicities and a call
//! site's actual argument types and multiplicities, compute a consistent
//! binding of the signature's free parameters, or fail with a located
//! compilation error.

mod matching;
mod multiplicity;
mod unify;

pub use matching::*;
pub use multiplicity::*;
pub use unify::*;
