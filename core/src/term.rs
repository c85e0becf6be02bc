//! Generic-type and multiplicity terms.
//!
//! Every typed node carries exactly one generic type and one multiplicity,
//! directly or inferable from context. A term is either concrete or a named
//! parameter to be solved by unification.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An arity range `[lower..upper]` constraining how many values a property or
/// parameter may hold, or a named multiplicity parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    /// A concrete range. `upper` of `None` means unbounded (`*`).
    Concrete { lower: u64, upper: Option<u64> },
    /// A named multiplicity parameter, e.g. the `m` in `[m]`.
    Parameter(String),
}

impl Multiplicity {
    /// The `[1]` multiplicity.
    pub fn one() -> Self {
        Multiplicity::Concrete {
            lower: 1,
            upper: Some(1),
        }
    }

    /// The `[0..1]` multiplicity.
    pub fn zero_one() -> Self {
        Multiplicity::Concrete {
            lower: 0,
            upper: Some(1),
        }
    }

    /// The `[*]` multiplicity.
    pub fn zero_many() -> Self {
        Multiplicity::Concrete {
            lower: 0,
            upper: None,
        }
    }

    /// A concrete `[lower..upper]` multiplicity.
    pub fn range(lower: u64, upper: Option<u64>) -> Self {
        Multiplicity::Concrete { lower, upper }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, Multiplicity::Concrete { .. })
    }

    pub fn parameter(&self) -> Option<&str> {
        match self {
            Multiplicity::Parameter(name) => Some(name),
            Multiplicity::Concrete { .. } => None,
        }
    }

    /// Lower bound of a concrete multiplicity.
    pub fn lower_bound(&self) -> Option<u64> {
        match self {
            Multiplicity::Concrete { lower, .. } => Some(*lower),
            Multiplicity::Parameter(_) => None,
        }
    }

    /// Upper bound of a concrete multiplicity; `Some(None)` is unbounded.
    pub fn upper_bound(&self) -> Option<Option<u64>> {
        match self {
            Multiplicity::Concrete { upper, .. } => Some(*upper),
            Multiplicity::Parameter(_) => None,
        }
    }

    /// Whether a concrete multiplicity admits exactly one value.
    pub fn is_to_one(&self) -> bool {
        matches!(
            self,
            Multiplicity::Concrete {
                lower: 1,
                upper: Some(1)
            }
        )
    }

    /// Whether the range is internally consistent (lower <= upper).
    pub fn is_well_formed(&self) -> bool {
        match self {
            Multiplicity::Concrete {
                lower,
                upper: Some(upper),
            } => lower <= upper,
            _ => true,
        }
    }

    /// Whether `count` values satisfy this multiplicity. A parameterised
    /// multiplicity constrains nothing until it is bound.
    pub fn is_valid_count(&self, count: u64) -> bool {
        match self {
            Multiplicity::Concrete { lower, upper } => {
                count >= *lower && upper.map_or(true, |u| count <= u)
            }
            Multiplicity::Parameter(_) => true,
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Multiplicity::Parameter(name) => write!(f, "[{}]", name),
            Multiplicity::Concrete { lower, upper } => match upper {
                Some(u) if lower == u => write!(f, "[{}]", lower),
                Some(u) => write!(f, "[{}..{}]", lower, u),
                None if *lower == 0 => write!(f, "[*]"),
                None => write!(f, "[{}..*]", lower),
            },
        }
    }
}

/// A (possibly parameterized) reference to a type, e.g. `List<String>`.
///
/// `raw_type` points at the class, enumeration or primitive node in the
/// instance graph; printing therefore lives with the graph, which can resolve
/// names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenericType {
    Concrete {
        raw_type: NodeId,
        type_args: Vec<GenericType>,
        mult_args: Vec<Multiplicity>,
    },
    /// A named type parameter, e.g. the `T` in `T[*]`.
    Parameter(String),
}

impl GenericType {
    /// A concrete generic type with no arguments.
    pub fn simple(raw_type: NodeId) -> Self {
        GenericType::Concrete {
            raw_type,
            type_args: Vec::new(),
            mult_args: Vec::new(),
        }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, GenericType::Concrete { .. })
    }

    pub fn parameter(&self) -> Option<&str> {
        match self {
            GenericType::Parameter(name) => Some(name),
            GenericType::Concrete { .. } => None,
        }
    }

    pub fn raw_type(&self) -> Option<NodeId> {
        match self {
            GenericType::Concrete { raw_type, .. } => Some(*raw_type),
            GenericType::Parameter(_) => None,
        }
    }

    /// Whether this type or any of its arguments mentions a type parameter.
    pub fn has_parameters(&self) -> bool {
        match self {
            GenericType::Parameter(_) => true,
            GenericType::Concrete {
                type_args,
                mult_args,
                ..
            } => {
                type_args.iter().any(GenericType::has_parameters)
                    || mult_args.iter().any(|m| !m.is_concrete())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplicity_display() {
        assert_eq!(Multiplicity::one().to_string(), "[1]");
        assert_eq!(Multiplicity::zero_one().to_string(), "[0..1]");
        assert_eq!(Multiplicity::zero_many().to_string(), "[*]");
        assert_eq!(Multiplicity::range(1, None).to_string(), "[1..*]");
        assert_eq!(Multiplicity::range(2, Some(5)).to_string(), "[2..5]");
        assert_eq!(Multiplicity::range(3, Some(3)).to_string(), "[3]");
        assert_eq!(Multiplicity::Parameter("m".into()).to_string(), "[m]");
    }

    #[test]
    fn test_valid_count() {
        assert!(Multiplicity::one().is_valid_count(1));
        assert!(!Multiplicity::one().is_valid_count(0));
        assert!(!Multiplicity::one().is_valid_count(2));
        assert!(Multiplicity::zero_many().is_valid_count(0));
        assert!(Multiplicity::zero_many().is_valid_count(100));
        assert!(Multiplicity::range(2, Some(4)).is_valid_count(3));
        assert!(!Multiplicity::range(2, Some(4)).is_valid_count(5));
    }

    #[test]
    fn test_well_formed() {
        assert!(Multiplicity::range(1, Some(5)).is_well_formed());
        assert!(!Multiplicity::range(5, Some(1)).is_well_formed());
        assert!(Multiplicity::range(5, None).is_well_formed());
    }

    #[test]
    fn test_generic_type_parameters() {
        let t = GenericType::Parameter("T".into());
        assert!(t.has_parameters());
        assert!(!t.is_concrete());

        let list = GenericType::Concrete {
            raw_type: NodeId::new(1),
            type_args: vec![GenericType::Parameter("T".into())],
            mult_args: vec![],
        };
        assert!(list.is_concrete());
        assert!(list.has_parameters());

        let plain = GenericType::simple(NodeId::new(2));
        assert!(!plain.has_parameters());
    }
}
