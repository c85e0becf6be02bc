//! Multiplicity algebra: subsumption, intersection, widening, matching.

use crate::{NullMatchBehavior, ParameterMatchBehavior};
use loam_core::Multiplicity;

/// Whether every value count valid for `subsumed` is also valid for
/// `subsuming`. Both multiplicities must be concrete; a non-concrete input
/// is reported as `None`.
pub fn subsumes(subsuming: &Multiplicity, subsumed: &Multiplicity) -> Option<bool> {
    let lower1 = subsuming.lower_bound()?;
    let lower2 = subsumed.lower_bound()?;
    if lower2 < lower1 {
        return Some(false);
    }
    let upper1 = subsuming.upper_bound()?;
    let upper2 = subsumed.upper_bound()?;
    Some(match (upper1, upper2) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(u1), Some(u2)) => u2 <= u1,
    })
}

/// Whether a set of concrete multiplicities admits at least one common
/// value count.
pub fn intersect<'a>(multiplicities: impl IntoIterator<Item = &'a Multiplicity>) -> Option<bool> {
    let mut lower: u64 = 0;
    let mut upper: Option<u64> = None;
    for m in multiplicities {
        lower = lower.max(m.lower_bound()?);
        match (upper, m.upper_bound()?) {
            (None, u) => upper = u,
            (Some(current), Some(u)) => upper = Some(current.min(u)),
            (Some(_), None) => {}
        }
        if let Some(u) = upper {
            if lower > u {
                return Some(false);
            }
        }
    }
    Some(true)
}

/// The minimal multiplicity which subsumes both inputs. A non-concrete input
/// widens to `[*]`.
pub fn min_subsuming(m1: &Multiplicity, m2: &Multiplicity) -> Multiplicity {
    match (m1, m2) {
        (
            Multiplicity::Concrete {
                lower: l1,
                upper: u1,
            },
            Multiplicity::Concrete {
                lower: l2,
                upper: u2,
            },
        ) => Multiplicity::Concrete {
            lower: (*l1).min(*l2),
            upper: match (u1, u2) {
                (Some(a), Some(b)) => Some((*a).max(*b)),
                _ => None,
            },
        },
        _ => Multiplicity::zero_many(),
    }
}

/// The minimal multiplicity which subsumes all the given multiplicities.
pub fn min_subsuming_all<'a>(
    multiplicities: impl IntoIterator<Item = &'a Multiplicity>,
) -> Option<Multiplicity> {
    let mut iter = multiplicities.into_iter();
    let first = iter.next()?;
    let mut acc = if first.is_concrete() {
        first.clone()
    } else {
        Multiplicity::zero_many()
    };
    for m in iter {
        acc = min_subsuming(&acc, m);
    }
    Some(acc)
}

/// Whether an actual multiplicity fits a declared target.
///
/// Covariant matching requires the target to subsume the value; contravariant
/// matching is the reverse. Non-concrete terms and missing values follow the
/// caller's declared behaviors, both defaulting to hard failure.
pub fn multiplicity_matches(
    target: &Multiplicity,
    value: Option<&Multiplicity>,
    covariant: bool,
    value_null_behavior: NullMatchBehavior,
    target_parameter_behavior: ParameterMatchBehavior,
    value_parameter_behavior: ParameterMatchBehavior,
) -> Result<bool, String> {
    let value = match value {
        Some(v) => v,
        None => {
            return match value_null_behavior {
                NullMatchBehavior::MatchAnything => Ok(true),
                NullMatchBehavior::MatchNothing => Ok(false),
                NullMatchBehavior::Error => Err("Value multiplicity may not be null".to_string()),
            }
        }
    };

    if target == value {
        return Ok(true);
    }

    if !target.is_concrete() {
        return match target_parameter_behavior {
            ParameterMatchBehavior::MatchAnything => Ok(true),
            ParameterMatchBehavior::MatchCautiously => {
                // Only an identically-named parameter is a safe match.
                Ok(target.parameter() == value.parameter())
            }
            ParameterMatchBehavior::Error => Err(format!(
                "Target multiplicity must be concrete, got: {}",
                target
            )),
        };
    }

    if !value.is_concrete() {
        return match value_parameter_behavior {
            ParameterMatchBehavior::MatchAnything => Ok(true),
            ParameterMatchBehavior::MatchCautiously => {
                // A free value parameter can only flow into an unconstrained target.
                Ok(covariant && *target == Multiplicity::zero_many())
            }
            ParameterMatchBehavior::Error => Err(format!(
                "Value multiplicity must be concrete, got: {}",
                value
            )),
        };
    }

    let result = if covariant {
        subsumes(target, value)
    } else {
        subsumes(value, target)
    };
    Ok(result.unwrap_or(false))
}
