//! Generic-type matching and covariant widening.

use loam_core::{CompilationError, CompilationResult, GenericType, NodeId};
use loam_graph::InstanceGraph;
use std::collections::HashSet;

/// How a missing (null) term behaves during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullMatchBehavior {
    /// Accept regardless.
    MatchAnything,
    /// Never match.
    MatchNothing,
    /// A missing term is a hard failure.
    Error,
}

/// How a non-concrete (parameter) term behaves during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterMatchBehavior {
    /// Accept regardless.
    MatchAnything,
    /// Reject ambiguous covariant matches; only clearly-safe ones pass.
    MatchCautiously,
    /// A non-concrete term is a hard failure.
    Error,
}

/// Whether an actual argument type fits a declared target type.
///
/// Covariant matching accepts subtypes of the target; contravariant matching
/// accepts supertypes. Type arguments of a shared raw type are matched
/// covariantly position by position.
pub fn type_matches(
    graph: &InstanceGraph,
    target: &GenericType,
    value: Option<&GenericType>,
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
                NullMatchBehavior::Error => Err("Value generic type may not be null".to_string()),
            }
        }
    };

    if target == value {
        return Ok(true);
    }

    match (target, value) {
        (GenericType::Parameter(target_name), _) => match target_parameter_behavior {
            ParameterMatchBehavior::MatchAnything => Ok(true),
            ParameterMatchBehavior::MatchCautiously => {
                Ok(value.parameter() == Some(target_name.as_str()))
            }
            ParameterMatchBehavior::Error => Err(format!(
                "Target generic type must be concrete, got: {}",
                graph.print_generic_type(target)
            )),
        },
        (GenericType::Concrete { .. }, GenericType::Parameter(_)) => {
            match value_parameter_behavior {
                ParameterMatchBehavior::MatchAnything => Ok(true),
                ParameterMatchBehavior::MatchCautiously => {
                    // Safe only when anything at all would fit the target.
                    Ok(covariant && target.raw_type() == Some(graph.any_class()))
                }
                ParameterMatchBehavior::Error => Err(format!(
                    "Value generic type must be concrete, got: {}",
                    graph.print_generic_type(value)
                )),
            }
        }
        (
            GenericType::Concrete {
                raw_type: target_raw,
                type_args: target_args,
                ..
            },
            GenericType::Concrete {
                raw_type: value_raw,
                type_args: value_args,
                ..
            },
        ) => {
            let (sub, sup) = if covariant {
                (*value_raw, *target_raw)
            } else {
                (*target_raw, *value_raw)
            };
            if !graph.type_conforms(sub, sup) {
                return Ok(false);
            }
            // Same raw type: arguments must match position by position.
            if graph.resolve_ref(*target_raw) == graph.resolve_ref(*value_raw)
                && target_args.len() == value_args.len()
            {
                for (t, v) in target_args.iter().zip(value_args) {
                    if !type_matches(
                        graph,
                        t,
                        Some(v),
                        covariant,
                        value_null_behavior,
                        target_parameter_behavior,
                        value_parameter_behavior,
                    )? {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        }
    }
}

/// The transitive supertype closure of a type, including itself and `Any`.
fn supertype_closure(graph: &InstanceGraph, type_id: NodeId) -> HashSet<NodeId> {
    let mut closure = HashSet::new();
    let mut pending = vec![graph.resolve_ref(type_id)];
    while let Some(next) = pending.pop() {
        if closure.insert(next) {
            pending.extend(graph.supertypes(next));
        }
    }
    closure.insert(graph.any_class());
    closure
}

/// The best common supertype of a set of occurrences: the most specific type
/// every occurrence conforms to. `allow_nil` controls whether an empty
/// occurrence set may widen to the bottom type instead of failing.
pub fn common_supertype(
    graph: &InstanceGraph,
    occurrences: &[GenericType],
    allow_nil: bool,
) -> CompilationResult<GenericType> {
    // Nil occurrences conform to everything and never constrain the result.
    let concrete: Vec<&GenericType> = occurrences
        .iter()
        .filter(|gt| gt.raw_type().map(|r| graph.resolve_ref(r)) != Some(graph.nil_class()))
        .collect();

    if concrete.is_empty() {
        if allow_nil {
            return Ok(GenericType::simple(graph.nil_class()));
        }
        return Err(CompilationError::unlocated(
            "The system cannot infer a type from an empty set of occurrences",
        ));
    }

    // Parameter occurrences agree or fail; they never widen.
    if let Some(first) = concrete.iter().find_map(|gt| gt.parameter()) {
        if concrete.iter().all(|gt| gt.parameter() == Some(first)) {
            return Ok(GenericType::Parameter(first.to_string()));
        }
        let other = concrete
            .iter()
            .find_map(|gt| gt.parameter().filter(|&p| p != first))
            .unwrap_or("<concrete>");
        return Err(CompilationError::unlocated(format!(
            "Cannot compute a common supertype between '{}' and '{}'",
            first, other
        )));
    }

    // All occurrences share a raw type: keep it, widening arguments.
    let first_raw = concrete[0].raw_type().map(|r| graph.resolve_ref(r));
    if let Some(raw) = first_raw {
        if concrete
            .iter()
            .all(|gt| gt.raw_type().map(|r| graph.resolve_ref(r)) == Some(raw))
        {
            return Ok(GenericType::simple(raw));
        }
    }

    // Otherwise intersect supertype closures and pick the most specific.
    let mut iter = concrete.iter();
    let mut intersection = match iter.next().and_then(|gt| gt.raw_type()) {
        Some(raw) => supertype_closure(graph, raw),
        None => HashSet::new(),
    };
    for gt in iter {
        if let Some(raw) = gt.raw_type() {
            let closure = supertype_closure(graph, raw);
            intersection.retain(|t| closure.contains(t));
        }
    }

    let best = intersection
        .iter()
        .copied()
        .find(|&candidate| {
            intersection
                .iter()
                .all(|&other| graph.type_conforms(candidate, other))
        })
        .unwrap_or_else(|| graph.any_class());

    Ok(GenericType::simple(best))
}
