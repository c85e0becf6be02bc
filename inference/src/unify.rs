//! Unification of free type and multiplicity parameters.

use crate::{common_supertype, min_subsuming, multiplicity_matches, subsumes};
use crate::{NullMatchBehavior, ParameterMatchBehavior};
use loam_core::{
    CompilationError, CompilationResult, GenericType, Multiplicity, NodeId, SourceSpan,
};
use loam_graph::InstanceGraph;
use std::collections::HashMap;

/// The declared generic type of a node with a `genericType` slot.
pub fn declared_generic_type(graph: &InstanceGraph, owner: NodeId) -> Option<GenericType> {
    let gt_node = graph.to_one(owner, "genericType")?;
    graph.get_node(gt_node)?.generic_type().cloned()
}

/// The declared multiplicity of a node with a `multiplicity` slot.
pub fn declared_multiplicity(graph: &InstanceGraph, owner: NodeId) -> Option<Multiplicity> {
    let m_node = graph.to_one(owner, "multiplicity")?;
    graph.get_node(m_node)?.multiplicity().cloned()
}

/// Result of matching a call site against a function signature.
#[derive(Debug, Clone)]
pub struct SignatureMatch {
    pub return_type: GenericType,
    pub return_multiplicity: Multiplicity,
}

/// One inference context: accumulates bindings for named type and
/// multiplicity parameters and rejects conflicting observations.
pub struct Unifier<'g> {
    graph: &'g InstanceGraph,
    /// Widen conflicting type observations to their best common supertype
    /// instead of failing.
    covariant_widening: bool,
    /// Whether widening an empty occurrence set to the bottom type is
    /// permitted.
    allow_nil: bool,
    type_bindings: HashMap<String, GenericType>,
    mult_bindings: HashMap<String, Multiplicity>,
}

impl<'g> Unifier<'g> {
    pub fn new(graph: &'g InstanceGraph) -> Self {
        Self {
            graph,
            covariant_widening: false,
            allow_nil: false,
            type_bindings: HashMap::new(),
            mult_bindings: HashMap::new(),
        }
    }

    pub fn with_covariant_widening(mut self, enabled: bool) -> Self {
        self.covariant_widening = enabled;
        self
    }

    pub fn with_nil(mut self, enabled: bool) -> Self {
        self.allow_nil = enabled;
        self
    }

    pub fn type_binding(&self, name: &str) -> Option<&GenericType> {
        self.type_bindings.get(name)
    }

    pub fn multiplicity_binding(&self, name: &str) -> Option<&Multiplicity> {
        self.mult_bindings.get(name)
    }

    /// Observe a binding for a named type parameter. A second observation
    /// must agree; with covariant widening enabled, disagreeing concrete
    /// observations widen to their best common supertype instead.
    pub fn bind_type(
        &mut self,
        name: &str,
        observed: &GenericType,
        span: Option<&SourceSpan>,
    ) -> CompilationResult<()> {
        match self.type_bindings.get(name) {
            None => {
                self.type_bindings.insert(name.to_string(), observed.clone());
                Ok(())
            }
            Some(existing) if existing == observed => Ok(()),
            Some(existing) => {
                if self.covariant_widening {
                    let widened = common_supertype(
                        self.graph,
                        &[existing.clone(), observed.clone()],
                        self.allow_nil,
                    )?;
                    self.type_bindings.insert(name.to_string(), widened);
                    Ok(())
                } else {
                    Err(CompilationError::new(
                        format!(
                            "Type parameter '{}' is bound to both '{}' and '{}'",
                            name,
                            self.graph.print_generic_type(existing),
                            self.graph.print_generic_type(observed)
                        ),
                        span.cloned(),
                    ))
                }
            }
        }
    }

    /// Observe a binding for a named multiplicity parameter.
    pub fn bind_multiplicity(
        &mut self,
        name: &str,
        observed: &Multiplicity,
        span: Option<&SourceSpan>,
    ) -> CompilationResult<()> {
        match self.mult_bindings.get(name) {
            None => {
                self.mult_bindings.insert(name.to_string(), observed.clone());
                Ok(())
            }
            Some(existing) if existing == observed => Ok(()),
            Some(existing) => {
                if self.covariant_widening {
                    let widened = min_subsuming(existing, observed);
                    self.mult_bindings.insert(name.to_string(), widened);
                    Ok(())
                } else {
                    Err(CompilationError::new(
                        format!(
                            "Multiplicity parameter '{}' is bound to both '{}' and '{}'",
                            name, existing, observed
                        ),
                        span.cloned(),
                    ))
                }
            }
        }
    }

    /// Unify a declared type against an actual argument type.
    pub fn unify_type(
        &mut self,
        declared: &GenericType,
        actual: &GenericType,
        span: Option<&SourceSpan>,
    ) -> CompilationResult<()> {
        match declared {
            GenericType::Parameter(name) => self.bind_type(name, actual, span),
            GenericType::Concrete {
                type_args: declared_args,
                raw_type,
                ..
            } => {
                let conforms = crate::type_matches(
                    self.graph,
                    declared,
                    Some(actual),
                    true,
                    NullMatchBehavior::Error,
                    ParameterMatchBehavior::MatchAnything,
                    ParameterMatchBehavior::MatchAnything,
                )
                .map_err(|message| CompilationError::new(message, span.cloned()))?;
                if !conforms {
                    return Err(CompilationError::new(
                        format!(
                            "Type Error: '{}' is not compatible with '{}'",
                            self.graph.print_generic_type(actual),
                            self.graph.print_generic_type(declared)
                        ),
                        span.cloned(),
                    ));
                }
                // Recurse into arguments when the raw types line up, so
                // nested parameters (List<T>) collect bindings.
                if let GenericType::Concrete {
                    raw_type: actual_raw,
                    type_args: actual_args,
                    ..
                } = actual
                {
                    if self.graph.resolve_ref(*raw_type) == self.graph.resolve_ref(*actual_raw)
                        && declared_args.len() == actual_args.len()
                    {
                        for (d, a) in declared_args.iter().zip(actual_args) {
                            self.unify_type(d, a, span)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Unify a declared multiplicity against an actual argument multiplicity.
    /// A concrete declaration must subsume the argument's range.
    pub fn unify_multiplicity(
        &mut self,
        declared: &Multiplicity,
        actual: &Multiplicity,
        span: Option<&SourceSpan>,
    ) -> CompilationResult<()> {
        match declared {
            Multiplicity::Parameter(name) => self.bind_multiplicity(name, actual, span),
            Multiplicity::Concrete { .. } => {
                let fits = match subsumes(declared, actual) {
                    Some(fits) => fits,
                    None => multiplicity_matches(
                        declared,
                        Some(actual),
                        true,
                        NullMatchBehavior::Error,
                        ParameterMatchBehavior::Error,
                        ParameterMatchBehavior::MatchCautiously,
                    )
                    .map_err(|message| CompilationError::new(message, span.cloned()))?,
                };
                if !fits {
                    return Err(CompilationError::new(
                        format!(
                            "Multiplicity Error: '{}' is not compatible with '{}'",
                            actual, declared
                        ),
                        span.cloned(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Substitute accumulated bindings into a type.
    pub fn resolve_type(&self, gt: &GenericType) -> GenericType {
        match gt {
            GenericType::Parameter(name) => self
                .type_bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| gt.clone()),
            GenericType::Concrete {
                raw_type,
                type_args,
                mult_args,
            } => GenericType::Concrete {
                raw_type: *raw_type,
                type_args: type_args.iter().map(|a| self.resolve_type(a)).collect(),
                mult_args: mult_args
                    .iter()
                    .map(|m| self.resolve_multiplicity(m))
                    .collect(),
            },
        }
    }

    /// Substitute accumulated bindings into a multiplicity.
    pub fn resolve_multiplicity(&self, m: &Multiplicity) -> Multiplicity {
        match m {
            Multiplicity::Parameter(name) => self
                .mult_bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| m.clone()),
            concrete => concrete.clone(),
        }
    }
}

/// Match a call site against a function signature: concrete signature
/// positions are checked by subsumption/conformance, free positions are
/// unified, and the return type and multiplicity come back with the
/// discovered bindings substituted.
pub fn match_signature(
    graph: &InstanceGraph,
    function: NodeId,
    arg_types: &[GenericType],
    arg_mults: &[Multiplicity],
) -> CompilationResult<SignatureMatch> {
    let span = graph.get_node(function).and_then(|n| n.span.clone());
    let parameters: Vec<NodeId> = graph.edges(function, "parameters").to_vec();
    if parameters.len() != arg_types.len() || arg_types.len() != arg_mults.len() {
        return Err(CompilationError::new(
            format!(
                "Function '{}' expects {} parameters, got {}",
                graph.node_name(function),
                parameters.len(),
                arg_types.len()
            ),
            span,
        ));
    }

    let mut unifier = Unifier::new(graph).with_covariant_widening(true);
    for (i, &parameter) in parameters.iter().enumerate() {
        let param_span = graph
            .get_node(parameter)
            .and_then(|n| n.span.clone())
            .or_else(|| span.clone());
        let declared_type = declared_generic_type(graph, parameter).ok_or_else(|| {
            CompilationError::new(
                format!(
                    "Parameter '{}' of function '{}' has no generic type",
                    graph.node_name(parameter),
                    graph.node_name(function)
                ),
                param_span.clone(),
            )
        })?;
        let declared_mult = declared_multiplicity(graph, parameter).ok_or_else(|| {
            CompilationError::new(
                format!(
                    "Parameter '{}' of function '{}' has no multiplicity",
                    graph.node_name(parameter),
                    graph.node_name(function)
                ),
                param_span.clone(),
            )
        })?;
        unifier.unify_type(&declared_type, &arg_types[i], param_span.as_ref())?;
        unifier.unify_multiplicity(&declared_mult, &arg_mults[i], param_span.as_ref())?;
    }

    let return_type = graph
        .to_one(function, "returnType")
        .and_then(|n| graph.get_node(n))
        .and_then(|n| n.generic_type().cloned())
        .map(|gt| unifier.resolve_type(&gt))
        .unwrap_or_else(|| GenericType::simple(graph.any_class()));
    let return_multiplicity = graph
        .to_one(function, "returnMultiplicity")
        .and_then(|n| graph.get_node(n))
        .and_then(|n| n.multiplicity().cloned())
        .map(|m| unifier.resolve_multiplicity(&m))
        .unwrap_or_else(Multiplicity::zero_many);

    Ok(SignatureMatch {
        return_type,
        return_multiplicity,
    })
}
