//! Validate phase: per-kind semantic rules plus the generic deep property
//! validator.

use crate::{Matcher, PipelineError, PipelineResult};
use loam_core::{CompilationError, GenericType, NodeId, NodeKind, SourceSpan};
use loam_graph::InstanceGraph;
use loam_inference::{
    declared_generic_type, declared_multiplicity, subsumes, type_matches, NullMatchBehavior,
    ParameterMatchBehavior,
};
use loam_transaction::Transaction;
use std::collections::{BTreeMap, HashSet};

/// Validation depth. Deep validation walks every reachable value through the
/// generic property validator; shallow validation performs structural checks
/// only and is the default for performance-sensitive partial recompiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Shallow,
    Deep,
}

/// A validate-phase handler for one node kind. Validators read the graph;
/// the runner owns the validated flag.
pub trait Validator {
    fn kind(&self) -> NodeKind;

    fn validate(&self, graph: &InstanceGraph, node: NodeId) -> PipelineResult<()>;
}

/// The explicit visited set threaded through recursive validation: each
/// reachable node is validated at most once, cycles included.
struct ValidatorState {
    mode: ValidationMode,
    visited: HashSet<NodeId>,
}

/// Run the validate phase over a set of nodes. Any failure aborts the whole
/// phase; nothing partial commits.
pub fn run_validators(
    txn: &mut Transaction<'_, '_>,
    matcher: &Matcher,
    nodes: &[NodeId],
    mode: ValidationMode,
) -> PipelineResult<()> {
    let mut state = ValidatorState {
        mode,
        visited: HashSet::new(),
    };
    let mut ordered = nodes.to_vec();
    ordered.sort_unstable();
    for node in ordered {
        validate_node(txn, matcher, &mut state, node, None)?;
    }
    Ok(())
}

/// The best deterministic span for reporting a failure on `node`: its own
/// span, or the closest ancestor's, or the supplied fallback.
pub fn best_span(
    graph: &InstanceGraph,
    node: NodeId,
    fallback: Option<&SourceSpan>,
) -> Option<SourceSpan> {
    if let Some(span) = graph.get_node(node).and_then(|n| n.span.clone()) {
        return Some(span);
    }
    let mut current = node;
    while let Some(parent) = graph.parent_of(current) {
        if let Some(span) = graph.get_node(parent).and_then(|n| n.span.clone()) {
            return Some(span);
        }
        current = parent;
    }
    fallback.cloned()
}

fn validate_node(
    txn: &mut Transaction<'_, '_>,
    matcher: &Matcher,
    state: &mut ValidatorState,
    node: NodeId,
    fallback_span: Option<&SourceSpan>,
) -> PipelineResult<()> {
    if state.visited.contains(&node) || txn.graph().is_validated(node) {
        return Ok(());
    }
    state.visited.insert(node);

    let kind = match txn.graph().get_node(node) {
        Some(n) => n.kind,
        None => return Ok(()),
    };

    for validator in matcher.validators_for(kind) {
        validator.validate(txn.graph(), node)?;
    }

    // Deep mode adds the generic property-by-property check, which also
    // covers kinds with no registered validator.
    if state.mode == ValidationMode::Deep {
        test_properties(txn, matcher, state, node, fallback_span)?;
    }

    txn.mark_validated(node)?;
    Ok(())
}

/// Generic property-by-property validation against the classifier's declared
/// slots: every slot must name a declared property instance, resolved values
/// must fit the declared multiplicity range, each value's classifier must
/// conform to the declared type, and each value recurses exactly once.
fn test_properties(
    txn: &mut Transaction<'_, '_>,
    matcher: &Matcher,
    state: &mut ValidatorState,
    node: NodeId,
    fallback_span: Option<&SourceSpan>,
) -> PipelineResult<()> {
    // Stubs and literals are bookkeeping; their slots are structural.
    let kind = match txn.graph().get_node(node) {
        Some(n) => n.kind,
        None => return Ok(()),
    };
    if matches!(kind, NodeKind::ImportStub | NodeKind::Literal) {
        return Ok(());
    }

    let span = best_span(txn.graph(), node, fallback_span);
    let properties: BTreeMap<String, Vec<NodeId>> = txn
        .graph()
        .checked_properties(node)?
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let classifier = match txn.graph().get_node(node).and_then(|n| n.classifier) {
        Some(c) => c,
        None => {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!("'{}' has no classifier", txn.graph().node_name(node)),
                span,
            )))
        }
    };

    for (key, values) in properties {
        let declared = txn
            .graph()
            .declared_property(classifier, &key)
            .ok_or_else(|| {
                PipelineError::Compilation(CompilationError::new(
                    format!(
                        "Unknown property '{}' on '{}'",
                        key,
                        txn.graph().node_name(classifier)
                    ),
                    span.clone(),
                ))
            })?;
        if txn.graph().get_node(declared).map(|n| n.kind) != Some(NodeKind::Property) {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!(
                    "'{}' on '{}' is not a property instance",
                    key,
                    txn.graph().node_name(classifier)
                ),
                span.clone(),
            )));
        }

        if let Some(mult) = declared_multiplicity(txn.graph(), declared) {
            if !mult.is_valid_count(values.len() as u64) {
                return Err(PipelineError::Compilation(CompilationError::new(
                    format!(
                        "Multiplicity Error: property '{}' on '{}' has {} values for multiplicity {}",
                        key,
                        txn.graph().node_name(node),
                        values.len(),
                        mult
                    ),
                    span.clone(),
                )));
            }
        }

        let declared_type = declared_generic_type(txn.graph(), declared);
        for value in values {
            let resolved = txn.graph().resolve_ref(value);
            if let Some(declared_type) = &declared_type {
                check_value_type(txn.graph(), resolved, declared_type, &key, span.as_ref())?;
            }
            validate_node(txn, matcher, state, resolved, span.as_ref())?;
        }
    }
    Ok(())
}

fn check_value_type(
    graph: &InstanceGraph,
    value: NodeId,
    declared: &GenericType,
    key: &str,
    span: Option<&SourceSpan>,
) -> PipelineResult<()> {
    let value_classifier = match graph.get_node(value).and_then(|n| n.classifier) {
        Some(c) => c,
        None => return Ok(()),
    };
    let value_type = GenericType::simple(value_classifier);
    let conforms = type_matches(
        graph,
        declared,
        Some(&value_type),
        true,
        NullMatchBehavior::MatchAnything,
        ParameterMatchBehavior::MatchAnything,
        ParameterMatchBehavior::MatchAnything,
    )
    .map_err(|message| PipelineError::Compilation(CompilationError::new(message, span.cloned())))?;
    if !conforms {
        return Err(PipelineError::Compilation(CompilationError::new(
            format!(
                "Type Error: property '{}' value '{}' is a '{}', expected '{}'",
                key,
                graph.node_name(value),
                graph.print_generic_type(&value_type),
                graph.print_generic_type(declared)
            ),
            best_span(graph, value, span),
        )));
    }
    Ok(())
}

// ==================== Concrete Validators ====================

fn duplicate_name<'a>(
    graph: &'a InstanceGraph,
    ids: impl IntoIterator<Item = NodeId>,
) -> Option<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        let name = graph.node_name(graph.resolve_ref(id));
        if !seen.insert(name) {
            return Some(name);
        }
    }
    None
}

/// Class rules: no duplicate property or type-parameter names; applied
/// stereotypes must resolve to stereotype instances.
pub struct ClassValidator;

impl Validator for ClassValidator {
    fn kind(&self) -> NodeKind {
        NodeKind::Class
    }

    fn validate(&self, graph: &InstanceGraph, node: NodeId) -> PipelineResult<()> {
        let span = best_span(graph, node, None);
        let all_properties = graph
            .edges(node, "properties")
            .iter()
            .chain(graph.edges(node, "propertiesFromAssociations"))
            .copied()
            .collect::<Vec<_>>();
        if let Some(name) = duplicate_name(graph, all_properties) {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!(
                    "Duplicated property '{}' in class '{}'",
                    name,
                    graph.user_path(node)
                ),
                span,
            )));
        }
        if let Some(name) = duplicate_name(graph, graph.edges(node, "typeParameters").to_vec()) {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!(
                    "Duplicated type parameter '{}' in class '{}'",
                    name,
                    graph.user_path(node)
                ),
                span.clone(),
            )));
        }
        for &general in graph.edges(node, "generalizations") {
            let resolved = graph.resolve_ref(general);
            if resolved == general
                && graph.get_node(general).map(|n| n.kind) == Some(NodeKind::ImportStub)
            {
                continue;
            }
            if graph.get_node(resolved).map(|n| n.kind) != Some(NodeKind::Class) {
                return Err(PipelineError::Compilation(CompilationError::new(
                    format!(
                        "'{}' is not a class and cannot be extended",
                        graph.node_name(resolved)
                    ),
                    best_span(graph, general, span.as_ref()),
                )));
            }
        }
        validate_stereotypes(graph, node, span)
    }
}

fn validate_stereotypes(
    graph: &InstanceGraph,
    node: NodeId,
    span: Option<SourceSpan>,
) -> PipelineResult<()> {
    for &applied in graph.edges(node, "stereotypes") {
        let resolved = graph.resolve_ref(applied);
        if resolved == applied && graph.get_node(applied).map(|n| n.kind) == Some(NodeKind::ImportStub)
        {
            // Unresolved stubs were already reported by the process phase.
            continue;
        }
        if graph.get_node(resolved).map(|n| n.kind) != Some(NodeKind::Stereotype) {
            let stub_span = best_span(graph, applied, span.as_ref());
            return Err(PipelineError::Compilation(CompilationError::new(
                format!("'{}' is not a stereotype", graph.node_name(resolved)),
                stub_span,
            )));
        }
    }
    Ok(())
}

/// Enumeration rules: no duplicate values.
pub struct EnumerationValidator;

impl Validator for EnumerationValidator {
    fn kind(&self) -> NodeKind {
        NodeKind::Enumeration
    }

    fn validate(&self, graph: &InstanceGraph, node: NodeId) -> PipelineResult<()> {
        if let Some(name) = duplicate_name(graph, graph.edges(node, "values").to_vec()) {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!(
                    "Duplicated enum value '{}' in enumeration '{}'",
                    name,
                    graph.user_path(node)
                ),
                best_span(graph, node, None),
            )));
        }
        Ok(())
    }
}

/// Association rules: exactly two ends with distinct names.
pub struct AssociationValidator;

impl Validator for AssociationValidator {
    fn kind(&self) -> NodeKind {
        NodeKind::Association
    }

    fn validate(&self, graph: &InstanceGraph, node: NodeId) -> PipelineResult<()> {
        let span = best_span(graph, node, None);
        let ends = graph.edges(node, "properties");
        if ends.len() != 2 {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!(
                    "Association '{}' must have exactly 2 properties, found {}",
                    graph.user_path(node),
                    ends.len()
                ),
                span,
            )));
        }
        if graph.node_name(ends[0]) == graph.node_name(ends[1]) {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!(
                    "Duplicated property '{}' in association '{}'",
                    graph.node_name(ends[0]),
                    graph.user_path(node)
                ),
                span,
            )));
        }
        // An end must not shadow a property the target class already owns.
        let ends = [ends[0], ends[1]];
        for i in 0..2 {
            let end = ends[i];
            let target = match crate::end_target_class(graph, ends[1 - i]) {
                Some(t) => t,
                None => continue,
            };
            let end_name = graph.node_name(end);
            let clash = graph
                .edges(target, "properties")
                .iter()
                .chain(graph.edges(target, "propertiesFromAssociations"))
                .map(|&p| graph.resolve_ref(p))
                .any(|p| p != end && graph.node_name(p) == end_name);
            if clash {
                return Err(PipelineError::Compilation(CompilationError::new(
                    format!(
                        "Duplicated property '{}' in class '{}'",
                        end_name,
                        graph.user_path(target)
                    ),
                    best_span(graph, end, None),
                )));
            }
        }
        Ok(())
    }
}

/// Property rules: well-formed multiplicity and a type-conforming default
/// value.
pub struct PropertyValidator;

impl Validator for PropertyValidator {
    fn kind(&self) -> NodeKind {
        NodeKind::Property
    }

    fn validate(&self, graph: &InstanceGraph, node: NodeId) -> PipelineResult<()> {
        let span = best_span(graph, node, None);
        if let Some(mult) = declared_multiplicity(graph, node) {
            if !mult.is_well_formed() {
                return Err(PipelineError::Compilation(CompilationError::new(
                    format!(
                        "Multiplicity Error: invalid multiplicity {} (lower bound greater than upper bound)",
                        mult
                    ),
                    span,
                )));
            }
        }
        if let Some(default) = graph.to_one(node, "defaultValue") {
            if let Some(declared) = declared_generic_type(graph, node) {
                check_value_type(
                    graph,
                    graph.resolve_ref(default),
                    &declared,
                    "defaultValue",
                    span.as_ref(),
                )?;
            }
            if let Some(mult) = declared_multiplicity(graph, node) {
                if !mult.is_valid_count(1) {
                    return Err(PipelineError::Compilation(CompilationError::new(
                        format!(
                            "Multiplicity Error: default value of '{}' provides 1 value for multiplicity {}",
                            graph.node_name(node),
                            mult
                        ),
                        span,
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Function rules: distinct parameter names; a body expression must conform
/// to the declared return type and multiplicity.
pub struct FunctionValidator;

impl Validator for FunctionValidator {
    fn kind(&self) -> NodeKind {
        NodeKind::Function
    }

    fn validate(&self, graph: &InstanceGraph, node: NodeId) -> PipelineResult<()> {
        let span = best_span(graph, node, None);
        if let Some(name) = duplicate_name(graph, graph.edges(node, "parameters").to_vec()) {
            return Err(PipelineError::Compilation(CompilationError::new(
                format!(
                    "Duplicated parameter '{}' in function '{}'",
                    name,
                    graph.user_path(node)
                ),
                span,
            )));
        }
        validate_stereotypes(graph, node, span.clone())?;

        let return_type = graph
            .to_one(node, "returnType")
            .and_then(|n| graph.get_node(n))
            .and_then(|n| n.generic_type().cloned());
        let return_mult = graph
            .to_one(node, "returnMultiplicity")
            .and_then(|n| graph.get_node(n))
            .and_then(|n| n.multiplicity().cloned());

        for &expression in graph.edges(node, "expressions") {
            let resolved = graph.resolve_ref(expression);
            if resolved == expression
                && graph.get_node(expression).map(|n| n.kind) == Some(NodeKind::ImportStub)
            {
                continue;
            }
            if let Some(return_type) = &return_type {
                if return_type.is_concrete() {
                    check_value_type(graph, resolved, return_type, "return", span.as_ref())?;
                }
            }
            if let Some(return_mult) = &return_mult {
                if subsumes(return_mult, &loam_core::Multiplicity::one()) == Some(false) {
                    return Err(PipelineError::Compilation(CompilationError::new(
                        format!(
                            "Multiplicity Error: '[1]' is not compatible with '{}'",
                            return_mult
                        ),
                        best_span(graph, expression, span.as_ref()),
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Profile rules: distinct stereotype and tag names.
pub struct ProfileValidator;

impl Validator for ProfileValidator {
    fn kind(&self) -> NodeKind {
        NodeKind::Profile
    }

    fn validate(&self, graph: &InstanceGraph, node: NodeId) -> PipelineResult<()> {
        let span = best_span(graph, node, None);
        for slot in ["stereotypes", "tags"] {
            if let Some(name) = duplicate_name(graph, graph.edges(node, slot).to_vec()) {
                return Err(PipelineError::Compilation(CompilationError::new(
                    format!(
                        "Duplicated element '{}' in profile '{}'",
                        name,
                        graph.user_path(node)
                    ),
                    span,
                )));
            }
        }
        Ok(())
    }
}
