//! Process phase: resolve stub references into real edges and compute
//! derived edges.

use crate::{PipelineError, PipelineResult};
use loam_core::{CompilationError, NodeId, NodeKind, SourceId};
use loam_graph::InstanceGraph;
use loam_transaction::Transaction;
use std::collections::HashMap;
use tracing::debug;

/// Shared state threaded through the process phase: the import group of each
/// source, consulted during reference resolution.
#[derive(Debug, Default)]
pub struct ProcessorState {
    import_groups: HashMap<SourceId, NodeId>,
}

impl ProcessorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_import_group(&mut self, source: SourceId, import_group: NodeId) {
        self.import_groups.insert(source, import_group);
    }

    pub fn import_group_for(&self, source: &SourceId) -> Option<NodeId> {
        self.import_groups.get(source).copied()
    }
}

/// A process-phase handler for one node kind.
pub trait Processor {
    fn kind(&self) -> NodeKind;

    fn process(
        &self,
        txn: &mut Transaction<'_, '_>,
        node: NodeId,
        state: &mut ProcessorState,
    ) -> PipelineResult<()>;
}

/// Run the process phase over a set of nodes. Stub resolution runs before
/// derived-edge computation so processors can navigate through resolved
/// references; within each pass the order is deterministic by node id.
pub fn run_processors(
    txn: &mut Transaction<'_, '_>,
    matcher: &crate::Matcher,
    nodes: &[NodeId],
    state: &mut ProcessorState,
) -> PipelineResult<()> {
    let mut stubs: Vec<NodeId> = Vec::new();
    let mut others: Vec<NodeId> = Vec::new();
    for &node in nodes {
        match txn.graph().get_node(node).map(|n| n.kind) {
            Some(NodeKind::ImportStub) => stubs.push(node),
            Some(_) => others.push(node),
            None => {}
        }
    }
    stubs.sort_unstable();
    others.sort_unstable();

    for node in stubs.into_iter().chain(others) {
        let kind = match txn.graph().get_node(node) {
            Some(n) => n.kind,
            None => continue,
        };
        if let Some(processor) = matcher.processor_for(kind) {
            processor.process(txn, node, state)?;
        }
    }
    Ok(())
}

/// The package containing a node, walking the reverse-navigation index.
pub fn containing_package(graph: &InstanceGraph, node: NodeId) -> Option<NodeId> {
    graph.parent_of(node)
}

/// Look a dotted member up inside an element: enum values, profile
/// stereotypes and tags.
pub fn resolve_member(graph: &InstanceGraph, element: NodeId, member: &str) -> Option<NodeId> {
    for slot in ["values", "stereotypes", "tags"] {
        if let Some(found) = graph
            .edges(element, slot)
            .iter()
            .copied()
            .find(|&v| graph.node_name(v) == member)
        {
            return Some(found);
        }
    }
    None
}

/// Resolve an element reference: absolute paths and top levels first, then
/// the owner's own package, then the import group (exact imports and
/// wildcards, in declaration order).
pub fn resolve_element(
    graph: &InstanceGraph,
    path: &str,
    owner: Option<NodeId>,
    import_group: Option<NodeId>,
) -> Option<NodeId> {
    if path.contains("::") {
        return graph.get_by_user_path(path);
    }
    if let Some(top) = graph.get_core_instance(path) {
        return Some(top);
    }
    if let Some(owner) = owner {
        if let Some(package) = containing_package(graph, owner) {
            if let Some(found) = graph.find_child(package, path) {
                return Some(found);
            }
        }
    }
    if let Some(import_group) = import_group {
        for &import in graph.edges(import_group, "imports") {
            let import_path = match graph
                .get_node(import)
                .and_then(|n| n.literal())
                .and_then(|v| v.as_str())
            {
                Some(value) => value.to_string(),
                None => continue,
            };
            if let Some(package_path) = import_path.strip_suffix("::*") {
                if let Some(package) = graph.get_by_user_path(package_path) {
                    if let Some(found) = graph.find_child(package, path) {
                        return Some(found);
                    }
                }
            } else if import_path.rsplit("::").next() == Some(path) {
                if let Some(found) = graph.get_by_user_path(&import_path) {
                    return Some(found);
                }
            }
        }
    }
    None
}

// ==================== Concrete Processors ====================

/// Resolves import stubs: looks the stub's path up through the package tree
/// and imports and attaches the `resolved` edge. The failure message names
/// the missing element at the exact reference location.
pub struct ImportStubProcessor;

impl Processor for ImportStubProcessor {
    fn kind(&self) -> NodeKind {
        NodeKind::ImportStub
    }

    fn process(
        &self,
        txn: &mut Transaction<'_, '_>,
        node: NodeId,
        state: &mut ProcessorState,
    ) -> PipelineResult<()> {
        if txn.graph().to_one(node, "resolved").is_some() {
            return Ok(());
        }
        let (path, span, owner) = {
            let stub = match txn.graph().get_node(node) {
                Some(n) => n,
                None => return Ok(()),
            };
            let path = match stub.stub_path() {
                Some(p) => p.to_string(),
                None => return Ok(()),
            };
            (path, stub.span.clone(), stub.to_one("owner"))
        };
        let import_group = span
            .as_ref()
            .and_then(|s| state.import_group_for(&s.source));

        // Dotted references read `Enumeration.VALUE` or `Profile.stereotype`.
        let (element_path, member) = match path.split_once('.') {
            Some((base, member)) => (base.to_string(), Some(member.to_string())),
            None => (path.clone(), None),
        };

        let element = resolve_element(txn.graph(), &element_path, owner, import_group)
            .ok_or_else(|| {
                PipelineError::Compilation(CompilationError::new(
                    format!("{} has not been defined!", element_path),
                    span.clone(),
                ))
            })?;

        let target = match member {
            None => element,
            Some(member_name) => {
                resolve_member(txn.graph(), element, &member_name).ok_or_else(|| {
                    let message = match txn.graph().get_node(element).map(|n| n.kind) {
                        Some(NodeKind::Enumeration) => format!(
                            "The enum value '{}' can't be found in the enumeration {}",
                            member_name,
                            txn.graph().user_path(element)
                        ),
                        Some(NodeKind::Profile) => format!(
                            "The stereotype '{}' can't be found in profile {}",
                            member_name,
                            txn.graph().user_path(element)
                        ),
                        _ => format!(
                            "The member '{}' can't be found in {}",
                            member_name,
                            txn.graph().user_path(element)
                        ),
                    };
                    PipelineError::Compilation(CompilationError::new(message, span.clone()))
                })?
            }
        };

        debug!(stub = %path, target = %txn.graph().user_path(target), "stub resolved");
        txn.set_edges(node, "resolved", vec![target])?;
        Ok(())
    }
}

/// Re-classifies enum values by their owning enumeration, the meta-circular
/// classifier relationship enum values carry.
pub struct EnumerationProcessor;

impl Processor for EnumerationProcessor {
    fn kind(&self) -> NodeKind {
        NodeKind::Enumeration
    }

    fn process(
        &self,
        txn: &mut Transaction<'_, '_>,
        node: NodeId,
        _state: &mut ProcessorState,
    ) -> PipelineResult<()> {
        let values: Vec<NodeId> = txn.graph().edges(node, "values").to_vec();
        for value in values {
            if txn.graph().get_node(value).and_then(|n| n.classifier) != Some(node) {
                txn.set_classifier(value, node)?;
            }
        }
        Ok(())
    }
}

/// Wires association ends onto the participating classes: each end becomes a
/// property-from-association on the type of the opposite end.
pub struct AssociationProcessor;

impl Processor for AssociationProcessor {
    fn kind(&self) -> NodeKind {
        NodeKind::Association
    }

    fn process(
        &self,
        txn: &mut Transaction<'_, '_>,
        node: NodeId,
        _state: &mut ProcessorState,
    ) -> PipelineResult<()> {
        let ends: Vec<NodeId> = txn.graph().edges(node, "properties").to_vec();
        if ends.len() != 2 {
            // The validator reports the arity failure with a better span.
            return Ok(());
        }
        for i in 0..2 {
            let end = ends[i];
            let opposite = ends[1 - i];
            let target = match crate::end_target_class(txn.graph(), opposite) {
                Some(t) => t,
                None => {
                    let span = txn.graph().get_node(opposite).and_then(|n| n.span.clone());
                    return Err(PipelineError::Compilation(CompilationError::new(
                        format!(
                            "Association end '{}' must reference a class",
                            txn.graph().node_name(opposite)
                        ),
                        span,
                    )));
                }
            };
            if !txn
                .graph()
                .edges(target, "propertiesFromAssociations")
                .contains(&end)
            {
                txn.add_edge(target, "propertiesFromAssociations", end)?;
            }
        }
        Ok(())
    }
}

/// The resolved class an association end points at, or None when it is not
/// (yet) a class.
pub fn end_target_class(graph: &InstanceGraph, end: NodeId) -> Option<NodeId> {
    let gt = loam_inference::declared_generic_type(graph, end)?;
    let raw = graph.resolve_ref(gt.raw_type()?);
    match graph.get_node(raw) {
        Some(node) if node.kind == NodeKind::Class => Some(raw),
        _ => None,
    }
}
