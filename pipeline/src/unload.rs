//! Unload phase: collect every node a deleted source must clean.

use loam_core::{NodeId, NodeKind};
use loam_graph::InstanceGraph;
use std::collections::HashSet;

/// An unload-phase handler for one node kind: enumerates the nodes owned by
/// a top-level element, so deleting its source removes the whole subtree.
pub trait UnloadWalker {
    fn kind(&self) -> NodeKind;

    /// Append every node owned by `node` (excluding `node` itself) to `out`.
    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>);
}

/// Collect the full owned subtree of a set of top-level elements, in
/// deterministic order, using the matcher's registered walkers.
pub fn collect_owned(
    graph: &InstanceGraph,
    matcher: &crate::Matcher,
    roots: &[NodeId],
) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut pending: Vec<NodeId> = roots.to_vec();
    pending.sort_unstable();
    while let Some(node) = pending.pop() {
        if !seen.insert(node) {
            continue;
        }
        out.push(node);
        if let Some(kind) = graph.get_node(node).map(|n| n.kind) {
            if let Some(walker) = matcher.unload_walker_for(kind) {
                let mut owned = Vec::new();
                walker.walk(graph, node, &mut owned);
                pending.extend(owned);
            }
        }
    }
    out.sort_unstable();
    out
}

fn extend_from(graph: &InstanceGraph, node: NodeId, slots: &[&str], out: &mut Vec<NodeId>) {
    for slot in slots {
        out.extend(graph.edges(node, slot));
    }
}

/// Classes own their properties, type parameters, generalization stubs and
/// stereotype stubs.
pub struct ClassUnloadWalker;

impl UnloadWalker for ClassUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::Class
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(
            graph,
            node,
            &["properties", "generalizations", "typeParameters", "stereotypes"],
            out,
        );
    }
}

/// Properties own their term nodes and default value.
pub struct PropertyUnloadWalker;

impl UnloadWalker for PropertyUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::Property
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(graph, node, &["genericType", "multiplicity", "defaultValue"], out);
    }
}

/// Associations own their two ends.
pub struct AssociationUnloadWalker;

impl UnloadWalker for AssociationUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::Association
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(graph, node, &["properties"], out);
    }
}

/// Enumerations own their values.
pub struct EnumerationUnloadWalker;

impl UnloadWalker for EnumerationUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::Enumeration
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(graph, node, &["values"], out);
    }
}

/// Functions own parameters, return terms, type parameters and body stubs.
pub struct FunctionUnloadWalker;

impl UnloadWalker for FunctionUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::Function
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(
            graph,
            node,
            &[
                "parameters",
                "returnType",
                "returnMultiplicity",
                "typeParameters",
                "multiplicityParameters",
                "expressions",
                "stereotypes",
            ],
            out,
        );
    }
}

/// Parameters own their term nodes.
pub struct ParameterUnloadWalker;

impl UnloadWalker for ParameterUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::Parameter
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(graph, node, &["genericType", "multiplicity"], out);
    }
}

/// Profiles own their stereotypes and tags.
pub struct ProfileUnloadWalker;

impl UnloadWalker for ProfileUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::Profile
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(graph, node, &["stereotypes", "tags"], out);
    }
}

/// Import groups own their import path literals.
pub struct ImportGroupUnloadWalker;

impl UnloadWalker for ImportGroupUnloadWalker {
    fn kind(&self) -> NodeKind {
        NodeKind::ImportGroup
    }

    fn walk(&self, graph: &InstanceGraph, node: NodeId, out: &mut Vec<NodeId>) {
        extend_from(graph, node, &["imports"], out);
    }
}
