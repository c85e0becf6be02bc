//! Graph snapshot hooks.
//!
//! The core exposes "serialize all reachable nodes from a given root" and
//! "deserialize into a fresh graph" as opaque hooks; persistent formats and
//! packaging beyond this flat record form belong to external tooling.

use crate::{CompilerError, CompilerResult};
use loam_core::{CompilationError, NodeId, NodeKind, SourceSpan};
use loam_graph::{InstanceGraph, Node, Payload};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A flat, serializable rendition of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub classifier: Option<NodeId>,
    pub properties: Vec<(String, Vec<NodeId>)>,
    pub span: Option<SourceSpan>,
    pub payload: Option<Payload>,
}

fn record(node: &Node) -> NodeRecord {
    NodeRecord {
        id: node.id,
        name: node.name.clone(),
        kind: node.kind,
        classifier: node.classifier,
        properties: node
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        span: node.span.clone(),
        payload: node.payload.clone(),
    }
}

fn payload_refs(payload: &Payload, out: &mut Vec<NodeId>) {
    if let Payload::GenericType(gt) = payload {
        collect_generic_refs(gt, out);
    }
}

fn collect_generic_refs(gt: &loam_core::GenericType, out: &mut Vec<NodeId>) {
    if let loam_core::GenericType::Concrete {
        raw_type,
        type_args,
        ..
    } = gt
    {
        out.push(*raw_type);
        for arg in type_args {
            collect_generic_refs(arg, out);
        }
    }
}

/// Serialize every node reachable from `root` through edges, classifiers and
/// generic-type payloads, in id order.
pub fn serialize_reachable(graph: &InstanceGraph, root: NodeId) -> Vec<NodeRecord> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut pending = vec![root];
    let mut records = Vec::new();
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let node = match graph.get_node(id) {
            Some(n) => n,
            None => continue,
        };
        records.push(record(node));
        if let Some(classifier) = node.classifier {
            pending.push(classifier);
        }
        for children in node.properties.values() {
            pending.extend(children.iter().copied());
        }
        if let Some(payload) = &node.payload {
            payload_refs(payload, &mut pending);
        }
    }
    records.sort_by_key(|r| r.id);
    records
}

/// Deserialize records into a fresh graph. Pre-seeded nodes keep their
/// bootstrap identity (bootstrap allocation is deterministic); loaded user
/// nodes are inserted under their recorded ids and the allocator is raised
/// past them.
pub fn load(records: Vec<NodeRecord>) -> CompilerResult<InstanceGraph> {
    let mut graph = InstanceGraph::new();
    let mut max_id = 0u64;
    for record in records {
        max_id = max_id.max(record.id.raw());
        if graph.get_node(record.id).is_some() {
            // A pre-seeded node: adopt its recorded edges (Root regains its
            // children) but keep the bootstrap identity.
            for (key, children) in record.properties {
                graph.set_edges(record.id, &key, children)?;
            }
            continue;
        }
        let mut node = Node::from_parts(
            record.id,
            record.name,
            record.kind,
            record.classifier,
            record.span,
        );
        for (key, children) in record.properties {
            node.properties.insert(key, children);
        }
        node.payload = record.payload;
        graph.restore_node(node, None);
    }
    graph.ensure_id_floor(max_id + 1);

    // Rebuild the reverse-navigation index from the loaded children edges.
    let package_like: Vec<NodeId> = graph.all_node_ids().collect();
    for id in package_like {
        for child in graph.edges(id, "children").to_vec() {
            graph.relink_parent(child, id);
        }
    }

    graph
        .validate_integrity()
        .map_err(CompilerError::GraphStructure)?;
    Ok(graph)
}

/// Serialize records to JSON.
pub fn to_json(records: &[NodeRecord]) -> CompilerResult<String> {
    serde_json::to_string(records)
        .map_err(|e| CompilerError::Compilation(CompilationError::unlocated(e.to_string())))
}

/// Deserialize records from JSON.
pub fn from_json(json: &str) -> CompilerResult<Vec<NodeRecord>> {
    serde_json::from_str(json)
        .map_err(|e| CompilerError::Compilation(CompilationError::unlocated(e.to_string())))
}
