//! The compiler context: concurrent registries over committed elements.
//!
//! Read-only graph traversals on other threads consult these indexes while a
//! compile cycle runs; entries are only written after a successful commit,
//! and the compare-and-remove semantics of the concurrent index keep racing
//! invalidation and re-indexing from leaving stale entries.

use dashmap::DashMap;
use loam_core::{NodeId, NodeKind};
use loam_graph::{ConcurrentIdIndex, IdConflictError, InstanceGraph};
use std::collections::BTreeSet;

/// A context entry captured while the element is still in the graph, so an
/// unload can unregister it after the node is gone.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub node: NodeId,
    pub path: String,
    pub name: String,
    pub kind: NodeKind,
}

impl ContextEntry {
    pub fn capture(graph: &InstanceGraph, node: NodeId) -> Option<Self> {
        let data = graph.get_node(node)?;
        Some(Self {
            node,
            path: graph.user_path(node),
            name: data.name.clone(),
            kind: data.kind,
        })
    }
}

/// Committed-element registries: by user path, by simple name for functions,
/// and by kind.
#[derive(Debug, Default)]
pub struct Context {
    elements_by_path: ConcurrentIdIndex<String>,
    functions_by_name: ConcurrentIdIndex<String>,
    by_kind: DashMap<NodeKind, BTreeSet<NodeId>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a committed top-level element. A path conflict is an
    /// internal consistency error and aborts the batch.
    pub fn register(&self, entry: &ContextEntry) -> Result<(), IdConflictError> {
        self.elements_by_path.add(entry.path.clone(), entry.node)?;
        if entry.kind == NodeKind::Function {
            // Simple-name lookup is a convenience; the first function with a
            // given name wins and same-name functions elsewhere are reached
            // by path.
            self.functions_by_name.add(entry.name.clone(), entry.node).ok();
        }
        self.by_kind.entry(entry.kind).or_default().insert(entry.node);
        Ok(())
    }

    /// Remove an unloaded element. Removal is guarded by the concurrent
    /// index: only the stored entry is removed, so a path re-registered to a
    /// newer node survives.
    pub fn unregister(&self, entry: &ContextEntry) {
        self.elements_by_path.remove(&entry.path, entry.node);
        if entry.kind == NodeKind::Function {
            self.functions_by_name.remove(&entry.name, entry.node);
        }
        if let Some(mut set) = self.by_kind.get_mut(&entry.kind) {
            set.remove(&entry.node);
        }
    }

    /// Look a committed element up by its user path.
    pub fn get_by_path(&self, path: &str) -> Option<NodeId> {
        self.elements_by_path.get(&path.to_string())
    }

    /// Look a committed function up by its simple name.
    pub fn get_function_by_name(&self, name: &str) -> Option<NodeId> {
        self.functions_by_name.get(&name.to_string())
    }

    /// All committed elements of a kind, in id order.
    pub fn instances_of(&self, kind: NodeKind) -> Vec<NodeId> {
        self.by_kind
            .get(&kind)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.elements_by_path.clear();
        self.functions_by_name.clear();
        self.by_kind.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== TEST: register_and_unregister ==========
    #[test]
    fn test_register_and_unregister() {
        let mut graph = InstanceGraph::new();
        let pkg = graph.get_or_create_package("model").unwrap().package;
        let class = graph.create_node(Some("Person"), NodeKind::Class, None);
        graph.add_package_child(pkg, class).unwrap();

        let context = Context::new();
        let entry = ContextEntry::capture(&graph, class).unwrap();
        context.register(&entry).unwrap();

        assert_eq!(context.get_by_path("model::Person"), Some(class));
        assert_eq!(context.instances_of(NodeKind::Class), vec![class]);

        context.unregister(&entry);
        assert_eq!(context.get_by_path("model::Person"), None);
        assert!(context.instances_of(NodeKind::Class).is_empty());
    }

    // ========== TEST: stale_unregister_keeps_newer_entry ==========
    #[test]
    fn test_stale_unregister_keeps_newer_entry() {
        // GIVEN a path re-registered to a newer node
        let mut graph = InstanceGraph::new();
        let pkg = graph.get_or_create_package("model").unwrap().package;
        let old = graph.create_node(Some("Person"), NodeKind::Class, None);
        graph.add_package_child(pkg, old).unwrap();
        let context = Context::new();
        let old_entry = ContextEntry::capture(&graph, old).unwrap();
        context.register(&old_entry).unwrap();

        context.unregister(&old_entry);
        graph.remove_package_child(pkg, old).unwrap();
        graph.remove_node(old).unwrap();
        let new = graph.create_node(Some("Person"), NodeKind::Class, None);
        graph.add_package_child(pkg, new).unwrap();
        let new_entry = ContextEntry::capture(&graph, new).unwrap();
        context.register(&new_entry).unwrap();

        // WHEN the stale entry is unregistered again
        context.unregister(&old_entry);

        // THEN the newer registration survives
        assert_eq!(context.get_by_path("model::Person"), Some(new));
    }
}
