//! Auxiliary indexes over the instance graph.
//!
//! An index specification is a pure function from a node to a key. Specs can
//! be composed to build derived indexes (e.g. "property value's name" from
//! "property value" and "name"). An ID index maps keys to single nodes and
//! detects key collisions as a distinguishable error, never a silent
//! overwrite.

use crate::{IdConflictError, InstanceGraph, Node};
use dashmap::DashMap;
use loam_core::{NodeId, SourceId};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// A pure function from a node to an index key.
pub trait IndexSpec<K> {
    fn key_for(&self, graph: &InstanceGraph, node: &Node) -> Option<K>;
}

/// Index nodes by their simple name.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByName;

impl IndexSpec<String> for ByName {
    fn key_for(&self, _graph: &InstanceGraph, node: &Node) -> Option<String> {
        Some(node.name.clone())
    }
}

/// Index nodes by their user path (reference-id).
#[derive(Debug, Default, Clone, Copy)]
pub struct ByUserPath;

impl IndexSpec<String> for ByUserPath {
    fn key_for(&self, graph: &InstanceGraph, node: &Node) -> Option<String> {
        Some(graph.user_path(node.id))
    }
}

/// Index nodes by the source unit that introduced them.
#[derive(Debug, Default, Clone, Copy)]
pub struct BySource;

impl IndexSpec<SourceId> for BySource {
    fn key_for(&self, _graph: &InstanceGraph, node: &Node) -> Option<SourceId> {
        node.span.as_ref().map(|s| s.source.clone())
    }
}

/// Navigate to the single value of a property slot. Yields the target node's
/// id, for composition with another spec.
#[derive(Debug, Clone)]
pub struct ToOneProperty {
    pub property: String,
}

impl ToOneProperty {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

impl IndexSpec<NodeId> for ToOneProperty {
    fn key_for(&self, graph: &InstanceGraph, node: &Node) -> Option<NodeId> {
        node.to_one(&self.property).map(|id| graph.resolve_ref(id))
    }
}

/// Composition of two specs: navigate with the first, extract the key from
/// the navigated-to node with the second.
#[derive(Debug, Clone)]
pub struct Composed<S, T> {
    nav: S,
    then: T,
}

impl<S, T> Composed<S, T> {
    pub fn new(nav: S, then: T) -> Self {
        Self { nav, then }
    }
}

impl<K, S, T> IndexSpec<K> for Composed<S, T>
where
    S: IndexSpec<NodeId>,
    T: IndexSpec<K>,
{
    fn key_for(&self, graph: &InstanceGraph, node: &Node) -> Option<K> {
        let target = self.nav.key_for(graph, node)?;
        let target_node = graph.get_node(target)?;
        self.then.key_for(graph, target_node)
    }
}

/// An ID index: key -> node, with collision detection.
#[derive(Debug)]
pub struct IdIndex<K, S> {
    spec: S,
    map: HashMap<K, NodeId>,
}

impl<K, S> IdIndex<K, S>
where
    K: Eq + Hash + Display,
    S: IndexSpec<K>,
{
    pub fn new(spec: S) -> Self {
        Self {
            spec,
            map: HashMap::new(),
        }
    }

    /// Add a node. Fails with `IdConflictError` when a different node is
    /// already stored under the same key; the index is left unchanged.
    pub fn add(&mut self, graph: &InstanceGraph, id: NodeId) -> Result<(), IdConflictError> {
        let node = match graph.get_node(id) {
            Some(n) => n,
            None => return Ok(()),
        };
        let key = match self.spec.key_for(graph, node) {
            Some(k) => k,
            None => return Ok(()),
        };
        match self.map.get(&key) {
            Some(&existing) if existing != id => Err(IdConflictError::new(key.to_string())),
            _ => {
                self.map.insert(key, id);
                Ok(())
            }
        }
    }

    /// Add several nodes; the first conflict wins and aborts.
    pub fn add_all(
        &mut self,
        graph: &InstanceGraph,
        ids: impl IntoIterator<Item = NodeId>,
    ) -> Result<(), IdConflictError> {
        for id in ids {
            self.add(graph, id)?;
        }
        Ok(())
    }

    /// Remove a node, but only when the stored entry still equals the
    /// argument. Guards against removing a node that has since been
    /// superseded under the same key.
    pub fn remove(&mut self, graph: &InstanceGraph, id: NodeId) {
        let key = graph
            .get_node(id)
            .and_then(|node| self.spec.key_for(graph, node));
        if let Some(key) = key {
            if self.map.get(&key) == Some(&id) {
                self.map.remove(&key);
            }
        }
    }

    /// Remove by explicit key with the same stored-value guard. Needed when
    /// the node is already gone from the graph.
    pub fn remove_key(&mut self, key: &K, id: NodeId) {
        if self.map.get(key) == Some(&id) {
            self.map.remove(key);
        }
    }

    pub fn get(&self, key: &K) -> Option<NodeId> {
        self.map.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }
}

/// Concurrent variant of the ID index. Uses atomic compare-and-remove so
/// that racing invalidation and re-indexing during concurrent incremental
/// recompiles cannot leave a stale or double-counted entry.
#[derive(Debug)]
pub struct ConcurrentIdIndex<K> {
    map: DashMap<K, NodeId>,
}

impl<K> Default for ConcurrentIdIndex<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<K> ConcurrentIdIndex<K>
where
    K: Eq + Hash + Display + Clone,
{
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Add an entry. Fails with `IdConflictError` when a different node is
    /// already stored under the key; the index is left unchanged.
    pub fn add(&self, key: K, id: NodeId) -> Result<(), IdConflictError> {
        match self.map.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                if *occupied.get() == id {
                    Ok(())
                } else {
                    Err(IdConflictError::new(occupied.key().to_string()))
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(id);
                Ok(())
            }
        }
    }

    /// Atomic compare-and-remove: the entry is removed only while it still
    /// maps to `id`.
    pub fn remove(&self, key: &K, id: NodeId) {
        self.map.remove_if(key, |_, &stored| stored == id);
    }

    pub fn get(&self, key: &K) -> Option<NodeId> {
        self.map.get(key).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}
