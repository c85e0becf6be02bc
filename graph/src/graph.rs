//! Core instance graph storage.

use crate::{GraphError, GraphResult, GraphStructureError, Node, Payload};
use loam_core::{GenericType, NodeId, NodeKind};
use std::collections::{HashMap, HashSet};

static NO_EDGES: [NodeId; 0] = [];

/// ID allocator for nodes. Monotonic: ids are never reused, so a restored
/// node keeps its identity and later allocations cannot collide with it.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next_id: u64,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self { next_id: 1 }
    }

    pub(crate) fn alloc(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

/// The in-memory instance graph.
///
/// Structural mutation is visible immediately to any holder of a `NodeId`;
/// callers must only mutate inside an open transaction (the transaction crate
/// wraps every mutating entry point and records undo information).
#[derive(Debug)]
pub struct InstanceGraph {
    /// Node storage
    nodes: HashMap<NodeId, Node>,
    /// ID allocator
    pub(crate) id_alloc: IdAllocator,
    /// Fallback counter for anonymous nodes created outside parsing
    anonymous_counter: u64,
    /// The Root package
    pub(crate) root: NodeId,
    /// Pre-seeded top level elements by name (primitives, metamodel classes)
    pub(crate) top_levels: HashMap<String, NodeId>,
    /// Metamodel class per node kind
    pub(crate) meta: HashMap<NodeKind, NodeId>,
    /// The universal supertype
    pub(crate) any_class: NodeId,
    /// The bottom type: conforms to everything
    pub(crate) nil_class: NodeId,
    /// Side index for reverse navigation: child -> owning package
    pub(crate) parents: HashMap<NodeId, NodeId>,
}

impl Default for InstanceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceGraph {
    /// Create a graph pre-seeded with the Root package, the primitive types
    /// and the metamodel classes.
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: HashMap::new(),
            id_alloc: IdAllocator::new(),
            anonymous_counter: 0,
            root: NodeId::new(0),
            top_levels: HashMap::new(),
            meta: HashMap::new(),
            any_class: NodeId::new(0),
            nil_class: NodeId::new(0),
            parents: HashMap::new(),
        };
        crate::package::bootstrap(&mut graph);
        graph
    }

    // ==================== Node Operations ====================

    /// Create a new node. The classifier defaults to the metamodel class of
    /// `kind`; enum values are re-classified by their processor. Unnamed
    /// nodes get a generated name (parsers supply deterministic names of
    /// their own, so this fallback only serves ad hoc construction).
    pub fn create_node(
        &mut self,
        name: Option<&str>,
        kind: NodeKind,
        span: Option<loam_core::SourceSpan>,
    ) -> NodeId {
        let id = self.id_alloc.alloc();
        let name = match name {
            Some(n) => n.to_string(),
            None => {
                self.anonymous_counter += 1;
                format!("@_anonymous_{}", self.anonymous_counter)
            }
        };
        let mut node = Node::new(id, name, kind, span);
        node.classifier = self.meta.get(&kind).copied();
        self.nodes.insert(id, node);
        id
    }

    /// Get a node by ID.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a node by ID, failing if it does not exist.
    pub fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// The simple name of a node, or a placeholder for a missing one.
    pub fn node_name(&self, id: NodeId) -> &str {
        self.nodes.get(&id).map(|n| n.name.as_str()).unwrap_or("?")
    }

    /// Remove a node from storage, returning its data so a rollback can
    /// restore it byte-identically (same id). The caller is responsible for
    /// unlinking package children edges first.
    pub fn remove_node(&mut self, id: NodeId) -> GraphResult<(Node, Option<NodeId>)> {
        if id == self.root {
            return Err(GraphError::TopLevelImmutable("Root".to_string()));
        }
        if let Some(node) = self.nodes.get(&id) {
            if self.top_levels.get(&node.name) == Some(&id) {
                return Err(GraphError::TopLevelImmutable(node.name.clone()));
            }
        }
        let node = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))?;
        let parent = self.parents.remove(&id);
        Ok((node, parent))
    }

    /// Reinsert a previously removed node under its original id.
    pub fn restore_node(&mut self, node: Node, parent: Option<NodeId>) {
        if let Some(parent) = parent {
            self.parents.insert(node.id, parent);
        }
        self.nodes.insert(node.id, node);
    }

    /// Raise the allocator floor so future ids stay clear of externally
    /// loaded ones.
    pub fn ensure_id_floor(&mut self, min_next: u64) {
        if self.id_alloc.next_id < min_next {
            self.id_alloc.next_id = min_next;
        }
    }

    // ==================== Edge Operations ====================

    /// Replace the child list under a property slot, returning the previous
    /// list (None when the slot was unset).
    pub fn set_edges(
        &mut self,
        id: NodeId,
        property: &str,
        children: Vec<NodeId>,
    ) -> GraphResult<Option<Vec<NodeId>>> {
        let node = self.node_mut(id)?;
        Ok(node.properties.insert(property.to_string(), children))
    }

    /// Append a child under a property slot.
    pub fn add_edge(&mut self, id: NodeId, property: &str, child: NodeId) -> GraphResult<()> {
        let node = self.node_mut(id)?;
        node.properties
            .entry(property.to_string())
            .or_default()
            .push(child);
        Ok(())
    }

    /// Replace the child at one position of a property slot, returning the
    /// previous occupant.
    pub fn replace_edge(
        &mut self,
        id: NodeId,
        property: &str,
        index: usize,
        child: NodeId,
    ) -> GraphResult<NodeId> {
        let name = self.node_name(id).to_string();
        let node = self.node_mut(id)?;
        let slot = node
            .properties
            .get_mut(property)
            .and_then(|children| children.get_mut(index))
            .ok_or_else(|| GraphError::SlotNotFound {
                node: name,
                property: property.to_string(),
                index,
            })?;
        let old = *slot;
        *slot = child;
        Ok(old)
    }

    /// Remove a property slot entirely, returning the previous list.
    pub fn remove_edges(&mut self, id: NodeId, property: &str) -> GraphResult<Option<Vec<NodeId>>> {
        let node = self.node_mut(id)?;
        Ok(node.properties.shift_remove(property))
    }

    /// Child references under a property name. Missing nodes and unset slots
    /// both read as empty.
    pub fn edges(&self, id: NodeId, property: &str) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.edges(property))
            .unwrap_or(&NO_EDGES)
    }

    /// The single child of a to-one slot.
    pub fn to_one(&self, id: NodeId, property: &str) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.to_one(property))
    }

    // ==================== Flags & Payloads ====================

    /// Set the payload, returning the previous one.
    pub fn set_payload(&mut self, id: NodeId, payload: Payload) -> GraphResult<Option<Payload>> {
        let node = self.node_mut(id)?;
        Ok(node.payload.replace(payload))
    }

    /// Clear the payload, returning the previous one.
    pub fn clear_payload(&mut self, id: NodeId) -> GraphResult<Option<Payload>> {
        let node = self.node_mut(id)?;
        Ok(node.payload.take())
    }

    /// Set the classifier, returning the previous one.
    pub fn set_classifier(
        &mut self,
        id: NodeId,
        classifier: NodeId,
    ) -> GraphResult<Option<NodeId>> {
        let node = self.node_mut(id)?;
        Ok(node.classifier.replace(classifier))
    }

    /// Clear the classifier, returning the previous one.
    pub fn clear_classifier(&mut self, id: NodeId) -> GraphResult<Option<NodeId>> {
        let node = self.node_mut(id)?;
        Ok(node.classifier.take())
    }

    /// Mark a node validated, returning the previous flag value.
    pub fn mark_validated(&mut self, id: NodeId) -> GraphResult<bool> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.validated, true))
    }

    /// Clear the validated flag, returning the previous value.
    pub fn clear_validated(&mut self, id: NodeId) -> GraphResult<bool> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.validated, false))
    }

    pub fn is_validated(&self, id: NodeId) -> bool {
        self.nodes.get(&id).map(|n| n.validated).unwrap_or(false)
    }

    /// Mark a node for deletion, returning the previous flag value.
    pub fn mark_for_deletion(&mut self, id: NodeId) -> GraphResult<bool> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.marked_for_deletion, true))
    }

    /// Clear the deletion mark, returning the previous flag value.
    pub fn unmark_for_deletion(&mut self, id: NodeId) -> GraphResult<bool> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.marked_for_deletion, false))
    }

    pub fn is_marked_for_deletion(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .map(|n| n.marked_for_deletion)
            .unwrap_or(false)
    }

    /// Property access guarded by the classifier invariant: a node whose
    /// classifier declares type parameters cannot be read as an instance.
    /// The failure names the offending node and its source location, before
    /// any validator runs on it.
    pub fn checked_properties(
        &self,
        id: NodeId,
    ) -> Result<&indexmap::IndexMap<String, Vec<NodeId>>, GraphStructureError> {
        let node = self
            .get_node(id)
            .ok_or_else(|| GraphStructureError::new(format!("Node not found: {}", id), None))?;
        if let Some(classifier) = node.classifier {
            if !self.edges(classifier, "typeParameters").is_empty() {
                return Err(GraphStructureError::new(
                    format!(
                        "Type variables are not supported on instances: '{}' is classified by '{}' which has type parameters",
                        node.name,
                        self.node_name(classifier)
                    ),
                    node.span.clone(),
                ));
            }
        }
        Ok(&node.properties)
    }

    // ==================== Navigation ====================

    /// Follow a stub to its resolved target; identity for anything else.
    pub fn resolve_ref(&self, id: NodeId) -> NodeId {
        match self.nodes.get(&id) {
            Some(node) if node.kind == NodeKind::ImportStub => {
                node.to_one("resolved").unwrap_or(id)
            }
            _ => id,
        }
    }

    /// The owning package of a packageable node.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// The Root package.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The universal supertype class.
    pub fn any_class(&self) -> NodeId {
        self.any_class
    }

    /// The bottom type class; conforms to everything.
    pub fn nil_class(&self) -> NodeId {
        self.nil_class
    }

    /// The metamodel class for a node kind.
    pub fn meta_class(&self, kind: NodeKind) -> NodeId {
        self.meta[&kind]
    }

    /// A pre-seeded top level element (primitive type or metamodel class).
    pub fn get_core_instance(&self, name: &str) -> Option<NodeId> {
        match self.top_levels.get(name) {
            Some(id) => Some(*id),
            None if name == "Root" => Some(self.root),
            None => self.get_by_user_path(name),
        }
    }

    /// A primitive type node by name.
    pub fn primitive(&self, name: &str) -> Option<NodeId> {
        self.top_levels
            .get(name)
            .copied()
            .filter(|id| self.get_node(*id).map(|n| n.kind) == Some(NodeKind::PrimitiveType))
    }

    // ==================== Type Queries ====================

    /// Direct resolved supertypes of a class.
    pub fn supertypes(&self, class: NodeId) -> Vec<NodeId> {
        self.edges(class, "generalizations")
            .iter()
            .map(|&g| self.resolve_ref(g))
            .filter(|&g| g != class)
            .collect()
    }

    /// Whether `sub` conforms to `sup`: identical, `sup` is Any, or `sup`
    /// appears in `sub`'s transitive generalizations.
    pub fn type_conforms(&self, sub: NodeId, sup: NodeId) -> bool {
        let sub = self.resolve_ref(sub);
        let sup = self.resolve_ref(sup);
        if sub == sup || sup == self.any_class || sub == self.nil_class {
            return true;
        }
        let mut seen = HashSet::new();
        let mut pending = self.supertypes(sub);
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            if next == sup {
                return true;
            }
            pending.extend(self.supertypes(next));
        }
        false
    }

    /// The declared property of a type with the given name, searching the
    /// type itself and then its transitive generalizations.
    pub fn declared_property(&self, type_id: NodeId, name: &str) -> Option<NodeId> {
        let type_id = self.resolve_ref(type_id);
        for &prop in self.edges(type_id, "properties") {
            let prop = self.resolve_ref(prop);
            if self.node_name(prop) == name {
                return Some(prop);
            }
        }
        let mut seen = HashSet::new();
        let mut pending = self.supertypes(type_id);
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            for &prop in self.edges(next, "properties") {
                let prop = self.resolve_ref(prop);
                if self.node_name(prop) == name {
                    return Some(prop);
                }
            }
            pending.extend(self.supertypes(next));
        }
        None
    }

    // ==================== Printing ====================

    /// Print a generic type in canonical notation, e.g. `List<T|m>`.
    pub fn print_generic_type(&self, gt: &GenericType) -> String {
        match gt {
            GenericType::Parameter(name) => name.clone(),
            GenericType::Concrete {
                raw_type,
                type_args,
                mult_args,
            } => {
                let resolved = self.resolve_ref(*raw_type);
                let mut out = match self.get_node(resolved) {
                    Some(node) if node.kind == NodeKind::ImportStub => {
                        node.stub_path().unwrap_or(&node.name).to_string()
                    }
                    Some(node) => node.name.clone(),
                    None => resolved.to_string(),
                };
                if !type_args.is_empty() || !mult_args.is_empty() {
                    out.push('<');
                    out.push_str(
                        &type_args
                            .iter()
                            .map(|a| self.print_generic_type(a))
                            .collect::<Vec<_>>()
                            .join(", "),
                    );
                    if !mult_args.is_empty() {
                        out.push('|');
                        out.push_str(
                            &mult_args
                                .iter()
                                .map(|m| m.to_string())
                                .collect::<Vec<_>>()
                                .join(", "),
                        );
                    }
                    out.push('>');
                }
                out
            }
        }
    }

    // ==================== Statistics ====================

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All node IDs.
    pub fn all_node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// A deterministic structural summary of the graph: one sorted line per
    /// node describing its user path, kind, classifier, edges, payload and
    /// flags, without synthetic ids. Two graphs are considered isomorphic
    /// when their fingerprints are equal.
    pub fn fingerprint(&self) -> String {
        let mut lines: Vec<String> = self
            .nodes
            .values()
            .map(|node| {
                let classifier = node
                    .classifier
                    .map(|c| self.describe(c))
                    .unwrap_or_else(|| "-".to_string());
                // Empty slots read the same as absent ones.
                let mut edges: Vec<String> = node
                    .properties
                    .iter()
                    .filter(|(_, children)| !children.is_empty())
                    .map(|(prop, children)| {
                        let described: Vec<String> =
                            children.iter().map(|&c| self.describe(c)).collect();
                        format!("{}=[{}]", prop, described.join(","))
                    })
                    .collect();
                edges.sort_unstable();
                let payload = match &node.payload {
                    Some(Payload::Literal(v)) => format!(" literal:{}", v),
                    Some(Payload::Multiplicity(m)) => format!(" mult:{}", m),
                    Some(Payload::GenericType(gt)) => {
                        format!(" type:{}", self.print_generic_type(gt))
                    }
                    Some(Payload::Stub { path, .. }) => format!(" stub:{}", path),
                    None => String::new(),
                };
                format!(
                    "{}|{}|classifier={}|{}{}{}{}",
                    self.describe(node.id),
                    node.kind,
                    classifier,
                    edges.join("|"),
                    payload,
                    if node.validated { " validated" } else { "" },
                    if node.marked_for_deletion { " deleted" } else { "" },
                )
            })
            .collect();
        lines.sort_unstable();
        lines.join("\n")
    }

    /// User path for packageable nodes, simple name otherwise.
    fn describe(&self, id: NodeId) -> String {
        match self.get_node(id) {
            Some(node) if node.kind.is_packageable() => self.user_path(id),
            Some(node) => node.name.clone(),
            None => id.to_string(),
        }
    }
}
