//! Node structure for the instance graph.

use indexmap::IndexMap;
use loam_core::{GenericType, Multiplicity, NodeId, NodeKind, SourceSpan, Value};
use serde::{Deserialize, Serialize};

/// Typed payload carried by leaf-like nodes. Literal values, multiplicity and
/// generic-type terms, and unresolved reference stubs keep their data here
/// instead of spreading it over edge lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// A literal value (property default, function body literal).
    Literal(Value),
    /// A multiplicity term.
    Multiplicity(Multiplicity),
    /// A generic-type term.
    GenericType(GenericType),
    /// An unresolved reference: the textual path the parser saw. Resolution
    /// adds a `resolved` edge; navigation follows it through `resolve_ref`.
    Stub { path: String },
}

/// A node in the instance graph: one compiled model element.
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable synthetic identity, unique within one graph instance.
    pub id: NodeId,
    /// Simple name. Anonymous nodes carry generated names.
    pub name: String,
    /// Kind tag for matcher dispatch.
    pub kind: NodeKind,
    /// The classifier node ("the type of" this node, in the meta sense).
    /// `None` only transiently during metamodel bootstrap.
    pub classifier: Option<NodeId>,
    /// Ordered mapping from property name to child node references.
    /// To-one and to-many slots share this representation.
    pub properties: IndexMap<String, Vec<NodeId>>,
    /// Where this node came from, if it was parsed.
    pub span: Option<SourceSpan>,
    /// Typed payload for literal / term / stub nodes.
    pub payload: Option<Payload>,
    /// Set once the node has passed validation in the current cycle.
    pub validated: bool,
    /// Set when an unload pass has claimed the node.
    pub marked_for_deletion: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, kind: NodeKind, span: Option<SourceSpan>) -> Self {
        Self {
            id,
            name,
            kind,
            classifier: None,
            properties: IndexMap::new(),
            span,
            payload: None,
            validated: false,
            marked_for_deletion: false,
        }
    }

    /// Rebuild a node from externally stored parts (snapshot loading).
    pub fn from_parts(
        id: NodeId,
        name: String,
        kind: NodeKind,
        classifier: Option<NodeId>,
        span: Option<SourceSpan>,
    ) -> Self {
        let mut node = Self::new(id, name, kind, span);
        node.classifier = classifier;
        node
    }

    /// Child references under a property name; empty when the slot is unset.
    pub fn edges(&self, property: &str) -> &[NodeId] {
        self.properties
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The single child under a to-one property slot.
    pub fn to_one(&self, property: &str) -> Option<NodeId> {
        match self.edges(property) {
            [single] => Some(*single),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&Value> {
        match &self.payload {
            Some(Payload::Literal(value)) => Some(value),
            _ => None,
        }
    }

    pub fn multiplicity(&self) -> Option<&Multiplicity> {
        match &self.payload {
            Some(Payload::Multiplicity(m)) => Some(m),
            _ => None,
        }
    }

    pub fn generic_type(&self) -> Option<&GenericType> {
        match &self.payload {
            Some(Payload::GenericType(gt)) => Some(gt),
            _ => None,
        }
    }

    pub fn stub_path(&self) -> Option<&str> {
        match &self.payload {
            Some(Payload::Stub { path }) => Some(path),
            _ => None,
        }
    }
}
