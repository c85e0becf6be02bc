//! Undo buffer: the record of every mutation a transaction applied.

use loam_core::NodeId;
use loam_graph::{Node, Payload};

/// One applied graph mutation, with enough of the previous state to invert it.
#[derive(Debug, Clone)]
pub enum Change {
    /// A node was created.
    NodeCreated(NodeId),
    /// A node was removed; its full data and parent link are kept so a
    /// rollback restores it under the same id.
    NodeRemoved {
        node: Node,
        parent: Option<NodeId>,
    },
    /// A property slot was replaced wholesale.
    EdgesSet {
        node: NodeId,
        property: String,
        old: Option<Vec<NodeId>>,
    },
    /// A child was appended to a property slot.
    EdgeAdded { node: NodeId, property: String },
    /// A child at one position was swapped.
    EdgeReplaced {
        node: NodeId,
        property: String,
        index: usize,
        old: NodeId,
    },
    /// The payload changed.
    PayloadSet {
        node: NodeId,
        old: Option<Payload>,
    },
    /// The classifier changed.
    ClassifierSet {
        node: NodeId,
        old: Option<NodeId>,
    },
    /// The validated flag changed.
    ValidatedChanged { node: NodeId, old: bool },
    /// The marked-for-deletion flag changed.
    DeletionMarkChanged { node: NodeId, old: bool },
    /// A child was linked into a package.
    PackageChildAdded { package: NodeId, child: NodeId },
    /// A child was unlinked from a package; its position is kept so a
    /// rollback restores the original child order.
    PackageChildRemoved {
        package: NodeId,
        child: NodeId,
        index: usize,
    },
}

/// Ordered log of changes applied by one transaction. A rollback replays the
/// inverse of each change in reverse order.
#[derive(Debug, Default)]
pub struct UndoBuffer {
    changes: Vec<Change>,
}

impl UndoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Drain the log in reverse application order.
    pub fn drain_reverse(&mut self) -> impl Iterator<Item = Change> + '_ {
        self.changes.drain(..).rev()
    }
}
