//! Transaction state machine, manager, and the graph-mutation capability.

use crate::{Change, TransactionError, TransactionResult, UndoBuffer};
use loam_core::{NodeId, NodeKind, SourceSpan};
use loam_graph::{InstanceGraph, Payload};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

/// Transaction lifecycle state. Transitions are monotonic and irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    /// A failure during commit or rollback landed here; the transaction must
    /// never be retried.
    Invalid,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Open => "OPEN",
            TransactionState::Committing => "COMMITTING",
            TransactionState::Committed => "COMMITTED",
            TransactionState::RollingBack => "ROLLING_BACK",
            TransactionState::RolledBack => "ROLLED_BACK",
            TransactionState::Invalid => "INVALID",
        };
        write!(f, "{}", name)
    }
}

/// Identifier of a transaction within its manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn{}", self.0)
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    next_id: u64,
    registered: HashSet<TransactionId>,
    current: Option<TransactionId>,
}

/// Tracks open transactions and the at-most-one "current" binding that
/// nested graph operations use to discover the active transaction without
/// explicit parameter threading.
#[derive(Debug, Default)]
pub struct TransactionManager {
    inner: Mutex<ManagerState>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> TransactionId {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.next_id += 1;
        let id = TransactionId(state.next_id);
        state.registered.insert(id);
        id
    }

    /// Deregistration happens before commit logic runs, so a concurrent
    /// lookup of the current transaction never sees a half-committed one.
    fn deregister(&self, id: TransactionId) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.registered.remove(&id);
        if state.current == Some(id) {
            state.current = None;
        }
    }

    pub fn is_registered(&self, id: TransactionId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .registered
            .contains(&id)
    }

    /// The transaction currently bound via `bind_current`, if any.
    pub fn current(&self) -> Option<TransactionId> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).current
    }

    fn bind(&self, id: TransactionId) -> TransactionResult<()> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if state.current.is_some() {
            return Err(TransactionError::AlreadyBound);
        }
        state.current = Some(id);
        Ok(())
    }

    fn release(&self, id: TransactionId) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if state.current == Some(id) {
            state.current = None;
        }
    }

    /// Forget everything (compiler reset).
    pub fn clear(&self) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.registered.clear();
        state.current = None;
    }
}

/// Scoped handle for the current-transaction binding; releases on drop.
pub struct CurrentTransactionGuard<'m> {
    manager: &'m TransactionManager,
    id: TransactionId,
}

impl CurrentTransactionGuard<'_> {
    pub fn id(&self) -> TransactionId {
        self.id
    }
}

impl Drop for CurrentTransactionGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(self.id);
    }
}

/// One attempt at a coherent graph mutation.
///
/// Holds the exclusive borrow of the graph for its whole lifetime, which is
/// what serializes mutation per graph instance. Every mutation records its
/// inverse; `rollback` replays them in reverse so the graph ends
/// byte-identical to its pre-open state. Dropping an open transaction rolls
/// it back.
pub struct Transaction<'g, 'm> {
    id: TransactionId,
    manager: &'m TransactionManager,
    graph: &'g mut InstanceGraph,
    state: TransactionState,
    committable: bool,
    buffer: UndoBuffer,
}

impl<'g, 'm> Transaction<'g, 'm> {
    /// Open a transaction over the graph. `committable` distinguishes
    /// read/write transactions from read-only snapshots.
    pub fn open(
        manager: &'m TransactionManager,
        graph: &'g mut InstanceGraph,
        committable: bool,
    ) -> Self {
        let id = manager.register();
        debug!(transaction = %id, committable, "transaction opened");
        Self {
            id,
            manager,
            graph,
            state: TransactionState::Open,
            committable,
            buffer: UndoBuffer::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_committable(&self) -> bool {
        self.committable
    }

    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    pub fn is_rolled_back(&self) -> bool {
        self.state == TransactionState::RolledBack
    }

    pub fn is_invalid(&self) -> bool {
        self.state == TransactionState::Invalid
    }

    /// Read access to the graph under this transaction.
    pub fn graph(&self) -> &InstanceGraph {
        self.graph
    }

    /// Bind this transaction as the manager's current one. The returned
    /// guard must be dropped to clear the binding; binding a second
    /// transaction without releasing the first fails immediately.
    pub fn bind_current(&self) -> TransactionResult<CurrentTransactionGuard<'m>> {
        self.ensure_open()?;
        self.manager.bind(self.id)?;
        Ok(CurrentTransactionGuard {
            manager: self.manager,
            id: self.id,
        })
    }

    // ========== Transaction Lifecycle ==========

    /// Commit. Fails when the transaction is not committable or not open;
    /// deregisters from the manager before the commit logic runs. A failure
    /// during the commit step invalidates the transaction.
    pub fn commit(&mut self) -> TransactionResult<()> {
        if !self.committable {
            return Err(TransactionError::NotCommittable);
        }
        self.ensure_open()?;
        self.state = TransactionState::Committing;
        self.manager.deregister(self.id);
        // Changes were applied eagerly; committing just seals them.
        self.buffer.clear();
        self.state = TransactionState::Committed;
        debug!(transaction = %self.id, "transaction committed");
        Ok(())
    }

    /// Roll back. Always permitted on an open transaction regardless of
    /// committability. A failure during replay invalidates the transaction.
    pub fn rollback(&mut self) -> TransactionResult<()> {
        self.ensure_open()?;
        self.state = TransactionState::RollingBack;
        self.manager.deregister(self.id);
        match Self::replay_inverse(self.graph, &mut self.buffer) {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                debug!(transaction = %self.id, "transaction rolled back");
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Invalid;
                Err(e)
            }
        }
    }

    fn ensure_open(&self) -> TransactionResult<()> {
        if self.state != TransactionState::Open {
            return Err(TransactionError::InvalidState {
                expected: TransactionState::Open,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn ensure_writable(&self) -> TransactionResult<()> {
        if !self.committable {
            return Err(TransactionError::NotCommittable);
        }
        self.ensure_open()
    }

    fn replay_inverse(graph: &mut InstanceGraph, buffer: &mut UndoBuffer) -> TransactionResult<()> {
        for change in buffer.drain_reverse() {
            match change {
                Change::NodeCreated(id) => {
                    let _ = graph.remove_node(id);
                }
                Change::NodeRemoved { node, parent } => {
                    graph.restore_node(node, parent);
                }
                Change::EdgesSet {
                    node,
                    property,
                    old,
                } => match old {
                    Some(children) => {
                        graph.set_edges(node, &property, children)?;
                    }
                    None => {
                        graph.remove_edges(node, &property)?;
                    }
                },
                Change::EdgeAdded { node, property } => {
                    let mut children = graph.edges(node, &property).to_vec();
                    children.pop();
                    graph.set_edges(node, &property, children)?;
                }
                Change::EdgeReplaced {
                    node,
                    property,
                    index,
                    old,
                } => {
                    graph.replace_edge(node, &property, index, old)?;
                }
                Change::PayloadSet { node, old } => match old {
                    Some(payload) => {
                        graph.set_payload(node, payload)?;
                    }
                    None => {
                        graph.clear_payload(node)?;
                    }
                },
                Change::ClassifierSet { node, old } => match old {
                    Some(classifier) => {
                        graph.set_classifier(node, classifier)?;
                    }
                    None => {
                        graph.clear_classifier(node)?;
                    }
                },
                Change::ValidatedChanged { node, old } => {
                    if old {
                        graph.mark_validated(node)?;
                    } else {
                        graph.clear_validated(node)?;
                    }
                }
                Change::DeletionMarkChanged { node, old } => {
                    if old {
                        graph.mark_for_deletion(node)?;
                    } else {
                        graph.unmark_for_deletion(node)?;
                    }
                }
                Change::PackageChildAdded { package, child } => {
                    graph.remove_package_child(package, child)?;
                }
                Change::PackageChildRemoved {
                    package,
                    child,
                    index,
                } => {
                    let mut children = graph.edges(package, "children").to_vec();
                    let index = index.min(children.len());
                    children.insert(index, child);
                    graph.set_edges(package, "children", children)?;
                    graph.relink_parent(child, package);
                }
            }
        }
        Ok(())
    }

    // ========== Graph Mutations ==========

    /// Create a node.
    pub fn create_node(
        &mut self,
        name: Option<&str>,
        kind: NodeKind,
        span: Option<SourceSpan>,
    ) -> TransactionResult<NodeId> {
        self.ensure_writable()?;
        let id = self.graph.create_node(name, kind, span);
        self.buffer.record(Change::NodeCreated(id));
        Ok(id)
    }

    /// Remove a node; a rollback restores it under the same id. The caller
    /// unlinks any package edge first via `remove_package_child`.
    pub fn remove_node(&mut self, id: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        let (node, parent) = self.graph.remove_node(id)?;
        self.buffer.record(Change::NodeRemoved { node, parent });
        Ok(())
    }

    /// Replace the child list under a property slot.
    pub fn set_edges(
        &mut self,
        node: NodeId,
        property: &str,
        children: Vec<NodeId>,
    ) -> TransactionResult<()> {
        self.ensure_writable()?;
        let old = self.graph.set_edges(node, property, children)?;
        self.buffer.record(Change::EdgesSet {
            node,
            property: property.to_string(),
            old,
        });
        Ok(())
    }

    /// Append a child to a property slot.
    pub fn add_edge(&mut self, node: NodeId, property: &str, child: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        self.graph.add_edge(node, property, child)?;
        self.buffer.record(Change::EdgeAdded {
            node,
            property: property.to_string(),
        });
        Ok(())
    }

    /// Replace the child at one position of a property slot.
    pub fn replace_edge(
        &mut self,
        node: NodeId,
        property: &str,
        index: usize,
        child: NodeId,
    ) -> TransactionResult<NodeId> {
        self.ensure_writable()?;
        let old = self.graph.replace_edge(node, property, index, child)?;
        self.buffer.record(Change::EdgeReplaced {
            node,
            property: property.to_string(),
            index,
            old,
        });
        Ok(old)
    }

    /// Set the payload of a node.
    pub fn set_payload(&mut self, node: NodeId, payload: Payload) -> TransactionResult<()> {
        self.ensure_writable()?;
        let old = self.graph.set_payload(node, payload)?;
        self.buffer.record(Change::PayloadSet { node, old });
        Ok(())
    }

    /// Set the classifier of a node.
    pub fn set_classifier(&mut self, node: NodeId, classifier: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        let old = self.graph.set_classifier(node, classifier)?;
        self.buffer.record(Change::ClassifierSet { node, old });
        Ok(())
    }

    /// Mark a node validated.
    pub fn mark_validated(&mut self, node: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        let old = self.graph.mark_validated(node)?;
        self.buffer.record(Change::ValidatedChanged { node, old });
        Ok(())
    }

    /// Clear the validated flag.
    pub fn clear_validated(&mut self, node: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        let old = self.graph.clear_validated(node)?;
        self.buffer.record(Change::ValidatedChanged { node, old });
        Ok(())
    }

    /// Mark a node for deletion.
    pub fn mark_for_deletion(&mut self, node: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        let old = self.graph.mark_for_deletion(node)?;
        self.buffer.record(Change::DeletionMarkChanged { node, old });
        Ok(())
    }

    /// Find or create a package path.
    pub fn get_or_create_package(&mut self, path: &str) -> TransactionResult<NodeId> {
        self.ensure_writable()?;
        let creation = self.graph.get_or_create_package(path)?;
        for &pkg in &creation.created {
            self.buffer.record(Change::NodeCreated(pkg));
            if let Some(parent) = self.graph.parent_of(pkg) {
                self.buffer.record(Change::PackageChildAdded {
                    package: parent,
                    child: pkg,
                });
            }
        }
        Ok(creation.package)
    }

    /// Link a child into a package.
    pub fn add_package_child(&mut self, package: NodeId, child: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        self.graph.add_package_child(package, child)?;
        self.buffer.record(Change::PackageChildAdded { package, child });
        Ok(())
    }

    /// Unlink a child from a package.
    pub fn remove_package_child(&mut self, package: NodeId, child: NodeId) -> TransactionResult<()> {
        self.ensure_writable()?;
        let index = self
            .graph
            .edges(package, "children")
            .iter()
            .position(|&c| c == child)
            .unwrap_or(0);
        self.graph.remove_package_child(package, child)?;
        self.buffer.record(Change::PackageChildRemoved {
            package,
            child,
            index,
        });
        Ok(())
    }
}

impl Drop for Transaction<'_, '_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Open {
            let _ = self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== TEST: state_after_commit ==========
    #[test]
    fn test_state_after_commit() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let mut txn = Transaction::open(&manager, &mut graph, true);
        let id = txn.id();
        assert!(txn.is_open());
        assert!(manager.is_registered(id));

        txn.commit().unwrap();
        assert!(!txn.is_open());
        assert!(txn.is_committed());
        assert!(!txn.is_rolled_back());
        assert!(!txn.is_invalid());
        assert!(!manager.is_registered(id));
    }

    // ========== TEST: commit_non_committable ==========
    #[test]
    fn test_commit_non_committable() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let mut txn = Transaction::open(&manager, &mut graph, false);

        let err = txn.commit().unwrap_err();
        assert!(matches!(err, TransactionError::NotCommittable));
        // The transaction stays open; it was never transitioned.
        assert!(txn.is_open());
    }

    // ========== TEST: commit_after_commit ==========
    #[test]
    fn test_commit_after_commit() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let mut txn = Transaction::open(&manager, &mut graph, true);
        txn.commit().unwrap();

        let err = txn.commit().unwrap_err();
        assert!(matches!(err, TransactionError::InvalidState { .. }));
    }

    // ========== TEST: rollback_after_commit ==========
    #[test]
    fn test_rollback_after_commit() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let mut txn = Transaction::open(&manager, &mut graph, true);
        txn.commit().unwrap();

        let err = txn.rollback().unwrap_err();
        assert!(matches!(err, TransactionError::InvalidState { .. }));
    }

    // ========== TEST: state_after_rollback ==========
    #[test]
    fn test_state_after_rollback() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let mut txn = Transaction::open(&manager, &mut graph, true);
        let id = txn.id();

        txn.rollback().unwrap();
        assert!(txn.is_rolled_back());
        assert!(!txn.is_committed());
        assert!(!txn.is_invalid());
        assert!(!manager.is_registered(id));

        let err = txn.commit().unwrap_err();
        assert!(matches!(err, TransactionError::InvalidState { .. }));
    }

    // ========== TEST: rollback_allowed_on_read_only ==========
    #[test]
    fn test_rollback_allowed_on_read_only() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let mut txn = Transaction::open(&manager, &mut graph, false);
        assert!(txn.rollback().is_ok());
    }

    // ========== TEST: rollback_restores_graph ==========
    #[test]
    fn test_rollback_restores_graph() {
        // GIVEN a graph with a committed class
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let before_count;
        let before_print;
        {
            let mut txn = Transaction::open(&manager, &mut graph, true);
            let pkg = txn.get_or_create_package("model").unwrap();
            let class = txn
                .create_node(Some("Person"), NodeKind::Class, None)
                .unwrap();
            txn.add_package_child(pkg, class).unwrap();
            txn.commit().unwrap();
        }
        before_count = graph.node_count();
        before_print = graph.fingerprint();

        // WHEN a second transaction mutates heavily and rolls back
        {
            let mut txn = Transaction::open(&manager, &mut graph, true);
            let pkg = txn.get_or_create_package("model::sub").unwrap();
            let class = txn
                .create_node(Some("Employee"), NodeKind::Class, None)
                .unwrap();
            txn.add_package_child(pkg, class).unwrap();
            let person = txn.graph().get_by_user_path("model::Person").unwrap();
            txn.set_edges(class, "generalizations", vec![person]).unwrap();
            txn.mark_validated(class).unwrap();
            txn.rollback().unwrap();
        }

        // THEN node count and structure are byte-identical to the pre-open state
        assert_eq!(graph.node_count(), before_count);
        assert_eq!(graph.fingerprint(), before_print);
        assert!(graph.get_by_user_path("model::sub").is_none());
    }

    // ========== TEST: drop_of_open_transaction_rolls_back ==========
    #[test]
    fn test_drop_of_open_transaction_rolls_back() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let before = graph.fingerprint();
        {
            let mut txn = Transaction::open(&manager, &mut graph, true);
            txn.get_or_create_package("model").unwrap();
            // dropped without commit
        }
        assert_eq!(graph.fingerprint(), before);
    }

    // ========== TEST: bind_current_is_exclusive ==========
    #[test]
    fn test_bind_current_is_exclusive() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let txn = Transaction::open(&manager, &mut graph, true);

        let guard = txn.bind_current().unwrap();
        assert_eq!(manager.current(), Some(txn.id()));

        // A second binding without releasing the first fails immediately
        assert!(matches!(
            txn.bind_current().unwrap_err(),
            TransactionError::AlreadyBound
        ));

        drop(guard);
        assert_eq!(manager.current(), None);

        // After release, binding works again
        let guard = txn.bind_current().unwrap();
        drop(guard);
    }

    // ========== TEST: mutations_rejected_on_read_only ==========
    #[test]
    fn test_mutations_rejected_on_read_only() {
        let manager = TransactionManager::new();
        let mut graph = InstanceGraph::new();
        let mut txn = Transaction::open(&manager, &mut graph, false);
        let err = txn
            .create_node(Some("X"), NodeKind::Class, None)
            .unwrap_err();
        assert!(matches!(err, TransactionError::NotCommittable));
    }
}
