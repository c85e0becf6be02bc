//! Unbind phase: physically detach edges a processor created, so a node can
//! be re-processed after its references were invalidated.

use crate::PipelineResult;
use loam_core::{NodeId, NodeKind};
use loam_transaction::Transaction;

/// An unbind-phase handler for one node kind.
pub trait Unbinder {
    fn kind(&self) -> NodeKind;

    fn unbind(&self, txn: &mut Transaction<'_, '_>, node: NodeId) -> PipelineResult<()>;
}

/// Run the unbind phase over a set of nodes, routing each through its
/// registered unbinder; nodes without one are untouched.
pub fn run_unbinders(
    txn: &mut Transaction<'_, '_>,
    matcher: &crate::Matcher,
    nodes: &[NodeId],
) -> PipelineResult<()> {
    let mut ordered = nodes.to_vec();
    ordered.sort_unstable();
    for node in ordered {
        let kind = match txn.graph().get_node(node) {
            Some(n) => n.kind,
            None => continue,
        };
        if let Some(unbinder) = matcher.unbinder_for(kind) {
            unbinder.unbind(txn, node)?;
        }
    }
    Ok(())
}

/// Detaches the `resolved` edge of a stub, restoring it to its parsed state
/// so the next process phase resolves it afresh.
pub struct ImportStubUnbinder;

impl Unbinder for ImportStubUnbinder {
    fn kind(&self) -> NodeKind {
        NodeKind::ImportStub
    }

    fn unbind(&self, txn: &mut Transaction<'_, '_>, node: NodeId) -> PipelineResult<()> {
        if txn.graph().to_one(node, "resolved").is_some() {
            txn.set_edges(node, "resolved", Vec::new())?;
        }
        Ok(())
    }
}

/// Removes the association's ends from the classes they were wired onto.
pub struct AssociationUnbinder;

impl Unbinder for AssociationUnbinder {
    fn kind(&self) -> NodeKind {
        NodeKind::Association
    }

    fn unbind(&self, txn: &mut Transaction<'_, '_>, node: NodeId) -> PipelineResult<()> {
        let ends: Vec<NodeId> = txn.graph().edges(node, "properties").to_vec();
        if ends.len() != 2 {
            return Ok(());
        }
        for i in 0..2 {
            let end = ends[i];
            let target = match crate::end_target_class(txn.graph(), ends[1 - i]) {
                Some(t) => t,
                None => continue,
            };
            let remaining: Vec<NodeId> = txn
                .graph()
                .edges(target, "propertiesFromAssociations")
                .iter()
                .copied()
                .filter(|&p| p != end)
                .collect();
            if remaining.len() != txn.graph().edges(target, "propertiesFromAssociations").len() {
                txn.set_edges(target, "propertiesFromAssociations", remaining)?;
            }
        }
        Ok(())
    }
}
