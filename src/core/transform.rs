//! Layer 4: Transformation and pruning primitives
//!
//! The pairwise transformation matrix over OT node kinds. The operation
//! algebra itself lives behind [`OtEngine`]: the indexer decides *which*
//! pairs transform, the engine decides *how*.

use std::collections::BTreeSet;

use super::acl::AclDelta;
use super::error::OtError;
use super::identity::BlobRef;
use super::node::{Operation, OtNode};

/// External collaborator supplying the operation algebra.
///
/// Implementations must be convergent: transforming concurrent pairs in
/// either order has to produce the same document state. The indexer applies
/// the matrix; it never inspects operation payloads.
pub trait OtEngine: Send + Sync {
    /// Classical OT transformation of two concurrent mutations.
    fn transform_mutations(
        &self,
        left: Operation,
        right: Operation,
    ) -> Result<(Operation, Operation), OtError>;

    /// Bit-set resolution of two concurrent permission deltas.
    fn transform_permissions(
        &self,
        left: AclDelta,
        right: AclDelta,
    ) -> Result<(AclDelta, AclDelta), OtError>;

    /// Sequential composition: `first` then `second` as one operation.
    fn compose(&self, first: Operation, second: Operation) -> Result<Operation, OtError>;

    /// Rebase `op` over the composed undo of pruned mutations, returning the
    /// rebased operation and the updated undo.
    fn prune_mutation(
        &self,
        op: Operation,
        undo: Operation,
    ) -> Result<(Operation, Operation), OtError>;

    /// Rebase a permission delta past a pruned set.
    fn prune_permission(
        &self,
        delta: AclDelta,
        pruned: &BTreeSet<BlobRef>,
    ) -> Result<AclDelta, OtError>;
}

/// Engine whose transformations are the identity.
///
/// Suitable for histories whose operations commute (or for embedders that
/// resolve concurrency elsewhere), and for tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityEngine;

impl OtEngine for IdentityEngine {
    fn transform_mutations(
        &self,
        left: Operation,
        right: Operation,
    ) -> Result<(Operation, Operation), OtError> {
        Ok((left, right))
    }

    fn transform_permissions(
        &self,
        left: AclDelta,
        right: AclDelta,
    ) -> Result<(AclDelta, AclDelta), OtError> {
        Ok((left, right))
    }

    fn compose(&self, first: Operation, _second: Operation) -> Result<Operation, OtError> {
        Ok(first)
    }

    fn prune_mutation(
        &self,
        op: Operation,
        undo: Operation,
    ) -> Result<(Operation, Operation), OtError> {
        Ok((op, undo))
    }

    fn prune_permission(
        &self,
        delta: AclDelta,
        _pruned: &BTreeSet<BlobRef>,
    ) -> Result<AclDelta, OtError> {
        Ok(delta)
    }
}

/// Pairwise transform per the kind matrix.
///
/// Mutation x Mutation and Permission x Permission go through the engine;
/// every pair involving a keep, and every cross-kind pair, is the identity.
/// Keeps are order-only markers and never need transformation. The matrix is
/// closed over [`OtNode`], so an unknown combination cannot be represented.
pub fn transform(
    engine: &dyn OtEngine,
    left: OtNode,
    right: OtNode,
) -> Result<(OtNode, OtNode), OtError> {
    match (left, right) {
        (OtNode::Mutation(mut m1), OtNode::Mutation(mut m2)) => {
            let (op1, op2) = engine.transform_mutations(m1.operation, m2.operation)?;
            m1.operation = op1;
            m2.operation = op2;
            Ok((OtNode::Mutation(m1), OtNode::Mutation(m2)))
        }
        (OtNode::Permission(mut p1), OtNode::Permission(mut p2)) => {
            let (d1, d2) = engine.transform_permissions(p1.delta, p2.delta)?;
            p1.delta = d1;
            p2.delta = d2;
            Ok((OtNode::Permission(p1), OtNode::Permission(p2)))
        }
        (left, right) => Ok((left, right)),
    }
}

/// Fold [`transform`] across a sequence, returning the transformed sequence
/// and the node rebased past all of it.
pub fn transform_seq(
    engine: &dyn OtEngine,
    nodes: Vec<OtNode>,
    node: OtNode,
) -> Result<(Vec<OtNode>, OtNode), OtError> {
    let mut transformed = Vec::with_capacity(nodes.len());
    let mut carried = node;
    for n in nodes {
        let (tn, tc) = transform(engine, n, carried)?;
        transformed.push(tn);
        carried = tc;
    }
    Ok((transformed, carried))
}

/// Remove `prune` from a history sequence.
///
/// Later mutations are rebased through the composed undo of everything
/// pruned so far; later permissions are rebased by the engine's
/// prune_permission; keeps pass through. Pruned permissions and keeps are
/// dropped silently.
pub fn prune_seq(
    engine: &dyn OtEngine,
    nodes: Vec<OtNode>,
    prune: &BTreeSet<BlobRef>,
) -> Result<Vec<OtNode>, OtError> {
    let mut result = Vec::with_capacity(nodes.len());
    let mut undo: Option<Operation> = None;

    for node in nodes {
        if !prune.contains(node.blob_ref()) {
            let Some(current_undo) = undo.take() else {
                // Nothing pruned yet, nothing to rebase over.
                result.push(node);
                continue;
            };
            match node {
                OtNode::Mutation(mut m) => {
                    let (op, next_undo) = engine.prune_mutation(m.operation, current_undo)?;
                    m.operation = op;
                    undo = Some(next_undo);
                    result.push(OtNode::Mutation(m));
                }
                OtNode::Permission(mut p) => {
                    p.delta = engine.prune_permission(p.delta, prune)?;
                    undo = Some(current_undo);
                    result.push(OtNode::Permission(p));
                }
                OtNode::Keep(k) => {
                    undo = Some(current_undo);
                    result.push(OtNode::Keep(k));
                }
            }
            continue;
        }

        if let OtNode::Mutation(m) = node {
            undo = Some(match undo.take() {
                None => m.operation,
                Some(u) => engine.compose(u, m.operation)?,
            });
        }
    }

    Ok(result)
}
