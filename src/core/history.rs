//! Layer 5: Per-document OT history
//!
//! An ordered, causally-consistent sequence of applied OT nodes with a
//! frontier and a folded permission map. Application order is a linear
//! extension of the causal order: a node is admitted only once every one of
//! its dependencies has been applied, and is transformed against everything
//! concurrent with it before being appended.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::acl::PermissionBits;
use super::error::HistoryError;
use super::identity::{BlobRef, UserId};
use super::node::OtNode;
use super::transform::{OtEngine, transform};

/// Result of [`OtHistory::apply`].
#[derive(Clone, Debug)]
pub enum ApplyOutcome {
    /// The node was transformed and appended; this is the applied form.
    Applied(OtNode),
    /// Dependencies absent from this history. Nothing was changed; the
    /// caller queues the node until they arrive.
    Missing(Vec<BlobRef>),
}

/// The OT history of one permanode.
#[derive(Clone, Debug)]
pub struct OtHistory {
    owner: UserId,
    /// Applied nodes in application order.
    entries: Vec<OtNode>,
    index: BTreeMap<BlobRef, usize>,
    /// Applied nodes with no applied successor.
    frontier: BTreeSet<BlobRef>,
    /// Folded capability map. The owner is pre-granted every bit.
    permissions: BTreeMap<UserId, PermissionBits>,
}

impl OtHistory {
    pub fn new(owner: UserId) -> Self {
        let mut permissions = BTreeMap::new();
        permissions.insert(owner.clone(), PermissionBits::ALL);
        Self {
            owner,
            entries: Vec::new(),
            index: BTreeMap::new(),
            frontier: BTreeSet::new(),
            permissions,
        }
    }

    /// Integrate an incoming node.
    ///
    /// Missing dependencies abort the application without side effects.
    /// Otherwise the node is transformed against every concurrent history
    /// node (those not in the causal past of its dependencies) in history
    /// order, appended, and the frontier and permission map are updated.
    pub fn apply(
        &mut self,
        node: OtNode,
        engine: &dyn OtEngine,
    ) -> Result<ApplyOutcome, HistoryError> {
        if self.index.contains_key(node.blob_ref()) {
            return Err(HistoryError::DuplicateNode {
                blobref: node.blob_ref().clone(),
            });
        }

        let missing: Vec<BlobRef> = node
            .dependencies()
            .iter()
            .filter(|dep| !self.index.contains_key(dep))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Ok(ApplyOutcome::Missing(missing));
        }

        let past = self.causal_past(node.dependencies());
        let mut carried = node;
        for entry in &self.entries {
            if past.contains(entry.blob_ref()) {
                continue;
            }
            let (_, rebased) = transform(engine, entry.clone(), carried)?;
            carried = rebased;
        }

        for dep in carried.dependencies() {
            self.frontier.remove(dep);
        }
        self.frontier.insert(carried.blob_ref().clone());

        if let OtNode::Permission(perm) = &carried {
            let bits = self
                .permissions
                .get(&perm.user)
                .copied()
                .unwrap_or(PermissionBits::NONE);
            self.permissions.insert(perm.user.clone(), perm.delta.fold_into(bits));
        }

        self.index.insert(carried.blob_ref().clone(), self.entries.len());
        self.entries.push(carried.clone());
        Ok(ApplyOutcome::Applied(carried))
    }

    /// Transitive closure of `deps` through this history.
    fn causal_past(&self, deps: &[BlobRef]) -> BTreeSet<BlobRef> {
        let mut past = BTreeSet::new();
        let mut queue: VecDeque<&BlobRef> = deps.iter().collect();
        while let Some(blobref) = queue.pop_front() {
            if !past.insert(blobref.clone()) {
                continue;
            }
            if let Some(&at) = self.index.get(blobref) {
                queue.extend(self.entries[at].dependencies());
            }
        }
        past
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn contains(&self, blobref: &BlobRef) -> bool {
        self.index.contains_key(blobref)
    }

    pub fn get(&self, blobref: &BlobRef) -> Option<&OtNode> {
        self.index.get(blobref).map(|&at| &self.entries[at])
    }

    /// Applied nodes in causal order. Reverse with `.rev()`.
    pub fn iter(&self) -> std::slice::Iter<'_, OtNode> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frontier(&self) -> &BTreeSet<BlobRef> {
        &self.frontier
    }

    pub fn permissions(&self) -> &BTreeMap<UserId, PermissionBits> {
        &self.permissions
    }

    pub fn has_permission(&self, user: &UserId, mask: PermissionBits) -> bool {
        self.permissions
            .get(user)
            .is_some_and(|bits| bits.contains(mask))
    }
}
