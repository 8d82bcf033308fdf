//! Layer 3: The node graph
//!
//! Four node kinds share a common header: PermaNode (document root),
//! MutationNode (OT content change), PermissionNode (membership/ACL change),
//! KeepNode (membership acknowledgement). Nodes never hold references to
//! other nodes; every relationship is a [`BlobRef`] resolved through the
//! indexer's node map, so the graph stays acyclic by construction.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::acl::{AclDelta, PermAction, PermissionBits};
use super::history::OtHistory;
use super::identity::{BlobRef, UserId};

/// Opaque OT operation payload.
///
/// The indexer never interprets this; only the external engine does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(pub serde_json::Value);

/// Attributes common to every node kind.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeHeader {
    pub blobref: BlobRef,
    pub signer: UserId,
    /// Seconds since epoch. Informational; never used for ordering.
    pub timestamp: i64,
    /// The permanode this node belongs to. None only for document roots.
    pub parent: Option<BlobRef>,
}

/// The root node of a document.
///
/// Carries the membership state the indexer maintains: which users keep the
/// document, which invitations are outstanding, and the OT history of its
/// content. The signer is the owner and implicitly holds every permission
/// bit.
#[derive(Clone, Debug)]
pub struct PermaNode {
    header: NodeHeader,
    keeps: BTreeMap<UserId, BlobRef>,
    pending_invitations: BTreeMap<UserId, BlobRef>,
    ot: OtHistory,
}

impl PermaNode {
    pub fn new(header: NodeHeader) -> Self {
        let ot = OtHistory::new(header.signer.clone());
        Self {
            header,
            keeps: BTreeMap::new(),
            pending_invitations: BTreeMap::new(),
            ot,
        }
    }

    pub fn blob_ref(&self) -> &BlobRef {
        &self.header.blobref
    }

    /// The document owner.
    pub fn signer(&self) -> &UserId {
        &self.header.signer
    }

    pub fn header(&self) -> &NodeHeader {
        &self.header
    }

    pub fn ot(&self) -> &OtHistory {
        &self.ot
    }

    pub(crate) fn ot_mut(&mut self) -> &mut OtHistory {
        &mut self.ot
    }

    /// Keep blobrefs by user, owner included.
    pub fn keeps(&self) -> &BTreeMap<UserId, BlobRef> {
        &self.keeps
    }

    /// Invitations applied but not yet answered by a keep.
    pub fn pending_invitations(&self) -> &BTreeMap<UserId, BlobRef> {
        &self.pending_invitations
    }

    pub fn has_keep(&self, user: &UserId) -> bool {
        self.keeps.contains_key(user)
    }

    /// The owner passes any mask; everyone else is checked against the
    /// folded permission map.
    pub fn has_permission(&self, user: &UserId, mask: PermissionBits) -> bool {
        if self.header.signer == *user {
            return true;
        }
        self.ot.has_permission(user, mask)
    }

    /// Every user holding a keep.
    pub fn followers(&self) -> Vec<UserId> {
        self.keeps.keys().cloned().collect()
    }

    /// Keep-holders that pass the permission mask. The owner always passes.
    pub fn followers_with_permission(&self, mask: PermissionBits) -> Vec<UserId> {
        self.keeps
            .keys()
            .filter(|user| {
                mask.is_empty()
                    || self.header.signer == **user
                    || self.ot.has_permission(user, mask)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn insert_keep(&mut self, user: UserId, keep: BlobRef) {
        self.keeps.insert(user, keep);
    }

    pub(crate) fn record_invitation(&mut self, user: UserId, permission: BlobRef) {
        self.pending_invitations.insert(user, permission);
    }

    pub(crate) fn clear_invitation(&mut self, user: &UserId) -> Option<BlobRef> {
        self.pending_invitations.remove(user)
    }
}

/// An OT content change.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationNode {
    pub header: NodeHeader,
    pub operation: Operation,
    pub site: String,
    pub dependencies: Vec<BlobRef>,
}

/// A membership/ACL change. An `Invite` doubles as an invitation.
#[derive(Clone, Debug, PartialEq)]
pub struct PermissionNode {
    pub header: NodeHeader,
    pub user: UserId,
    pub delta: AclDelta,
    pub action: PermAction,
    pub dependencies: Vec<BlobRef>,
}

/// A user's acknowledgement of document membership.
///
/// `permission` cites the accepted invitation; it is None only for the
/// owner's own keep.
#[derive(Clone, Debug, PartialEq)]
pub struct KeepNode {
    pub header: NodeHeader,
    pub permission: Option<BlobRef>,
    pub dependencies: Vec<BlobRef>,
}

/// Any indexed node.
#[derive(Clone, Debug)]
pub enum Node {
    Perma(PermaNode),
    Mutation(MutationNode),
    Permission(PermissionNode),
    Keep(KeepNode),
}

impl Node {
    pub fn header(&self) -> &NodeHeader {
        match self {
            Node::Perma(n) => &n.header,
            Node::Mutation(n) => &n.header,
            Node::Permission(n) => &n.header,
            Node::Keep(n) => &n.header,
        }
    }

    pub fn blob_ref(&self) -> &BlobRef {
        &self.header().blobref
    }

    pub fn signer(&self) -> &UserId {
        &self.header().signer
    }

    pub fn parent(&self) -> Option<&BlobRef> {
        self.header().parent.as_ref()
    }

    pub fn timestamp(&self) -> i64 {
        self.header().timestamp
    }

    /// Explicit causal predecessors. Empty for permanodes.
    pub fn dependencies(&self) -> &[BlobRef] {
        match self {
            Node::Perma(_) => &[],
            Node::Mutation(n) => &n.dependencies,
            Node::Permission(n) => &n.dependencies,
            Node::Keep(n) => &n.dependencies,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Perma(_) => "permanode",
            Node::Mutation(_) => "mutation",
            Node::Permission(_) => "permission",
            Node::Keep(_) => "keep",
        }
    }
}

/// A node eligible for OT application: everything but a permanode.
#[derive(Clone, Debug)]
pub enum OtNode {
    Mutation(MutationNode),
    Permission(PermissionNode),
    Keep(KeepNode),
}

impl OtNode {
    pub fn header(&self) -> &NodeHeader {
        match self {
            OtNode::Mutation(n) => &n.header,
            OtNode::Permission(n) => &n.header,
            OtNode::Keep(n) => &n.header,
        }
    }

    pub fn blob_ref(&self) -> &BlobRef {
        &self.header().blobref
    }

    pub fn signer(&self) -> &UserId {
        &self.header().signer
    }

    pub fn dependencies(&self) -> &[BlobRef] {
        match self {
            OtNode::Mutation(n) => &n.dependencies,
            OtNode::Permission(n) => &n.dependencies,
            OtNode::Keep(n) => &n.dependencies,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OtNode::Mutation(_) => "mutation",
            OtNode::Permission(_) => "permission",
            OtNode::Keep(_) => "keep",
        }
    }
}

impl From<OtNode> for Node {
    fn from(node: OtNode) -> Node {
        match node {
            OtNode::Mutation(n) => Node::Mutation(n),
            OtNode::Permission(n) => Node::Permission(n),
            OtNode::Keep(n) => Node::Keep(n),
        }
    }
}

impl TryFrom<Node> for OtNode {
    type Error = Node;

    fn try_from(node: Node) -> Result<OtNode, Node> {
        match node {
            Node::Mutation(n) => Ok(OtNode::Mutation(n)),
            Node::Permission(n) => Ok(OtNode::Permission(n)),
            Node::Keep(n) => Ok(OtNode::Keep(n)),
            other @ Node::Perma(_) => Err(other),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.blob_ref())
    }
}
