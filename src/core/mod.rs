//! Core domain types for driftwave (Layers 1-7)
//!
//! Module hierarchy follows type dependency order:
//! - identity: BlobRef, UserId (Layer 1)
//! - acl: PermissionBits, PermAction, AclDelta (Layer 2)
//! - node: NodeHeader, the four node kinds, Node/OtNode (Layer 3)
//! - transform: OtEngine seam, pairwise matrix, pruning (Layer 4)
//! - history: OtHistory with frontier and permission fold (Layer 5)
//! - graph: two-frontier delta walk (Layer 6)
//! - schema: wire envelope and classification (Layer 7)

pub mod acl;
pub mod error;
pub mod graph;
pub mod history;
pub mod identity;
pub mod limits;
pub mod node;
pub mod schema;
pub mod transform;

pub use acl::{AclDelta, PermAction, PermissionBits};
pub use error::{
    ClassifyError, CoreError, HistoryError, InvalidId, InvalidPermAction, OtError,
};
pub use graph::HistoryGraph;
pub use history::{ApplyOutcome, OtHistory};
pub use identity::{BlobRef, UserId};
pub use limits::Limits;
pub use node::{
    KeepNode, MutationNode, Node, NodeHeader, Operation, OtNode, PermaNode, PermissionNode,
};
pub use schema::{SCHEMA_MIMETYPE, classify, sniff_mimetype};
pub use transform::{IdentityEngine, OtEngine, prune_seq, transform, transform_seq};
