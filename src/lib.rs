#![forbid(unsafe_code)]

//! driftwave: indexer core for a federated, content-addressed collaborative
//! document store.
//!
//! Every change to a document is a signed, immutable, hash-named blob. The
//! [`Indexer`] consumes blobs in arbitrary arrival order and reconstructs,
//! per document, a causally consistent OT history plus membership state,
//! forwarding blobs to the peers that need them and notifying the
//! application of meaningful events.

pub mod config;
pub mod core;
pub mod error;
pub mod federation;
pub mod index;
pub mod store;
pub mod telemetry;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::config::IndexerConfig;
pub use crate::core::{
    AclDelta, ApplyOutcome, BlobRef, ClassifyError, CoreError, HistoryError, HistoryGraph,
    IdentityEngine, KeepNode, Limits, MutationNode, Node, NodeHeader, Operation, OtEngine,
    OtError, OtHistory, OtNode, PermAction, PermaNode, PermissionBits, PermissionNode,
    SCHEMA_MIMETYPE, UserId, classify, sniff_mimetype,
};
pub use crate::federation::{Federation, FederationError, NoopFederation};
pub use crate::index::{ApplicationListener, DependencyQueue, IndexError, Indexer};
pub use crate::store::{BlobStore, MemoryBlobStore, StoreError, StoredBlob};
