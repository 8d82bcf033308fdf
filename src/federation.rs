//! Federation capability: forwarding blobs to peers.
//!
//! Injected into the indexer and possibly absent. The indexer only issues
//! fire-and-forget calls; delivery ordering across the network is the
//! peers' dependency queues' problem, not ours.

use thiserror::Error;

use crate::core::{BlobRef, UserId};

#[derive(Debug, Error)]
#[error("federation: {reason}")]
pub struct FederationError {
    pub reason: String,
}

impl FederationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Peer-to-peer transport for blobs.
pub trait Federation: Send + Sync {
    /// Send a blob to each named user's store.
    fn forward(&self, blobref: &BlobRef, users: &[UserId]);

    /// Fetch the full history of the permanode behind an invitation from
    /// the inviter's domain. Completion surfaces through the local blob
    /// store, never through a return path.
    fn download_perma_node(&self, permission: &BlobRef) -> Result<(), FederationError>;
}

/// Federation that drops everything. For single-store deployments and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopFederation;

impl Federation for NoopFederation {
    fn forward(&self, blobref: &BlobRef, users: &[UserId]) {
        tracing::debug!(%blobref, count = users.len(), "dropping forward, federation disabled");
    }

    fn download_perma_node(&self, _permission: &BlobRef) -> Result<(), FederationError> {
        Ok(())
    }
}
