//! Indexing pipeline errors: cross-reference and policy refusals.
//!
//! A blob hitting one of these is recorded as rejected. Its waiters stay
//! queued forever; a rejected ancestor poisons the whole causal subtree.

use thiserror::Error;

use crate::core::{BlobRef, UserId};
use crate::error::{Effect, Transience};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IndexError {
    /// The cited parent exists but is not a permanode.
    #[error("blob {blobref} cites parent {parent} which is not a permanode")]
    ParentNotPermaNode { blobref: BlobRef, parent: BlobRef },

    /// An OT-eligible node without a parent permanode.
    #[error("{kind} blob {blobref} has no parent permanode")]
    MissingParent {
        blobref: BlobRef,
        kind: &'static str,
    },

    /// A keep on a foreign permanode must cite the invitation it accepts.
    #[error("keep {blobref} on a foreign permanode cites no permission")]
    KeepWithoutPermission { blobref: BlobRef },

    /// The blob a keep cites as its permission is something else.
    #[error("keep {blobref} cites {permission} which is not a permission")]
    KeepCitesNonPermission {
        blobref: BlobRef,
        permission: BlobRef,
    },

    /// The cited invitation targets a different user than the keep's signer.
    #[error("keep {blobref} signed by {signer} cites an invitation for {invited}")]
    KeepUserMismatch {
        blobref: BlobRef,
        signer: UserId,
        invited: UserId,
    },

    #[error("failed to encode schema blob: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to format timestamp: {0}")]
    FormatTimestamp(#[from] time::error::Format),
}

impl IndexError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
