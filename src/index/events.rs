//! Application-facing events.
//!
//! The indexer reports logically meaningful milestones to registered
//! listeners. All methods have empty defaults so a listener implements only
//! what it cares about. Callbacks run synchronously inside `handle_blob`;
//! listeners must not re-enter the indexer.

use crate::core::{BlobRef, MutationNode, PermAction, PermissionNode, UserId};

/// Observer of indexing milestones.
pub trait ApplicationListener: Send + Sync {
    /// An invitation for the local user arrived. May precede the document
    /// content; the user should be prompted to accept before the data is
    /// complete.
    fn invitation(&self, _perma: &BlobRef, _invitation: &BlobRef) {}

    /// The local user's keep for an invitation was seen. Level-triggered:
    /// when the keep precedes its cited permission this fires once while
    /// waiting and again when the keep is applied.
    fn accepted_invitation(&self, _perma: &BlobRef, _invitation: &BlobRef, _keep: &BlobRef) {}

    /// A permanode became kept: by its owner (`invitation` is None) or by
    /// the local user completing an acceptance.
    fn perma_node(&self, _perma: &BlobRef, _invitation: Option<&BlobRef>, _keep: &BlobRef) {}

    /// A remote user accepted an invitation to a document we follow.
    fn new_follower(&self, _perma: &BlobRef, _invitation: &BlobRef, _keep: &BlobRef, _user: &UserId) {
    }

    /// A mutation was applied. The node carries its transformed operation.
    fn mutation(&self, _perma: &BlobRef, _mutation: &MutationNode) {}

    /// A permission was applied. The node carries its transformed delta.
    fn permission(&self, _perma: &BlobRef, _action: PermAction, _permission: &PermissionNode) {}
}
