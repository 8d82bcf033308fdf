//! Indexer configuration.

use serde::{Deserialize, Serialize};

use crate::core::{Limits, UserId};

/// Everything an indexer needs to know about its environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// The local user. Blobs signed by this user are forwarded to
    /// followers; invitations targeting it raise application events.
    pub user: UserId,
    #[serde(default)]
    pub limits: Limits,
}

impl IndexerConfig {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            limits: Limits::default(),
        }
    }
}
