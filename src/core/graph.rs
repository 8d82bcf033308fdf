//! Layer 6: Frontier-delta reachability
//!
//! Decides which history nodes a remote follower lacks, given the local
//! frontier and the frontier the follower declared in its keep. The walk
//! substitutes each visited node for its dependencies, propagating
//! remote-reachability, and settles once every open path is known to the
//! remote.

use std::collections::BTreeMap;

use super::identity::BlobRef;

/// Two-frontier walk state.
///
/// Drive it over a history in reverse causal order: call
/// [`substitute`](HistoryGraph::substitute) for every node, stop as soon as
/// [`is_settled`](HistoryGraph::is_settled) turns true.
#[derive(Debug)]
pub struct HistoryGraph {
    /// Open blobrefs still to be accounted for. The flag records whether the
    /// ref is reachable from the remote frontier.
    open: BTreeMap<BlobRef, bool>,
    /// Open entries not (yet) known to the remote.
    local_only: usize,
}

impl HistoryGraph {
    pub fn new<'a>(
        local_frontier: impl IntoIterator<Item = &'a BlobRef>,
        remote_frontier: impl IntoIterator<Item = &'a BlobRef>,
    ) -> Self {
        let mut open = BTreeMap::new();
        for blobref in local_frontier {
            open.insert(blobref.clone(), false);
        }
        for blobref in remote_frontier {
            open.insert(blobref.clone(), true);
        }
        let local_only = open.values().filter(|&&remote| !remote).count();
        Self { open, local_only }
    }

    /// Replace a node by its dependencies.
    ///
    /// Returns true when the remote frontier already covers the node, in
    /// which case it needs no forwarding. A node the walk never opened is
    /// reported as covered; over a well-formed history every entry is opened
    /// by a successor before the reverse walk reaches it.
    pub fn substitute(&mut self, blobref: &BlobRef, deps: &[BlobRef]) -> bool {
        let Some(remote) = self.open.remove(blobref) else {
            return true;
        };
        if !remote {
            self.local_only -= 1;
        }
        for dep in deps {
            match self.open.get_mut(dep) {
                Some(flag) => {
                    if !*flag && remote {
                        *flag = true;
                        self.local_only -= 1;
                    }
                }
                None => {
                    self.open.insert(dep.clone(), remote);
                    if !remote {
                        self.local_only += 1;
                    }
                }
            }
        }
        remote
    }

    /// True once the remote has caught up: no open path is local-only.
    /// Remote-frontier refs unknown to the local history stay open but do
    /// not count.
    pub fn is_settled(&self) -> bool {
        self.local_only == 0
    }
}
