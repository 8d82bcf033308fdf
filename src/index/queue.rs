//! Dependency-waiting queue.
//!
//! Blobs that arrive before their causal predecessors wait here. The queue
//! tracks refs only, never bytes: released waiters are re-fetched from the
//! store, keeping memory proportional to outstanding references.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::BlobRef;

/// Waiter bookkeeping: who waits, on what, and how much is left.
#[derive(Debug, Default)]
pub struct DependencyQueue {
    /// Every blob currently waiting.
    waiting: BTreeSet<BlobRef>,
    /// For each missing dependency, its waiters in enqueue order.
    waiters_by_dep: BTreeMap<BlobRef, Vec<BlobRef>>,
    /// Remaining unsatisfied dependency count per waiter.
    pending: BTreeMap<BlobRef, usize>,
}

impl DependencyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `waiter` cannot proceed until every `dep` is indexed.
    ///
    /// Callers pass only dependencies that are actually missing, and a
    /// waiter enters the queue at most once in its lifetime.
    pub fn enqueue(&mut self, waiter: BlobRef, deps: impl IntoIterator<Item = BlobRef>) {
        debug_assert!(
            !self.waiting.contains(&waiter),
            "waiter {waiter} enqueued twice"
        );
        let mut count = 0;
        for dep in deps {
            self.waiters_by_dep.entry(dep).or_default().push(waiter.clone());
            count += 1;
        }
        debug_assert!(count > 0, "waiter {waiter} enqueued with no dependencies");
        self.pending.insert(waiter.clone(), count);
        self.waiting.insert(waiter);
    }

    /// Release waiters unblocked by `just_indexed`, in their enqueue order.
    ///
    /// A waiter is emitted only when its last outstanding dependency is
    /// satisfied.
    pub fn dequeue(&mut self, just_indexed: &BlobRef) -> Vec<BlobRef> {
        let Some(waiters) = self.waiters_by_dep.remove(just_indexed) else {
            return Vec::new();
        };
        let mut released = Vec::new();
        for waiter in waiters {
            let Some(remaining) = self.pending.get_mut(&waiter) else {
                continue;
            };
            *remaining -= 1;
            if *remaining == 0 {
                self.pending.remove(&waiter);
                self.waiting.remove(&waiter);
                released.push(waiter);
            }
        }
        released
    }

    pub fn is_waiting(&self, blobref: &BlobRef) -> bool {
        self.waiting.contains(blobref)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Waiters that can never be released because a dependency was rejected.
    ///
    /// A rejected ancestor makes the whole causal subtree inadmissible, so
    /// these are reported as a diagnostic rather than garbage-collected.
    /// Transitive: a waiter blocked only by another stranded waiter is
    /// stranded too.
    pub fn stranded<'a>(
        &self,
        rejected: impl IntoIterator<Item = &'a BlobRef>,
    ) -> BTreeSet<BlobRef> {
        let mut dead: BTreeSet<BlobRef> = rejected.into_iter().cloned().collect();
        let mut stranded = BTreeSet::new();
        loop {
            let mut grew = false;
            for (dep, waiters) in &self.waiters_by_dep {
                if !dead.contains(dep) {
                    continue;
                }
                for waiter in waiters {
                    if stranded.insert(waiter.clone()) {
                        dead.insert(waiter.clone());
                        grew = true;
                    }
                }
            }
            if !grew {
                return stranded;
            }
        }
    }
}
