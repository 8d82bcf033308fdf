//! The indexer: blobs in arbitrary arrival order, causal graphs out.
//!
//! A passive component driven by one event: a blob was stored. Each blob is
//! classified, parked until its causal predecessors are indexed, applied to
//! its document's OT history, folded into membership state, and forwarded
//! to the peers that need it. Single-threaded cooperative: callers
//! serialize `handle_blob`, which recurses through released waiters.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::IndexerConfig;
use crate::core::{
    ApplyOutcome, BlobRef, HistoryGraph, KeepNode, Limits, MutationNode, Node, Operation, OtEngine,
    OtNode, PermAction, PermaNode, PermissionBits, PermissionNode, SCHEMA_MIMETYPE, UserId,
    classify, sniff_mimetype,
};
use crate::error::Error;
use crate::federation::Federation;
use crate::store::{BlobStore, StoredBlob};

use super::error::IndexError;
use super::events::ApplicationListener;
use super::queue::DependencyQueue;

/// How a schema blob left the pipeline.
enum SchemaOutcome {
    /// Indexed; `perma` names the document the federation step consults.
    Applied { perma: BlobRef },
    /// Queued on missing dependencies. No state beyond the queue changed.
    Pending,
    Rejected(Error),
}

/// Verdict of the pre-apply keep inspection.
enum KeepCheck {
    Accept,
    /// The cited permission has not been indexed yet.
    Waiting(BlobRef),
    Reject(Error),
}

/// Per-store indexer for one local user.
pub struct Indexer {
    user: UserId,
    limits: Limits,
    /// Every successfully applied node.
    nodes: BTreeMap<BlobRef, Node>,
    /// Processing record: true = indexed, false = rejected. Blobs waiting on
    /// dependencies have no entry.
    blobs: BTreeMap<BlobRef, bool>,
    queue: DependencyQueue,
    /// Invitations to the local user not yet answered by a keep, keyed by
    /// permanode.
    open_invitations: BTreeMap<BlobRef, BlobRef>,
    store: Arc<dyn BlobStore>,
    federation: Option<Arc<dyn Federation>>,
    engine: Arc<dyn OtEngine>,
    listeners: Vec<Box<dyn ApplicationListener>>,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        store: Arc<dyn BlobStore>,
        engine: Arc<dyn OtEngine>,
    ) -> Self {
        Self {
            user: config.user,
            limits: config.limits,
            nodes: BTreeMap::new(),
            blobs: BTreeMap::new(),
            queue: DependencyQueue::new(),
            open_invitations: BTreeMap::new(),
            store,
            federation: None,
            engine,
            listeners: Vec::new(),
        }
    }

    pub fn with_federation(mut self, federation: Arc<dyn Federation>) -> Self {
        self.federation = Some(federation);
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn ApplicationListener>) {
        self.listeners.push(listener);
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn node(&self, blobref: &BlobRef) -> Option<&Node> {
        self.nodes.get(blobref)
    }

    pub fn perma_node(&self, blobref: &BlobRef) -> Option<&PermaNode> {
        match self.nodes.get(blobref) {
            Some(Node::Perma(perma)) => Some(perma),
            _ => None,
        }
    }

    pub fn permission_node(&self, blobref: &BlobRef) -> Option<&PermissionNode> {
        match self.nodes.get(blobref) {
            Some(Node::Permission(perm)) => Some(perm),
            _ => None,
        }
    }

    /// Processing record for a blob: true = indexed, false = rejected,
    /// None = never seen or still waiting.
    pub fn is_processed(&self, blobref: &BlobRef) -> Option<bool> {
        self.blobs.get(blobref).copied()
    }

    pub fn is_waiting(&self, blobref: &BlobRef) -> bool {
        self.queue.is_waiting(blobref)
    }

    pub fn waiting_count(&self) -> usize {
        self.queue.waiting_count()
    }

    /// Invitations to the local user awaiting acceptance, permanode keyed.
    pub fn open_invitations(&self) -> &BTreeMap<BlobRef, BlobRef> {
        &self.open_invitations
    }

    /// Waiters that can never be released because an ancestor was rejected.
    pub fn stranded_blobs(&self) -> BTreeSet<BlobRef> {
        let rejected: Vec<&BlobRef> = self
            .blobs
            .iter()
            .filter_map(|(blobref, &ok)| (!ok).then_some(blobref))
            .collect();
        self.queue.stranded(rejected)
    }

    /// Pump a store subscription dry, funneling announcements into the
    /// indexer's serialization domain.
    pub fn drain(&mut self, rx: &crossbeam::channel::Receiver<StoredBlob>) -> usize {
        let mut handled = 0;
        while let Ok(stored) = rx.try_recv() {
            self.handle_blob(&stored.bytes, &stored.blobref);
            handled += 1;
        }
        handled
    }

    /// Entry point: a blob identified by `blobref` was stored.
    pub fn handle_blob(&mut self, bytes: &[u8], blobref: &BlobRef) {
        if self.blobs.contains_key(blobref) {
            tracing::trace!(%blobref, "blob already handled");
            return;
        }
        if sniff_mimetype(bytes) != SCHEMA_MIMETYPE {
            // External binary content passes through unindexed.
            tracing::trace!(%blobref, "ignoring non-schema blob");
            return;
        }

        match self.handle_schema_blob(bytes, blobref) {
            SchemaOutcome::Applied { perma } => {
                // Forward before releasing waiters so peers see causally
                // ordered streams.
                self.forward_to_followers(blobref, &perma);
                self.blobs.insert(blobref.clone(), true);
                self.release_waiters(blobref);
            }
            SchemaOutcome::Pending => {}
            SchemaOutcome::Rejected(err) => {
                tracing::warn!(%blobref, error = %err, "rejecting blob");
                self.blobs.insert(blobref.clone(), false);
            }
        }
    }

    fn handle_schema_blob(&mut self, bytes: &[u8], blobref: &BlobRef) -> SchemaOutcome {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let node = match classify(bytes, blobref, &self.limits, now) {
            Ok(node) => node,
            Err(err) => return SchemaOutcome::Rejected(crate::core::CoreError::from(err).into()),
        };

        // Resolve the governing permanode. A node arriving before its
        // document root parks until the root is indexed.
        let perma_ref = match node.parent() {
            Some(parent) => match self.nodes.get(parent) {
                None => {
                    tracing::debug!(%blobref, %parent, "waiting for parent permanode");
                    self.queue.enqueue(blobref.clone(), [parent.clone()]);
                    return SchemaOutcome::Pending;
                }
                Some(Node::Perma(_)) => parent.clone(),
                Some(_) => {
                    return SchemaOutcome::Rejected(
                        IndexError::ParentNotPermaNode {
                            blobref: blobref.clone(),
                            parent: parent.clone(),
                        }
                        .into(),
                    );
                }
            },
            None => blobref.clone(),
        };

        let ot_node = match node {
            Node::Perma(perma) => {
                self.nodes.insert(blobref.clone(), Node::Perma(perma));
                tracing::debug!(%blobref, "indexed permanode");
                // A fresh permanode is its own document; it has no followers
                // yet, so the federation step is a no-op for it.
                return SchemaOutcome::Applied {
                    perma: blobref.clone(),
                };
            }
            Node::Mutation(n) => OtNode::Mutation(n),
            Node::Permission(n) => OtNode::Permission(n),
            Node::Keep(n) => OtNode::Keep(n),
        };
        if *blobref == perma_ref {
            // An OT-eligible node with no `perma` field has no document.
            return SchemaOutcome::Rejected(
                IndexError::MissingParent {
                    blobref: blobref.clone(),
                    kind: ot_node.kind(),
                }
                .into(),
            );
        }

        // An invitation to the local user may outrun the document content.
        // Tell the user now; apply once the data has arrived.
        if let OtNode::Permission(perm) = &ot_node
            && perm.action == PermAction::Invite
            && perm.user == self.user
        {
            let missing = self.missing_nodes(&perm.dependencies);
            if !missing.is_empty() {
                self.handle_invitation(&perma_ref, perm);
                self.queue.enqueue(blobref.clone(), missing);
                return SchemaOutcome::Pending;
            }
        }

        if let OtNode::Keep(keep) = &ot_node {
            match self.check_keep(&perma_ref, keep) {
                KeepCheck::Accept => {}
                KeepCheck::Waiting(permission) => {
                    tracing::debug!(%blobref, %permission, "keep waits for its cited permission");
                    self.queue.enqueue(blobref.clone(), [permission]);
                    return SchemaOutcome::Pending;
                }
                KeepCheck::Reject(err) => return SchemaOutcome::Rejected(err),
            }
        }

        let outcome = {
            let engine = Arc::clone(&self.engine);
            let Some(Node::Perma(perma)) = self.nodes.get_mut(&perma_ref) else {
                // Parent resolution pinned this to a permanode above.
                return SchemaOutcome::Pending;
            };
            perma.ot_mut().apply(ot_node, engine.as_ref())
        };
        let applied = match outcome {
            Ok(ApplyOutcome::Applied(applied)) => applied,
            Ok(ApplyOutcome::Missing(deps)) => {
                tracing::debug!(%blobref, missing = deps.len(), "waiting for dependencies");
                self.queue.enqueue(blobref.clone(), deps);
                return SchemaOutcome::Pending;
            }
            Err(err) => return SchemaOutcome::Rejected(crate::core::CoreError::from(err).into()),
        };

        self.nodes
            .insert(blobref.clone(), Node::from(applied.clone()));
        tracing::debug!(%blobref, user = %self.user, "applied blob");

        match &applied {
            OtNode::Permission(perm) => self.handle_permission(&perma_ref, perm),
            OtNode::Keep(keep) => self.handle_keep(&perma_ref, keep),
            OtNode::Mutation(mutation) => self.handle_mutation(&perma_ref, mutation),
        }

        SchemaOutcome::Applied { perma: perma_ref }
    }

    /// Dependencies not yet present in the node map.
    fn missing_nodes(&self, deps: &[BlobRef]) -> Vec<BlobRef> {
        deps.iter()
            .filter(|dep| !self.nodes.contains_key(*dep))
            .cloned()
            .collect()
    }

    /// Forward a locally signed blob to every follower with read access.
    /// The local user never forwards to itself.
    fn forward_to_followers(&self, blobref: &BlobRef, perma_ref: &BlobRef) {
        let Some(federation) = &self.federation else {
            return;
        };
        let Some(node) = self.nodes.get(blobref) else {
            return;
        };
        if *node.signer() != self.user {
            return;
        }
        let Some(perma) = self.perma_node(perma_ref) else {
            return;
        };
        let users: Vec<UserId> = perma
            .followers_with_permission(PermissionBits::READ)
            .into_iter()
            .filter(|user| *user != self.user)
            .collect();
        if !users.is_empty() {
            federation.forward(blobref, &users);
        }
    }

    /// Re-run every blob unblocked by `blobref`, in enqueue order.
    fn release_waiters(&mut self, blobref: &BlobRef) {
        for waiter in self.queue.dequeue(blobref) {
            match self.store.get_blob(&waiter) {
                Ok(bytes) => self.handle_blob(&bytes, &waiter),
                Err(err) => {
                    tracing::warn!(%waiter, error = %err, "failed to re-fetch released waiter");
                }
            }
        }
    }

    fn handle_invitation(&mut self, perma_ref: &BlobRef, perm: &PermissionNode) {
        tracing::info!(perma = %perma_ref, invitation = %perm.header.blobref, user = %self.user,
            "invitation received");
        self.open_invitations
            .insert(perma_ref.clone(), perm.header.blobref.clone());
        for listener in &self.listeners {
            listener.invitation(perma_ref, &perm.header.blobref);
        }
    }

    /// Pre-apply inspection of a keep.
    ///
    /// Owner self-keeps pass. Foreign keeps must cite a permission; an
    /// absent one parks the keep, a bogus one rejects it. A keep signed by
    /// the local user additionally starts the permanode prefetch, because
    /// the download is how a still-missing permission arrives.
    fn check_keep(&self, perma_ref: &BlobRef, keep: &KeepNode) -> KeepCheck {
        let Some(perma) = self.perma_node(perma_ref) else {
            return KeepCheck::Waiting(perma_ref.clone());
        };
        if keep.header.signer == *perma.signer() {
            return KeepCheck::Accept;
        }

        let Some(permission_ref) = &keep.permission else {
            return KeepCheck::Reject(
                IndexError::KeepWithoutPermission {
                    blobref: keep.header.blobref.clone(),
                }
                .into(),
            );
        };

        if keep.header.signer == self.user {
            if let Some(federation) = &self.federation {
                let federation = Arc::clone(federation);
                let permission = permission_ref.clone();
                std::thread::spawn(move || {
                    if let Err(err) = federation.download_perma_node(&permission) {
                        tracing::warn!(%permission, error = %err, "permanode download failed");
                    }
                });
            }
            for listener in &self.listeners {
                listener.accepted_invitation(perma_ref, permission_ref, &keep.header.blobref);
            }
        }

        match self.nodes.get(permission_ref) {
            None => KeepCheck::Waiting(permission_ref.clone()),
            Some(Node::Permission(perm)) => {
                if perm.user != keep.header.signer {
                    KeepCheck::Reject(
                        IndexError::KeepUserMismatch {
                            blobref: keep.header.blobref.clone(),
                            signer: keep.header.signer.clone(),
                            invited: perm.user.clone(),
                        }
                        .into(),
                    )
                } else {
                    KeepCheck::Accept
                }
            }
            Some(_) => KeepCheck::Reject(
                IndexError::KeepCitesNonPermission {
                    blobref: keep.header.blobref.clone(),
                    permission: permission_ref.clone(),
                }
                .into(),
            ),
        }
    }

    fn handle_permission(&mut self, perma_ref: &BlobRef, perm: &PermissionNode) {
        match perm.action {
            PermAction::Invite => {
                let already_kept;
                {
                    let Some(Node::Perma(perma)) = self.nodes.get_mut(perma_ref) else {
                        return;
                    };
                    perma.record_invitation(perm.user.clone(), perm.header.blobref.clone());
                    already_kept = perma.has_keep(&perm.user);
                }
                tracing::info!(user = %perm.user, perma = %perma_ref, "user invited");

                if perm.user == self.user
                    && !already_kept
                    && !self.open_invitations.contains_key(perma_ref)
                {
                    // Invitation whose dependencies were already present:
                    // the early-notification path never ran.
                    self.open_invitations
                        .insert(perma_ref.clone(), perm.header.blobref.clone());
                    for listener in &self.listeners {
                        listener.invitation(perma_ref, &perm.header.blobref);
                    }
                }

                if perm.header.signer == self.user
                    && let Some(federation) = &self.federation
                {
                    let invited = [perm.user.clone()];
                    federation.forward(&perm.header.blobref, &invited);
                    // The invited user needs the document root as well.
                    federation.forward(perma_ref, &invited);
                }
            }
            PermAction::Expel => {
                {
                    let Some(Node::Perma(perma)) = self.nodes.get_mut(perma_ref) else {
                        return;
                    };
                    perma.clear_invitation(&perm.user);
                }
                if perm.user == self.user {
                    self.open_invitations.remove(perma_ref);
                }
                // The deny bits folded by apply already drop the user out of
                // followers_with_permission, which ends their forwards.
                tracing::info!(user = %perm.user, perma = %perma_ref, "user expelled");
            }
            PermAction::Change => {
                // Bits folded by apply; nothing else to do.
                tracing::debug!(user = %perm.user, perma = %perma_ref, "permissions changed");
            }
        }

        for listener in &self.listeners {
            listener.permission(perma_ref, perm.action, perm);
        }
    }

    fn handle_mutation(&mut self, perma_ref: &BlobRef, mutation: &MutationNode) {
        for listener in &self.listeners {
            listener.mutation(perma_ref, mutation);
        }
    }

    fn handle_keep(&mut self, perma_ref: &BlobRef, keep: &KeepNode) {
        tracing::debug!(signer = %keep.header.signer, perma = %perma_ref, user = %self.user,
            "handling keep");

        // The cited invitation, for foreign keeps only. check_keep pinned
        // its presence and target before apply.
        let perm: Option<PermissionNode> = {
            let owner_keep = self
                .perma_node(perma_ref)
                .is_some_and(|perma| *perma.signer() == keep.header.signer);
            if owner_keep {
                None
            } else {
                keep.permission
                    .as_ref()
                    .and_then(|blobref| self.permission_node(blobref))
                    .cloned()
            }
        };

        {
            let Some(Node::Perma(perma)) = self.nodes.get_mut(perma_ref) else {
                return;
            };
            perma.clear_invitation(&keep.header.signer);
            perma.insert_keep(keep.header.signer.clone(), keep.header.blobref.clone());
        }

        match &perm {
            Some(perm) if perm.user == self.user => {
                // The local user completed an acceptance. Tell the inviter.
                if perm.header.signer != self.user
                    && let Some(federation) = &self.federation
                {
                    federation.forward(&keep.header.blobref, &[perm.header.signer.clone()]);
                }
                self.open_invitations.remove(perma_ref);
                tracing::info!(perma = %perma_ref, "local user accepted invitation");
                for listener in &self.listeners {
                    listener.perma_node(
                        perma_ref,
                        Some(&perm.header.blobref),
                        &keep.header.blobref,
                    );
                }
            }
            Some(perm) => {
                tracing::info!(user = %keep.header.signer, perma = %perma_ref,
                    "user accepted invitation");
                for listener in &self.listeners {
                    listener.new_follower(
                        perma_ref,
                        &perm.header.blobref,
                        &keep.header.blobref,
                        &perm.user,
                    );
                }
                self.forward_history_delta(perma_ref, keep);
            }
            None => {
                tracing::debug!(user = %keep.header.signer, perma = %perma_ref,
                    "owner keeps own permanode");
                for listener in &self.listeners {
                    listener.perma_node(perma_ref, None, &keep.header.blobref);
                }
            }
        }
    }

    /// Send a new follower the history it lacks.
    ///
    /// The keep's dependencies declare the follower's frontier. Walking the
    /// history in reverse causal order, every node the remote's ancestry
    /// does not cover is forwarded if the local user authored it, or if it
    /// is a keep accepting a locally signed invitation. Third-party blobs
    /// are their signer's responsibility; federation stays authoritative
    /// per signer.
    fn forward_history_delta(&self, perma_ref: &BlobRef, keep: &KeepNode) {
        let Some(federation) = &self.federation else {
            return;
        };
        let Some(perma) = self.perma_node(perma_ref) else {
            return;
        };
        let history = perma.ot();

        let mut graph = HistoryGraph::new(history.frontier(), keep.dependencies.iter());
        let mut forwards: Vec<BlobRef> = Vec::new();
        if !graph.is_settled() {
            for node in history.iter().rev() {
                if !graph.substitute(node.blob_ref(), node.dependencies())
                    && node.blob_ref() != &keep.header.blobref
                {
                    if *node.signer() == self.user {
                        forwards.push(node.blob_ref().clone());
                    } else if let OtNode::Keep(other) = node
                        && let Some(cited) = &other.permission
                        && self
                            .permission_node(cited)
                            .is_some_and(|p| p.header.signer == self.user)
                    {
                        forwards.push(node.blob_ref().clone());
                    }
                }
                if graph.is_settled() {
                    break;
                }
            }
        }

        tracing::debug!(perma = %perma_ref, follower = %keep.header.signer,
            count = forwards.len(), "forwarding history delta");
        let recipient = [keep.header.signer.clone()];
        for blobref in &forwards {
            federation.forward(blobref, &recipient);
        }
    }

    // ------------------------------------------------------------------
    // Blob builders. Each hashes the exact bytes stored and returns the new
    // ref; indexing happens through the store subscription like any other
    // blob.

    /// Create a new document root signed by the local user.
    pub fn create_perma_blob(&self) -> Result<BlobRef, Error> {
        use rand::Rng;
        let nonce: u64 = rand::rng().random();
        let value = serde_json::json!({
            "type": "permanode",
            "signer": self.user.as_str(),
            "random": format!("{nonce:016x}"),
            "t": rfc3339_now()?,
        });
        self.store_built(&value)
    }

    /// Create a keep for a permanode. `permission` cites the accepted
    /// invitation; the owner's own keep omits it.
    pub fn create_keep_blob(
        &self,
        perma: &BlobRef,
        permission: Option<&BlobRef>,
    ) -> Result<BlobRef, Error> {
        let deps: Vec<&str> = permission.iter().map(|p| p.as_str()).collect();
        let mut value = serde_json::json!({
            "type": "keep",
            "signer": self.user.as_str(),
            "perma": perma.as_str(),
            "dep": deps,
            "t": rfc3339_now()?,
        });
        if let Some(permission) = permission {
            value["permission"] = serde_json::Value::String(permission.as_str().to_string());
        }
        self.store_built(&value)
    }

    /// Create a permission blob for a permanode.
    pub fn create_permission_blob(
        &self,
        perma: &BlobRef,
        dependencies: &[BlobRef],
        user: &UserId,
        allow: PermissionBits,
        deny: PermissionBits,
        action: PermAction,
    ) -> Result<BlobRef, Error> {
        let deps: Vec<&str> = dependencies.iter().map(|d| d.as_str()).collect();
        let value = serde_json::json!({
            "type": "permission",
            "signer": self.user.as_str(),
            "perma": perma.as_str(),
            "dep": deps,
            "user": user.as_str(),
            "allow": allow.0,
            "deny": deny.0,
            "action": action.as_str(),
            "t": rfc3339_now()?,
        });
        self.store_built(&value)
    }

    /// Create a mutation blob for a permanode.
    pub fn create_mutation_blob(
        &self,
        perma: &BlobRef,
        dependencies: &[BlobRef],
        operation: &Operation,
        site: &str,
    ) -> Result<BlobRef, Error> {
        let deps: Vec<&str> = dependencies.iter().map(|d| d.as_str()).collect();
        let value = serde_json::json!({
            "type": "mutation",
            "signer": self.user.as_str(),
            "perma": perma.as_str(),
            "dep": deps,
            "op": operation.0.clone(),
            "site": site,
            "t": rfc3339_now()?,
        });
        self.store_built(&value)
    }

    fn store_built(&self, value: &serde_json::Value) -> Result<BlobRef, Error> {
        let bytes = serde_json::to_vec(value).map_err(IndexError::Encode)?;
        let blobref = BlobRef::for_bytes(&bytes);
        tracing::debug!(%blobref, "storing built blob");
        self.store.store_blob(bytes.into(), &blobref)?;
        Ok(blobref)
    }
}

fn rfc3339_now() -> Result<String, IndexError> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}
