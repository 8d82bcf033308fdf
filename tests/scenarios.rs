//! End-to-end indexer scenarios over a shared in-memory store.
//!
//! Blobs are handcrafted JSON, stored in controlled orders, and pumped into
//! the indexer through the store subscription, the same way production
//! deliveries arrive.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use crossbeam::channel::Receiver;

use driftwave::{
    ApplicationListener, BlobRef, BlobStore, Federation, FederationError, IdentityEngine,
    Indexer, IndexerConfig, MemoryBlobStore, MutationNode, PermAction, PermissionBits,
    PermissionNode, StoredBlob, UserId,
};

#[derive(Clone, Debug, PartialEq)]
enum AppEvent {
    Invitation {
        perma: String,
        invitation: String,
    },
    Accepted {
        perma: String,
        invitation: String,
        keep: String,
    },
    PermaNode {
        perma: String,
        invitation: Option<String>,
        keep: String,
    },
    NewFollower {
        perma: String,
        invitation: String,
        keep: String,
        user: String,
    },
    Mutation {
        perma: String,
        mutation: String,
    },
    Permission {
        perma: String,
        action: PermAction,
        permission: String,
    },
}

#[derive(Clone, Default)]
struct RecordingListener {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ApplicationListener for RecordingListener {
    fn invitation(&self, perma: &BlobRef, invitation: &BlobRef) {
        self.events.lock().unwrap().push(AppEvent::Invitation {
            perma: perma.to_string(),
            invitation: invitation.to_string(),
        });
    }

    fn accepted_invitation(&self, perma: &BlobRef, invitation: &BlobRef, keep: &BlobRef) {
        self.events.lock().unwrap().push(AppEvent::Accepted {
            perma: perma.to_string(),
            invitation: invitation.to_string(),
            keep: keep.to_string(),
        });
    }

    fn perma_node(&self, perma: &BlobRef, invitation: Option<&BlobRef>, keep: &BlobRef) {
        self.events.lock().unwrap().push(AppEvent::PermaNode {
            perma: perma.to_string(),
            invitation: invitation.map(|i| i.to_string()),
            keep: keep.to_string(),
        });
    }

    fn new_follower(&self, perma: &BlobRef, invitation: &BlobRef, keep: &BlobRef, user: &UserId) {
        self.events.lock().unwrap().push(AppEvent::NewFollower {
            perma: perma.to_string(),
            invitation: invitation.to_string(),
            keep: keep.to_string(),
            user: user.to_string(),
        });
    }

    fn mutation(&self, perma: &BlobRef, mutation: &MutationNode) {
        self.events.lock().unwrap().push(AppEvent::Mutation {
            perma: perma.to_string(),
            mutation: mutation.header.blobref.to_string(),
        });
    }

    fn permission(&self, perma: &BlobRef, action: PermAction, permission: &PermissionNode) {
        self.events.lock().unwrap().push(AppEvent::Permission {
            perma: perma.to_string(),
            action,
            permission: permission.header.blobref.to_string(),
        });
    }
}

#[derive(Default)]
struct RecordingFederation {
    forwards: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingFederation {
    /// Every blob forwarded to `user`, in issue order.
    fn forwarded_to(&self, user: &str) -> Vec<String> {
        self.forwards
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, users)| users.iter().any(|u| u == user))
            .map(|(blobref, _)| blobref.clone())
            .collect()
    }
}

impl Federation for RecordingFederation {
    fn forward(&self, blobref: &BlobRef, users: &[UserId]) {
        self.forwards.lock().unwrap().push((
            blobref.to_string(),
            users.iter().map(|u| u.to_string()).collect(),
        ));
    }

    fn download_perma_node(&self, _permission: &BlobRef) -> Result<(), FederationError> {
        Ok(())
    }
}

struct Fixture {
    store: Arc<MemoryBlobStore>,
    rx: Receiver<StoredBlob>,
    indexer: Indexer,
    federation: Arc<RecordingFederation>,
    listener: RecordingListener,
}

impl Fixture {
    fn new(user: &str) -> Self {
        let store = Arc::new(MemoryBlobStore::new());
        let rx = store.subscribe();
        let federation = Arc::new(RecordingFederation::default());
        let listener = RecordingListener::default();

        let config = IndexerConfig::new(UserId::parse(user).unwrap());
        let mut indexer = Indexer::new(
            config,
            Arc::clone(&store) as Arc<dyn BlobStore>,
            Arc::new(IdentityEngine),
        )
        .with_federation(Arc::clone(&federation) as Arc<dyn Federation>);
        indexer.add_listener(Box::new(listener.clone()));

        Self {
            store,
            rx,
            indexer,
            federation,
            listener,
        }
    }

    /// Store raw blob bytes and return the content ref. Nothing is indexed
    /// until [`pump`](Self::pump) runs.
    fn put(&self, raw: &str) -> BlobRef {
        self.store.store(Bytes::from(raw.to_string())).unwrap()
    }

    fn pump(&mut self) {
        self.indexer.drain(&self.rx);
    }
}

fn blobref_of(raw: &str) -> BlobRef {
    BlobRef::for_bytes(raw.as_bytes())
}

/// The fixed document used by the invite/keep scenarios, built from the
/// perspective of owner `a@b`: root, self-keep, three mutations, then an
/// invitation for `foo@bar` and that user's keep.
struct InviteScenario {
    perma: String,
    keep0: String,
    m1: String,
    m2: String,
    m3: String,
    invite: String,
    keep_foo: String,
}

impl InviteScenario {
    fn build() -> Self {
        let perma = r#"{"type":"permanode","signer":"a@b","random":"perma1"}"#.to_string();
        let perma_ref = blobref_of(&perma);
        let keep0 = format!(r#"{{"type":"keep","signer":"a@b","perma":"{perma_ref}"}}"#);
        let keep0_ref = blobref_of(&keep0);
        let m1 = format!(
            r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","dep":["{keep0_ref}"],"site":"s1","op":{{"$t":["Hello World"]}}}}"#
        );
        let m1_ref = blobref_of(&m1);
        let m2 = format!(
            r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","dep":["{m1_ref}"],"site":"s1","op":{{"$t":[{{"$s":11}},"!!"]}}}}"#
        );
        let m2_ref = blobref_of(&m2);
        let m3 = format!(
            r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","dep":["{m2_ref}"],"site":"s1","op":{{"$t":[{{"$s":13}},"?"]}}}}"#
        );
        let m3_ref = blobref_of(&m3);
        let invite = format!(
            r#"{{"type":"permission","signer":"a@b","perma":"{perma_ref}","dep":["{m3_ref}"],"user":"foo@bar","action":"invite","allow":1,"deny":0}}"#
        );
        let invite_ref = blobref_of(&invite);
        let keep_foo = format!(
            r#"{{"type":"keep","signer":"foo@bar","perma":"{perma_ref}","permission":"{invite_ref}"}}"#
        );
        Self {
            perma,
            keep0,
            m1,
            m2,
            m3,
            invite,
            keep_foo,
        }
    }

    fn blobs(&self) -> Vec<&str> {
        vec![
            &self.perma,
            &self.keep0,
            &self.m1,
            &self.m2,
            &self.m3,
            &self.invite,
            &self.keep_foo,
        ]
    }
}

// ---------------------------------------------------------------------
// S1/S2: nested permanodes, both arrival orders.

#[test]
fn nested_permanodes_in_order() {
    let mut fx = Fixture::new("a@b");
    let p1 = r#"{"type":"permanode","signer":"a@b","random":"r1"}"#;
    let p1_ref = fx.put(p1);
    let p2 = format!(r#"{{"type":"permanode","signer":"a@b","random":"r2","perma":"{p1_ref}"}}"#);
    let p2_ref = fx.put(&p2);
    fx.pump();

    assert!(fx.indexer.perma_node(&p1_ref).is_some());
    assert!(fx.indexer.perma_node(&p2_ref).is_some());
    assert_eq!(fx.indexer.waiting_count(), 0);
}

#[test]
fn nested_permanodes_reversed() {
    let mut fx = Fixture::new("a@b");
    let p1 = r#"{"type":"permanode","signer":"a@b","random":"r1"}"#;
    let p1_ref = blobref_of(p1);
    let p2 = format!(r#"{{"type":"permanode","signer":"a@b","random":"r2","perma":"{p1_ref}"}}"#);

    // Child first: it must wait for its root.
    let p2_ref = fx.put(&p2);
    fx.pump();
    assert!(fx.indexer.perma_node(&p2_ref).is_none());
    assert!(fx.indexer.is_waiting(&p2_ref));

    fx.put(p1);
    fx.pump();
    assert!(fx.indexer.perma_node(&p1_ref).is_some());
    assert!(fx.indexer.perma_node(&p2_ref).is_some());
    assert_eq!(fx.indexer.waiting_count(), 0);
}

// ---------------------------------------------------------------------
// S3/S4: cross-user invite and keep.

#[test]
fn invite_and_keep_cross_user() {
    let scenario = InviteScenario::build();
    let mut fx = Fixture::new("a@b");
    let refs: Vec<BlobRef> = scenario.blobs().iter().map(|raw| fx.put(raw)).collect();
    fx.pump();

    let perma_ref = &refs[0];
    let perma = fx.indexer.perma_node(perma_ref).expect("perma indexed");

    let owner = UserId::parse("a@b").unwrap();
    let foo = UserId::parse("foo@bar").unwrap();
    assert_eq!(perma.keeps().len(), 2);
    assert_eq!(perma.keeps()[&owner], blobref_of(&scenario.keep0));
    assert_eq!(perma.keeps()[&foo], blobref_of(&scenario.keep_foo));
    assert!(perma.pending_invitations().is_empty());
    assert!(perma.has_permission(&foo, PermissionBits::READ));
    assert!(!perma.has_permission(&foo, PermissionBits::WRITE));

    assert!(fx.listener.events().contains(&AppEvent::NewFollower {
        perma: perma_ref.to_string(),
        invitation: blobref_of(&scenario.invite).to_string(),
        keep: blobref_of(&scenario.keep_foo).to_string(),
        user: "foo@bar".to_string(),
    }));

    // foo@bar receives the invitation, the root, and every locally authored
    // history node it lacks. Its own keep is never echoed back.
    let mut sent = fx.federation.forwarded_to("foo@bar");
    sent.sort();
    sent.dedup();
    let mut expected: Vec<String> = [
        &scenario.perma,
        &scenario.keep0,
        &scenario.m1,
        &scenario.m2,
        &scenario.m3,
        &scenario.invite,
    ]
    .iter()
    .map(|raw| blobref_of(raw).to_string())
    .collect();
    expected.sort();
    assert_eq!(sent, expected);
    assert!(
        !fx.federation
            .forwarded_to("foo@bar")
            .contains(&blobref_of(&scenario.keep_foo).to_string())
    );
}

#[test]
fn keep_before_its_permission() {
    let scenario = InviteScenario::build();
    let mut fx = Fixture::new("a@b");

    // Everything but the invitation, keep included: the keep must wait.
    for raw in [
        &scenario.perma,
        &scenario.keep0,
        &scenario.m1,
        &scenario.m2,
        &scenario.m3,
        &scenario.keep_foo,
    ] {
        fx.put(raw);
    }
    fx.pump();

    let keep_ref = blobref_of(&scenario.keep_foo);
    assert!(fx.indexer.is_waiting(&keep_ref));
    assert!(fx.indexer.node(&keep_ref).is_none());

    fx.put(&scenario.invite);
    fx.pump();

    let perma = fx
        .indexer
        .perma_node(&blobref_of(&scenario.perma))
        .expect("perma indexed");
    let foo = UserId::parse("foo@bar").unwrap();
    assert_eq!(perma.keeps()[&foo], keep_ref);
    assert!(perma.pending_invitations().is_empty());
    assert_eq!(fx.indexer.waiting_count(), 0);
    assert_eq!(fx.indexer.is_processed(&keep_ref), Some(true));
}

// ---------------------------------------------------------------------
// S5: keep citing an invitation for somebody else.

#[test]
fn keep_with_mismatched_user_is_rejected() {
    let scenario = InviteScenario::build();
    let mut fx = Fixture::new("a@b");
    for raw in [
        &scenario.perma,
        &scenario.keep0,
        &scenario.m1,
        &scenario.m2,
        &scenario.m3,
        &scenario.invite,
    ] {
        fx.put(raw);
    }

    let intruder = format!(
        r#"{{"type":"keep","signer":"x@y","perma":"{}","permission":"{}"}}"#,
        blobref_of(&scenario.perma),
        blobref_of(&scenario.invite),
    );
    let intruder_ref = fx.put(&intruder);
    fx.pump();

    assert_eq!(fx.indexer.is_processed(&intruder_ref), Some(false));
    assert!(fx.indexer.node(&intruder_ref).is_none());

    let perma = fx
        .indexer
        .perma_node(&blobref_of(&scenario.perma))
        .expect("perma indexed");
    let x = UserId::parse("x@y").unwrap();
    assert!(!perma.has_keep(&x));
    // The genuine invitation is still outstanding.
    let foo = UserId::parse("foo@bar").unwrap();
    assert_eq!(
        perma.pending_invitations()[&foo],
        blobref_of(&scenario.invite)
    );
}

// ---------------------------------------------------------------------
// S6: permission fold.

#[test]
fn permission_fold_allow_then_deny() {
    let mut fx = Fixture::new("a@b");
    let perma = r#"{"type":"permanode","signer":"a@b","random":"fold"}"#;
    let perma_ref = blobref_of(perma);
    let read = PermissionBits::READ.0;
    let write = PermissionBits::WRITE.0;
    let grant1 = format!(
        r#"{{"type":"permission","signer":"a@b","perma":"{perma_ref}","user":"u@v","action":"invite","allow":{read},"deny":0}}"#
    );
    let grant1_ref = blobref_of(&grant1);
    let grant2 = format!(
        r#"{{"type":"permission","signer":"a@b","perma":"{perma_ref}","dep":["{grant1_ref}"],"user":"u@v","action":"change","allow":{write},"deny":{read}}}"#
    );

    fx.put(perma);
    fx.put(&grant1);
    fx.put(&grant2);
    fx.pump();

    let perma = fx.indexer.perma_node(&perma_ref).expect("perma indexed");
    let u = UserId::parse("u@v").unwrap();
    assert!(!perma.has_permission(&u, PermissionBits::READ));
    assert!(perma.has_permission(&u, PermissionBits::WRITE));

    let actions: Vec<PermAction> = fx
        .listener
        .events()
        .iter()
        .filter_map(|event| match event {
            AppEvent::Permission { action, .. } => Some(*action),
            _ => None,
        })
        .collect();
    assert_eq!(actions, vec![PermAction::Invite, PermAction::Change]);
}

// ---------------------------------------------------------------------
// P1/P2: arrival-order determinism and dependency closure.

#[derive(Debug, PartialEq)]
struct StateSnapshot {
    nodes: Vec<String>,
    keeps: Vec<(String, String)>,
    pending: Vec<String>,
    frontier: Vec<String>,
    read_users: Vec<String>,
    waiting: usize,
}

fn snapshot(fx: &Fixture, perma_ref: &BlobRef, all: &[BlobRef]) -> StateSnapshot {
    let perma = fx.indexer.perma_node(perma_ref).expect("perma indexed");
    StateSnapshot {
        nodes: all
            .iter()
            .filter(|r| fx.indexer.node(r).is_some())
            .map(|r| r.to_string())
            .collect(),
        keeps: perma
            .keeps()
            .iter()
            .map(|(u, k)| (u.to_string(), k.to_string()))
            .collect(),
        pending: perma
            .pending_invitations()
            .keys()
            .map(|u| u.to_string())
            .collect(),
        frontier: perma.ot().frontier().iter().map(|r| r.to_string()).collect(),
        read_users: perma
            .followers_with_permission(PermissionBits::READ)
            .iter()
            .map(|u| u.to_string())
            .collect(),
        waiting: fx.indexer.waiting_count(),
    }
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    if n == 1 {
        return vec![vec![0]];
    }
    let mut out = Vec::new();
    for sub in permutations(n - 1) {
        for at in 0..n {
            let mut perm = sub.clone();
            perm.insert(at, n - 1);
            out.push(perm);
        }
    }
    out
}

#[test]
fn every_arrival_order_converges_to_the_same_state() {
    let perma = r#"{"type":"permanode","signer":"a@b","random":"conv"}"#.to_string();
    let perma_ref = blobref_of(&perma);
    let keep0 = format!(r#"{{"type":"keep","signer":"a@b","perma":"{perma_ref}"}}"#);
    let keep0_ref = blobref_of(&keep0);
    let m1 = format!(
        r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","dep":["{keep0_ref}"],"site":"s1","op":{{"$t":["hi"]}}}}"#
    );
    let m1_ref = blobref_of(&m1);
    let invite = format!(
        r#"{{"type":"permission","signer":"a@b","perma":"{perma_ref}","dep":["{m1_ref}"],"user":"foo@bar","action":"invite","allow":1,"deny":0}}"#
    );
    let invite_ref = blobref_of(&invite);
    let keep_foo = format!(
        r#"{{"type":"keep","signer":"foo@bar","perma":"{perma_ref}","permission":"{invite_ref}","dep":["{invite_ref}"]}}"#
    );

    let blobs = [&perma, &keep0, &m1, &invite, &keep_foo];
    let refs: Vec<BlobRef> = blobs.iter().map(|raw| blobref_of(raw)).collect();

    let mut reference: Option<StateSnapshot> = None;
    for order in permutations(blobs.len()) {
        let mut fx = Fixture::new("a@b");
        for &at in &order {
            fx.put(blobs[at]);
        }
        fx.pump();

        let state = snapshot(&fx, &perma_ref, &refs);
        assert_eq!(state.waiting, 0, "order {order:?} left waiters");
        assert_eq!(state.nodes.len(), blobs.len(), "order {order:?} lost nodes");
        match &reference {
            None => reference = Some(state),
            Some(expected) => assert_eq!(&state, expected, "order {order:?} diverged"),
        }
    }
}

#[test]
fn a_node_is_indexed_only_with_its_transitive_dependencies() {
    let perma = r#"{"type":"permanode","signer":"a@b","random":"gap"}"#.to_string();
    let perma_ref = blobref_of(&perma);
    let keep0 = format!(r#"{{"type":"keep","signer":"a@b","perma":"{perma_ref}"}}"#);
    let keep0_ref = blobref_of(&keep0);
    let m1 = format!(
        r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","dep":["{keep0_ref}"],"site":"s1","op":{{"$t":["a"]}}}}"#
    );
    let m1_ref = blobref_of(&m1);
    let m2 = format!(
        r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","dep":["{m1_ref}"],"site":"s1","op":{{"$t":["b"]}}}}"#
    );

    let mut fx = Fixture::new("a@b");
    fx.put(&perma);
    fx.put(&keep0);
    let m2_ref = fx.put(&m2);
    fx.pump();

    // m1 is absent, so m2 must not be indexed.
    assert!(fx.indexer.node(&m2_ref).is_none());
    assert!(fx.indexer.is_waiting(&m2_ref));

    fx.put(&m1);
    fx.pump();
    assert!(fx.indexer.node(&m1_ref).is_some());
    assert!(fx.indexer.node(&m2_ref).is_some());
    assert_eq!(fx.indexer.waiting_count(), 0);
}

// ---------------------------------------------------------------------
// The invited side: early invitation, acceptance, forward to the inviter.

#[test]
fn invited_user_accepts_an_early_invitation() {
    let scenario = InviteScenario::build();
    let mut fx = Fixture::new("foo@bar");
    let perma_ref = blobref_of(&scenario.perma);
    let invite_ref = blobref_of(&scenario.invite);

    // The invitation outruns the content it depends on.
    fx.put(&scenario.perma);
    fx.put(&scenario.invite);
    fx.pump();

    assert!(fx.indexer.is_waiting(&invite_ref));
    assert_eq!(fx.indexer.open_invitations().get(&perma_ref), Some(&invite_ref));
    assert!(fx.listener.events().contains(&AppEvent::Invitation {
        perma: perma_ref.to_string(),
        invitation: invite_ref.to_string(),
    }));

    // The content catches up and the invitation applies.
    for raw in [&scenario.keep0, &scenario.m1, &scenario.m2, &scenario.m3] {
        fx.put(raw);
    }
    fx.pump();
    assert!(fx.indexer.node(&invite_ref).is_some());
    assert_eq!(fx.indexer.waiting_count(), 0);
    // Still open: no keep was issued yet.
    assert!(fx.indexer.open_invitations().contains_key(&perma_ref));

    // Accept.
    let keep_ref = fx
        .indexer
        .create_keep_blob(&perma_ref, Some(&invite_ref))
        .unwrap();
    fx.pump();

    assert!(fx.indexer.open_invitations().is_empty());
    let perma = fx.indexer.perma_node(&perma_ref).expect("perma indexed");
    let foo = UserId::parse("foo@bar").unwrap();
    assert_eq!(perma.keeps()[&foo], keep_ref);

    let events = fx.listener.events();
    assert!(events.contains(&AppEvent::Accepted {
        perma: perma_ref.to_string(),
        invitation: invite_ref.to_string(),
        keep: keep_ref.to_string(),
    }));
    assert!(events.contains(&AppEvent::PermaNode {
        perma: perma_ref.to_string(),
        invitation: Some(invite_ref.to_string()),
        keep: keep_ref.to_string(),
    }));

    // The accepting keep travels to the inviter.
    assert!(fx.federation.forwarded_to("a@b").contains(&keep_ref.to_string()));
}

// ---------------------------------------------------------------------
// Expel ends forwarding.

#[test]
fn expelled_follower_stops_receiving_forwards() {
    let scenario = InviteScenario::build();
    let mut fx = Fixture::new("a@b");
    let refs: Vec<BlobRef> = scenario.blobs().iter().map(|raw| fx.put(raw)).collect();
    fx.pump();
    let perma_ref = refs[0].clone();

    let foo = UserId::parse("foo@bar").unwrap();
    let expel_ref = fx
        .indexer
        .create_permission_blob(
            &perma_ref,
            &[blobref_of(&scenario.keep_foo)],
            &foo,
            PermissionBits::NONE,
            PermissionBits::ALL,
            PermAction::Expel,
        )
        .unwrap();
    fx.pump();

    let perma = fx.indexer.perma_node(&perma_ref).expect("perma indexed");
    assert!(!perma.has_permission(&foo, PermissionBits::READ));
    // The keep itself stays: an expel revokes reachability, not history.
    assert!(perma.has_keep(&foo));
    assert!(
        perma
            .followers_with_permission(PermissionBits::READ)
            .iter()
            .all(|u| *u != foo)
    );
    assert!(fx.listener.events().contains(&AppEvent::Permission {
        perma: perma_ref.to_string(),
        action: PermAction::Expel,
        permission: expel_ref.to_string(),
    }));

    let sent_before = fx.federation.forwarded_to("foo@bar").len();
    let op = driftwave::Operation(serde_json::json!({"$t": ["more"]}));
    fx.indexer
        .create_mutation_blob(&perma_ref, &[expel_ref], &op, "s1")
        .unwrap();
    fx.pump();
    assert_eq!(fx.federation.forwarded_to("foo@bar").len(), sent_before);
}

// ---------------------------------------------------------------------
// Rejected ancestors strand their subtree, visibly.

#[test]
fn waiters_on_a_rejected_ancestor_are_stranded() {
    let mut fx = Fixture::new("a@b");
    let perma = r#"{"type":"permanode","signer":"a@b","random":"strand"}"#;
    let perma_ref = blobref_of(perma);
    // Missing site: rejected at classification.
    let bad = format!(
        r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","op":{{"$t":["x"]}}}}"#
    );
    let bad_ref = blobref_of(&bad);
    let orphan = format!(
        r#"{{"type":"mutation","signer":"a@b","perma":"{perma_ref}","dep":["{bad_ref}"],"site":"s1","op":{{"$t":["y"]}}}}"#
    );

    fx.put(perma);
    fx.put(&bad);
    let orphan_ref = fx.put(&orphan);
    fx.pump();

    assert_eq!(fx.indexer.is_processed(&bad_ref), Some(false));
    assert!(fx.indexer.is_waiting(&orphan_ref));
    assert!(fx.indexer.stranded_blobs().contains(&orphan_ref));
}

// ---------------------------------------------------------------------
// Non-schema blobs pass through unindexed.

#[test]
fn binary_blobs_are_ignored_not_rejected() {
    let mut fx = Fixture::new("a@b");
    let blobref = fx
        .store
        .store(Bytes::from_static(&[0x89, b'P', b'N', b'G']))
        .unwrap();
    fx.pump();

    assert!(fx.indexer.node(&blobref).is_none());
    assert_eq!(fx.indexer.is_processed(&blobref), None);
}
