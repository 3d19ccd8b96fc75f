//! The KVS worker-thread actor.
//!
//! A [`KvsNode`] value is the owned state of one worker thread of a storage
//! node: its slice of the key space, the per-key metadata, the deferred work
//! parked on unknown replication factors, and the changeset feeding the next
//! anti-entropy round. The handlers for the individual message kinds live in
//! the submodules of this module.

use crate::{
    config::Config,
    hash_ring::{replication_factor_fetch, RingState, SharedRings},
    messages::{
        cluster_membership::{Departed, Join},
        Message, Tier,
    },
    metadata::{KeyMetadata, KeyReplication},
    pending::{PendingGossip, PendingMap, PendingRequest},
    storage::StorageAdapter,
    topics::{Address, KvsThread},
    ClientKey, Key,
};
use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

mod gossip;
mod replication_response;
mod request;

/// The owned state of one KVS worker thread.
pub struct KvsNode {
    config: Arc<Config>,
    /// The storage tier this node belongs to.
    tier: Tier,
    /// The identity of this worker thread.
    wt: KvsThread,
    /// Shared, snapshot-swapped hash rings of the node.
    rings: SharedRings,
    /// The thread's slice of the stored values.
    storage: StorageAdapter,
    /// Per-key bookkeeping: lattice type, size, cached replication factor.
    metadata_map: HashMap<Key, KeyMetadata>,
    /// Client operations parked on an unknown replication factor.
    pending_requests: PendingMap<PendingRequest>,
    /// Gossip tuples parked on an unknown replication factor.
    pending_gossip: PendingMap<PendingGossip>,
    /// Keys written locally since the last anti-entropy round.
    local_changeset: HashSet<Key>,
    /// Access timestamps per key, reported to the external monitoring system.
    key_access: HashMap<Key, Vec<DateTime<Utc>>>,
    total_accesses: usize,
}

impl KvsNode {
    /// Creates the actor state for the given worker thread.
    pub fn new(
        config: Arc<Config>,
        tier: Tier,
        node_id: String,
        thread_id: u32,
        rings: SharedRings,
    ) -> Self {
        Self {
            config,
            tier,
            wt: KvsThread::new(node_id, thread_id),
            rings,
            storage: StorageAdapter::new(),
            metadata_map: HashMap::new(),
            pending_requests: PendingMap::default(),
            pending_gossip: PendingMap::default(),
            local_changeset: HashSet::new(),
            key_access: HashMap::new(),
            total_accesses: 0,
        }
    }

    /// The identity of this worker thread.
    pub fn thread(&self) -> &KvsThread {
        &self.wt
    }

    /// The storage tier of this node.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The number of key accesses this thread has served.
    pub fn total_accesses(&self) -> usize {
        self.total_accesses
    }

    /// The number of recorded accesses to the given key, reported to the
    /// external monitoring system.
    pub fn key_access_count(&self, key: &Key) -> usize {
        self.key_access
            .get(key)
            .map(|timestamps| timestamps.len())
            .unwrap_or(0)
    }

    /// The keys written locally since the last anti-entropy round.
    pub fn local_changeset(&self) -> &HashSet<Key> {
        &self.local_changeset
    }

    /// Adds a joined node to the rings shared across this node's threads.
    pub fn handle_join(&self, join: &Join) {
        self.rings.insert_node(join.tier, &join.node_id);
    }

    /// Removes a departed node from the shared rings.
    pub fn handle_depart(&self, depart: &Departed) {
        self.rings.remove_node(depart.tier, &depart.node_id);
    }

    /// Issues an asynchronous replication-factor fetch for the given key,
    /// with this thread as the response target.
    ///
    /// Metadata keys always resolve with the fixed factor, so a fetch is only
    /// ever needed (and issued) for client keys.
    fn issue_replication_fetch(
        &self,
        rings: &RingState,
        key: &Key,
        out: &mut Vec<(Address, Message)>,
    ) {
        let Key::Client(client_key) = key else {
            return;
        };
        match replication_factor_fetch(rings, client_key, self.wt.replication_response_topic()) {
            Some((address, request)) => out.push((address, Message::Request(request))),
            None => log::warn!(
                "cannot fetch replication factor for key `{}`: no nodes in the metadata tier",
                key
            ),
        }
    }

    /// Caches a freshly learned replication factor for the key.
    fn update_replication(&mut self, key: &ClientKey, replication: KeyReplication) {
        self.metadata_map
            .entry(Key::Client(key.clone()))
            .or_default()
            .replication = Some(replication);
    }

    /// Records a served access to the key.
    fn track_access(&mut self, key: Key) {
        self.key_access.entry(key).or_default().push(Utc::now());
        self.total_accesses += 1;
    }
}
