//! Consistent hash rings and the key-to-thread responsibility resolver.
//!
//! Each storage tier owns a _global_ ring mapping the hashed key space to
//! physical nodes, and a _local_ ring mapping it to the worker threads of a
//! node (all nodes of a tier run the same thread count, so one local ring per
//! tier suffices). Every member is inserted at a large number of virtual
//! positions to smooth the load distribution.
//!
//! The rings are the only state shared between the worker threads of a node:
//! they are read on every request but mutated only on membership changes, so
//! they are published as an atomically-swapped immutable snapshot
//! ([`SharedRings`]).

use crate::{
    config::Config,
    messages::{Request, RequestTuple, RequestType, Tier},
    metadata::{KeyMetadata, MetadataKey},
    topics::{Address, KvsThread},
    ClientKey, Key, ALL_TIERS,
};
use parking_lot::RwLock;
use rand::prelude::IteratorRandom;
use rapidhash::v3::rapidhash_v3;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Display,
    hash::Hash,
    sync::Arc,
};

/// Replication factor of metadata keys across nodes.
///
/// Fixed and small, so that metadata keys can be located without any per-key
/// replication state.
pub const METADATA_REPLICATION_FACTOR: usize = 1;

/// Replication factor of metadata keys across the threads of a node.
pub const METADATA_LOCAL_REPLICATION_FACTOR: usize = 1;

/// Hashes a key or ring member name to its position in the ring's hash space.
///
/// Uses rapidhash instead of the standard library hasher because ring
/// positions must be identical across processes and releases.
pub fn ring_hash(name: &str) -> u64 {
    rapidhash_v3(name.as_bytes())
}

/// A consistent hash ring over members of type `T`.
///
/// Members are placed at `virtual_nodes` pseudo-random positions each;
/// lookups walk clockwise to the nearest successor position.
#[derive(Debug, Clone)]
pub struct HashRing<T> {
    ring: BTreeMap<u64, T>,
    members: HashSet<T>,
    virtual_nodes: usize,
}

impl<T> HashRing<T>
where
    T: Clone + Eq + Hash + Display,
{
    /// Creates an empty ring placing each member at the given number of
    /// virtual positions.
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            ring: BTreeMap::new(),
            members: HashSet::new(),
            virtual_nodes,
        }
    }

    /// Inserts a member at its virtual positions. Inserting a member twice
    /// has no effect.
    pub fn insert(&mut self, member: T) {
        if !self.members.insert(member.clone()) {
            return;
        }
        for index in 0..self.virtual_nodes {
            let position = ring_hash(&format!("{}_{}", member, index));
            self.ring.insert(position, member.clone());
        }
    }

    /// Removes a member and all its virtual positions.
    pub fn remove(&mut self, member: &T) {
        if !self.members.remove(member) {
            return;
        }
        self.ring.retain(|_, m| m != member);
    }

    /// The number of distinct members on the ring.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns whether the ring has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the member owning the given hash position: the first entry at
    /// or after the position, wrapping around to the smallest entry.
    pub fn successor(&self, hash: u64) -> Option<&T> {
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, member)| member)
    }

    /// Walks the ring clockwise from the given position, collecting distinct
    /// members until `count` are found or the ring is exhausted.
    ///
    /// Returns fewer than `count` members when the ring has fewer distinct
    /// members.
    pub fn unique_successors(&self, hash: u64, count: usize) -> Vec<T> {
        let mut result = Vec::new();
        if count == 0 {
            return result;
        }
        for member in self
            .ring
            .range(hash..)
            .chain(self.ring.range(..hash))
            .map(|(_, member)| member)
        {
            if !result.contains(member) {
                result.push(member.clone());
                if result.len() == count {
                    break;
                }
            }
        }
        result
    }
}

/// An immutable view of all rings of a node: one global and one local ring
/// per storage tier.
#[derive(Debug, Clone)]
pub struct RingState {
    /// Per-tier rings over the physical nodes of the tier.
    pub global: HashMap<Tier, HashRing<String>>,
    /// Per-tier rings over the worker thread ids of a node of the tier.
    pub local: HashMap<Tier, HashRing<u32>>,
}

impl RingState {
    /// Creates the ring set for the given configuration: empty global rings,
    /// and local rings pre-populated with the configured thread ids.
    pub fn new(config: &Config) -> Self {
        let mut global = HashMap::new();
        let mut local = HashMap::new();
        for &tier in ALL_TIERS {
            global.insert(tier, HashRing::new(config.virtual_nodes));

            let mut local_ring = HashRing::new(config.virtual_nodes);
            for thread_id in 0..config.tier_metadata(tier).thread_number {
                local_ring.insert(thread_id);
            }
            local.insert(tier, local_ring);
        }
        Self { global, local }
    }

    /// The total number of physical nodes across all storage tiers.
    pub fn node_count(&self) -> usize {
        self.global.values().map(HashRing::len).sum()
    }
}

/// Handle to the node's ring set, shared by all of its worker threads.
///
/// Reads take a cheap [`Arc`] snapshot; membership updates clone the current
/// state, apply the change, and atomically swap the snapshot in, so no reader
/// ever observes a ring mid-mutation.
#[derive(Debug, Clone)]
pub struct SharedRings {
    inner: Arc<RwLock<Arc<RingState>>>,
}

impl SharedRings {
    /// Creates the shared ring set for the given configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(RingState::new(config)))),
        }
    }

    /// Returns the current ring snapshot.
    ///
    /// The snapshot stays valid for the whole handler invocation even if a
    /// membership change swaps the rings concurrently; a slightly stale view
    /// is corrected by the responsibility re-check on the gossip path.
    pub fn snapshot(&self) -> Arc<RingState> {
        self.inner.read().clone()
    }

    /// Adds a node to the given tier's global ring.
    pub fn insert_node(&self, tier: Tier, node_id: &str) {
        self.update(|state| {
            if let Some(ring) = state.global.get_mut(&tier) {
                ring.insert(node_id.to_owned());
            } else {
                log::error!("cannot add node `{}`: unknown tier {:?}", node_id, tier);
            }
        });
    }

    /// Removes a node from the given tier's global ring.
    pub fn remove_node(&self, tier: Tier, node_id: &str) {
        self.update(|state| {
            if let Some(ring) = state.global.get_mut(&tier) {
                ring.remove(&node_id.to_owned());
            } else {
                log::error!("cannot remove node `{}`: unknown tier {:?}", node_id, tier);
            }
        });
    }

    fn update(&self, apply: impl FnOnce(&mut RingState)) {
        let mut guard = self.inner.write();
        let mut state = RingState::clone(&guard);
        apply(&mut state);
        *guard = Arc::new(state);
    }
}

/// Computes the set of threads responsible for the given key across the given
/// tiers.
///
/// For metadata keys the replication factor is the fixed metadata constant,
/// so resolution always succeeds. For client keys the factor must already be
/// cached in `metadata_map`; `None` is returned otherwise, and the caller
/// must defer the operation and issue a [`replication_factor_fetch`].
///
/// A tier without nodes contributes no threads, which is not a failure:
/// callers that need at least one owner escalate across tiers.
///
/// The returned list is ordered by the given tier order, then by ring order
/// of the nodes within a tier, then by ring order of the threads on a node.
pub fn responsible_threads(
    rings: &RingState,
    metadata_map: &HashMap<Key, KeyMetadata>,
    key: &Key,
    tiers: &[Tier],
) -> Option<Vec<KvsThread>> {
    let fixed = (
        METADATA_REPLICATION_FACTOR,
        METADATA_LOCAL_REPLICATION_FACTOR,
    );
    match key {
        Key::Metadata(_) => Some(collect_threads(rings, key, tiers, |_| fixed)),
        Key::Client(_) => {
            let replication = metadata_map.get(key)?.replication.as_ref()?;
            Some(collect_threads(rings, key, tiers, |tier| {
                (
                    replication.global.get(&tier).copied().unwrap_or(0),
                    replication.local.get(&tier).copied().unwrap_or(0),
                )
            }))
        }
    }
}

fn collect_threads(
    rings: &RingState,
    key: &Key,
    tiers: &[Tier],
    factors: impl Fn(Tier) -> (usize, usize),
) -> Vec<KvsThread> {
    let hash = ring_hash(&key.to_string());
    let mut threads = Vec::new();
    for &tier in tiers {
        let (global_replication, local_replication) = factors(tier);
        let (Some(global), Some(local)) = (rings.global.get(&tier), rings.local.get(&tier)) else {
            continue;
        };
        for node_id in global.unique_successors(hash, global_replication) {
            for thread_id in local.unique_successors(hash, local_replication) {
                threads.push(KvsThread::new(node_id.clone(), thread_id));
            }
        }
    }
    threads
}

/// Builds the asynchronous fetch for an unknown replication factor: a GET for
/// the key's replication metadata entry, addressed to a random owner of that
/// entry, with the asking thread's `response_address` as reply-to.
///
/// Returns `None` when the metadata tier has no nodes to ask yet.
pub fn replication_factor_fetch(
    rings: &RingState,
    key: &ClientKey,
    response_address: Address,
) -> Option<(Address, Request)> {
    let metadata_key = Key::Metadata(MetadataKey::Replication { key: key.clone() });
    let owners = responsible_threads(rings, &HashMap::new(), &metadata_key, &[Tier::Memory])?;
    let target = owners.into_iter().choose(&mut rand::thread_rng())?;

    let request = Request {
        request_id: None,
        response_address: Some(response_address),
        ty: RequestType::Get,
        tuples: vec![RequestTuple::get(metadata_key)],
    };
    Some((target.request_topic(), request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Capacities, Replication, Threads},
        metadata::KeyReplication,
    };
    use pretty_assertions::assert_eq;

    fn config() -> Config {
        Config {
            threads: Threads {
                memory: 4,
                disk: 2,
                routing: 1,
            },
            replication: Replication {
                memory: 2,
                disk: 0,
                local: 1,
                minimum: 1,
            },
            capacities: Capacities {
                memory_cap: 1,
                disk_cap: 0,
            },
            virtual_nodes: 128,
        }
    }

    fn ring_of(members: &[&str]) -> HashRing<String> {
        let mut ring = HashRing::new(128);
        for member in members {
            ring.insert((*member).to_owned());
        }
        ring
    }

    #[test]
    fn successor_is_deterministic() {
        let ring = ring_of(&["a", "b", "c"]);
        let hash = ring_hash("some-key");
        let first = ring.successor(hash).cloned();
        for _ in 0..10 {
            assert_eq!(ring.successor(hash).cloned(), first);
        }
    }

    #[test]
    fn unique_successors_returns_distinct_members() {
        let ring = ring_of(&["a", "b", "c"]);
        let owners = ring.unique_successors(ring_hash("some-key"), 2);
        assert_eq!(owners.len(), 2);
        assert_ne!(owners[0], owners[1]);
    }

    #[test]
    fn unique_successors_caps_at_member_count() {
        let ring = ring_of(&["a", "b"]);
        let mut owners = ring.unique_successors(ring_hash("some-key"), 5);
        owners.sort();
        assert_eq!(owners, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn removed_member_no_longer_owns_anything() {
        let mut ring = ring_of(&["a", "b"]);
        ring.remove(&"a".to_owned());
        assert_eq!(ring.len(), 1);
        let owners = ring.unique_successors(ring_hash("some-key"), 2);
        assert_eq!(owners, vec!["b".to_owned()]);
    }

    #[test]
    fn metadata_keys_resolve_without_cached_factor() {
        let rings = SharedRings::new(&config());
        rings.insert_node(Tier::Memory, "node-a");
        let snapshot = rings.snapshot();

        let key = Key::Metadata(MetadataKey::Replication {
            key: ClientKey::from("a"),
        });
        let threads =
            responsible_threads(&snapshot, &HashMap::new(), &key, &[Tier::Memory]).unwrap();
        assert_eq!(threads.len(), METADATA_REPLICATION_FACTOR);
        assert_eq!(threads[0].node_id, "node-a");
    }

    #[test]
    fn client_keys_are_unresolved_without_cached_factor() {
        let rings = SharedRings::new(&config());
        rings.insert_node(Tier::Memory, "node-a");
        let snapshot = rings.snapshot();

        let key = Key::Client(ClientKey::from("a"));
        assert_eq!(
            responsible_threads(&snapshot, &HashMap::new(), &key, &[Tier::Memory]),
            None
        );
    }

    #[test]
    fn client_keys_resolve_with_cached_factor() {
        let cfg = config();
        let rings = SharedRings::new(&cfg);
        rings.insert_node(Tier::Memory, "node-a");
        rings.insert_node(Tier::Memory, "node-b");
        rings.insert_node(Tier::Memory, "node-c");
        let snapshot = rings.snapshot();

        let key = Key::Client(ClientKey::from("a"));
        let mut metadata_map = HashMap::new();
        metadata_map.insert(
            key.clone(),
            KeyMetadata {
                replication: Some(cfg.default_replication()),
                ..Default::default()
            },
        );

        let threads =
            responsible_threads(&snapshot, &metadata_map, &key, &[Tier::Memory]).unwrap();
        // two distinct nodes, one thread each
        assert_eq!(threads.len(), 2);
        assert_ne!(threads[0].node_id, threads[1].node_id);
    }

    #[test]
    fn empty_tier_contributes_no_threads() {
        let cfg = config();
        let rings = SharedRings::new(&cfg);
        rings.insert_node(Tier::Memory, "node-a");
        let snapshot = rings.snapshot();

        let key = Key::Client(ClientKey::from("a"));
        let mut replication = cfg.default_replication();
        replication.global.insert(Tier::Disk, 1);
        let mut metadata_map = HashMap::new();
        metadata_map.insert(
            key.clone(),
            KeyMetadata {
                replication: Some(replication),
                ..Default::default()
            },
        );

        // the disk tier has no nodes, so only memory-tier threads come back
        let threads =
            responsible_threads(&snapshot, &metadata_map, &key, &[Tier::Memory, Tier::Disk])
                .unwrap();
        assert!(threads.iter().all(|t| t.node_id == "node-a"));
    }

    #[test]
    fn snapshot_is_isolated_from_later_updates() {
        let rings = SharedRings::new(&config());
        rings.insert_node(Tier::Memory, "node-a");
        let before = rings.snapshot();
        rings.insert_node(Tier::Memory, "node-b");

        assert_eq!(before.global[&Tier::Memory].len(), 1);
        assert_eq!(rings.snapshot().global[&Tier::Memory].len(), 2);
    }

    #[test]
    fn fetch_targets_a_metadata_owner() {
        let rings = SharedRings::new(&config());
        let snapshot = rings.snapshot();
        // nobody to ask yet
        assert!(replication_factor_fetch(&snapshot, &ClientKey::from("a"), "reply".into())
            .is_none());

        rings.insert_node(Tier::Memory, "node-a");
        let snapshot = rings.snapshot();
        let (address, request) =
            replication_factor_fetch(&snapshot, &ClientKey::from("a"), "reply".into()).unwrap();
        assert!(address.contains("node-a"));
        assert_eq!(request.ty, RequestType::Get);
        assert_eq!(request.response_address.as_deref(), Some("reply"));
        assert!(request.tuples[0].key.is_metadata());
    }
}
