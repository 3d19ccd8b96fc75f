//! Anti-entropy: receiving gossip batches and producing the periodic push.

use super::KvsNode;
use crate::{
    hash_ring::responsible_threads,
    messages::{Message, Request, RequestTuple},
    pending::PendingGossip,
    topics::Address,
    Key, LatticeType, ALL_TIERS,
};
use std::collections::{HashMap, HashSet};

impl KvsNode {
    /// Applies an incoming gossip batch from a replica.
    ///
    /// Responsibility is re-resolved per tuple because the rings may have
    /// moved since the sender computed its owner set. Tuples this thread
    /// owns are merged; metadata tuples that landed on the wrong thread are
    /// forwarded to the true owners (batched per destination); everything
    /// else is parked until the key's replication factor is known.
    pub fn handle_gossip(&mut self, gossip: Request) -> Vec<(Address, Message)> {
        let mut out = Vec::new();
        let rings = self.rings.snapshot();
        let mut forward: HashMap<Address, Vec<RequestTuple>> = HashMap::new();

        for tuple in gossip.tuples {
            let key = tuple.key.clone();
            let (Some(lattice_type), Some(payload)) =
                (tuple.lattice_type, tuple.payload.clone())
            else {
                log::error!("gossip tuple for key `{}` has no type or payload", key);
                continue;
            };

            match responsible_threads(&rings, &self.metadata_map, &key, &[self.tier]) {
                Some(threads) if threads.contains(&self.wt) => {
                    self.merge_gossip(key, lattice_type, &payload);
                }
                Some(threads) => {
                    if key.is_metadata() {
                        // metadata must converge even through an intermediary
                        for thread in &threads {
                            forward
                                .entry(thread.gossip_topic())
                                .or_default()
                                .push(tuple.clone());
                        }
                    } else {
                        self.issue_replication_fetch(&rings, &key, &mut out);
                        self.pending_gossip.push(
                            key,
                            PendingGossip {
                                lattice_type,
                                payload,
                            },
                        );
                    }
                }
                None => {
                    self.issue_replication_fetch(&rings, &key, &mut out);
                    self.pending_gossip.push(
                        key,
                        PendingGossip {
                            lattice_type,
                            payload,
                        },
                    );
                }
            }
        }

        for (address, tuples) in forward {
            out.push((address, Message::Request(Request::gossip(tuples))));
        }
        out
    }

    /// One periodic anti-entropy round: pushes every locally changed key to
    /// all of its other owners, as a PUT-shaped gossip batch per destination.
    ///
    /// The push is state-based and at-least-once: the full merged value is
    /// sent, so receivers converge even under reordering or duplication.
    /// Scheduling of the rounds is left to the surrounding driver.
    pub fn gossip_round(&mut self) -> Vec<(Address, Message)> {
        let rings = self.rings.snapshot();
        let mut addr_keyset: HashMap<Address, HashSet<Key>> = HashMap::new();
        let mut unresolved = HashSet::new();

        for key in std::mem::take(&mut self.local_changeset) {
            match responsible_threads(&rings, &self.metadata_map, &key, ALL_TIERS) {
                Some(threads) => {
                    for thread in threads {
                        if thread != self.wt {
                            addr_keyset
                                .entry(thread.gossip_topic())
                                .or_default()
                                .insert(key.clone());
                        }
                    }
                }
                // factor no longer cached; retry in the next round
                None => {
                    unresolved.insert(key);
                }
            }
        }
        self.local_changeset = unresolved;

        self.send_gossip(addr_keyset)
    }

    /// Builds one gossip batch per destination address, carrying the current
    /// merged values of the given keys.
    pub(super) fn send_gossip(
        &self,
        addr_keyset: HashMap<Address, HashSet<Key>>,
    ) -> Vec<(Address, Message)> {
        let mut out = Vec::new();
        for (address, keys) in addr_keyset {
            let mut tuples = Vec::new();
            for key in keys {
                match self.storage.process_get(&key) {
                    Ok((lattice_type, payload)) => {
                        tuples.push(RequestTuple::put(key, lattice_type, payload));
                    }
                    // the value vanished since the change was recorded
                    Err(_) => {}
                }
            }
            if !tuples.is_empty() {
                out.push((address, Message::Request(Request::gossip(tuples))));
            }
        }
        out
    }

    /// Merges a gossiped value into local storage, guarding the key's
    /// established lattice type.
    pub(super) fn merge_gossip(&mut self, key: Key, lattice_type: LatticeType, payload: &[u8]) {
        if let Some(expected) = self.metadata_map.get(&key).and_then(|m| m.lattice_type) {
            if expected != lattice_type {
                log::error!(
                    "lattice type mismatch for key `{}`: {:?} from gossip but {:?} expected",
                    key,
                    lattice_type,
                    expected
                );
                return;
            }
        }
        match self.storage.process_put(key.clone(), lattice_type, payload) {
            Ok(size) => {
                let metadata = self.metadata_map.entry(key).or_default();
                metadata.lattice_type = Some(lattice_type);
                metadata.size = size;
            }
            Err(error) => {
                log::error!("failed to merge gossip for key `{}`: {:#}", key, error);
            }
        }
    }
}
