//! The routing-thread actor that answers "who owns key K" queries.
//!
//! Clients that prefer indirect lookup send an
//! [`AddressRequest`][crate::messages::AddressRequest] here before contacting
//! the storage threads directly. Resolution starts at the lowest storage tier
//! and escalates while a tier yields no owners.

use crate::{
    config::Config,
    hash_ring::{replication_factor_fetch, responsible_threads, RingState, SharedRings},
    messages::{
        cluster_membership::{Departed, Join},
        AddressRequest, AddressResponse, KeyAddress, Message, Response,
    },
    metadata::{replication_outcome, KeyMetadata, KeyReplication, ReplicationOutcome},
    pending::PendingMap,
    topics::{Address, KvsThread, RoutingThread},
    ClientKey, Key, StrataError, ALL_TIERS,
};
use std::{collections::HashMap, sync::Arc};

/// The owned state of one routing thread.
pub struct RoutingNode {
    config: Arc<Config>,
    /// The identity of this routing thread.
    rt: RoutingThread,
    /// Shared, snapshot-swapped hash rings of the node.
    rings: SharedRings,
    /// Replication factors this thread has learned so far.
    metadata_map: HashMap<Key, KeyMetadata>,
    /// Address requests parked on an unknown replication factor, as
    /// `(response_address, request_id)` pairs.
    pending_addr: PendingMap<(Address, String)>,
}

impl RoutingNode {
    /// Creates the actor state for the given routing thread.
    pub fn new(config: Arc<Config>, node_id: String, thread_id: u32, rings: SharedRings) -> Self {
        Self {
            config,
            rt: RoutingThread::new(node_id, thread_id),
            rings,
            metadata_map: HashMap::new(),
            pending_addr: PendingMap::default(),
        }
    }

    /// The identity of this routing thread.
    pub fn thread(&self) -> &RoutingThread {
        &self.rt
    }

    /// Adds a joined node to the shared rings.
    pub fn handle_join(&self, join: &Join) {
        self.rings.insert_node(join.tier, &join.node_id);
    }

    /// Removes a departed node from the shared rings.
    pub fn handle_depart(&self, depart: &Departed) {
        self.rings.remove_node(depart.tier, &depart.node_id);
    }

    /// Answers a "who owns these keys" query.
    ///
    /// With no servers in the cluster at all, a single
    /// [`StrataError::NoServers`] response is returned instead of per-key
    /// errors. If any key's replication factor is unknown, the whole request
    /// parks until the factor response arrives; the client receives no
    /// partial response.
    pub fn handle_address_request(&mut self, request: AddressRequest) -> Vec<(Address, Message)> {
        let mut out = Vec::new();
        let rings = self.rings.snapshot();
        let mut response = AddressResponse {
            response_id: request.request_id.clone(),
            error: None,
            addresses: Vec::new(),
        };

        if rings.node_count() == 0 {
            response.error = Some(StrataError::NoServers);
            out.push((request.response_address, Message::AddressResponse(response)));
            return out;
        }

        for key in &request.keys {
            match self.key_owners(&rings, key) {
                Some(threads) => response.addresses.push(KeyAddress {
                    key: key.clone(),
                    threads,
                }),
                None => {
                    self.pending_addr.push(
                        Key::Client(key.clone()),
                        (request.response_address.clone(), request.request_id.clone()),
                    );
                    match replication_factor_fetch(
                        &rings,
                        key,
                        self.rt.replication_response_topic(),
                    ) {
                        Some((address, fetch)) => out.push((address, Message::Request(fetch))),
                        None => log::warn!(
                            "cannot fetch replication factor for key `{}`: no nodes in the metadata tier",
                            key
                        ),
                    }
                    return out;
                }
            }
        }

        if !response.addresses.is_empty() {
            out.push((request.response_address, Message::AddressResponse(response)));
        }
        out
    }

    /// Consumes the response to one of this thread's replication-factor
    /// fetches and answers every address request parked on the key.
    pub fn handle_replication_response(&mut self, response: Response) -> Vec<(Address, Message)> {
        let mut out = Vec::new();

        let Some(tuple) = response.tuples.into_iter().next() else {
            log::warn!("replication factor response carries no tuples");
            return out;
        };
        let (key, outcome) = match replication_outcome(&tuple) {
            Ok(parsed) => parsed,
            Err(error) => {
                log::error!("discarding replication factor response: {:#}", error);
                return out;
            }
        };

        match outcome {
            ReplicationOutcome::Known(replication) => self.update_replication(&key, replication),
            ReplicationOutcome::Unset => {
                let defaults = self.config.default_replication();
                self.update_replication(&key, defaults);
            }
            ReplicationOutcome::WrongThread => {
                let rings = self.rings.snapshot();
                match replication_factor_fetch(&rings, &key, self.rt.replication_response_topic())
                {
                    Some((address, fetch)) => out.push((address, Message::Request(fetch))),
                    None => log::warn!(
                        "cannot re-fetch replication factor for key `{}`: no nodes in the metadata tier",
                        key
                    ),
                }
                return out;
            }
        }

        let rings = self.rings.snapshot();
        let client_key = Key::Client(key.clone());
        for (response_address, request_id) in self.pending_addr.remove(&client_key) {
            match self.key_owners(&rings, &key) {
                Some(threads) => {
                    let response = AddressResponse {
                        response_id: request_id,
                        error: None,
                        addresses: vec![KeyAddress {
                            key: key.clone(),
                            threads,
                        }],
                    };
                    out.push((response_address, Message::AddressResponse(response)));
                }
                None => log::error!(
                    "replication factor for key `{}` still unknown after response",
                    key
                ),
            }
        }

        out
    }

    /// Resolves the owner set of a key, escalating across tiers.
    ///
    /// Tiers are tried in escalation order; the first tier yielding a
    /// non-empty owner set wins. `None` means the key's replication factor is
    /// unknown; an empty list means no tier has owners for the key.
    fn key_owners(&self, rings: &RingState, key: &ClientKey) -> Option<Vec<KvsThread>> {
        let key = Key::Client(key.clone());
        for &tier in ALL_TIERS {
            let threads = responsible_threads(rings, &self.metadata_map, &key, &[tier])?;
            if !threads.is_empty() {
                return Some(threads);
            }
        }
        Some(Vec::new())
    }

    /// Caches a freshly learned replication factor for the key.
    fn update_replication(&mut self, key: &ClientKey, replication: KeyReplication) {
        self.metadata_map
            .entry(Key::Client(key.clone()))
            .or_default()
            .replication = Some(replication);
    }
}
