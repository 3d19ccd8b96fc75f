//! Handler for replication-factor fetch responses and the replay of work
//! parked on them.

use super::KvsNode;
use crate::{
    hash_ring::responsible_threads,
    messages::{Message, Request, RequestTuple, Response},
    metadata::{replication_outcome, ReplicationOutcome},
    topics::Address,
    Key,
};
use rand::prelude::IteratorRandom;
use std::collections::HashMap;

impl KvsNode {
    /// Consumes the response to one of this thread's replication-factor
    /// fetches and replays everything that was parked on the key.
    ///
    /// The factor is cached into the key's metadata first (falling back to
    /// the configured defaults when no factor was ever written), then the
    /// key's pending requests and pending gossip are replayed in the order
    /// they were queued.
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
                // the metadata tier moved under us; ask again with a fresh
                // snapshot and keep the parked work where it is
                let rings = self.rings.snapshot();
                self.issue_replication_fetch(&rings, &Key::Client(key), &mut out);
                return out;
            }
        }

        let client_key = Key::Client(key);
        let rings = self.rings.snapshot();

        // replay parked client operations, oldest first
        for pending in self.pending_requests.remove(&client_key) {
            let tuple = RequestTuple {
                key: client_key.clone(),
                lattice_type: pending.lattice_type,
                payload: pending.payload.clone(),
                address_cache_size: None,
            };
            match responsible_threads(&rings, &self.metadata_map, &client_key, &[self.tier]) {
                Some(threads) if threads.contains(&self.wt) => {
                    let response_tuple = self.process_operation(pending.ty, &tuple, threads.len());
                    if let (Some(response_tuple), Some(address)) =
                        (response_tuple, pending.response_address)
                    {
                        out.push((
                            address,
                            Message::Response(Response {
                                response_id: pending.response_id,
                                tuples: vec![response_tuple],
                            }),
                        ));
                    }
                }
                Some(threads) => {
                    // ownership settled elsewhere while the request was
                    // parked: hand the original operation to a true owner
                    if let Some(target) = threads.iter().choose(&mut rand::thread_rng()) {
                        let request = Request {
                            request_id: pending.response_id,
                            response_address: pending.response_address,
                            ty: pending.ty,
                            tuples: vec![tuple],
                        };
                        out.push((target.request_topic(), Message::Request(request)));
                    } else {
                        log::error!(
                            "no responsible threads for key `{}` after factor resolution",
                            client_key
                        );
                    }
                }
                None => log::error!(
                    "replication factor for key `{}` still unknown after response",
                    client_key
                ),
            }
        }

        // replay parked gossip, oldest first
        let mut forward: HashMap<Address, Vec<RequestTuple>> = HashMap::new();
        for pending in self.pending_gossip.remove(&client_key) {
            match responsible_threads(&rings, &self.metadata_map, &client_key, &[self.tier]) {
                Some(threads) if threads.contains(&self.wt) => {
                    self.merge_gossip(client_key.clone(), pending.lattice_type, &pending.payload);
                }
                Some(threads) => {
                    for thread in &threads {
                        forward.entry(thread.gossip_topic()).or_default().push(
                            RequestTuple::put(
                                client_key.clone(),
                                pending.lattice_type,
                                pending.payload.clone(),
                            ),
                        );
                    }
                }
                None => log::error!(
                    "replication factor for key `{}` still unknown after response",
                    client_key
                ),
            }
        }
        for (address, tuples) in forward {
            out.push((address, Message::Request(Request::gossip(tuples))));
        }

        out
    }
}
