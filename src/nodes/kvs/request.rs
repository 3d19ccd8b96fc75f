//! Handler for client GET/PUT requests.

use super::KvsNode;
use crate::{
    hash_ring::responsible_threads,
    messages::{Message, Request, RequestTuple, RequestType, ResponseTuple},
    pending::PendingRequest,
    topics::Address,
    StrataError,
};

impl KvsNode {
    /// Serves a GET/PUT [`Request`] against this thread's local key set.
    ///
    /// Every tuple is first checked against the current ring snapshot; tuples
    /// this thread is not (or not yet provably) responsible for are answered
    /// with an error, parked as pending, or both, per the rules below. A
    /// [`Response`](crate::messages::Response) is emitted only when the
    /// request names a response address and at least one tuple produced a
    /// result.
    pub fn handle_request(&mut self, request: Request) -> Vec<(Address, Message)> {
        let mut out = Vec::new();
        let mut response = request.new_response();
        let response_address = request.response_address.clone();
        let rings = self.rings.snapshot();

        for tuple in request.tuples {
            let key = tuple.key.clone();
            match responsible_threads(&rings, &self.metadata_map, &key, &[self.tier]) {
                None => {
                    // replication factor unknown: defer and ask for it
                    self.issue_replication_fetch(&rings, &key, &mut out);
                    self.pending_requests.push(
                        key,
                        PendingRequest {
                            ty: request.ty,
                            lattice_type: tuple.lattice_type,
                            payload: tuple.payload,
                            response_address: response_address.clone(),
                            response_id: request.request_id.clone(),
                        },
                    );
                }
                Some(threads) if threads.contains(&self.wt) => {
                    if let Some(response_tuple) =
                        self.process_operation(request.ty, &tuple, threads.len())
                    {
                        response.tuples.push(response_tuple);
                    }
                }
                Some(_) => {
                    if key.is_metadata() {
                        // not responsible for this metadata key: the caller
                        // must re-resolve (error code 2)
                        response.tuples.push(ResponseTuple {
                            key,
                            lattice_type: tuple.lattice_type,
                            payload: None,
                            error: Some(StrataError::WrongThread),
                            invalidate: false,
                        });
                    } else {
                        // the rings moved and our ownership view is stale;
                        // re-fetch the factor and decide on replay
                        self.issue_replication_fetch(&rings, &key, &mut out);
                        self.pending_requests.push(
                            key,
                            PendingRequest {
                                ty: request.ty,
                                lattice_type: tuple.lattice_type,
                                payload: tuple.payload,
                                response_address: response_address.clone(),
                                response_id: request.request_id.clone(),
                            },
                        );
                    }
                }
            }
        }

        if !response.tuples.is_empty() {
            if let Some(address) = response_address {
                out.push((address, Message::Response(response)));
            }
        }
        out
    }

    /// Applies a single GET/PUT tuple that this thread owns.
    ///
    /// Returns `None` for tuples that are dropped without a result: malformed
    /// PUTs and lattice-type mismatches are logged and leave all state
    /// untouched.
    pub(super) fn process_operation(
        &mut self,
        ty: RequestType,
        tuple: &RequestTuple,
        owner_count: usize,
    ) -> Option<ResponseTuple> {
        let key = tuple.key.clone();
        let mut response_tuple = match ty {
            RequestType::Get => match self.storage.process_get(&key) {
                Ok((lattice_type, payload)) => ResponseTuple {
                    key: key.clone(),
                    lattice_type: Some(lattice_type),
                    payload: Some(payload),
                    error: None,
                    invalidate: false,
                },
                Err(error) => ResponseTuple {
                    key: key.clone(),
                    lattice_type: None,
                    payload: None,
                    error: Some(error),
                    invalidate: false,
                },
            },
            RequestType::Put => {
                let Some(lattice_type) = tuple.lattice_type else {
                    log::error!("PUT request for key `{}` is missing a lattice type", key);
                    return None;
                };
                let Some(payload) = tuple.payload.as_deref() else {
                    log::error!("PUT request for key `{}` is missing a payload", key);
                    return None;
                };
                if let Some(expected) = self.metadata_map.get(&key).and_then(|m| m.lattice_type) {
                    if expected != lattice_type {
                        log::error!(
                            "lattice type mismatch for key `{}`: {:?} from query but {:?} expected",
                            key,
                            lattice_type,
                            expected
                        );
                        return None;
                    }
                }
                match self.storage.process_put(key.clone(), lattice_type, payload) {
                    Ok(size) => {
                        let metadata = self.metadata_map.entry(key.clone()).or_default();
                        metadata.lattice_type = Some(lattice_type);
                        metadata.size = size;
                        self.local_changeset.insert(key.clone());
                        ResponseTuple {
                            key: key.clone(),
                            lattice_type: Some(lattice_type),
                            payload: None,
                            error: None,
                            invalidate: false,
                        }
                    }
                    Err(error) => {
                        log::error!("failed to apply PUT for key `{}`: {:#}", key, error);
                        return None;
                    }
                }
            }
        };

        if let Some(cached) = tuple.address_cache_size {
            if cached != owner_count {
                response_tuple.invalidate = true;
            }
        }
        self.track_access(key);
        Some(response_tuple)
    }
}
