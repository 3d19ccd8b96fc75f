//! Provides the main [`Request`] struct and related types.

use super::response::Response;
use crate::{topics::Address, Key, LatticeType};

/// An individual GET or PUT request; each request can batch multiple keys.
///
/// The target thread answers with a [`Response`] when the request carries a
/// [`response_address`][Self::response_address]. Anti-entropy gossip reuses
/// this shape: a gossip batch is a PUT request without a response address.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Request {
    /// A client-specific ID used to match asynchronous requests with
    /// responses.
    pub request_id: Option<String>,
    /// The address at which the sender expects the response, if any.
    pub response_address: Option<Address>,
    /// Whether the tuples should be read or written.
    pub ty: RequestType,
    /// The per-key operations batched in this request.
    pub tuples: Vec<RequestTuple>,
}

impl Request {
    /// Constructs an anti-entropy gossip batch carrying the given tuples.
    pub fn gossip(tuples: Vec<RequestTuple>) -> Self {
        Self {
            request_id: None,
            response_address: None,
            ty: RequestType::Put,
            tuples,
        }
    }

    /// Constructs a new [`Response`] for the request, with the
    /// [`response_id`][Response::response_id] set accordingly and an empty
    /// tuple list.
    pub fn new_response(&self) -> Response {
        Response {
            response_id: self.request_id.clone(),
            tuples: Default::default(),
        }
    }
}

/// Specifies whether a request reads or writes its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RequestType {
    /// Request the stored values of the keys.
    Get,
    /// Merge the given payloads into the stored values.
    Put,
}

/// A single key operation within a [`Request`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestTuple {
    /// The key that should be read or updated.
    pub key: Key,
    /// The merge algebra of the payload. Required for PUT, ignored for GET.
    pub lattice_type: Option<LatticeType>,
    /// The serialized lattice element to merge. Required for PUT.
    pub payload: Option<Vec<u8>>,
    /// The number of owner addresses the client currently has cached for the
    /// key; lets the server order a cache invalidation after membership
    /// changes.
    pub address_cache_size: Option<usize>,
}

impl RequestTuple {
    /// Constructs a GET tuple for the given key.
    pub fn get(key: Key) -> Self {
        Self {
            key,
            lattice_type: None,
            payload: None,
            address_cache_size: None,
        }
    }

    /// Constructs a PUT tuple merging the given payload into the key.
    pub fn put(key: Key, lattice_type: LatticeType, payload: Vec<u8>) -> Self {
        Self {
            key,
            lattice_type: Some(lattice_type),
            payload: Some(payload),
            address_cache_size: None,
        }
    }
}
