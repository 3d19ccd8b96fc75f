//! Provides the [`Response`] message sent in reply to [`Request`]s.
//!
//! [`Request`]: super::Request

use crate::{Key, LatticeType, StrataError};

/// The answer to a GET/PUT [`Request`][super::Request], with one tuple per
/// processed key.
///
/// Keys that were deferred (unknown replication factor) or dropped (malformed
/// or type-mismatched tuples) produce no response tuple.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Response {
    /// The [`request_id`][super::Request::request_id] of the answered
    /// request, if it carried one.
    pub response_id: Option<String>,
    /// The per-key results.
    pub tuples: Vec<ResponseTuple>,
}

/// The result of a single key operation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseTuple {
    /// The key this result is about.
    pub key: Key,
    /// The merge algebra of the returned payload (for successful GETs) or of
    /// the applied update (for successful PUTs).
    pub lattice_type: Option<LatticeType>,
    /// The serialized current value, for successful GETs.
    pub payload: Option<Vec<u8>>,
    /// `None` on success; [`StrataError::KeyDoesNotExist`] when a GET misses;
    /// [`StrataError::WrongThread`] when a metadata key was addressed to a
    /// non-owning thread.
    pub error: Option<StrataError>,
    /// Set when the client's cached owner set for the key is out of date and
    /// should be re-resolved through the routing tier.
    pub invalidate: bool,
}
