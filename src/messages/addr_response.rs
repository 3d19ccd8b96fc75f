//! Provides the [`AddressResponse`] message of the routing tier.

use crate::{topics::KvsThread, ClientKey, StrataError};

/// The routing tier's answer to an [`AddressRequest`][super::AddressRequest].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AddressResponse {
    /// The [`request_id`][super::AddressRequest::request_id] of the answered
    /// request.
    pub response_id: String,
    /// Set to [`StrataError::NoServers`] when no KVS node has joined the
    /// cluster yet; per-key results are meaningless in that case.
    pub error: Option<StrataError>,
    /// The owner sets of the requested keys.
    pub addresses: Vec<KeyAddress>,
}

/// The set of KVS threads responsible for one key.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyAddress {
    /// The key this entry is about.
    pub key: ClientKey,
    /// The threads that own the key, in ring order of the first tier that
    /// yielded owners.
    pub threads: Vec<KvsThread>,
}
