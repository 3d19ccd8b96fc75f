//! Provides the [`AddressRequest`] message for querying the routing tier.

use crate::{topics::Address, ClientKey};

/// Asks the routing tier which KVS threads own the given keys.
///
/// Answered with an [`AddressResponse`][super::AddressResponse].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AddressRequest {
    /// A client-specific ID used to match the asynchronous response.
    pub request_id: String,
    /// The address at which the client is waiting for the response.
    pub response_address: Address,
    /// The keys whose owners should be resolved.
    pub keys: Vec<ClientKey>,
}
