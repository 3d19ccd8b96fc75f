//! Defines the message types that are sent between nodes and threads.
//!
//! Wire encoding is an external concern: these types derive
//! [`serde::Serialize`]/[`serde::Deserialize`] and the transport picks the
//! format.

pub use self::{
    addr_request::AddressRequest,
    addr_response::{AddressResponse, KeyAddress},
    cluster_membership::{ClusterInfo, Departed, Join, TierMembership},
    replication_factor::{ReplicationFactor, ReplicationValue},
    request::{Request, RequestTuple, RequestType},
    response::{Response, ResponseTuple},
};

mod addr_request;
mod addr_response;

pub mod cluster_membership;
pub mod replication_factor;
pub mod request;
pub mod response;

/// The envelope for every message a node handler can emit.
///
/// Handlers return `(Address, Message)` pairs; the transport serializes the
/// wrapped inner type and delivers it to the channel behind the address.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Message {
    /// A GET/PUT [`Request`] (also used for gossip batches).
    Request(Request),
    /// A [`Response`] to a request.
    Response(Response),
    /// An [`AddressRequest`] to the routing tier.
    AddressRequest(AddressRequest),
    /// An [`AddressResponse`] from the routing tier.
    AddressResponse(AddressResponse),
}

/// An enum representing all the tiers the system supports -- currently, a
/// memory tier and a disk-based tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Tier {
    /// The value for the memory tier.
    Memory,
    /// The value for the disk-based tier.
    Disk,
    /// The value for the routing tier.
    Routing,
}
