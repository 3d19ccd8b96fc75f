//! Defines the addresses at which the threads of each node kind receive
//! messages.
//!
//! An [`Address`] is an opaque topic string; the transport layer maps it to
//! an actual channel. Handlers return `(Address, Message)` pairs, so the
//! address scheme is the only coupling between this core and the transport.

/// The address of a thread-specific message channel.
pub type Address = String;

// The topic on which KVS threads receive client requests.
const REQUEST_TOPIC: &str = "requests";

// The topic on which KVS threads receive anti-entropy pushes.
const GOSSIP_TOPIC: &str = "gossip";

// The topic on which threads receive replication-factor fetch responses.
const REPLICATION_RESPONSE_TOPIC: &str = "replication_response";

// The topic on which routing threads receive address requests.
const ADDRESS_REQUEST_TOPIC: &str = "address_request";

// The topic on which clients receive responses from the KVS.
const USER_RESPONSE_TOPIC: &str = "user_response";

// The topic on which clients receive responses from the routing tier.
const USER_KEY_ADDRESS_TOPIC: &str = "user_key_address";

/// Addresses a specific worker thread of a specific _KVS_ node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct KvsThread {
    /// The ID of the addressed KVS node.
    pub node_id: String,
    /// The ID of the addressed thread on the KVS node.
    pub thread_id: u32,
}

impl KvsThread {
    /// Address the given thread of the given KVS node.
    pub fn new(node_id: String, thread_id: u32) -> Self {
        Self { node_id, thread_id }
    }

    /// The topic on which this thread receives GET/PUT
    /// [`Request`][crate::messages::Request] messages.
    pub fn request_topic(&self) -> Address {
        format!("/strata/{}/{}/{}", self.node_id, REQUEST_TOPIC, self.thread_id)
    }

    /// The topic on which this thread receives anti-entropy
    /// [`Request`][crate::messages::Request] batches from replicas.
    pub fn gossip_topic(&self) -> Address {
        format!("/strata/{}/{}/{}", self.node_id, GOSSIP_TOPIC, self.thread_id)
    }

    /// The topic on which this thread receives the responses to its
    /// replication-factor fetches.
    pub fn replication_response_topic(&self) -> Address {
        format!(
            "/strata/{}/{}/{}",
            self.node_id, REPLICATION_RESPONSE_TOPIC, self.thread_id
        )
    }
}

/// Addresses a specific thread of a specific _routing_ node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RoutingThread {
    /// The ID of the addressed routing node.
    pub node_id: String,
    /// The ID of the addressed thread.
    pub thread_id: u32,
}

impl RoutingThread {
    /// Addresses the given thread of the given routing node.
    pub fn new(node_id: String, thread_id: u32) -> Self {
        Self { node_id, thread_id }
    }

    /// The topic on which this thread receives
    /// [`AddressRequest`][crate::messages::AddressRequest] messages.
    pub fn address_request_topic(&self) -> Address {
        format!(
            "/strata/{}/{}/{}",
            self.node_id, ADDRESS_REQUEST_TOPIC, self.thread_id
        )
    }

    /// The topic on which this thread receives the responses to its
    /// replication-factor fetches.
    pub fn replication_response_topic(&self) -> Address {
        format!(
            "/strata/{}/{}/{}",
            self.node_id, REPLICATION_RESPONSE_TOPIC, self.thread_id
        )
    }
}

/// Addresses a specific thread of a specific _client_ node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientThread {
    /// The node ID of the client node.
    pub node_id: String,
    /// The ID of the addressed thread.
    pub thread_id: u32,
}

impl ClientThread {
    /// Address the given thread of the given client node.
    pub fn new(node_id: String, thread_id: u32) -> Self {
        Self { node_id, thread_id }
    }

    /// The topic on which [`Response`][crate::messages::Response] messages
    /// should be sent in reply to requests.
    pub fn response_topic(&self) -> Address {
        format!(
            "/strata/{}/{}/{}",
            self.node_id, USER_RESPONSE_TOPIC, self.thread_id
        )
    }

    /// The topic on which
    /// [`AddressResponse`][crate::messages::AddressResponse] messages should
    /// be sent in reply to address requests.
    pub fn address_response_topic(&self) -> Address {
        format!(
            "/strata/{}/{}/{}",
            self.node_id, USER_KEY_ADDRESS_TOPIC, self.thread_id
        )
    }
}
