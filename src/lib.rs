#![warn(missing_docs)]

//! Core of the `strata` key-value store: a tiered, replicated,
//! eventually-consistent store built on mergeable lattice values.
//!
//! Clients resolve which server threads own a key through the routing tier
//! (see [`nodes::RoutingNode`]), then read and write directly against the
//! owning KVS threads (see [`nodes::KvsNode`]). Concurrent writes are
//! resolved through the join operation of the key's lattice type rather than
//! through locking or consensus, and replicas converge via periodic
//! state-based gossip.
//!
//! The message transport and the durable storage backend are external
//! collaborators: node handlers consume already-decoded messages and return
//! batches of `(address, message)` pairs for the surrounding driver to send.

pub use strata_api::{lattice, ClientKey, LatticeType, LatticeValue, StrataError};

use eyre::anyhow;
use messages::Tier;
use metadata::MetadataKey;
use std::fmt::Display;

pub mod config;
pub mod hash_ring;
pub mod messages;
pub mod metadata;
pub mod nodes;
pub mod pending;
pub mod storage;
pub mod store;
pub mod topics;

/// List of all storage [`Tier`]s, in escalation order (the `Routing` tier is
/// not a storage tier).
pub const ALL_TIERS: &[Tier] = &[Tier::Memory, Tier::Disk];

/// The key type used in the key-value store.
#[derive(Debug, PartialEq, Eq, Hash, Clone, serde::Serialize, serde::Deserialize)]
pub enum Key {
    /// A key supplied by a client.
    Client(ClientKey),
    /// Reserved namespace used to store internal metadata, e.g. per-key
    /// replication factors.
    Metadata(MetadataKey),
}

impl Key {
    /// Returns whether this is an internal metadata key.
    pub fn is_metadata(&self) -> bool {
        matches!(self, Key::Metadata(_))
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Client(key) => Display::fmt(key, f),
            Key::Metadata(key) => write!(f, "metadata|{}", key),
        }
    }
}

impl From<MetadataKey> for Key {
    fn from(key: MetadataKey) -> Self {
        Self::Metadata(key)
    }
}

impl From<ClientKey> for Key {
    fn from(key: ClientKey) -> Self {
        Self::Client(key)
    }
}

impl<'a> From<&'a ClientKey> for Key {
    fn from(key: &'a ClientKey) -> Self {
        Self::Client(key.clone())
    }
}

impl std::convert::TryFrom<Key> for ClientKey {
    type Error = eyre::Error;

    fn try_from(value: Key) -> Result<Self, Self::Error> {
        match value {
            Key::Metadata(_) => Err(anyhow!("key is a metadata key instead of a client key")),
            Key::Client(key) => Ok(key),
        }
    }
}
