//! Messages related to replication of keys.

use crate::{
    lattice::{LastWriterWinsLattice, Lattice},
    ClientKey, LatticeType, LatticeValue, StrataError,
};

/// Captures the replication factor of an individual key.
///
/// Stored inside the KVS under the key's
/// [`MetadataKey::Replication`][crate::metadata::MetadataKey::Replication]
/// entry, wrapped in a last-writer-wins lattice so that concurrent factor
/// changes converge like any other value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReplicationFactor {
    /// The name of the key whose replication factor is being described.
    pub key: ClientKey,
    /// Mappings from individual tiers to the cross-node replication factor
    /// at that tier.
    pub global: Vec<ReplicationValue>,
    /// Mappings from individual tiers to the within-node replication factor
    /// at that tier.
    pub local: Vec<ReplicationValue>,
}

impl ReplicationFactor {
    /// Encodes this factor into the LWW payload stored under the key's
    /// replication metadata entry, timestamped for the given writer thread.
    pub fn to_lww_payload(&self, thread_id: u32) -> Result<Vec<u8>, StrataError> {
        let serialized = serde_json::to_vec(self)?;
        LatticeValue::Lww(LastWriterWinsLattice::new_now(thread_id, serialized)).serialize()
    }

    /// Decodes a factor from the LWW payload returned by a metadata GET.
    pub fn from_lww_payload(payload: &[u8]) -> Result<Self, StrataError> {
        let value = LatticeValue::deserialize(LatticeType::Lww, payload)?;
        let lww = value.as_lww().map_err(|_| StrataError::Serialize)?;
        Ok(serde_json::from_slice(lww.reveal().value())?)
    }
}

/// The replication level of a single key at a single tier.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReplicationValue {
    /// The tier represented by this message.
    pub tier: super::Tier,
    /// The replication level at this particular tier for this particular key.
    pub value: usize,
}

/// A message to propagate changes to a set of keys' replication factors.
#[derive(Default, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReplicationFactorUpdate {
    /// The set of replication factor updates being sent.
    pub updates: Vec<ReplicationFactor>,
}
