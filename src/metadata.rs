//! Provides the [`MetadataKey`] type that addresses internal bookkeeping data
//! stored inside the KVS itself, and the per-key [`KeyMetadata`] record that
//! owning threads maintain.

use crate::{
    messages::{replication_factor::ReplicationFactor, response::ResponseTuple, Tier},
    ClientKey, Key, LatticeType, StrataError,
};
use eyre::{anyhow, bail};
use std::collections::HashMap;

/// Used to request and update metadata between nodes.
///
/// Metadata keys live in the same store as client keys but replicate with a
/// fixed, small factor so that they can be located without knowing any
/// per-key state.
#[derive(Debug, PartialEq, Eq, Hash, Clone, serde::Serialize, serde::Deserialize)]
pub enum MetadataKey {
    /// Key under which the replication metadata of a [`ClientKey`] is stored.
    Replication {
        /// The client key whose replication factor is requested/updated.
        key: ClientKey,
    },
}

impl std::fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataKey::Replication { key } => write!(f, "replication|{}", key),
        }
    }
}

impl std::convert::TryFrom<Key> for MetadataKey {
    type Error = eyre::Error;

    fn try_from(value: Key) -> Result<Self, Self::Error> {
        match value {
            Key::Client(_) => Err(anyhow!("key is a client key instead of a metadata key")),
            Key::Metadata(key) => Ok(key),
        }
    }
}

/// Per-key bookkeeping kept by each owning thread.
///
/// Created on first PUT or on a replication-factor fetch, updated on every
/// successful PUT. Entries are never explicitly deleted; stale entries for
/// removed keys are harmless because every use re-checks the stored value.
#[derive(Debug, Clone, Default)]
pub struct KeyMetadata {
    /// The merge algebra of the key's value, fixed by the first write this
    /// thread observed.
    pub lattice_type: Option<LatticeType>,
    /// Size estimate of the current merged value, in bytes.
    pub size: usize,
    /// The key's replication factor, once known. `None` means resolution of
    /// the key's owners must be deferred until a fetch completes.
    pub replication: Option<KeyReplication>,
}

/// How many replicas a key should have, per tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReplication {
    /// Cross-node replica counts, per tier.
    pub global: HashMap<Tier, usize>,
    /// Per-node thread replica counts, per tier.
    pub local: HashMap<Tier, usize>,
}

impl KeyReplication {
    /// Converts the wire representation into the cached form.
    pub fn from_message(factor: &ReplicationFactor) -> Self {
        Self {
            global: factor
                .global
                .iter()
                .map(|rep| (rep.tier, rep.value))
                .collect(),
            local: factor
                .local
                .iter()
                .map(|rep| (rep.tier, rep.value))
                .collect(),
        }
    }
}

/// Describes per-[`Tier`] configuration.
#[derive(Debug, Clone)]
pub struct TierMetadata {
    /// The number of worker threads configured for the tier.
    pub thread_number: u32,
    /// The default replication factor configured for the tier.
    pub default_replication: usize,
    /// The configured capacity of nodes of this tier, in bytes.
    pub node_capacity: u64,
}

/// Outcome of a replication-factor fetch, as reported by the queried thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// The stored factor for the key.
    Known(KeyReplication),
    /// No factor was ever written for the key; the caller should fall back to
    /// the configured defaults.
    Unset,
    /// The queried thread was not responsible for the metadata key; the fetch
    /// must be re-issued against a fresh ring snapshot.
    WrongThread,
}

/// Extracts the fetched replication factor from the response tuple of a
/// replication-factor fetch.
///
/// The factor is stored as a last-writer-wins value whose payload is the
/// serialized [`ReplicationFactor`] message.
pub fn replication_outcome(tuple: &ResponseTuple) -> eyre::Result<(ClientKey, ReplicationOutcome)> {
    let key = match &tuple.key {
        Key::Metadata(MetadataKey::Replication { key }) => key.clone(),
        other => bail!("unexpected key `{}` in replication factor response", other),
    };

    let outcome = match tuple.error {
        None => {
            let payload = tuple
                .payload
                .as_deref()
                .ok_or_else(|| anyhow!("replication factor response has no payload"))?;
            let factor = ReplicationFactor::from_lww_payload(payload)?;
            ReplicationOutcome::Known(KeyReplication::from_message(&factor))
        }
        Some(StrataError::KeyDoesNotExist) => ReplicationOutcome::Unset,
        Some(StrataError::WrongThread) => ReplicationOutcome::WrongThread,
        Some(other) => bail!("replication factor fetch for key `{}` failed: {}", key, other),
    };

    Ok((key, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::replication_factor::ReplicationValue;

    #[test]
    fn outcome_round_trips_through_lww_payload() {
        let key = ClientKey::from("a");
        let factor = ReplicationFactor {
            key: key.clone(),
            global: vec![ReplicationValue {
                tier: Tier::Memory,
                value: 2,
            }],
            local: vec![ReplicationValue {
                tier: Tier::Memory,
                value: 1,
            }],
        };

        let tuple = ResponseTuple {
            key: Key::Metadata(MetadataKey::Replication { key: key.clone() }),
            lattice_type: Some(LatticeType::Lww),
            payload: Some(factor.to_lww_payload(0).unwrap()),
            error: None,
            invalidate: false,
        };

        let (parsed_key, outcome) = replication_outcome(&tuple).unwrap();
        assert_eq!(parsed_key, key);
        assert_eq!(
            outcome,
            ReplicationOutcome::Known(KeyReplication::from_message(&factor))
        );
    }

    #[test]
    fn missing_factor_maps_to_unset() {
        let key = ClientKey::from("a");
        let tuple = ResponseTuple {
            key: Key::Metadata(MetadataKey::Replication { key }),
            lattice_type: None,
            payload: None,
            error: Some(StrataError::KeyDoesNotExist),
            invalidate: false,
        };

        let (_, outcome) = replication_outcome(&tuple).unwrap();
        assert_eq!(outcome, ReplicationOutcome::Unset);
    }
}
