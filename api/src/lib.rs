#![warn(missing_docs)]

//! Shared vocabulary of the `strata` key-value store: the lattice types that
//! make concurrent writes mergeable, the [`LatticeValue`] wrapper stored under
//! each key, and the error codes that travel inside responses.
//!
//! This crate is deliberately free of any node logic so that clients can
//! construct and inspect values without depending on the server side.

use eyre::anyhow;
use lattice::{CausalLattice, Lattice, LastWriterWinsLattice, SetLattice};
use std::{error::Error, fmt::Display, sync::Arc};

pub mod lattice;

/// A string-based key type used to store user-supplied data.
///
/// Keys are cloned on almost every hop (routing, pending queues, gossip
/// batches), so the string is wrapped in an [`Arc`] to make clones a
/// reference-count bump instead of a reallocation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientKey(Arc<String>);

impl std::ops::Deref for ClientKey {
    type Target = Arc<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Arc<String>> for ClientKey {
    fn from(k: Arc<String>) -> Self {
        Self(k)
    }
}

impl From<String> for ClientKey {
    fn from(k: String) -> Self {
        Self::from(Arc::new(k))
    }
}

impl From<&str> for ClientKey {
    fn from(k: &str) -> Self {
        Self::from(k.to_owned())
    }
}

/// A value stored in the key-value store, tagged with its merge algebra.
///
/// Two values of the same variant can always be merged deterministically; see
/// [`Self::try_merge`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LatticeValue {
    /// Last-writer-wins lattice.
    Lww(LastWriterWinsLattice<Vec<u8>>),
    /// Add-only set lattice.
    Set(SetLattice<Vec<u8>>),
    /// Vector-clock guarded causal lattice.
    Causal(CausalLattice<SetLattice<Vec<u8>>>),
}

impl LatticeValue {
    /// Tries to cast the value to a [`LastWriterWinsLattice`].
    ///
    /// Errors if the value is of a different type.
    pub fn as_lww(&self) -> eyre::Result<&LastWriterWinsLattice<Vec<u8>>> {
        match self {
            Self::Lww(val) => Ok(val),
            other => Err(anyhow!("expected Lww lattice, got `{:?}`", other)),
        }
    }

    /// Tries to cast the value to a [`LastWriterWinsLattice`], taking ownership.
    ///
    /// Errors if the value is of a different type.
    pub fn into_lww(self) -> eyre::Result<LastWriterWinsLattice<Vec<u8>>> {
        match self {
            Self::Lww(val) => Ok(val),
            other => Err(anyhow!("expected Lww lattice, got `{:?}`", other)),
        }
    }

    /// Tries to cast the value to a [`SetLattice`].
    ///
    /// Errors if the value is of a different type.
    pub fn as_set(&self) -> eyre::Result<&SetLattice<Vec<u8>>> {
        match self {
            Self::Set(val) => Ok(val),
            other => Err(anyhow!("expected Set lattice, got `{:?}`", other)),
        }
    }

    /// Tries to cast the value to a [`SetLattice`], taking ownership.
    ///
    /// Errors if the value is of a different type.
    pub fn into_set(self) -> eyre::Result<SetLattice<Vec<u8>>> {
        match self {
            Self::Set(val) => Ok(val),
            other => Err(anyhow!("expected Set lattice, got `{:?}`", other)),
        }
    }

    /// Tries to cast the value to a [`CausalLattice`].
    ///
    /// Errors if the value is of a different type.
    pub fn as_causal(&self) -> eyre::Result<&CausalLattice<SetLattice<Vec<u8>>>> {
        match self {
            Self::Causal(val) => Ok(val),
            other => Err(anyhow!("expected Causal lattice, got `{:?}`", other)),
        }
    }

    /// Tries to cast the value to a [`CausalLattice`], taking ownership.
    ///
    /// Errors if the value is of a different type.
    pub fn into_causal(self) -> eyre::Result<CausalLattice<SetLattice<Vec<u8>>>> {
        match self {
            Self::Causal(val) => Ok(val),
            other => Err(anyhow!("expected Causal lattice, got `{:?}`", other)),
        }
    }

    /// Merges the given value into `self` if both values are of the same
    /// lattice type.
    ///
    /// Returns [`StrataError::Lattice`] if the variants differ; `self` is left
    /// untouched in that case.
    pub fn try_merge(&mut self, other: &LatticeValue) -> Result<(), StrataError> {
        match (self, other) {
            (LatticeValue::Lww(s), LatticeValue::Lww(other)) => {
                s.merge(other);
                Ok(())
            }
            (LatticeValue::Set(s), LatticeValue::Set(other)) => {
                s.merge(other);
                Ok(())
            }
            (LatticeValue::Causal(s), LatticeValue::Causal(other)) => {
                s.merge(other);
                Ok(())
            }
            _ => Err(StrataError::Lattice),
        }
    }

    /// Returns the lattice type of the value.
    pub fn ty(&self) -> LatticeType {
        match self {
            LatticeValue::Lww(_) => LatticeType::Lww,
            LatticeValue::Set(_) => LatticeType::Set,
            LatticeValue::Causal(_) => LatticeType::Causal,
        }
    }

    /// Encodes the value into the opaque byte payload carried in messages.
    ///
    /// The encoding is per-variant: the payload holds only the lattice
    /// element, while the variant tag travels separately as a
    /// [`LatticeType`] next to the payload. Round-trips losslessly through
    /// [`Self::deserialize`] for values in canonical merged form.
    pub fn serialize(&self) -> Result<Vec<u8>, StrataError> {
        let bytes = match self {
            LatticeValue::Lww(lattice) => serde_json::to_vec(lattice.reveal())?,
            LatticeValue::Set(lattice) => serde_json::to_vec(lattice.reveal())?,
            LatticeValue::Causal(lattice) => serde_json::to_vec(lattice.reveal())?,
        };
        Ok(bytes)
    }

    /// Decodes a payload produced by [`Self::serialize`] for the given type.
    pub fn deserialize(ty: LatticeType, payload: &[u8]) -> Result<Self, StrataError> {
        let value = match ty {
            LatticeType::Lww => {
                LatticeValue::Lww(LastWriterWinsLattice::new(serde_json::from_slice(payload)?))
            }
            LatticeType::Set => {
                LatticeValue::Set(SetLattice::new(serde_json::from_slice(payload)?))
            }
            LatticeType::Causal => {
                LatticeValue::Causal(CausalLattice::new(serde_json::from_slice(payload)?))
            }
        };
        Ok(value)
    }
}

impl From<LastWriterWinsLattice<Vec<u8>>> for LatticeValue {
    fn from(val: LastWriterWinsLattice<Vec<u8>>) -> Self {
        Self::Lww(val)
    }
}

impl From<SetLattice<Vec<u8>>> for LatticeValue {
    fn from(val: SetLattice<Vec<u8>>) -> Self {
        Self::Set(val)
    }
}

impl From<CausalLattice<SetLattice<Vec<u8>>>> for LatticeValue {
    fn from(val: CausalLattice<SetLattice<Vec<u8>>>) -> Self {
        Self::Causal(val)
    }
}

/// The closed set of merge algebras that values can use.
///
/// A key's type is fixed by its first write; later writes with a different
/// type are rejected. "No type" (e.g. on a GET tuple) is expressed as
/// `Option<LatticeType>` in messages rather than an extra variant here.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum LatticeType {
    /// Last-writer-wins lattice.
    Lww,
    /// Add-only set lattice.
    Set,
    /// Vector-clock guarded causal lattice.
    Causal,
}

/// Used to signal errors in messages.
///
/// On the wire these map to the tuple-level error codes: success is the
/// absence of an error, [`Self::KeyDoesNotExist`] is code 1 and
/// [`Self::WrongThread`] is code 2.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum StrataError {
    /// The requested key does not exist.
    KeyDoesNotExist,
    /// The request was sent to a thread that is not responsible for the key.
    WrongThread,
    /// The request timed out.
    Timeout,
    /// The lattice type was not correctly specified or conflicted with an
    /// existing key.
    Lattice,
    /// Returned by the routing tier if no servers are in the cluster.
    NoServers,
    /// Failed to serialize or deserialize a value.
    Serialize,
}

impl Display for StrataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyDoesNotExist => write!(f, "The requested key does not exist."),
            Self::WrongThread => write!(
                f,
                "The request was sent to the wrong thread, which is not responsible for the key."
            ),
            Self::Timeout => write!(f, "The request timed out."),
            Self::Lattice => write!(
                f,
                "The lattice type was not correctly specified or conflicted with an existing key."
            ),
            Self::NoServers => write!(f, "No servers are in the cluster."),
            Self::Serialize => write!(f, "Serialization error."),
        }
    }
}

impl Error for StrataError {}

impl From<serde_json::Error> for StrataError {
    fn from(_: serde_json::Error) -> Self {
        Self::Serialize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Timestamp;

    #[test]
    fn try_merge_rejects_mismatched_variants() {
        let mut lww = LatticeValue::Lww(LastWriterWinsLattice::from_pair(
            Timestamp::new(1),
            b"v".to_vec(),
        ));
        let set = LatticeValue::Set(SetLattice::default());

        let before = lww.clone();
        assert_eq!(lww.try_merge(&set), Err(StrataError::Lattice));
        assert_eq!(lww, before);
    }

    #[test]
    fn payload_round_trip() {
        let mut set = SetLattice::default();
        set.insert(b"a".to_vec());
        set.insert(b"b".to_vec());
        let value = LatticeValue::Set(set);

        let payload = value.serialize().unwrap();
        let decoded = LatticeValue::deserialize(LatticeType::Set, &payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn payload_type_tag_must_match() {
        let value = LatticeValue::Lww(LastWriterWinsLattice::from_pair(
            Timestamp::new(7),
            b"x".to_vec(),
        ));
        let payload = value.serialize().unwrap();
        assert_eq!(
            LatticeValue::deserialize(LatticeType::Causal, &payload),
            Err(StrataError::Serialize)
        );
    }
}
