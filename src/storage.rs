//! The storage adapter that every handler funnels reads and writes through.
//!
//! Wraps the in-memory [`LatticeValueStore`] behind the two operations the
//! request, gossip and replay paths share: merge-and-persist a serialized
//! update, and read back the serialized current value. A durable backend
//! would implement the same contract; merge correctness only requires that
//! re-applying the same update is a no-op, which the lattice laws guarantee.

use crate::{
    store::{LatticeSizeEstimate, LatticeValueStore},
    Key, LatticeType, LatticeValue, StrataError,
};
use eyre::{anyhow, WrapErr};

/// Per-thread storage handle.
#[derive(Default)]
pub struct StorageAdapter {
    store: LatticeValueStore<Key>,
}

impl StorageAdapter {
    /// Creates an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the payload for the given lattice type, merges it into the
    /// stored value (an absent key acts as the bottom element), and returns
    /// the size estimate of the merged result.
    ///
    /// Callers are expected to have checked the key's established lattice
    /// type; a conflicting variant still fails here rather than corrupting
    /// the stored value.
    pub fn process_put(
        &mut self,
        key: Key,
        lattice_type: LatticeType,
        payload: &[u8],
    ) -> eyre::Result<usize> {
        let incoming = LatticeValue::deserialize(lattice_type, payload)
            .wrap_err_with(|| format!("invalid `{:?}` payload for key `{}`", lattice_type, key))?;
        self.store.put(key.clone(), incoming)?;
        let merged = self
            .store
            .get(&key)
            .ok_or_else(|| anyhow!("value for key `{}` vanished after put", key))?;
        Ok(merged.size_estimate())
    }

    /// Reads the current merged value of the key, serialized for the wire.
    ///
    /// Returns [`StrataError::KeyDoesNotExist`] when the key is absent (wire
    /// error code 1).
    pub fn process_get(&self, key: &Key) -> Result<(LatticeType, Vec<u8>), StrataError> {
        let value = self
            .store
            .get(key)
            .ok_or(StrataError::KeyDoesNotExist)?;
        Ok((value.ty(), value.serialize()?))
    }

    /// Returns whether a value is stored under the key.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.store.contains_key(key)
    }
}
