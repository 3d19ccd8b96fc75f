//! A key value store implementation for lattice types.

use crate::{
    lattice::{CausalLattice, LastWriterWinsLattice, Lattice, SetLattice},
    LatticeValue, StrataError,
};
use std::{
    borrow::Borrow,
    collections::{hash_map, HashMap},
    hash::Hash,
    mem,
};

/// A key-value store for lattice values.
///
/// Writes never overwrite: inserting under an existing key merges the new
/// value into the stored one, so applying the same update twice leaves the
/// store unchanged.
pub struct LatticeValueStore<K> {
    db: HashMap<K, LatticeValue>,
}

impl<K> LatticeValueStore<K>
where
    K: Hash + Eq,
{
    /// Gets the current value for the given key, if present.
    pub fn get<Q>(&self, key: &Q) -> Option<&LatticeValue>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.db.get(key)
    }

    /// Inserts or updates the map with the given key/value combination.
    ///
    /// If a value is already stored under the key, the two values are merged
    /// with [`LatticeValue::try_merge`]. This requires that both values are
    /// the same variant of [`LatticeValue`]; otherwise a
    /// [`StrataError::Lattice`] is returned and the stored value is left
    /// untouched.
    pub fn put(&mut self, key: K, value: LatticeValue) -> Result<(), StrataError> {
        match self.db.entry(key) {
            hash_map::Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
            hash_map::Entry::Occupied(mut entry) => entry.get_mut().try_merge(&value),
        }
    }

    /// Removes the given key from the store.
    pub fn remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.db.remove(key);
    }

    /// Returns an [`Iterator`] of all keys in the store.
    pub fn keys(&self) -> hash_map::Keys<K, LatticeValue> {
        self.db.keys()
    }

    /// Returns whether the store contains the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.db.contains_key(key)
    }

    /// An iterator visiting all stored key-value pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &LatticeValue)> {
        self.db.iter()
    }
}

impl<K> Default for LatticeValueStore<K> {
    fn default() -> Self {
        Self {
            db: Default::default(),
        }
    }
}

/// Estimates the in-memory size of a lattice value.
///
/// The estimate is recorded into the per-key metadata on every PUT and feeds
/// the capacity accounting of the external monitoring system.
pub trait LatticeSizeEstimate {
    /// Returns an estimate of the size of the lattice, in bytes.
    fn size_estimate(&self) -> usize;
}

impl LatticeSizeEstimate for LatticeValue {
    fn size_estimate(&self) -> usize {
        match self {
            LatticeValue::Lww(lattice) => lattice.size_estimate(),
            LatticeValue::Set(lattice) => lattice.size_estimate(),
            LatticeValue::Causal(lattice) => lattice.size_estimate(),
        }
    }
}

impl LatticeSizeEstimate for LastWriterWinsLattice<Vec<u8>> {
    fn size_estimate(&self) -> usize {
        self.element().value().len() + mem::size_of_val(&self.element().timestamp())
    }
}

impl LatticeSizeEstimate for SetLattice<Vec<u8>> {
    fn size_estimate(&self) -> usize {
        let mut size = 0;
        for val in self.reveal() {
            // the hash-set slot plus the separate heap allocation of the
            // vector data; u8 has size 1, so adding the length is enough
            size += mem::size_of_val(val);
            size += val.len();
        }
        size
    }
}

impl LatticeSizeEstimate for CausalLattice<SetLattice<Vec<u8>>> {
    fn size_estimate(&self) -> usize {
        let pair = self.reveal();
        let mut clock_size = 0;
        for (id, counter) in pair.vector_clock.reveal() {
            clock_size += id.len();
            clock_size += mem::size_of_val(counter.reveal());
        }
        clock_size + pair.value.size_estimate()
    }
}
