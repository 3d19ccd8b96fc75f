//! Buffers work that cannot proceed until a key's replication factor is
//! known.
//!
//! Whenever responsibility resolution fails because the factor is not cached
//! yet, the operation is parked here and a fetch is issued. The
//! replication-factor response handler replays each key's queue in FIFO order
//! and clears it. The map is unbounded, so prompt draining on resolution
//! matters.

use crate::{
    messages::RequestType,
    topics::Address,
    Key, LatticeType,
};
use std::collections::HashMap;

/// Per-key FIFO queues of deferred items.
///
/// There is no ordering guarantee across keys, only within one key's queue.
#[derive(Debug)]
pub struct PendingMap<T> {
    map: HashMap<Key, Vec<T>>,
}

impl<T> PendingMap<T> {
    /// Appends an item to the given key's queue.
    pub fn push(&mut self, key: Key, item: T) {
        self.map.entry(key).or_default().push(item);
    }

    /// Removes and returns the given key's queue, oldest item first.
    pub fn remove(&mut self, key: &Key) -> Vec<T> {
        self.map.remove(key).unwrap_or_default()
    }

    /// Returns whether the given key has deferred items.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }

    /// The number of keys with deferred items.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns whether no key has deferred items.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T> Default for PendingMap<T> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

/// A deferred client operation.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Whether the parked operation was a GET or a PUT.
    pub ty: RequestType,
    /// The lattice type of the parked PUT, if any was given.
    pub lattice_type: Option<LatticeType>,
    /// The payload of the parked PUT.
    pub payload: Option<Vec<u8>>,
    /// Where the eventual response should be sent.
    pub response_address: Option<Address>,
    /// The request id to tag the eventual response with.
    pub response_id: Option<String>,
}

/// A deferred anti-entropy tuple.
#[derive(Debug, Clone)]
pub struct PendingGossip {
    /// The lattice type of the gossiped value.
    pub lattice_type: LatticeType,
    /// The serialized gossiped value.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientKey;

    #[test]
    fn queues_are_fifo_per_key() {
        let mut pending = PendingMap::default();
        let key_a = Key::Client(ClientKey::from("a"));
        let key_b = Key::Client(ClientKey::from("b"));

        pending.push(key_a.clone(), 1);
        pending.push(key_b.clone(), 10);
        pending.push(key_a.clone(), 2);
        pending.push(key_a.clone(), 3);

        assert_eq!(pending.remove(&key_a), vec![1, 2, 3]);
        assert!(!pending.contains_key(&key_a));
        assert_eq!(pending.remove(&key_b), vec![10]);
        assert!(pending.is_empty());
    }

    #[test]
    fn removing_an_unknown_key_yields_nothing() {
        let mut pending: PendingMap<u32> = PendingMap::default();
        assert_eq!(
            pending.remove(&Key::Client(ClientKey::from("a"))),
            Vec::<u32>::new()
        );
    }
}
