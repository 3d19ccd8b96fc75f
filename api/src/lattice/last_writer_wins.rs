//! Provides the [`LastWriterWinsLattice`] and related timestamp types.

use super::Lattice;
use std::cmp::Ordering;

/// A lattice where later writes overwrite earlier ones.
///
/// Keeps a [`Timestamp`] next to the value. On merge, the value is replaced
/// only if the other timestamp is newer, which gives writes to a key a total
/// ordering without any coordination between writers.
///
/// ## Example
///
/// ```
/// use strata_api::lattice::{
///     Lattice, LastWriterWinsLattice,
///     last_writer_wins::{Timestamp, TimestampValuePair},
/// };
///
/// let mut lattice = LastWriterWinsLattice::from_pair(Timestamp::new(10), 42);
/// assert_eq!(lattice.reveal().value(), &42);
///
/// // a later write overwrites the value
/// lattice.merge_element(&TimestampValuePair::new(Timestamp::new(20), 50));
/// assert_eq!(lattice.reveal().value(), &50);
///
/// // an earlier write changes nothing
/// lattice.merge_element(&TimestampValuePair::new(Timestamp::new(15), 100));
/// assert_eq!(lattice.reveal().value(), &50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LastWriterWinsLattice<T> {
    element: TimestampValuePair<T>,
}

impl<T> LastWriterWinsLattice<T> {
    /// Creates a new lattice from the given value.
    pub fn new(element: TimestampValuePair<T>) -> Self {
        Self { element }
    }

    /// Convenience function to construct a lattice from a timestamp and a value.
    pub fn from_pair(timestamp: Timestamp, value: T) -> Self {
        Self::new(TimestampValuePair::new(timestamp, value))
    }

    /// Creates a new lattice timestamped with the current wall clock and the
    /// given writer thread id.
    pub fn new_now(thread_id: u32, value: T) -> Self {
        Self::from_pair(Timestamp::now(thread_id), value)
    }

    /// Get a reference to the wrapped `TimestampValuePair`.
    pub fn element(&self) -> &TimestampValuePair<T> {
        &self.element
    }
}

impl<T> Lattice for LastWriterWinsLattice<T>
where
    T: Ord + Clone + std::fmt::Debug,
{
    type Element = TimestampValuePair<T>;

    fn reveal(&self) -> &TimestampValuePair<T> {
        &self.element
    }

    fn into_revealed(self) -> TimestampValuePair<T> {
        self.element
    }

    fn assign(&mut self, element: Self::Element) {
        self.element = element;
    }

    fn merge_element(&mut self, element: &TimestampValuePair<T>) {
        match element.timestamp.cmp(&self.element.timestamp) {
            Ordering::Greater => self.element = element.clone(),
            // Equal timestamps happen when two writers race within the same
            // millisecond on the same thread id slot. The winner must be the
            // same regardless of merge order, so ties resolve by the value's
            // total order.
            Ordering::Equal => {
                if element.value > self.element.value {
                    self.element = element.clone();
                }
            }
            Ordering::Less => {}
        }
    }
}

/// The element type stored in a [`LastWriterWinsLattice`]. Pair of a
/// [`Timestamp`] and a value.
#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct TimestampValuePair<T> {
    timestamp: Timestamp,
    value: T,
}

impl<T> TimestampValuePair<T> {
    /// Constructs a new pair from the given timestamp and value.
    pub fn new(timestamp: Timestamp, value: T) -> Self {
        Self { timestamp, value }
    }

    /// Returns the stored timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Returns a reference to the wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the wrapped value, taking ownership.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Timestamp used to order writes in a [`LastWriterWinsLattice`].
///
/// Composed from the wall-clock milliseconds and the writing thread's id as
/// `millis * 10^k + thread_id`, with `k` chosen as the smallest power that
/// fits the thread id. Timestamps from distinct threads therefore never
/// collide, and timestamps from the same thread are monotone as long as the
/// system clock is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Wraps a raw timestamp value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Composes a timestamp from the current UTC wall clock and the given
    /// thread id.
    pub fn now(thread_id: u32) -> Self {
        let millis = chrono::Utc::now().timestamp_millis() as u64;
        Self::compose(millis, thread_id)
    }

    /// Composes a timestamp from the given wall-clock milliseconds and
    /// thread id.
    pub fn compose(millis: u64, thread_id: u32) -> Self {
        let mut pow = 10u64;
        while u64::from(thread_id) >= pow {
            pow *= 10;
        }
        Self(millis * pow + u64::from(thread_id))
    }

    /// Returns the raw composed value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lww(ts: u64, value: &str) -> LastWriterWinsLattice<Vec<u8>> {
        LastWriterWinsLattice::from_pair(Timestamp::new(ts), value.as_bytes().to_vec())
    }

    #[test]
    fn newer_timestamp_wins() {
        let mut lattice = lww(10, "old");
        lattice.merge(&lww(20, "new"));
        assert_eq!(lattice.reveal().value(), b"new");

        lattice.merge(&lww(15, "stale"));
        assert_eq!(lattice.reveal().value(), b"new");
    }

    #[test]
    fn equal_timestamps_resolve_identically_in_both_orders() {
        let a = lww(42, "apple");
        let b = lww(42, "banana");

        let mut left = a.clone();
        left.merge(&b);
        let mut right = b.clone();
        right.merge(&a);

        assert_eq!(left, right);
        // the lexicographically larger value is the deterministic winner
        assert_eq!(left.reveal().value(), b"banana");
    }

    #[test]
    fn merge_laws() {
        let a = lww(1, "a");
        let b = lww(2, "b");
        let c = lww(3, "c");

        // commutativity
        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);

        // associativity
        let mut ab_c = ab.clone();
        ab_c.merge(&c);
        let mut bc = b.clone();
        bc.merge(&c);
        let mut a_bc = a.clone();
        a_bc.merge(&bc);
        assert_eq!(ab_c, a_bc);

        // idempotence
        let mut aa = a.clone();
        aa.merge(&a);
        assert_eq!(aa, a);
    }

    #[test]
    fn compose_keeps_thread_id_below_multiplier() {
        assert_eq!(Timestamp::compose(123, 4).raw(), 1234);
        assert_eq!(Timestamp::compose(123, 45).raw(), 12345);
        assert_eq!(Timestamp::compose(123, 456).raw(), 123456);
        // distinct threads in the same millisecond never collide
        assert_ne!(Timestamp::compose(123, 4), Timestamp::compose(123, 5));
    }
}
