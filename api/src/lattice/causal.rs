//! Contains the [`CausalLattice`] that preserves causal ordering between
//! updates.

use super::{Lattice, MapLattice, MaxLattice};

/// A [vector clock](https://en.wikipedia.org/wiki/Vector_clock) tracks one
/// logical counter per replica to determine the partial ordering of events.
///
/// Built from a [`MapLattice`] of [`MaxLattice`] counters, so merging two
/// clocks yields their pointwise maximum.
pub type VectorClock = MapLattice<String, MaxLattice<usize>>;

/// Guards a lattice value with a [`VectorClock`] to provide
/// [causal consistency](https://en.wikipedia.org/wiki/Causal_consistency).
///
/// On merge the clocks decide: if the incoming clock dominates ours, the
/// incoming value causally follows our writes and replaces them. If our clock
/// dominates, the incoming value is causally stale and is dropped. Only when
/// neither dominates were the writes concurrent, and the values merge through
/// the inner [`Lattice`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CausalLattice<T> {
    element: VectorClockValuePair<T>,
}

impl<T> CausalLattice<T> {
    /// Creates a new lattice from the given vector clock and value.
    pub fn new(element: VectorClockValuePair<T>) -> Self {
        Self { element }
    }
}

impl<T> Lattice for CausalLattice<T>
where
    T: Lattice + Clone + PartialEq,
{
    type Element = VectorClockValuePair<T>;

    fn reveal(&self) -> &VectorClockValuePair<T> {
        &self.element
    }

    fn into_revealed(self) -> VectorClockValuePair<T> {
        self.element
    }

    fn assign(&mut self, element: Self::Element) {
        self.element = element;
    }

    fn merge_element(&mut self, other: &VectorClockValuePair<T>) {
        let prev = self.element.vector_clock.clone();
        self.element.vector_clock.merge(&other.vector_clock);

        if self.element.vector_clock == other.vector_clock {
            // the incoming clock dominates: its value causally follows ours
            self.element.value = other.value.clone();
        } else if self.element.vector_clock == prev {
            // our clock dominates: the incoming value is causally stale
        } else {
            // concurrent writes: keep the values of both non-dominated updates
            self.element.value.merge(&other.value);
        }
    }
}

/// Pair of a [`VectorClock`] and a value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub struct VectorClockValuePair<T> {
    pub vector_clock: VectorClock,
    pub value: T,
}

impl<T> VectorClockValuePair<T> {
    /// Constructs a new pair of the given values.
    pub fn new(vector_clock: VectorClock, value: T) -> Self {
        Self {
            vector_clock,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::SetLattice;

    fn clock(entries: &[(&str, usize)]) -> VectorClock {
        let mut clock = VectorClock::default();
        for &(id, counter) in entries {
            clock.insert(id.into(), MaxLattice::new(counter));
        }
        clock
    }

    fn causal(clock_entries: &[(&str, usize)], values: &[&str]) -> CausalLattice<SetLattice<Vec<u8>>> {
        let mut set = SetLattice::default();
        for v in values {
            set.insert(v.as_bytes().to_vec());
        }
        CausalLattice::new(VectorClockValuePair::new(clock(clock_entries), set))
    }

    #[test]
    fn dominating_clock_replaces_value() {
        let mut lattice = causal(&[("r1", 1)], &["old"]);
        lattice.merge(&causal(&[("r1", 2)], &["new"]));

        assert_eq!(lattice.reveal().vector_clock, clock(&[("r1", 2)]));
        assert_eq!(lattice.reveal().value, causal(&[], &["new"]).reveal().value);
    }

    #[test]
    fn dominated_update_is_dropped() {
        let mut lattice = causal(&[("r1", 2)], &["current"]);
        lattice.merge(&causal(&[("r1", 1)], &["stale"]));

        assert_eq!(
            lattice.reveal().value,
            causal(&[], &["current"]).reveal().value
        );
    }

    #[test]
    fn concurrent_updates_merge_values_and_clocks() {
        let mut lattice = causal(&[("r1", 1)], &["a"]);
        lattice.merge(&causal(&[("r2", 1)], &["b"]));

        // pointwise maximum of the two clocks
        assert_eq!(
            lattice.reveal().vector_clock,
            clock(&[("r1", 1), ("r2", 1)])
        );
        // both concurrent values survive
        assert_eq!(
            lattice.reveal().value,
            causal(&[], &["a", "b"]).reveal().value
        );
    }

    #[test]
    fn merge_laws() {
        let a = causal(&[("r1", 1)], &["a"]);
        let b = causal(&[("r2", 1)], &["b"]);
        let c = causal(&[("r3", 1)], &["c"]);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);

        let mut ab_c = ab.clone();
        ab_c.merge(&c);
        let mut bc = b.clone();
        bc.merge(&c);
        let mut a_bc = a.clone();
        a_bc.merge(&bc);
        assert_eq!(ab_c, a_bc);

        let mut aa = a.clone();
        aa.merge(&a);
        assert_eq!(aa, a);
    }
}
