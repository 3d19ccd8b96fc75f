//! Contains the [`Lattice`] trait and its implementations.
//!
//! Base lattices:
//!
//! - **[`MaxLattice`]:** merges by taking the maximum of the two values.
//! - **[`SetLattice`]:** a set of items merged with the union operator.
//! - **[`LastWriterWinsLattice`]:** tags each value with a creation
//!   timestamp and keeps the newer one on merge.
//!
//! Compound lattices:
//!
//! - **[`MapLattice`]:** a hash map of lattice values; merging unions the key
//!   sets and merges conflicting values.
//! - **[`CausalLattice`]:** guards a lattice value with a [`causal::VectorClock`]
//!   so that causally newer writes replace older ones and only genuinely
//!   concurrent writes fall back to the inner merge.

pub use self::{
    causal::CausalLattice,
    last_writer_wins::{LastWriterWinsLattice, Timestamp},
    map::MapLattice,
    max::MaxLattice,
    set::SetLattice,
};

pub mod causal;
pub mod last_writer_wins;

mod map;
mod max;
mod set;

/// Abstraction for a [_bounded join semilattice_](https://en.wikipedia.org/wiki/Semilattice),
/// the foundation of the store's coordination freedom.
///
/// A join semilattice has a supremum (least upper bound) operator `⊔` that is
/// [commutative](https://en.wikipedia.org/wiki/Commutative),
/// [associative](https://en.wikipedia.org/wiki/Associative_property), and
/// [idempotent](https://en.wikipedia.org/wiki/Idempotence). Because the
/// supremum of a set of updates does not depend on the order (or multiplicity)
/// in which they are merged, replicas can apply updates in any order —
/// including duplicated delivery from at-least-once gossip — and still reach
/// the same state.
///
/// The consistency of the whole store rests on these laws, so **every
/// implementation must satisfy all three**. Prefer composing the existing
/// lattice types over writing new `Lattice` impls.
pub trait Lattice {
    /// The type that is stored in this lattice.
    type Element;

    /// Returns the current value stored in the lattice.
    fn reveal(&self) -> &Self::Element;

    /// Returns the current value stored in the lattice, taking ownership.
    fn into_revealed(self) -> Self::Element;

    /// Assigns a new value to the lattice without any merging.
    fn assign(&mut self, element: Self::Element);

    /// Updates the lattice value with the supremum of the current and given
    /// values. This implements the `⊔` operator described above.
    fn merge_element(&mut self, element: &Self::Element);

    /// Updates the lattice value with the supremum of the current and given
    /// lattices.
    ///
    /// Convenience method that reveals the value of `other` and calls
    /// [`merge_element`][Self::merge_element].
    fn merge(&mut self, other: &Self) {
        self.merge_element(other.reveal());
    }
}
