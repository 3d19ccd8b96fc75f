use super::Lattice;
use std::{collections::HashSet, hash::Hash};

/// Lattice implementation based on a [`HashSet`] with the
/// [union operation](https://en.wikipedia.org/wiki/Union_(set_theory)) as
/// merge operator.
///
/// Supports add-only semantics: there is no way to remove an element through
/// merging, which is what makes the union a valid supremum.
///
/// ## Example
///
/// ```
/// use strata_api::lattice::{Lattice, SetLattice};
/// use std::collections::HashSet;
///
/// let set: HashSet<_> = ["foo", "bar"].iter().copied().collect();
/// let mut lattice = SetLattice::new(set.clone());
///
/// let other: HashSet<_> = ["bar", "baz"].iter().copied().collect();
/// lattice.merge_element(&other);
///
/// let union = set.union(&other).copied().collect::<HashSet<_>>();
/// assert_eq!(lattice.reveal(), &union);
/// ```
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SetLattice<T> {
    #[serde(bound = "T: Hash + Eq + serde::Serialize + for<'a> serde::Deserialize<'a>")]
    element: HashSet<T>,
}

impl<T> SetLattice<T>
where
    T: Eq + Hash,
{
    /// Creates a new lattice based on the given set.
    pub fn new(element: HashSet<T>) -> Self {
        Self { element }
    }

    /// Inserts the given value into the set.
    pub fn insert(&mut self, element: T) {
        self.element.insert(element);
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.element.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.element.is_empty()
    }
}

impl<T> Lattice for SetLattice<T>
where
    T: Eq + Hash + Clone,
{
    type Element = HashSet<T>;

    fn reveal(&self) -> &HashSet<T> {
        &self.element
    }

    fn into_revealed(self) -> HashSet<T> {
        self.element
    }

    fn assign(&mut self, element: Self::Element) {
        self.element = element;
    }

    fn merge_element(&mut self, element: &HashSet<T>) {
        for val in element {
            if !self.element.contains(val) {
                self.element.insert(val.clone());
            }
        }
    }
}

impl<T> Default for SetLattice<T> {
    fn default() -> Self {
        Self {
            element: Default::default(),
        }
    }
}

impl<T> PartialEq for SetLattice<T>
where
    HashSet<T>: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element
    }
}

impl<T> Eq for SetLattice<T> where HashSet<T>: Eq {}
