use super::Lattice;
use std::{borrow::Borrow, collections::HashMap, hash::Hash};

/// [`HashMap`]-based lattice that stores other lattice types as values.
///
/// The merge operation takes the union of the key sets of both maps. For keys
/// present in both maps, the two values are merged with the value type's own
/// merge operator.
///
/// ## Example
///
/// ```
/// use strata_api::lattice::{Lattice, MapLattice, MaxLattice};
/// use std::collections::HashMap;
///
/// let mut map = HashMap::new();
/// map.insert("foo", MaxLattice::new(5));
/// map.insert("bar", MaxLattice::new(12));
/// let mut lattice = MapLattice::new(map);
///
/// let mut other = HashMap::new();
/// other.insert("bar", MaxLattice::new(16));
/// other.insert("baz", MaxLattice::new(42));
/// lattice.merge_element(&other);
///
/// assert_eq!(lattice.reveal().get("foo"), Some(&MaxLattice::new(5)));
/// assert_eq!(lattice.reveal().get("bar"), Some(&MaxLattice::new(16)));
/// assert_eq!(lattice.reveal().get("baz"), Some(&MaxLattice::new(42)));
/// ```
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MapLattice<K, V> {
    #[serde(bound = "
        K: Hash + Eq + serde::Serialize + for<'a> serde::Deserialize<'a>,
        V: serde::Serialize + for<'a> serde::Deserialize<'a>,
    ")]
    element: HashMap<K, V>,
}

impl<K, V> Lattice for MapLattice<K, V>
where
    K: Eq + Hash + Clone,
    V: Lattice + Clone,
{
    type Element = HashMap<K, V>;

    fn reveal(&self) -> &HashMap<K, V> {
        &self.element
    }

    fn into_revealed(self) -> HashMap<K, V> {
        self.element
    }

    fn assign(&mut self, element: Self::Element) {
        self.element = element;
    }

    fn merge_element(&mut self, elements: &HashMap<K, V>) {
        for (key, value) in elements {
            match self.element.entry(key.clone()) {
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(value.clone());
                }
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    entry.get_mut().merge(value);
                }
            };
        }
    }
}

impl<K, V> MapLattice<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new lattice from the given map.
    pub fn new(element: HashMap<K, V>) -> Self {
        Self { element }
    }

    /// Inserts the given value into the map, merging it with the previous
    /// value under the same key if any.
    pub fn insert(&mut self, key: K, value: V)
    where
        V: Lattice,
    {
        match self.element.entry(key) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(value);
            }
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                entry.get_mut().merge(&value);
            }
        };
    }

    /// Returns `true` if the map contains a value for the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.element.contains_key(key)
    }
}

impl<K, V> Default for MapLattice<K, V> {
    fn default() -> Self {
        Self {
            element: Default::default(),
        }
    }
}

impl<K, V> PartialEq for MapLattice<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element
    }
}

impl<K, V> Eq for MapLattice<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::MaxLattice;

    fn map(entries: &[(char, u64)]) -> MapLattice<char, MaxLattice<u64>> {
        MapLattice::new(
            entries
                .iter()
                .map(|&(k, v)| (k, MaxLattice::new(v)))
                .collect(),
        )
    }

    #[test]
    fn merge_unions_keys_and_merges_values() {
        let mut m = map(&[('a', 10), ('b', 20)]);
        m.merge(&map(&[('b', 30), ('c', 40)]));
        assert_eq!(m, map(&[('a', 10), ('b', 30), ('c', 40)]));
    }

    #[test]
    fn insert_merges_existing_entry() {
        let mut m = map(&[('a', 10)]);
        m.insert('a', MaxLattice::new(5));
        assert_eq!(m.reveal().get(&'a'), Some(&MaxLattice::new(10)));
        m.insert('a', MaxLattice::new(15));
        assert_eq!(m.reveal().get(&'a'), Some(&MaxLattice::new(15)));
    }

    #[test]
    fn merge_laws() {
        let a = map(&[('a', 1), ('b', 5)]);
        let b = map(&[('b', 3), ('c', 2)]);
        let c = map(&[('a', 4)]);

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
