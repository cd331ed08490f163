//! Key index over an entry log.
//!
//! Maps every key to the positions of its occurrences, oldest first. A key is
//! present only while it has at least one occurrence.

use std::borrow::Borrow;
use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::{TryReserveError, VecDeque};

use super::Position;

pub(crate) type Occurrences = VecDeque<Position>;

pub(crate) struct KeyIndex<K> {
    occurrences: BTreeMap<K, Occurrences>,
    #[cfg(test)]
    fail_next_reserve: bool,
}

impl<K: Ord> KeyIndex<K> {
    pub(crate) const fn new() -> Self {
        Self {
            occurrences: BTreeMap::new(),
            #[cfg(test)]
            fail_next_reserve: false,
        }
    }

    /// Number of distinct keys.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&Occurrences>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.occurrences.get(key)
    }

    pub(crate) fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.occurrences.get(key).map_or(0, VecDeque::len)
    }

    /// Returns the occurrence list of `key` with room for one more position.
    ///
    /// A key that is absent gets its list only once the reservation succeeded,
    /// so a failure never leaves an empty list behind.
    pub(crate) fn reserve_slot(&mut self, key: K) -> Result<&mut Occurrences, TryReserveError> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_reserve) {
            Vec::<u8>::new().try_reserve(usize::MAX)?;
        }
        match self.occurrences.entry(key) {
            Entry::Occupied(entry) => {
                let positions = entry.into_mut();
                positions.try_reserve(1)?;
                Ok(positions)
            }
            Entry::Vacant(entry) => {
                let mut positions = VecDeque::new();
                positions.try_reserve(1)?;
                Ok(entry.insert(positions))
            }
        }
    }

    /// Makes the next [`reserve_slot`](Self::reserve_slot) fail as if the
    /// allocator had refused.
    #[cfg(test)]
    pub(crate) fn fail_next_reserve(&mut self) {
        self.fail_next_reserve = true;
    }

    /// Drops the oldest occurrence of `key` and the key itself once it has none left.
    pub(crate) fn pop_oldest<Q>(&mut self, key: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let positions = self.occurrences.get_mut(key)?;
        let oldest = positions.pop_front();
        if positions.is_empty() {
            self.occurrences.remove(key);
        }
        oldest
    }

    pub(crate) fn clear(&mut self) {
        self.occurrences.clear();
    }

    pub(crate) const fn as_map(&self) -> &BTreeMap<K, Occurrences> {
        &self.occurrences
    }
}
