//! Shared storage behind a [`KvFifo`](crate::KvFifo).
//!
//! [`Storage`] bundles the [`EntryLog`] (true FIFO order) with the
//! [`KeyIndex`] (per-key occurrence positions) and is the only place where the
//! two are mutated, so they always change in lockstep.

mod entry_log;
mod key_index;

use std::alloc::Layout;
use std::borrow::Borrow;

pub use entry_log::Iter;
pub(crate) use entry_log::{EntryLog, Position};
pub(crate) use key_index::{KeyIndex, Occurrences};

use crate::error::FifoError;

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer used to share [`Storage`].
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`.
/// Otherwise (default), this is `std::rc::Rc`.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

// =============================================================================
// Storage
// =============================================================================

pub(crate) struct Storage<K, V> {
    log: EntryLog<K, V>,
    index: KeyIndex<K>,
}

impl<K: Ord + Clone, V> Storage<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            log: EntryLog::new(),
            index: KeyIndex::new(),
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.log.len()
    }

    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    #[inline]
    pub(crate) fn distinct_keys(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.index.count(key)
    }

    /// Appends an entry to the log and its position to the key's occurrences.
    ///
    /// Both reservations happen before either structure changes.
    pub(crate) fn push(&mut self, key: K, value: V) -> Result<(), FifoError> {
        self.log.try_reserve_one()?;
        let occurrences = self.index.reserve_slot(key.clone())?;
        let position = self.log.push_back(key, value);
        occurrences.push_back(position);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<(K, V), FifoError> {
        let position = self.log.front_position().ok_or(FifoError::EmptyContainer)?;
        let (key, value) = self.log.remove(position).ok_or(FifoError::EmptyContainer)?;
        let oldest = self.index.pop_oldest(&key);
        debug_assert_eq!(oldest, Some(position));
        Ok((key, value))
    }

    pub(crate) fn pop_key<Q>(&mut self, key: &Q) -> Result<V, FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.check_key(key)?;
        let position = self.index.pop_oldest(key).ok_or(FifoError::KeyNotFound)?;
        let (_, value) = self.log.remove(position).ok_or(FifoError::KeyNotFound)?;
        Ok(value)
    }

    /// Relinks every occurrence of `key` at the back, oldest first.
    ///
    /// Positions are stable across relinking, so the occurrence list is untouched.
    pub(crate) fn move_to_back<Q>(&mut self, key: &Q) -> Result<(), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.check_key(key)?;
        if let Some(occurrences) = self.index.get(key) {
            for position in occurrences {
                self.log.move_to_back(*position);
            }
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.log.clear();
        self.index.clear();
    }

    pub(crate) fn front(&self) -> Result<(&K, &V), FifoError> {
        let position = self.log.front_position().ok_or(FifoError::EmptyContainer)?;
        self.log.get(position).ok_or(FifoError::EmptyContainer)
    }

    pub(crate) fn back(&self) -> Result<(&K, &V), FifoError> {
        let position = self.log.back_position().ok_or(FifoError::EmptyContainer)?;
        self.log.get(position).ok_or(FifoError::EmptyContainer)
    }

    pub(crate) fn front_mut(&mut self) -> Result<(&K, &mut V), FifoError> {
        let position = self.log.front_position().ok_or(FifoError::EmptyContainer)?;
        self.log.get_mut(position).ok_or(FifoError::EmptyContainer)
    }

    pub(crate) fn back_mut(&mut self) -> Result<(&K, &mut V), FifoError> {
        let position = self.log.back_position().ok_or(FifoError::EmptyContainer)?;
        self.log.get_mut(position).ok_or(FifoError::EmptyContainer)
    }

    pub(crate) fn first<Q>(&self, key: &Q) -> Result<(&K, &V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self.occurrences(key)?.front().copied();
        self.log.get(position.ok_or(FifoError::KeyNotFound)?).ok_or(FifoError::KeyNotFound)
    }

    pub(crate) fn last<Q>(&self, key: &Q) -> Result<(&K, &V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self.occurrences(key)?.back().copied();
        self.log.get(position.ok_or(FifoError::KeyNotFound)?).ok_or(FifoError::KeyNotFound)
    }

    pub(crate) fn first_mut<Q>(&mut self, key: &Q) -> Result<(&K, &mut V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self.occurrences(key)?.front().copied();
        self.log
            .get_mut(position.ok_or(FifoError::KeyNotFound)?)
            .ok_or(FifoError::KeyNotFound)
    }

    pub(crate) fn last_mut<Q>(&mut self, key: &Q) -> Result<(&K, &mut V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self.occurrences(key)?.back().copied();
        self.log
            .get_mut(position.ok_or(FifoError::KeyNotFound)?)
            .ok_or(FifoError::KeyNotFound)
    }

    /// Fails with `EmptyContainer` before `KeyNotFound`.
    pub(crate) fn check_key<Q>(&self, key: &Q) -> Result<(), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.occurrences(key).map(|_| ())
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        self.log.iter()
    }

    pub(crate) const fn key_index(&self) -> &KeyIndex<K> {
        &self.index
    }

    fn occurrences<Q>(&self, key: &Q) -> Result<&Occurrences, FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if self.log.is_empty() {
            return Err(FifoError::EmptyContainer);
        }
        match self.index.get(key) {
            Some(occurrences) if !occurrences.is_empty() => Ok(occurrences),
            _ => Err(FifoError::KeyNotFound),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Storage<K, V> {
    /// Deep copy by replaying the log in order, rebuilding every position.
    ///
    /// The copy is assembled off to the side; `self` is never touched.
    pub(crate) fn try_clone(&self) -> Result<Self, FifoError> {
        let mut copy = Self {
            log: EntryLog::try_with_capacity(self.len())?,
            index: KeyIndex::new(),
        };
        for (key, value) in self.log.iter() {
            copy.push(key.clone(), value.clone())?;
        }
        Ok(copy)
    }
}

/// Infallible deep copy; allocation failure aborts like the std collections.
impl<K: Ord + Clone, V: Clone> Clone for Storage<K, V> {
    fn clone(&self) -> Self {
        self.try_clone()
            .unwrap_or_else(|_| std::alloc::handle_alloc_error(Layout::new::<(K, V)>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> Storage<i32, &'static str> {
        let mut storage = Storage::new();
        storage.push(1, "a").unwrap();
        storage.push(2, "b").unwrap();
        storage.push(1, "c").unwrap();
        storage
    }

    fn entries(storage: &Storage<i32, &'static str>) -> Vec<(i32, &'static str)> {
        storage.iter().map(|(key, value)| (*key, *value)).collect()
    }

    /// Every log entry is listed once under its key, in log order.
    fn assert_consistent(storage: &Storage<i32, &'static str>) {
        let mut expected: std::collections::BTreeMap<i32, Vec<&'static str>> =
            std::collections::BTreeMap::new();
        for (key, value) in storage.iter() {
            expected.entry(*key).or_default().push(*value);
        }
        let indexed: std::collections::BTreeMap<i32, Vec<&'static str>> = storage
            .key_index()
            .as_map()
            .iter()
            .map(|(key, occurrences)| {
                let values = occurrences
                    .iter()
                    .map(|position| *storage.log.get(*position).unwrap().1)
                    .collect();
                (*key, values)
            })
            .collect();
        assert_eq!(indexed, expected);
    }

    #[rstest]
    fn test_push_updates_both_structures() {
        let storage = sample();

        assert_eq!(storage.len(), 3);
        assert_eq!(storage.count(&1), 2);
        assert_eq!(storage.distinct_keys(), 2);
        assert_consistent(&storage);
    }

    #[rstest]
    fn test_pop_removes_oldest_entry_and_occurrence() {
        let mut storage = sample();

        assert_eq!(storage.pop(), Ok((1, "a")));
        assert_eq!(storage.count(&1), 1);
        assert_eq!(storage.first(&1), Ok((&1, &"c")));
        assert_consistent(&storage);
    }

    #[rstest]
    fn test_pop_key_removes_oldest_occurrence_only() {
        let mut storage = sample();

        assert_eq!(storage.pop_key(&1), Ok("a"));
        assert_eq!(entries(&storage), vec![(2, "b"), (1, "c")]);
        assert_consistent(&storage);
    }

    #[rstest]
    fn test_pop_key_drops_key_when_exhausted() {
        let mut storage = sample();

        storage.pop_key(&2).unwrap();

        assert_eq!(storage.count(&2), 0);
        assert_eq!(storage.distinct_keys(), 1);
        assert_eq!(storage.first(&2), Err(FifoError::KeyNotFound));
    }

    #[rstest]
    fn test_move_to_back_keeps_relative_order() {
        let mut storage = sample();
        storage.push(3, "d").unwrap();

        storage.move_to_back(&1).unwrap();

        assert_eq!(entries(&storage), vec![(2, "b"), (3, "d"), (1, "a"), (1, "c")]);
        assert_eq!(storage.first(&1), Ok((&1, &"a")));
        assert_eq!(storage.last(&1), Ok((&1, &"c")));
        assert_consistent(&storage);
    }

    #[rstest]
    #[case(Storage::new(), FifoError::EmptyContainer)]
    #[case(sample(), FifoError::KeyNotFound)]
    fn test_key_errors(#[case] mut storage: Storage<i32, &'static str>, #[case] error: FifoError) {
        assert_eq!(storage.pop_key(&9), Err(error));
        assert_eq!(storage.move_to_back(&9), Err(error));
        assert_eq!(storage.first(&9), Err(error));
        assert_eq!(storage.last_mut(&9).map(|(key, _)| *key), Err(error));
    }

    #[rstest]
    fn test_try_clone_is_independent_and_compacted() {
        let mut storage = sample();
        storage.pop().unwrap();
        let mut copy = storage.try_clone().unwrap();

        copy.push(5, "e").unwrap();
        *copy.front_mut().unwrap().1 = "z";

        assert_eq!(entries(&storage), vec![(2, "b"), (1, "c")]);
        assert_eq!(entries(&copy), vec![(2, "z"), (1, "c"), (5, "e")]);
        assert_consistent(&copy);
    }

    #[rstest]
    fn test_clone_matches_try_clone() {
        let mut storage = sample();
        storage.move_to_back(&1).unwrap();
        let copy = storage.clone();

        assert_eq!(entries(&copy), entries(&storage.try_clone().unwrap()));
        assert_eq!(copy.distinct_keys(), storage.distinct_keys());
        assert_consistent(&copy);
    }

    #[rstest]
    #[case::log_refuses_new_key(true, 9)]
    #[case::log_refuses_existing_key(true, 1)]
    #[case::index_refuses_new_key(false, 9)]
    #[case::index_refuses_existing_key(false, 1)]
    fn test_failed_push_is_resource_exhaustion_and_changes_nothing(
        #[case] log_fails: bool,
        #[case] key: i32,
    ) {
        let mut storage = sample();
        if log_fails {
            storage.log.fail_next_reserve();
        } else {
            storage.index.fail_next_reserve();
        }

        assert_eq!(storage.push(key, "x"), Err(FifoError::ResourceExhaustion));

        assert_eq!(entries(&storage), vec![(1, "a"), (2, "b"), (1, "c")]);
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.distinct_keys(), 2);
        assert_eq!(storage.count(&1), 2);
        assert_eq!(storage.count(&9), 0);
        assert_eq!(storage.back(), Ok((&1, &"c")));
        assert_consistent(&storage);

        storage.push(key, "x").unwrap();
        assert_eq!(storage.back(), Ok((&key, &"x")));
        assert_consistent(&storage);
    }

    #[rstest]
    fn test_clear_empties_both_structures() {
        let mut storage = sample();

        storage.clear();

        assert!(storage.is_empty());
        assert_eq!(storage.distinct_keys(), 0);
        assert_eq!(storage.front(), Err(FifoError::EmptyContainer));
    }
}
