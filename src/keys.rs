//! Iteration over the distinct keys of a [`KvFifo`](crate::KvFifo).
//!
//! Keys are visited in key order, not in queue order. A [`Keys`] iterator
//! borrows the key index it was created from, so any mutation of the queue
//! (which may rebuild the index from scratch during a storage copy) ends its
//! lifetime.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::iter::FusedIterator;

use crate::storage::Occurrences;

/// A bidirectional iterator over the distinct keys of a [`KvFifo`](crate::KvFifo).
///
/// Created by [`KvFifo::keys`](crate::KvFifo::keys). Two iterators compare
/// equal when they walk the same key index and have consumed the same number
/// of keys from each end, or when both are exhausted.
///
/// # Examples
///
/// ```rust
/// use kvfifo::KvFifo;
///
/// let queue: KvFifo<i32, char> = [(3, 'c'), (1, 'a'), (3, 'd'), (2, 'b')]
///     .into_iter()
///     .collect();
///
/// let mut keys = queue.keys();
/// assert_eq!(keys.len(), 3);
/// assert_eq!(keys.next(), Some(&1));
/// assert_eq!(keys.next_back(), Some(&3));
/// assert_eq!(keys.next(), Some(&2));
/// assert_eq!(keys.next(), None);
/// ```
pub struct Keys<'a, K> {
    index: &'a BTreeMap<K, Occurrences>,
    inner: btree_map::Keys<'a, K, Occurrences>,
    taken_front: usize,
    taken_back: usize,
}

impl<'a, K> Keys<'a, K> {
    pub(crate) fn new(index: &'a BTreeMap<K, Occurrences>) -> Self {
        Self {
            index,
            inner: index.keys(),
            taken_front: 0,
            taken_back: 0,
        }
    }
}

impl<'a, K> Iterator for Keys<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.inner.next()?;
        self.taken_front += 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> DoubleEndedIterator for Keys<'_, K> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let key = self.inner.next_back()?;
        self.taken_back += 1;
        Some(key)
    }
}

impl<K> ExactSizeIterator for Keys<'_, K> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K> FusedIterator for Keys<'_, K> {}

impl<K> Clone for Keys<'_, K> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            inner: self.inner.clone(),
            taken_front: self.taken_front,
            taken_back: self.taken_back,
        }
    }
}

impl<K> PartialEq for Keys<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        let exhausted = self.inner.len() == 0 && other.inner.len() == 0;
        std::ptr::eq(self.index, other.index)
            && (exhausted
                || (self.taken_front == other.taken_front && self.taken_back == other.taken_back))
    }
}

impl<K> Eq for Keys<'_, K> {}

impl<K: fmt::Debug> fmt::Debug for Keys<'_, K> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.clone()).finish()
    }
}
