//! Key-indexed FIFO queue with copy-on-write storage.
//!
//! This module provides [`KvFifo`], a queue of `(key, value)` entries that
//! keeps global insertion order while giving logarithmic access to the
//! occurrences of any single key.
//!
//! # Storage Sharing
//!
//! Cloning a `KvFifo` is O(1): both handles point at the same storage. Before
//! a handle mutates the storage, or hands out a mutable reference into it, it
//! checks whether it may do so in place:
//!
//! 1. The storage is owned by this handle alone, **and**
//! 2. no mutable reference has been handed out since exclusivity was last
//!    established.
//!
//! If either condition fails, the handle first replays every entry into a
//! fresh storage and switches to it. The second condition makes a handle that
//! lent out `&mut V` (through [`front_mut`](KvFifo::front_mut) and friends)
//! behave as if the lent reference could still be written through: a clone
//! taken from such a handle copies eagerly instead of sharing, and the handle
//! itself re-copies before its next mutation.
//!
//! # Time Complexity
//!
//! | Operation                       | Complexity          |
//! |---------------------------------|---------------------|
//! | `push`                          | O(log n) amortized  |
//! | `pop`                           | O(log n)            |
//! | `pop_key`                       | O(log n)            |
//! | `move_to_back`                  | O(log n + m)        |
//! | `front` / `back`                | O(1)                |
//! | `first` / `last`                | O(log n)            |
//! | `len` / `is_empty`              | O(1)                |
//! | `count`                         | O(log n)            |
//! | `clone`                         | O(1), O(n) if lent  |
//! | storage copy before a mutation  | O(n log n)          |
//!
//! Here `m` is the number of occurrences of the key.
//!
//! # Examples
//!
//! ```rust
//! use kvfifo::KvFifo;
//!
//! let mut queue = KvFifo::new();
//! queue.push(1, "a")?;
//! queue.push(2, "b")?;
//! queue.push(1, "c")?;
//!
//! assert_eq!(queue.len(), 3);
//! assert_eq!(queue.count(&1), 2);
//! assert_eq!(queue.first(&1)?, (&1, &"a"));
//! assert_eq!(queue.last(&1)?, (&1, &"c"));
//!
//! queue.pop_key(&1)?;
//! assert_eq!(queue.len(), 2);
//! assert_eq!(queue.front()?, (&2, &"b"));
//! # Ok::<(), kvfifo::FifoError>(())
//! ```

use std::borrow::Borrow;
use std::fmt;

use tracing::{debug, trace};

use crate::error::FifoError;
use crate::keys::Keys;
use crate::storage::{Iter, ReferenceCounter, Storage};

/// A FIFO queue of `(key, value)` entries indexed by key.
///
/// # Type Parameters
///
/// * `K` - The key type. Must implement `Ord` and `Clone`.
/// * `V` - The value type. Must implement `Clone` so shared storage can be
///   copied on demand.
///
/// # Examples
///
/// ```rust
/// use kvfifo::KvFifo;
///
/// let mut original = KvFifo::new();
/// original.push("job", 1)?;
///
/// let mut copy = original.clone();
/// assert!(copy.shares_storage_with(&original));
///
/// copy.push("job", 2)?;
/// assert!(!copy.shares_storage_with(&original));
/// assert_eq!(original.len(), 1);
/// assert_eq!(copy.len(), 2);
/// # Ok::<(), kvfifo::FifoError>(())
/// ```
pub struct KvFifo<K, V> {
    storage: ReferenceCounter<Storage<K, V>>,
    /// Set while a `&mut V` into the current storage may have been handed out.
    lent: bool,
}

impl<K: Ord + Clone, V: Clone> KvFifo<K, V> {
    /// Creates a new empty queue.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let queue: KvFifo<i32, String> = KvFifo::new();
    /// assert!(queue.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: ReferenceCounter::new(Storage::new()),
            lent: false,
        }
    }

    /// Returns the number of entries in the queue.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if the queue contains no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns the number of entries carrying `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let queue: KvFifo<String, i32> =
    ///     [("a".to_string(), 1), ("a".to_string(), 2)].into_iter().collect();
    /// assert_eq!(queue.count("a"), 2);
    /// assert_eq!(queue.count("b"), 0);
    /// ```
    #[must_use]
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.storage.count(key)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Appends an entry at the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::ResourceExhaustion`] if memory for the entry or for
    /// a storage copy could not be reserved. The queue is unchanged in that case.
    pub fn push(&mut self, key: K, value: V) -> Result<(), FifoError> {
        self.exclusive()?.push(key, value)
    }

    /// Removes the entry at the front of the queue and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::{FifoError, KvFifo};
    ///
    /// let mut queue: KvFifo<i32, char> = [(1, 'a'), (2, 'b')].into_iter().collect();
    /// assert_eq!(queue.pop(), Ok((1, 'a')));
    /// assert_eq!(queue.pop(), Ok((2, 'b')));
    /// assert_eq!(queue.pop(), Err(FifoError::EmptyContainer));
    /// ```
    pub fn pop(&mut self) -> Result<(K, V), FifoError> {
        if self.is_empty() {
            return Err(FifoError::EmptyContainer);
        }
        self.exclusive()?.pop()
    }

    /// Removes the oldest entry carrying `key` and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty, or
    /// [`FifoError::KeyNotFound`] if no entry carries `key`.
    pub fn pop_key<Q>(&mut self, key: &Q) -> Result<V, FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.storage.check_key(key)?;
        self.exclusive()?.pop_key(key)
    }

    /// Moves every entry carrying `key` to the back of the queue.
    ///
    /// The moved entries keep their relative order, and so do the others.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty, or
    /// [`FifoError::KeyNotFound`] if no entry carries `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue: KvFifo<i32, char> =
    ///     [(1, 'a'), (2, 'b'), (1, 'c'), (3, 'd')].into_iter().collect();
    /// queue.move_to_back(&1)?;
    ///
    /// let order: Vec<char> = queue.iter().map(|(_, value)| *value).collect();
    /// assert_eq!(order, vec!['b', 'd', 'a', 'c']);
    /// # Ok::<(), kvfifo::FifoError>(())
    /// ```
    pub fn move_to_back<Q>(&mut self, key: &Q) -> Result<(), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.storage.check_key(key)?;
        self.exclusive()?.move_to_back(key)
    }

    /// Removes every entry.
    ///
    /// Storage still shared with other handles is released rather than copied.
    pub fn clear(&mut self) {
        if !self.lent
            && let Some(storage) = ReferenceCounter::get_mut(&mut self.storage)
        {
            storage.clear();
            return;
        }
        trace!(lent = self.lent, "kvfifo: releasing storage on clear");
        self.storage = ReferenceCounter::new(Storage::new());
        self.lent = false;
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Returns the entry at the front of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty.
    pub fn front(&self) -> Result<(&K, &V), FifoError> {
        self.storage.front()
    }

    /// Returns the entry at the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty.
    pub fn back(&self) -> Result<(&K, &V), FifoError> {
        self.storage.back()
    }

    /// Returns the oldest entry carrying `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty, or
    /// [`FifoError::KeyNotFound`] if no entry carries `key`.
    pub fn first<Q>(&self, key: &Q) -> Result<(&K, &V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.storage.first(key)
    }

    /// Returns the newest entry carrying `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty, or
    /// [`FifoError::KeyNotFound`] if no entry carries `key`.
    pub fn last<Q>(&self, key: &Q) -> Result<(&K, &V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.storage.last(key)
    }

    /// Returns the entry at the front with a mutable value.
    ///
    /// The storage is made private to this handle first, and the handle
    /// remembers that it lent out a mutable reference.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`] if the queue is empty, or
    /// [`FifoError::ResourceExhaustion`] if a needed storage copy failed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue: KvFifo<i32, i32> = [(1, 10)].into_iter().collect();
    /// let snapshot = queue.clone();
    ///
    /// *queue.front_mut()?.1 += 1;
    ///
    /// assert_eq!(queue.front()?, (&1, &11));
    /// assert_eq!(snapshot.front()?, (&1, &10));
    /// # Ok::<(), kvfifo::FifoError>(())
    /// ```
    ///
    /// The returned reference cannot outlive the next use of the queue, so a
    /// copy taken afterwards never observes a later write:
    ///
    /// ```compile_fail,E0502
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue: KvFifo<i32, i32> = [(1, 10)].into_iter().collect();
    /// let (_, value) = queue.front_mut()?;
    /// let snapshot = queue.clone();
    /// *value = 11;
    /// # drop(snapshot);
    /// # Ok::<(), kvfifo::FifoError>(())
    /// ```
    pub fn front_mut(&mut self) -> Result<(&K, &mut V), FifoError> {
        if self.is_empty() {
            return Err(FifoError::EmptyContainer);
        }
        self.lend()?.front_mut()
    }

    /// Returns the entry at the back with a mutable value.
    ///
    /// # Errors
    ///
    /// Same as [`front_mut`](Self::front_mut).
    pub fn back_mut(&mut self) -> Result<(&K, &mut V), FifoError> {
        if self.is_empty() {
            return Err(FifoError::EmptyContainer);
        }
        self.lend()?.back_mut()
    }

    /// Returns the oldest entry carrying `key` with a mutable value.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`], [`FifoError::KeyNotFound`] or
    /// [`FifoError::ResourceExhaustion`].
    pub fn first_mut<Q>(&mut self, key: &Q) -> Result<(&K, &mut V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.storage.check_key(key)?;
        self.lend()?.first_mut(key)
    }

    /// Returns the newest entry carrying `key` with a mutable value.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::EmptyContainer`], [`FifoError::KeyNotFound`] or
    /// [`FifoError::ResourceExhaustion`].
    pub fn last_mut<Q>(&mut self, key: &Q) -> Result<(&K, &mut V), FifoError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.storage.check_key(key)?;
        self.lend()?.last_mut(key)
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Returns an iterator over the distinct keys in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvfifo::KvFifo;
    ///
    /// let queue: KvFifo<&str, i32> = [("b", 1), ("a", 2), ("b", 3)].into_iter().collect();
    /// assert_eq!(queue.keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
    /// ```
    ///
    /// Any mutation of the queue ends the iterator's lifetime:
    ///
    /// ```compile_fail,E0502
    /// use kvfifo::KvFifo;
    ///
    /// let mut queue: KvFifo<&str, i32> = [("b", 1), ("a", 2)].into_iter().collect();
    /// let mut keys = queue.keys();
    /// queue.push("c", 3)?;
    /// keys.next();
    /// # Ok::<(), kvfifo::FifoError>(())
    /// ```
    pub fn keys(&self) -> Keys<'_, K> {
        Keys::new(self.storage.key_index().as_map())
    }

    /// Returns an iterator over the entries in FIFO order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.storage.iter()
    }

    // =========================================================================
    // Sharing
    // =========================================================================

    /// Returns `true` if both handles currently read the same storage.
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.storage, &other.storage)
    }

    /// Returns `true` if a mutable reference into the current storage may
    /// still be outstanding.
    #[must_use]
    pub const fn has_outstanding_access(&self) -> bool {
        self.lent
    }

    /// Clones the queue, reporting allocation failure instead of aborting.
    ///
    /// # Errors
    ///
    /// Returns [`FifoError::ResourceExhaustion`] if an eager copy was needed
    /// and could not be allocated.
    pub fn try_clone(&self) -> Result<Self, FifoError> {
        if !self.lent {
            return Ok(self.share());
        }
        let storage = self.storage.try_clone()?;
        debug!(
            entries = storage.len(),
            keys = storage.distinct_keys(),
            "kvfifo: eager copy of lent storage"
        );
        Ok(Self {
            storage: ReferenceCounter::new(storage),
            lent: false,
        })
    }

    fn share(&self) -> Self {
        trace!(
            owners = ReferenceCounter::strong_count(&self.storage) + 1,
            "kvfifo: sharing storage"
        );
        Self {
            storage: ReferenceCounter::clone(&self.storage),
            lent: false,
        }
    }

    /// Makes the storage private to this handle, copying it if it is shared
    /// or if a mutable reference into it was lent out.
    ///
    /// On failure neither the storage handle nor the flag changes.
    fn exclusive(&mut self) -> Result<&mut Storage<K, V>, FifoError> {
        let owners = ReferenceCounter::strong_count(&self.storage);
        if owners > 1 || self.lent {
            let copy = self.storage.try_clone()?;
            debug!(
                entries = copy.len(),
                keys = copy.distinct_keys(),
                owners,
                lent = self.lent,
                "kvfifo: copying storage before mutation"
            );
            self.storage = ReferenceCounter::new(copy);
            self.lent = false;
        }
        Ok(ReferenceCounter::make_mut(&mut self.storage))
    }

    fn lend(&mut self) -> Result<&mut Storage<K, V>, FifoError> {
        self.exclusive()?;
        self.lent = true;
        Ok(ReferenceCounter::make_mut(&mut self.storage))
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K: Ord + Clone, V: Clone> Clone for KvFifo<K, V> {
    /// Shares the storage, unless this handle has lent out a mutable
    /// reference; then the clone gets its own copy right away.
    fn clone(&self) -> Self {
        if !self.lent {
            return self.share();
        }
        let storage = Storage::clone(&self.storage);
        debug!(
            entries = storage.len(),
            keys = storage.distinct_keys(),
            "kvfifo: eager copy of lent storage"
        );
        Self {
            storage: ReferenceCounter::new(storage),
            lent: false,
        }
    }
}

impl<K: Ord + Clone, V: Clone> Default for KvFifo<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for KvFifo<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<K: Ord + Clone, V: Clone> Extend<(K, V)> for KvFifo<K, V> {
    /// # Panics
    ///
    /// Panics if memory for an entry cannot be reserved. Use
    /// [`KvFifo::push`] to handle that case.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            if let Err(error) = self.push(key, value) {
                panic!("{error}");
            }
        }
    }
}

impl<'a, K: Ord + Clone, V: Clone> IntoIterator for &'a KvFifo<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> PartialEq for KvFifo<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.shares_storage_with(other)
            || (self.len() == other.len() && self.iter().eq(other.iter()))
    }
}

impl<K: Ord + Clone, V: Clone + Eq> Eq for KvFifo<K, V> {}

impl<K: Ord + Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for KvFifo<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}
