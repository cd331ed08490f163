//! Ordered entry log.
//!
//! A doubly linked list whose nodes live in a `Vec` arena. Vacated slots are
//! threaded onto a free list and reused, so a [`Position`] handed out by
//! [`EntryLog::push_back`] stays valid until that entry itself is removed,
//! no matter how other entries are removed or relinked.

use std::collections::TryReserveError;
use std::iter::FusedIterator;

/// Stable handle of an entry inside an [`EntryLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Position(usize);

struct Node<K, V> {
    key: K,
    value: V,
    previous: Option<usize>,
    next: Option<usize>,
}

enum Slot<K, V> {
    Occupied(Node<K, V>),
    Vacant { next_free: Option<usize> },
}

pub(crate) struct EntryLog<K, V> {
    slots: Vec<Slot<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Option<usize>,
    length: usize,
    #[cfg(test)]
    fail_next_reserve: bool,
}

impl<K, V> EntryLog<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            tail: None,
            free: None,
            length: 0,
            #[cfg(test)]
            fail_next_reserve: false,
        }
    }

    /// Creates an empty log able to hold `capacity` entries without growing.
    pub(crate) fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut log = Self::new();
        log.slots.try_reserve_exact(capacity)?;
        Ok(log)
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Guarantees that the next [`push_back`](Self::push_back) does not allocate.
    pub(crate) fn try_reserve_one(&mut self) -> Result<(), TryReserveError> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_reserve) {
            return Vec::<u8>::new().try_reserve(usize::MAX);
        }
        if self.free.is_none() {
            self.slots.try_reserve(1)?;
        }
        Ok(())
    }

    /// Makes the next [`try_reserve_one`](Self::try_reserve_one) fail as if
    /// the allocator had refused.
    #[cfg(test)]
    pub(crate) fn fail_next_reserve(&mut self) {
        self.fail_next_reserve = true;
    }

    /// Links a new entry at the back and returns its position.
    pub(crate) fn push_back(&mut self, key: K, value: V) -> Position {
        let node = Node {
            key,
            value,
            previous: self.tail,
            next: None,
        };
        let index = match self.free {
            Some(index) => {
                if let Slot::Vacant { next_free } = &self.slots[index] {
                    self.free = *next_free;
                }
                self.slots[index] = Slot::Occupied(node);
                index
            }
            None => {
                self.slots.push(Slot::Occupied(node));
                self.slots.len() - 1
            }
        };
        self.attach_after_tail(index);
        self.length += 1;
        Position(index)
    }

    /// Unlinks the entry at `position` and returns its contents.
    pub(crate) fn remove(&mut self, position: Position) -> Option<(K, V)> {
        let Position(index) = position;
        if !matches!(self.slots.get(index), Some(Slot::Occupied(_))) {
            return None;
        }
        self.detach(index);
        let vacated = std::mem::replace(
            &mut self.slots[index],
            Slot::Vacant {
                next_free: self.free,
            },
        );
        self.free = Some(index);
        self.length -= 1;
        match vacated {
            Slot::Occupied(node) => Some((node.key, node.value)),
            Slot::Vacant { .. } => None,
        }
    }

    /// Relinks the entry at `position` as the last entry. The position is kept.
    pub(crate) fn move_to_back(&mut self, position: Position) {
        let Position(index) = position;
        if self.tail == Some(index) || !matches!(self.slots.get(index), Some(Slot::Occupied(_))) {
            return;
        }
        self.detach(index);
        if let Slot::Occupied(node) = &mut self.slots[index] {
            node.previous = self.tail;
            node.next = None;
        }
        self.attach_after_tail(index);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.head = None;
        self.tail = None;
        self.free = None;
        self.length = 0;
    }

    #[inline]
    pub(crate) fn front_position(&self) -> Option<Position> {
        self.head.map(Position)
    }

    #[inline]
    pub(crate) fn back_position(&self) -> Option<Position> {
        self.tail.map(Position)
    }

    pub(crate) fn get(&self, position: Position) -> Option<(&K, &V)> {
        match self.slots.get(position.0) {
            Some(Slot::Occupied(node)) => Some((&node.key, &node.value)),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, position: Position) -> Option<(&K, &mut V)> {
        match self.slots.get_mut(position.0) {
            Some(Slot::Occupied(node)) => Some((&node.key, &mut node.value)),
            _ => None,
        }
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            front: self.head,
            back: self.tail,
            remaining: self.length,
        }
    }

    // Expects `index` to be occupied with `previous` already pointing at the old tail.
    fn attach_after_tail(&mut self, index: usize) {
        match self.tail {
            Some(tail) => {
                if let Slot::Occupied(node) = &mut self.slots[tail] {
                    node.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
    }

    fn detach(&mut self, index: usize) {
        let (previous, next) = match &self.slots[index] {
            Slot::Occupied(node) => (node.previous, node.next),
            Slot::Vacant { .. } => return,
        };
        match previous {
            Some(previous) => {
                if let Slot::Occupied(node) = &mut self.slots[previous] {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Slot::Occupied(node) = &mut self.slots[next] {
                    node.previous = previous;
                }
            }
            None => self.tail = previous,
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the entries of a [`KvFifo`](crate::KvFifo) in FIFO order.
///
/// Created by [`KvFifo::iter`](crate::KvFifo::iter).
pub struct Iter<'a, K, V> {
    slots: &'a [Slot<K, V>],
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slots = self.slots;
        match slots.get(self.front?) {
            Some(Slot::Occupied(node)) => {
                self.front = node.next;
                self.remaining -= 1;
                Some((&node.key, &node.value))
            }
            _ => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slots = self.slots;
        match slots.get(self.back?) {
            Some(Slot::Occupied(node)) => {
                self.back = node.previous;
                self.remaining -= 1;
                Some((&node.key, &node.value))
            }
            _ => None,
        }
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}
