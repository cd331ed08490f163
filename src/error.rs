//! Error types for queue operations.
//!
//! Every fallible operation on a [`KvFifo`](crate::KvFifo) reports one of the
//! variants below synchronously. A failed call leaves the queue exactly as it
//! was before the call.

use std::collections::TryReserveError;

/// Represents errors that can occur when operating on a [`KvFifo`](crate::KvFifo).
///
/// # Examples
///
/// ```rust
/// use kvfifo::{FifoError, KvFifo};
///
/// let mut queue: KvFifo<i32, &str> = KvFifo::new();
/// assert_eq!(queue.pop(), Err(FifoError::EmptyContainer));
///
/// queue.push(2, "b")?;
/// assert_eq!(queue.pop_key(&1), Err(FifoError::KeyNotFound));
/// # Ok::<(), FifoError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FifoError {
    /// The operation requires at least one entry, but the queue is empty.
    EmptyContainer,
    /// The operation requires at least one occurrence of a key, but there is none.
    KeyNotFound,
    /// Memory could not be reserved for an insertion or for a storage copy.
    ResourceExhaustion,
}

impl std::fmt::Display for FifoError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContainer => write!(formatter, "kvfifo: the queue is empty"),
            Self::KeyNotFound => write!(formatter, "kvfifo: no entry with the given key"),
            Self::ResourceExhaustion => {
                write!(formatter, "kvfifo: memory allocation failed")
            }
        }
    }
}

impl std::error::Error for FifoError {}

static_assertions::assert_impl_all!(FifoError: Send, Sync, Copy, std::error::Error);

impl From<TryReserveError> for FifoError {
    fn from(_: TryReserveError) -> Self {
        Self::ResourceExhaustion
    }
}
