//! # kvfifo
//!
//! A key-indexed FIFO queue whose storage is shared between copies until one
//! of them is mutated.
//!
//! ## Overview
//!
//! [`KvFifo`] keeps `(key, value)` entries in insertion order and, next to
//! that order, an index from every key to the positions of its occurrences.
//! This allows:
//!
//! - **Queue operations**: `push` at the back and `pop` from the front in O(1)
//! - **Per-key operations**: first/last occurrence lookup, removal of the
//!   oldest occurrence, and moving every occurrence of a key to the back,
//!   all in O(log n + m)
//! - **Cheap copies**: `clone` shares the underlying storage; the first
//!   mutation on either side materializes a private copy
//!
//! ## Feature Flags
//!
//! - `arc`: share storage through `std::sync::Arc` instead of `std::rc::Rc`
//!
//! ## Example
//!
//! ```rust
//! use kvfifo::prelude::*;
//!
//! let mut queue = KvFifo::new();
//! queue.push(1, "a")?;
//! queue.push(2, "b")?;
//! queue.push(1, "c")?;
//!
//! let snapshot = queue.clone();
//! queue.move_to_back(&2)?;
//!
//! assert_eq!(queue.back()?, (&2, &"b"));
//! assert_eq!(snapshot.back()?, (&1, &"c"));
//! assert_eq!(queue.keys().collect::<Vec<_>>(), vec![&1, &2]);
//! # Ok::<(), kvfifo::FifoError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use kvfifo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::FifoError;
    pub use crate::fifo::KvFifo;
    pub use crate::keys::Keys;
    pub use crate::storage::Iter;
}

pub mod error;
pub mod fifo;
pub mod keys;
mod storage;

pub use error::FifoError;
pub use fifo::KvFifo;
pub use keys::Keys;
pub use storage::Iter;
