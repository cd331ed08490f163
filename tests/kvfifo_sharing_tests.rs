//! Tests for storage sharing between KvFifo handles.
//!
//! A clone shares storage until either side mutates it. A handle that lent
//! out a mutable reference never shares its current storage again: clones
//! taken from it copy eagerly, and its own next mutation copies as well.

use kvfifo::KvFifo;
use rstest::rstest;

fn sample() -> KvFifo<i32, String> {
    [(1, "a"), (2, "b"), (1, "c")]
        .into_iter()
        .map(|(key, value)| (key, value.to_string()))
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn values(queue: &KvFifo<i32, String>) -> Vec<&str> {
    queue.iter().map(|(_, value)| value.as_str()).collect()
}

// =============================================================================
// Cheap Copies
// =============================================================================

#[rstest]
fn test_clone_shares_storage() {
    let original = sample();
    let copy = original.clone();

    assert!(copy.shares_storage_with(&original));
    assert_eq!(copy, original);
}

#[rstest]
fn test_clone_from_shares_storage() {
    let original = sample();
    let mut target: KvFifo<i32, String> = [(9, "z".to_string())].into_iter().collect();

    target.clone_from(&original);

    assert!(target.shares_storage_with(&original));
    assert_eq!(values(&target), vec!["a", "b", "c"]);
}

#[rstest]
fn test_read_only_access_keeps_sharing() {
    let original = sample();
    let copy = original.clone();

    let _ = copy.front();
    let _ = copy.back();
    let _ = copy.first(&1);
    let _ = copy.last(&1);
    let _ = copy.keys().count();
    let _ = copy.iter().count();

    assert!(copy.shares_storage_with(&original));
    assert!(!copy.has_outstanding_access());
}

#[rstest]
fn test_move_transfers_storage_without_copy() {
    let mut original = sample();
    original.front_mut().unwrap();
    let observer = sample();

    let moved = std::mem::take(&mut original);

    assert!(moved.has_outstanding_access());
    assert_eq!(moved, observer);
    assert!(original.is_empty());
    assert!(!original.has_outstanding_access());
}

// =============================================================================
// Copy Isolation
// =============================================================================

#[rstest]
#[case::push(|queue: &mut KvFifo<i32, String>| queue.push(3, "d".to_string()).unwrap())]
#[case::pop(|queue: &mut KvFifo<i32, String>| { queue.pop().unwrap(); })]
#[case::pop_key(|queue: &mut KvFifo<i32, String>| { queue.pop_key(&1).unwrap(); })]
#[case::move_to_back(|queue: &mut KvFifo<i32, String>| queue.move_to_back(&1).unwrap())]
#[case::clear(|queue: &mut KvFifo<i32, String>| queue.clear())]
#[case::front_mut(|queue: &mut KvFifo<i32, String>| queue.front_mut().unwrap().1.push('!'))]
#[case::back_mut(|queue: &mut KvFifo<i32, String>| queue.back_mut().unwrap().1.push('!'))]
#[case::first_mut(|queue: &mut KvFifo<i32, String>| queue.first_mut(&2).unwrap().1.push('!'))]
#[case::last_mut(|queue: &mut KvFifo<i32, String>| queue.last_mut(&1).unwrap().1.push('!'))]
fn test_mutating_a_copy_leaves_the_original_alone(
    #[case] mutate: fn(&mut KvFifo<i32, String>),
) {
    let original = sample();
    let mut copy = original.clone();

    mutate(&mut copy);

    assert_eq!(values(&original), vec!["a", "b", "c"]);
    assert_eq!(original.count(&1), 2);
    assert!(!copy.shares_storage_with(&original));
}

#[rstest]
fn test_mutating_the_original_leaves_the_copy_alone() {
    let mut original = sample();
    let copy = original.clone();

    original.push(3, "d".to_string()).unwrap();
    original.move_to_back(&1).unwrap();
    original.pop().unwrap();

    assert_eq!(values(&copy), vec!["a", "b", "c"]);
    assert_eq!(values(&original), vec!["d", "a", "c"]);
}

#[rstest]
fn test_three_handles_diverge_independently() {
    let first = sample();
    let mut second = first.clone();
    let mut third = first.clone();

    second.push(4, "x".to_string()).unwrap();
    third.pop().unwrap();

    assert_eq!(values(&first), vec!["a", "b", "c"]);
    assert_eq!(values(&second), vec!["a", "b", "c", "x"]);
    assert_eq!(values(&third), vec!["b", "c"]);
    assert!(!second.shares_storage_with(&first));
    assert!(!third.shares_storage_with(&first));
}

#[rstest]
fn test_last_owner_mutates_in_place() {
    let mut original = sample();
    let copy = original.clone();
    drop(copy);

    original.push(3, "d".to_string()).unwrap();
    let second = original.clone();

    assert!(second.shares_storage_with(&original));
}

// =============================================================================
// Lent Mutable References
// =============================================================================

#[rstest]
fn test_write_after_copy_does_not_leak_into_copy() {
    init_tracing();
    let mut original = sample();

    original.front_mut().unwrap().1.push_str("-before");
    let copy = original.clone();
    original.front_mut().unwrap().1.push_str("-after");

    assert_eq!(copy.front().unwrap().1, "a-before");
    assert_eq!(original.front().unwrap().1, "a-before-after");
}

#[rstest]
fn test_clone_of_lent_handle_copies_eagerly() {
    let mut original = sample();
    original.first_mut(&1).unwrap();

    let copy = original.clone();

    assert!(!copy.shares_storage_with(&original));
    assert!(!copy.has_outstanding_access());
    assert!(original.has_outstanding_access());
    assert_eq!(copy, original);
}

#[rstest]
fn test_clone_from_lent_handle_copies_eagerly() {
    let mut original = sample();
    original.back_mut().unwrap();
    let mut target = KvFifo::new();

    target.clone_from(&original);

    assert!(!target.shares_storage_with(&original));
    assert_eq!(target, original);
}

#[rstest]
fn test_copies_of_copy_share_again() {
    let mut original = sample();
    original.front_mut().unwrap();

    let first_copy = original.clone();
    let second_copy = first_copy.clone();

    assert!(second_copy.shares_storage_with(&first_copy));
    assert!(!second_copy.shares_storage_with(&original));
}

#[rstest]
fn test_lent_handle_copies_before_next_mutation() {
    init_tracing();
    let mut original = sample();
    original.front_mut().unwrap();
    let copy = original.clone();

    original.push(3, "d".to_string()).unwrap();

    assert!(!original.has_outstanding_access());
    assert_eq!(values(&copy), vec!["a", "b", "c"]);
    assert_eq!(values(&original), vec!["a", "b", "c", "d"]);
}

#[rstest]
fn test_mutation_after_lending_clears_the_flag_and_shares_again() {
    let mut original = sample();
    original.front_mut().unwrap();
    original.push(3, "d".to_string()).unwrap();

    let copy = original.clone();

    assert!(copy.shares_storage_with(&original));
}

#[rstest]
fn test_lending_from_shared_storage_copies_first() {
    let original = sample();
    let mut copy = original.clone();

    copy.first_mut(&1).unwrap().1.make_ascii_uppercase();

    assert_eq!(values(&original), vec!["a", "b", "c"]);
    assert_eq!(values(&copy), vec!["A", "b", "c"]);
}

// =============================================================================
// Key Iterators And Storage Copies
// =============================================================================

#[rstest]
fn test_keys_follow_the_storage_they_were_taken_from() {
    let original = sample();
    let mut copy = original.clone();
    assert_eq!(copy.keys(), original.keys());

    copy.push(7, "q".to_string()).unwrap();

    assert_ne!(copy.keys(), original.keys());
    assert_eq!(original.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(copy.keys().copied().collect::<Vec<_>>(), vec![1, 2, 7]);
}

#[rstest]
fn test_mutation_of_other_key_rebuilds_shared_index() {
    let original = sample();
    let mut copy = original.clone();

    copy.pop_key(&2).unwrap();

    assert_eq!(original.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(copy.keys().copied().collect::<Vec<_>>(), vec![1]);
}
