// src/store/traits.rs
//! Store abstraction for BucketBase
//!
//! This module defines the exact interface the bucketed collection engine
//! requires from a backing document store. The engine never assumes more
//! than what is written here; in particular it never assumes cross-record
//! transactions. This enables:
//! - Dependency injection
//! - Easy testing with MemoryBucketStore
//! - Future extensibility (a server-backed store, etc.)

use crate::bucket::{Bucket, BucketId};
use crate::error::Result;
use crate::item::Item;
use crate::merge::ItemWrite;
use crate::selector::BucketPredicate;

/// How a conditional upsert landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An existing entry was replaced by the field-wise merge
    Merged,
    /// The item was appended to an existing bucket
    Appended,
    /// No eligible bucket existed; a new one was created
    Created,
}

/// Receipt for a successful conditional upsert
#[derive(Debug, Clone)]
pub struct UpsertReport {
    pub bucket_id: BucketId,
    pub outcome: UpsertOutcome,
}

/// Core store abstraction for BucketBase
///
/// # Atomicity contract
///
/// `conditional_upsert` must be atomic **per record**: find one bucket
/// satisfying the predicate (preferring an update target over a
/// spare-capacity bucket), apply the merge transform to it, and persist -
/// all indivisible with respect to other writers of that same record. The
/// predicate must be evaluated at the moment of the operation, not against
/// a stale snapshot. When no record matches, a new bucket seeded from the
/// write must be created instead.
///
/// The store is NOT required to serialize the no-match/create decision
/// across records. Two concurrent writers may both decide to create; the
/// declared uniqueness constraint over `(colNum, itemId)` must then reject
/// one of them with `UniqueViolation`, never corrupt state.
pub trait BucketStore: Send + Sync {
    /// Atomic find-matching / apply-merge / create-if-absent
    fn conditional_upsert(
        &self,
        predicate: &BucketPredicate,
        write: &ItemWrite,
    ) -> Result<UpsertReport>;

    /// Point query: the single item of `col_num` whose `itemNum` equals
    /// `item_num`, projected out of whichever bucket holds it
    fn find_item(&self, col_num: i64, item_num: i64) -> Result<Option<Item>>;

    /// Aggregate sum of the denormalized `numItems` over all buckets of
    /// `col_num`; 0 when the collection has no buckets
    fn sum_item_counts(&self, col_num: i64) -> Result<u64>;

    /// All bucket records of one collection (diagnostics and tests)
    fn scan_buckets(&self, col_num: i64) -> Result<Vec<Bucket>>;

    /// Drop the whole bucket table. Setup/test plumbing; callers must not
    /// race it against live writers.
    fn reset(&self) -> Result<()>;
}
