// src/engine.rs
// Insert coordinator and lookup engine - the public face of the crate

use std::sync::Arc;

use crate::bucket::{BucketConfig, BucketId};
use crate::error::{BucketBaseError, Result};
use crate::item::Item;
use crate::merge::ItemWrite;
use crate::selector::BucketPredicate;
use crate::store::{BucketStore, UpsertOutcome};
use crate::{log_debug, log_warn};

/// Conflict-retry budget for one insert. The cross-record creation race
/// resolves in one round under normal load; the budget only exists so a
/// pathological store cannot spin us forever.
pub const MAX_INSERT_RETRIES: u32 = 5;

/// Caller-side collection descriptor. `col_num` is the stable logical id;
/// `col_id`/`col_name` are duplicated into buckets on a first-writer-wins
/// basis and never consulted for routing.
#[derive(Debug, Clone)]
pub struct CollectionRef {
    pub col_id: String,
    pub col_num: i64,
    pub col_name: String,
}

impl CollectionRef {
    pub fn new(col_id: impl Into<String>, col_num: i64, col_name: impl Into<String>) -> Self {
        CollectionRef {
            col_id: col_id.into(),
            col_num,
            col_name: col_name.into(),
        }
    }
}

/// Receipt for a successful insert. `retries` counts uniqueness conflicts
/// that were absorbed on the way; callers can meter conflict pressure from
/// it without treating a retried insert as a failure.
#[derive(Debug, Clone)]
pub struct InsertReport {
    pub bucket_id: BucketId,
    pub outcome: UpsertOutcome,
    pub retries: u32,
}

/// The bucketed collection engine.
///
/// Generic over the store backend:
/// - `CollectionEngine<MemoryBucketStore>` - in-process reference store
/// - any other `BucketStore` implementation
///
/// All serialization is delegated to the store's per-record atomicity; the
/// engine holds no locks of its own and never spans a lock across store
/// round-trips.
pub struct CollectionEngine<S: BucketStore> {
    store: Arc<S>,
    config: BucketConfig,
}

impl<S: BucketStore> CollectionEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, BucketConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: BucketConfig) -> Self {
        CollectionEngine { store, config }
    }

    pub fn config(&self) -> BucketConfig {
        self.config
    }

    /// Insert or update one item in the given collection.
    ///
    /// Exactly one bucket of `col.col_num` ends up containing the item:
    /// merged field-wise into an existing entry, appended to a bucket with
    /// spare capacity, or placed in a freshly created bucket. A uniqueness
    /// conflict (two writers racing to create a bucket, or a selection
    /// snapshot going stale) is retried with re-selection up to
    /// `MAX_INSERT_RETRIES` times; exhaustion surfaces `WriteFailed`. Store
    /// transport errors are never retried here.
    pub fn insert(&self, col: &CollectionRef, item: Item) -> Result<InsertReport> {
        item.validate()?;

        let predicate = BucketPredicate::new(
            col.col_num,
            item.item_id.clone(),
            self.config.capacity(),
        );
        let write = ItemWrite {
            col_id: col.col_id.clone(),
            col_num: col.col_num,
            col_name: col.col_name.clone(),
            item,
        };

        let mut retries = 0u32;
        loop {
            // Selection happens inside the store's atomic primitive; each
            // attempt re-evaluates the predicate against current state, so a
            // retry naturally finds the bucket a rival writer created.
            match self.store.conditional_upsert(&predicate, &write) {
                Ok(report) => {
                    if retries > 0 {
                        log_debug!(
                            "insert of itemId {} into colNum {} settled after {} retries",
                            write.item.item_id,
                            col.col_num,
                            retries
                        );
                    }
                    return Ok(InsertReport {
                        bucket_id: report.bucket_id,
                        outcome: report.outcome,
                        retries,
                    });
                }
                Err(BucketBaseError::UniqueViolation { .. }) if retries < MAX_INSERT_RETRIES => {
                    retries += 1;
                    log_debug!(
                        "uniqueness conflict on itemId {} colNum {}, retry {}/{}",
                        write.item.item_id,
                        col.col_num,
                        retries,
                        MAX_INSERT_RETRIES
                    );
                }
                Err(BucketBaseError::UniqueViolation { col_num, item_id }) => {
                    let attempts = retries + 1;
                    log_warn!(
                        "giving up on itemId {} for colNum {} after {} attempts",
                        item_id,
                        col_num,
                        attempts
                    );
                    return Err(BucketBaseError::WriteFailed {
                        col_num,
                        item_id,
                        attempts,
                    });
                }
                // StoreUnavailable and everything else: caller policy, not ours
                Err(other) => return Err(other),
            }
        }
    }

    /// Point query by ordinal number. `None` when no such item exists;
    /// a missing collection is not an error.
    pub fn get_item(&self, col_num: i64, item_num: i64) -> Result<Option<Item>> {
        self.store.find_item(col_num, item_num)
    }

    /// Total item count for a collection: the sum of denormalized per-bucket
    /// counts, 0 for an unknown collection. May be stale relative to
    /// in-flight inserts.
    pub fn get_count(&self, col_num: i64) -> Result<u64> {
        self.store.sum_item_counts(col_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;
    use crate::store::{MemoryBucketStore, UpsertReport};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn col_one() -> CollectionRef {
        CollectionRef::new("col-123", 1, "collection one")
    }

    /// Store that rejects every write with a uniqueness conflict
    struct AlwaysConflicting;

    impl BucketStore for AlwaysConflicting {
        fn conditional_upsert(
            &self,
            predicate: &BucketPredicate,
            _write: &ItemWrite,
        ) -> Result<UpsertReport> {
            Err(BucketBaseError::UniqueViolation {
                col_num: predicate.col_num(),
                item_id: predicate.item_id().clone(),
            })
        }

        fn find_item(&self, _col_num: i64, _item_num: i64) -> Result<Option<Item>> {
            Ok(None)
        }

        fn sum_item_counts(&self, _col_num: i64) -> Result<u64> {
            Ok(0)
        }

        fn scan_buckets(&self, _col_num: i64) -> Result<Vec<crate::bucket::Bucket>> {
            Ok(Vec::new())
        }

        fn reset(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Store that conflicts a fixed number of times, then delegates
    struct EventuallySucceeding {
        conflicts_left: AtomicU32,
        inner: MemoryBucketStore,
    }

    impl EventuallySucceeding {
        fn new(conflicts: u32) -> Self {
            EventuallySucceeding {
                conflicts_left: AtomicU32::new(conflicts),
                inner: MemoryBucketStore::new(),
            }
        }
    }

    impl BucketStore for EventuallySucceeding {
        fn conditional_upsert(
            &self,
            predicate: &BucketPredicate,
            write: &ItemWrite,
        ) -> Result<UpsertReport> {
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(BucketBaseError::UniqueViolation {
                    col_num: predicate.col_num(),
                    item_id: predicate.item_id().clone(),
                });
            }
            self.inner.conditional_upsert(predicate, write)
        }

        fn find_item(&self, col_num: i64, item_num: i64) -> Result<Option<Item>> {
            self.inner.find_item(col_num, item_num)
        }

        fn sum_item_counts(&self, col_num: i64) -> Result<u64> {
            self.inner.sum_item_counts(col_num)
        }

        fn scan_buckets(&self, col_num: i64) -> Result<Vec<crate::bucket::Bucket>> {
            self.inner.scan_buckets(col_num)
        }

        fn reset(&self) -> Result<()> {
            self.inner.reset()
        }
    }

    /// Store with a dead transport
    struct Unavailable;

    impl BucketStore for Unavailable {
        fn conditional_upsert(
            &self,
            _predicate: &BucketPredicate,
            _write: &ItemWrite,
        ) -> Result<UpsertReport> {
            Err(BucketBaseError::StoreUnavailable("connection refused".to_string()))
        }

        fn find_item(&self, _col_num: i64, _item_num: i64) -> Result<Option<Item>> {
            Err(BucketBaseError::StoreUnavailable("connection refused".to_string()))
        }

        fn sum_item_counts(&self, _col_num: i64) -> Result<u64> {
            Err(BucketBaseError::StoreUnavailable("connection refused".to_string()))
        }

        fn scan_buckets(&self, _col_num: i64) -> Result<Vec<crate::bucket::Bucket>> {
            Err(BucketBaseError::StoreUnavailable("connection refused".to_string()))
        }

        fn reset(&self) -> Result<()> {
            Err(BucketBaseError::StoreUnavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_insert_rejects_empty_item_id() {
        let engine = CollectionEngine::new(Arc::new(MemoryBucketStore::new()));

        let result = engine.insert(&col_one(), Item::with_id(ItemId::String(String::new())));
        assert!(matches!(result, Err(BucketBaseError::InvalidItem(_))));

        // nothing must have reached the store
        assert_eq!(engine.get_count(1).unwrap(), 0);
    }

    #[test]
    fn test_insert_basic_outcomes() {
        let engine = CollectionEngine::new(Arc::new(MemoryBucketStore::new()));
        let col = col_one();

        let first = engine.insert(&col, Item::with_id(ItemId::Int(1))).unwrap();
        assert_eq!(first.outcome, UpsertOutcome::Created);
        assert_eq!(first.retries, 0);

        let second = engine.insert(&col, Item::with_id(ItemId::Int(2))).unwrap();
        assert_eq!(second.outcome, UpsertOutcome::Appended);

        let again = engine.insert(&col, Item::with_id(ItemId::Int(1))).unwrap();
        assert_eq!(again.outcome, UpsertOutcome::Merged);

        assert_eq!(engine.get_count(1).unwrap(), 2);
    }

    #[test]
    fn test_retry_budget_exhaustion_maps_to_write_failed() {
        let engine = CollectionEngine::new(Arc::new(AlwaysConflicting));

        let result = engine.insert(&col_one(), Item::with_id(ItemId::Int(1)));
        match result {
            Err(BucketBaseError::WriteFailed { attempts, .. }) => {
                assert_eq!(attempts, MAX_INSERT_RETRIES + 1);
            }
            other => panic!("Expected WriteFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_conflicts_within_budget_are_absorbed() {
        let engine = CollectionEngine::new(Arc::new(EventuallySucceeding::new(2)));

        let report = engine.insert(&col_one(), Item::with_id(ItemId::Int(1))).unwrap();
        assert_eq!(report.retries, 2);
        assert_eq!(report.outcome, UpsertOutcome::Created);
        assert_eq!(engine.get_count(1).unwrap(), 1);
    }

    #[test]
    fn test_store_unavailable_is_not_retried() {
        let engine = CollectionEngine::new(Arc::new(Unavailable));

        let result = engine.insert(&col_one(), Item::with_id(ItemId::Int(1)));
        assert!(matches!(
            result,
            Err(BucketBaseError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_lookups_never_error_on_missing_collection() {
        let engine = CollectionEngine::new(Arc::new(MemoryBucketStore::new()));

        assert!(engine.get_item(42, 1).unwrap().is_none());
        assert_eq!(engine.get_count(42).unwrap(), 0);
    }
}
