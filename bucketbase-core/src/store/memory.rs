// store/memory.rs
//! In-memory reference implementation of the store boundary.
//!
//! Atomicity here is deliberately no stronger than what the engine is
//! specified against: one `RwLock` per bucket record, plus a mutex-guarded
//! uniqueness set standing in for the store's declared unique index over
//! `(colNum, itemId)`. There is no table-wide write transaction, so two
//! writers that both observe "no eligible bucket" really do race to create
//! one, and the loser really does see `UniqueViolation` - the same shape of
//! conflict a server-backed document store would produce.

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::bucket::{Bucket, BucketId};
use crate::error::{BucketBaseError, Result};
use crate::item::{Item, ItemId};
use crate::merge;
use crate::merge::ItemWrite;
use crate::selector::BucketPredicate;
use crate::store::traits::{BucketStore, UpsertOutcome, UpsertReport};
use crate::{log_debug, log_info, log_trace};

type BucketSlot = Arc<RwLock<Bucket>>;

/// In-memory bucket store
///
/// The table lock only guards map membership; record contents are guarded
/// by their own per-record locks. Never hold the table lock while waiting
/// on a record write lock.
pub struct MemoryBucketStore {
    table: RwLock<AHashMap<BucketId, BucketSlot>>,
    /// Unique index over (colNum, itemId); claims are made before the
    /// corresponding append becomes visible to readers
    unique: Mutex<AHashSet<(i64, ItemId)>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        MemoryBucketStore {
            table: RwLock::new(AHashMap::new()),
            unique: Mutex::new(AHashSet::new()),
        }
    }

    /// Claim `(col_num, item_id)` in the unique index. Returns false when
    /// the pair is already taken, i.e. the item lives in some bucket.
    fn claim(&self, col_num: i64, item_id: &ItemId) -> bool {
        self.unique.lock().insert((col_num, item_id.clone()))
    }

    /// Snapshot the candidate records for a predicate, update targets first.
    /// The snapshot is advisory; every candidate is re-checked under its own
    /// write lock before being mutated.
    fn select_candidates(&self, predicate: &BucketPredicate) -> Vec<(BucketId, BucketSlot)> {
        let table = self.table.read();
        let mut update_targets = Vec::new();
        let mut spare = Vec::new();

        for (id, slot) in table.iter() {
            let bucket = slot.read();
            if predicate.is_update_target(&bucket) {
                update_targets.push((id.clone(), Arc::clone(slot)));
            } else if predicate.has_spare_capacity(&bucket) {
                spare.push((id.clone(), Arc::clone(slot)));
            }
        }

        update_targets.extend(spare);
        update_targets
    }
}

impl Default for MemoryBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketStore for MemoryBucketStore {
    fn conditional_upsert(
        &self,
        predicate: &BucketPredicate,
        write: &ItemWrite,
    ) -> Result<UpsertReport> {
        for (id, slot) in self.select_candidates(predicate) {
            let mut bucket = slot.write();

            // Another writer may have touched this record between the
            // snapshot and our lock; the predicate decides again here.
            if predicate.is_update_target(&bucket) {
                merge::apply_write(&mut bucket, write);
                log_trace!(
                    "merged itemId {} into bucket {}",
                    write.item.item_id,
                    id
                );
                return Ok(UpsertReport {
                    bucket_id: id,
                    outcome: UpsertOutcome::Merged,
                });
            }

            if predicate.has_spare_capacity(&bucket) {
                // Appending a new id: claim it in the unique index first.
                // A failed claim means the item already sits in another
                // bucket that the snapshot missed.
                if !self.claim(predicate.col_num(), predicate.item_id()) {
                    log_debug!(
                        "unique index rejected append of itemId {} for colNum {}",
                        predicate.item_id(),
                        predicate.col_num()
                    );
                    return Err(BucketBaseError::UniqueViolation {
                        col_num: predicate.col_num(),
                        item_id: predicate.item_id().clone(),
                    });
                }
                merge::apply_write(&mut bucket, write);
                return Ok(UpsertReport {
                    bucket_id: id,
                    outcome: UpsertOutcome::Appended,
                });
            }

            // Record no longer eligible (filled up meanwhile); next candidate.
        }

        // Nincs megfelelő bucket - újat hozunk létre.
        // Two writers can reach this point at the same time; the unique
        // index decides which creation survives.
        if !self.claim(write.col_num, &write.item.item_id) {
            log_debug!(
                "unique index rejected bucket creation for itemId {} colNum {}",
                write.item.item_id,
                write.col_num
            );
            return Err(BucketBaseError::UniqueViolation {
                col_num: write.col_num,
                item_id: write.item.item_id.clone(),
            });
        }

        let bucket = merge::create_bucket(write);
        let id = bucket.id.clone();
        self.table
            .write()
            .insert(id.clone(), Arc::new(RwLock::new(bucket)));
        log_trace!("created bucket {} for colNum {}", id, write.col_num);

        Ok(UpsertReport {
            bucket_id: id,
            outcome: UpsertOutcome::Created,
        })
    }

    fn find_item(&self, col_num: i64, item_num: i64) -> Result<Option<Item>> {
        let table = self.table.read();
        for slot in table.values() {
            let bucket = slot.read();
            if bucket.col_num != col_num {
                continue;
            }
            if let Some(item) = bucket.find_by_item_num(item_num) {
                return Ok(Some(item.clone()));
            }
        }
        Ok(None)
    }

    fn sum_item_counts(&self, col_num: i64) -> Result<u64> {
        // Trusts the denormalized counts; never re-measures items
        let table = self.table.read();
        let sum = table
            .values()
            .map(|slot| slot.read())
            .filter(|bucket| bucket.col_num == col_num)
            .map(|bucket| bucket.num_items)
            .sum();
        Ok(sum)
    }

    fn scan_buckets(&self, col_num: i64) -> Result<Vec<Bucket>> {
        let table = self.table.read();
        let buckets = table
            .values()
            .map(|slot| slot.read())
            .filter(|bucket| bucket.col_num == col_num)
            .map(|bucket| bucket.clone())
            .collect();
        Ok(buckets)
    }

    fn reset(&self) -> Result<()> {
        let mut table = self.table.write();
        table.clear();
        self.unique.lock().clear();
        log_info!("bucket table dropped");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
