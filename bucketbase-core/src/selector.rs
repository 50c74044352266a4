// src/selector.rs
//! Bucket selection predicate.
//!
//! The predicate is handed to the store and evaluated there, at the moment
//! of the atomic operation - never pre-evaluated by the caller, which would
//! open a read-then-write race window. A bucket is eligible when it either
//! already contains the incoming item (update case) or still has spare
//! capacity (insert-new case). The store must check the update arm first:
//! appending an item that already lives in another bucket would only bounce
//! off the unique index and re-select the same bucket forever.

use crate::bucket::Bucket;
use crate::item::ItemId;

#[derive(Debug, Clone)]
pub struct BucketPredicate {
    col_num: i64,
    item_id: ItemId,
    capacity: u64,
}

impl BucketPredicate {
    pub fn new(col_num: i64, item_id: ItemId, capacity: u64) -> Self {
        BucketPredicate {
            col_num,
            item_id,
            capacity,
        }
    }

    pub fn col_num(&self) -> i64 {
        self.col_num
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// The full predicate: update target or spare capacity
    pub fn matches(&self, bucket: &Bucket) -> bool {
        self.is_update_target(bucket) || self.has_spare_capacity(bucket)
    }

    /// A bucket of this collection already holding the incoming item
    pub fn is_update_target(&self, bucket: &Bucket) -> bool {
        bucket.col_num == self.col_num && bucket.contains_item(&self.item_id)
    }

    /// A bucket of this collection with room for one more item
    pub fn has_spare_capacity(&self, bucket: &Bucket) -> bool {
        bucket.col_num == self.col_num && bucket.num_items < self.capacity
    }
}
