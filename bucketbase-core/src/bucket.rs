// src/bucket.rs
// Bucket record schema and capacity policy

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{BucketBaseError, Result};
use crate::item::{Item, ItemId};

/// Items per bucket in the sample configuration. Larger buckets mean fewer
/// records to scan on lookup but larger atomic-update payloads.
pub const DEFAULT_BUCKET_CAPACITY: u64 = 4;

/// Record identity of a single bucket (UUID v4 string on the wire)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct BucketId(String);

impl BucketId {
    pub fn new() -> Self {
        BucketId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BucketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One physical record holding a bounded-size slice of a collection's items.
///
/// `colId`/`colName` are duplicated into every bucket of a collection and
/// written only if absent (first writer wins). `numItems` must equal
/// `items.len()` at all times; counting trusts it and never re-measures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "_id")]
    pub id: BucketId,

    #[serde(rename = "colNum")]
    pub col_num: i64,

    #[serde(rename = "colId", skip_serializing_if = "Option::is_none")]
    pub col_id: Option<String>,

    #[serde(rename = "colName", skip_serializing_if = "Option::is_none")]
    pub col_name: Option<String>,

    #[serde(rename = "numItems")]
    pub num_items: u64,

    pub items: Vec<Item>,
}

impl Bucket {
    pub fn contains_item(&self, item_id: &ItemId) -> bool {
        self.items.iter().any(|item| &item.item_id == item_id)
    }

    /// Single matching array element by ordinal number, if present
    pub fn find_by_item_num(&self, item_num: i64) -> Option<&Item> {
        self.items.iter().find(|item| item.item_num() == Some(item_num))
    }

    /// Denormalized count matches the actual item list
    pub fn is_consistent(&self) -> bool {
        self.num_items == self.items.len() as u64
    }
}

/// Fixed per-bucket item capacity. Must not change for the lifetime of a
/// collection: a bucket already at capacity is never split post-hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    capacity: u64,
}

impl BucketConfig {
    pub fn new(capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(BucketBaseError::InvalidConfig(
                "bucket capacity must be at least 1".to_string(),
            ));
        }
        Ok(BucketConfig { capacity })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        BucketConfig {
            capacity: DEFAULT_BUCKET_CAPACITY,
        }
    }
}
