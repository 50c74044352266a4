// src/error.rs
// Error taxonomy for the bucketed collection engine

use crate::item::ItemId;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BucketBaseError>;

/// All failure classes surfaced by the engine and the store boundary.
///
/// `UniqueViolation` is internal currency between the store and the insert
/// coordinator: the coordinator retries it and callers normally only see it
/// repackaged as `WriteFailed` once the retry budget runs out.
#[derive(Debug, Error)]
pub enum BucketBaseError {
    /// Item rejected before any store call (missing or empty itemId)
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// Invalid engine configuration (e.g. zero bucket capacity)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The store's unique index over (colNum, itemId) rejected a write
    #[error("unique index rejected itemId {item_id} for colNum {col_num}")]
    UniqueViolation { col_num: i64, item_id: ItemId },

    /// Insert gave up after exhausting its conflict-retry budget
    #[error("insert of itemId {item_id} into colNum {col_num} failed after {attempts} attempts")]
    WriteFailed {
        col_num: i64,
        item_id: ItemId,
        attempts: u32,
    },

    /// Transport/connectivity failure from the backing store; never retried here
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Serde plumbing failure at the store boundary
    #[error("serialization error: {0}")]
    Serialization(String),
}
