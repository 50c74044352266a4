// bucketbase-core/src/lib.rs
// Pure Rust API - NO binding dependencies

pub mod bucket;
pub mod engine;
pub mod error;
pub mod item;
pub mod logging;
pub mod merge;
pub mod selector;
pub mod store;


// Public exports
pub use bucket::{Bucket, BucketConfig, BucketId, DEFAULT_BUCKET_CAPACITY};
pub use engine::{CollectionEngine, CollectionRef, InsertReport, MAX_INSERT_RETRIES};
pub use error::{BucketBaseError, Result};
pub use item::{Item, ItemId};
pub use logging::{get_log_level, init_from_env, set_log_level, LogLevel};
pub use merge::{merge_items, ItemWrite, MergeOutcome};
pub use selector::BucketPredicate;
pub use store::{BucketStore, MemoryBucketStore, UpsertOutcome, UpsertReport};
