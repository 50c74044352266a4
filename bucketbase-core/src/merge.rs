// src/merge.rs
//! Item merge engine.
//!
//! Pure functions computing the next state of a bucket's item list given an
//! incoming item. Against a server-backed document store this logic would
//! travel as a declarative update expression evaluated server-side; here it
//! is the transform a `BucketStore` executes inside its atomic primitive.
//! Nothing in this module touches the store, takes locks, or observes the
//! clock.

use crate::bucket::{Bucket, BucketId};
use crate::item::Item;

/// Write payload handed to the store's conditional upsert: the collection
/// descriptors plus the incoming item. The descriptors only land in a bucket
/// that does not carry them yet.
#[derive(Debug, Clone)]
pub struct ItemWrite {
    pub col_id: String,
    pub col_num: i64,
    pub col_name: String,
    pub item: Item,
}

/// Next state for a bucket's item list and count
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub items: Vec<Item>,
    pub num_items: u64,
    /// true when the incoming item replaced an existing entry (update case)
    pub merged_existing: bool,
}

/// Compute the merged item list and count.
///
/// If `items` already holds the incoming `itemId`, that element is replaced
/// by the field-wise merge of the two (incoming wins per field, fields only
/// present in the existing entry are retained, identity untouched) and the
/// count does not move. Otherwise the incoming item is appended at the end
/// and the count bumps by one.
///
/// Total over all inputs: a fresh bucket's absent state is the empty list
/// with count 0.
pub fn merge_items(items: &[Item], num_items: u64, incoming: &Item) -> MergeOutcome {
    match items.iter().position(|it| it.item_id == incoming.item_id) {
        Some(pos) => {
            let mut next = items.to_vec();
            next[pos] = merged_attrs(&items[pos], incoming);
            MergeOutcome {
                items: next,
                num_items,
                merged_existing: true,
            }
        }
        None => {
            let mut next = items.to_vec();
            next.push(incoming.clone());
            MergeOutcome {
                items: next,
                num_items: num_items + 1,
                merged_existing: false,
            }
        }
    }
}

/// Shallow attribute union: every field present in `incoming` overwrites the
/// same field in `existing`, every field present only in `existing` stays.
pub fn merged_attrs(existing: &Item, incoming: &Item) -> Item {
    let mut attrs = existing.attrs.clone();
    for (key, value) in &incoming.attrs {
        attrs.insert(key.clone(), value.clone());
    }
    Item {
        item_id: existing.item_id.clone(),
        attrs,
    }
}

/// Apply a write to an existing bucket record. Returns true for the update
/// case, false for an append. Must only run inside the store's atomic
/// primitive, while no other writer can touch this record.
pub fn apply_write(bucket: &mut Bucket, write: &ItemWrite) -> bool {
    let outcome = merge_items(&bucket.items, bucket.num_items, &write.item);
    bucket.items = outcome.items;
    bucket.num_items = outcome.num_items;

    // colId/colName: first writer wins, never overwritten
    if bucket.col_id.is_none() {
        bucket.col_id = Some(write.col_id.clone());
    }
    if bucket.col_name.is_none() {
        bucket.col_name = Some(write.col_name.clone());
    }

    outcome.merged_existing
}

/// Seed a fresh bucket from a write that matched no existing record
pub fn create_bucket(write: &ItemWrite) -> Bucket {
    Bucket {
        id: BucketId::new(),
        col_num: write.col_num,
        col_id: Some(write.col_id.clone()),
        col_name: Some(write.col_name.clone()),
        num_items: 1,
        items: vec![write.item.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;
    use serde_json::json;
    use std::collections::HashMap;

    fn item(id: i64, fields: &[(&str, serde_json::Value)]) -> Item {
        let mut attrs = HashMap::new();
        for (k, v) in fields {
            attrs.insert(k.to_string(), v.clone());
        }
        Item::new(ItemId::Int(id), attrs)
    }

    fn write(it: Item) -> ItemWrite {
        ItemWrite {
            col_id: "col-123".to_string(),
            col_num: 1,
            col_name: "collection one".to_string(),
            item: it,
        }
    }

    #[test]
    fn test_append_into_empty_state() {
        let incoming = item(1, &[("itemNum", json!(1))]);
        let outcome = merge_items(&[], 0, &incoming);

        assert_eq!(outcome.num_items, 1);
        assert_eq!(outcome.items, vec![incoming]);
        assert!(!outcome.merged_existing);
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let existing = vec![item(1, &[]), item(2, &[])];
        let incoming = item(3, &[]);
        let outcome = merge_items(&existing, 2, &incoming);

        assert_eq!(outcome.num_items, 3);
        assert_eq!(outcome.items.last().unwrap().item_id, ItemId::Int(3));
        assert_eq!(outcome.items[0].item_id, ItemId::Int(1));
    }

    #[test]
    fn test_merge_replaces_in_place_without_count_change() {
        let existing = vec![
            item(1, &[("itemNum", json!(1)), ("flag", json!(true))]),
            item(2, &[]),
        ];
        let incoming = item(1, &[("itemNum", json!(10)), ("itemName", json!("one"))]);
        let outcome = merge_items(&existing, 2, &incoming);

        assert_eq!(outcome.num_items, 2);
        assert!(outcome.merged_existing);
        let merged = &outcome.items[0];
        assert_eq!(merged.get("itemNum"), Some(&json!(10))); // incoming wins
        assert_eq!(merged.get("flag"), Some(&json!(true))); // existing-only retained
        assert_eq!(merged.get("itemName"), Some(&json!("one")));
    }

    #[test]
    fn test_count_follows_stored_value_not_length() {
        // the engine trusts the denormalized count it was handed
        let existing = vec![item(1, &[])];
        let outcome = merge_items(&existing, 7, &item(2, &[]));
        assert_eq!(outcome.num_items, 8);
    }

    #[test]
    fn test_apply_write_first_writer_wins_descriptors() {
        let mut bucket = create_bucket(&write(item(1, &[])));
        assert_eq!(bucket.col_name.as_deref(), Some("collection one"));

        let mut other = write(item(2, &[]));
        other.col_name = "renamed".to_string();
        other.col_id = "col-999".to_string();
        let merged = apply_write(&mut bucket, &other);

        assert!(!merged);
        assert_eq!(bucket.num_items, 2);
        assert_eq!(bucket.col_name.as_deref(), Some("collection one"));
        assert_eq!(bucket.col_id.as_deref(), Some("col-123"));
    }

    #[test]
    fn test_apply_write_fills_absent_descriptors() {
        let mut bucket = create_bucket(&write(item(1, &[])));
        bucket.col_id = None;
        bucket.col_name = None;

        apply_write(&mut bucket, &write(item(2, &[])));
        assert_eq!(bucket.col_id.as_deref(), Some("col-123"));
        assert_eq!(bucket.col_name.as_deref(), Some("collection one"));
    }

    #[test]
    fn test_create_bucket_seed() {
        let bucket = create_bucket(&write(item(5, &[("itemNum", json!(5))])));

        assert_eq!(bucket.col_num, 1);
        assert_eq!(bucket.num_items, 1);
        assert_eq!(bucket.items.len(), 1);
        assert!(bucket.is_consistent());
        assert!(bucket.contains_item(&ItemId::Int(5)));
    }
}
