// src/item.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{BucketBaseError, Result};

/// Egy item: azonosító + nyitott attribútum-zsák
///
/// The identity is immutable once assigned; everything else is an open
/// attribute bag (`itemNum`, `itemName`, and any future fields). The wire
/// shape matches the backing store's documents: `{"itemId": ..., ...attrs}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(rename = "itemId")]
    pub item_id: ItemId,

    #[serde(flatten)]
    pub attrs: HashMap<String, Value>,
}

/// Item azonosító típusok
/// Untagged so ids appear as plain values on the wire: {"itemId": 7}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    String(String),
}

impl ItemId {
    /// Új object id generálás (UUID v4)
    pub fn new_object_id() -> Self {
        ItemId::String(Uuid::new_v4().to_string())
    }

    /// An empty string id carries no identity and is rejected by `Item::validate`
    pub fn is_empty(&self) -> bool {
        matches!(self, ItemId::String(s) if s.is_empty())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{}", n),
            ItemId::String(s) => f.write_str(s),
        }
    }
}

impl Item {
    /// Új item létrehozása
    pub fn new(item_id: ItemId, attrs: HashMap<String, Value>) -> Self {
        Item { item_id, attrs }
    }

    /// Bare item: identity only, no attributes yet
    pub fn with_id(item_id: ItemId) -> Self {
        Item {
            item_id,
            attrs: HashMap::new(),
        }
    }

    /// Parse an item from a JSON value. The `itemId` field is required;
    /// its absence is an `InvalidItem`, not a serde error.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| BucketBaseError::InvalidItem("item must be an object".to_string()))?;

        if !obj.contains_key("itemId") {
            return Err(BucketBaseError::InvalidItem("missing itemId".to_string()));
        }

        let item: Item = serde_json::from_value(value.clone())
            .map_err(|e| BucketBaseError::Serialization(e.to_string()))?;
        item.validate()?;
        Ok(item)
    }

    /// Reject items whose identity is empty, before any store round-trip
    pub fn validate(&self) -> Result<()> {
        if self.item_id.is_empty() {
            return Err(BucketBaseError::InvalidItem("empty itemId".to_string()));
        }
        Ok(())
    }

    /// Mező lekérése
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attrs.get(field)
    }

    /// Mező beállítása
    pub fn set(&mut self, field: String, value: Value) {
        self.attrs.insert(field, value);
    }

    /// The item's ordinal number, if the attribute has been written yet
    pub fn item_num(&self) -> Option<i64> {
        self.get("itemNum").and_then(Value::as_i64)
    }

    /// The item's display name, if the attribute has been written yet
    pub fn item_name(&self) -> Option<&str> {
        self.get("itemName").and_then(Value::as_str)
    }
}
