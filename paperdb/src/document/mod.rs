// Document model - the whole-file database, its collections, and item helpers

use crate::error::{PaperDbError, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A stored record. Field order is preserved as written.
pub type Item = serde_json::Map<String, Value>;

/// Equality filter for `find`/`find_one`. Only the first key is honored.
pub type Query = serde_json::Map<String, Value>;

/// Name of the system-assigned identity field.
pub const ID_FIELD: &str = "id";

/// Single `key == value` predicate used by update and delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        item.get(&self.key)
            .is_some_and(|found| strict_eq(found, &self.value))
    }
}

/// One named collection as persisted: optional schema plus its items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub data: Vec<Item>,
}

impl CollectionRecord {
    pub fn new(schema: Option<Schema>) -> Self {
        CollectionRecord {
            schema,
            data: Vec::new(),
        }
    }

    /// Whether any item already carries this id.
    pub fn has_id(&self, id: &str) -> bool {
        self.data
            .iter()
            .any(|item| item.get(ID_FIELD).and_then(Value::as_str) == Some(id))
    }
}

/// The full contents of a backing file: collection name to collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Database {
    collections: BTreeMap<String, CollectionRecord>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CollectionRecord> {
        self.collections.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CollectionRecord> {
        self.collections.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn insert(&mut self, name: String, record: CollectionRecord) {
        self.collections.insert(name, record);
    }

    pub fn remove(&mut self, name: &str) -> Option<CollectionRecord> {
        self.collections.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CollectionRecord)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Convert a JSON value into an item. Only objects are accepted.
pub fn item_from_value(value: Value) -> Result<Item> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PaperDbError::SchemaMismatch(vec![format!(
            "Item must be a JSON object, got {other}"
        )])),
    }
}

/// Canonical collection name: first character upper-cased, the rest untouched.
pub fn normalize_collection_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strict equality between stored and queried values.
/// Numbers compare by numeric value, so `20` equals `20.0`; all other kinds must match exactly.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Whether `item` matches the first key of `query`. An empty query matches everything.
pub fn query_matches(query: &Query, item: &Item) -> bool {
    match query.iter().next() {
        Some((key, value)) => item.get(key).is_some_and(|found| strict_eq(found, value)),
        None => true,
    }
}

/// Overwrite every field present in `patch`; fields absent from it are kept.
pub fn apply_patch(item: &mut Item, patch: &Item) {
    for (key, value) in patch {
        item.insert(key.clone(), value.clone());
    }
}
