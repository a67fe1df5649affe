// Collection engine - collection lifecycle and item CRUD against the backing file

use crate::config::IdStrategy;
use crate::document::{
    apply_patch, normalize_collection_name, query_matches, CollectionRecord, Database, Item,
    KeyValue, Query, ID_FIELD,
};
use crate::error::{PaperDbError, Result};
use crate::file_store::FileStore;
use crate::report::confirm;
use crate::schema::Schema;
use crate::validation;
use serde_json::Value;

/// Runs collection operations against a file store.
///
/// Every operation reads the whole document first and, when it mutates
/// anything, writes the whole document back before returning. Nothing is
/// cached between calls. Collection names are normalized on entry.
pub struct Engine<'a> {
    files: &'a FileStore,
    id_strategy: IdStrategy,
}

impl<'a> Engine<'a> {
    pub fn new(files: &'a FileStore, id_strategy: IdStrategy) -> Self {
        Engine { files, id_strategy }
    }

    /// Create an empty collection. Returns its normalized name.
    pub fn create_collection(&self, name: &str, schema: Option<Schema>) -> Result<String> {
        let mut db = self.files.read()?;
        let name = normalize_collection_name(name);

        if db.contains(&name) {
            return Err(PaperDbError::CollectionExists(name));
        }

        db.insert(name.clone(), CollectionRecord::new(schema));
        self.files.write(&db)?;

        confirm(&format!("Collection {name} created."));
        Ok(name)
    }

    /// Remove a collection and all of its items. Returns the removed record.
    pub fn delete_collection(&self, name: &str) -> Result<CollectionRecord> {
        let mut db = self.files.read()?;
        let name = normalize_collection_name(name);

        let record = db
            .remove(&name)
            .ok_or_else(|| PaperDbError::CollectionNotFound(name.clone()))?;
        self.files.write(&db)?;

        confirm(&format!("Collection {name} deleted."));
        Ok(record)
    }

    pub fn get_collection(&self, name: &str) -> Result<CollectionRecord> {
        let mut db = self.files.read()?;
        let name = normalize_collection_name(name);
        db.remove(&name)
            .ok_or(PaperDbError::CollectionNotFound(name))
    }

    /// Validate and append one item. Returns the stored item with its id.
    pub fn insert_item(&self, name: &str, record: Item) -> Result<Item> {
        let mut inserted = self.insert_many_items(name, vec![record])?;
        Ok(inserted.remove(0))
    }

    /// Validate every record, then append all of them in one write.
    /// A single invalid record rejects the whole batch.
    pub fn insert_many_items(&self, name: &str, records: Vec<Item>) -> Result<Vec<Item>> {
        let mut db = self.files.read()?;
        let name = normalize_collection_name(name);
        let collection = collection_mut(&mut db, &name)?;

        let mut errors = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let result = validation::type_check(collection.schema.as_ref(), record);
            errors.extend(
                result
                    .errors
                    .into_iter()
                    .map(|e| if records.len() > 1 { format!("item {index}: {e}") } else { e }),
            );
        }
        if !errors.is_empty() {
            return Err(PaperDbError::SchemaMismatch(errors));
        }

        let mut stored = Vec::with_capacity(records.len());
        for mut record in records {
            let id = self.fresh_id(collection);
            record.insert(ID_FIELD.to_string(), Value::String(id));
            collection.data.push(record.clone());
            stored.push(record);
        }
        self.files.write(&db)?;

        if stored.len() == 1 {
            confirm(&format!("Item inserted in {name}."));
        } else {
            confirm(&format!("{} items inserted in {name}.", stored.len()));
        }
        Ok(stored)
    }

    /// All items whose value for the query's first key equals the query's value.
    /// Without a query every item is returned.
    pub fn find_items(&self, name: &str, query: Option<&Query>) -> Result<Vec<Item>> {
        let db = self.files.read()?;
        let name = normalize_collection_name(name);
        let collection = collection_ref(&db, &name)?;

        let found: Vec<Item> = match query {
            Some(q) => collection
                .data
                .iter()
                .filter(|item| query_matches(q, item))
                .cloned()
                .collect(),
            None => collection.data.clone(),
        };

        confirm(&format!("{} item(s) found in {name}.", found.len()));
        Ok(found)
    }

    /// First item in storage order matching the query's first key, if any.
    pub fn find_one_item(&self, name: &str, query: &Query) -> Result<Option<Item>> {
        let db = self.files.read()?;
        let name = normalize_collection_name(name);
        let collection = collection_ref(&db, &name)?;

        let found = collection
            .data
            .iter()
            .find(|item| query_matches(query, item))
            .cloned();

        match found {
            Some(_) => confirm(&format!("Item found in {name}.")),
            None => confirm(&format!("0 item(s) found in {name}.")),
        }
        Ok(found)
    }

    pub fn find_item_by_id(&self, name: &str, id: &str) -> Result<Option<Item>> {
        let mut query = Query::new();
        query.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        self.find_one_item(name, &query)
    }

    /// Merge `patch` into the first item matching `filter`. Returns the merged item.
    pub fn update_item(&self, name: &str, filter: &KeyValue, patch: &Item) -> Result<Item> {
        let mut db = self.files.read()?;
        let name = normalize_collection_name(name);
        let collection = collection_mut(&mut db, &name)?;

        let item = collection
            .data
            .iter_mut()
            .find(|item| filter.matches(item))
            .ok_or_else(|| PaperDbError::ItemNotFound {
                collection: name.clone(),
            })?;
        apply_patch(item, patch);
        let updated = item.clone();
        self.files.write(&db)?;

        confirm(&format!("Item updated in {name}."));
        Ok(updated)
    }

    /// Remove the first item matching `filter`. Returns the removed item.
    pub fn delete_item(&self, name: &str, filter: &KeyValue) -> Result<Item> {
        let mut db = self.files.read()?;
        let name = normalize_collection_name(name);
        let collection = collection_mut(&mut db, &name)?;

        let index = collection
            .data
            .iter()
            .position(|item| filter.matches(item))
            .ok_or_else(|| PaperDbError::ItemNotFound {
                collection: name.clone(),
            })?;
        let removed = collection.data.remove(index);
        self.files.write(&db)?;

        confirm(&format!("Item deleted in {name}."));
        Ok(removed)
    }

    fn fresh_id(&self, collection: &CollectionRecord) -> String {
        loop {
            let id = self.id_strategy.generate();
            if !collection.has_id(&id) {
                return id;
            }
        }
    }
}

fn collection_ref<'d>(db: &'d Database, name: &str) -> Result<&'d CollectionRecord> {
    db.get(name)
        .ok_or_else(|| PaperDbError::CollectionNotFound(name.to_string()))
}

fn collection_mut<'d>(db: &'d mut Database, name: &str) -> Result<&'d mut CollectionRecord> {
    db.get_mut(name)
        .ok_or_else(|| PaperDbError::CollectionNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        let mut files = FileStore::new(tmp.path());
        files.open("test.json").unwrap();
        (tmp, files)
    }

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    fn user_schema() -> Schema {
        Schema::new()
            .field("name", FieldType::String)
            .field("age", FieldType::Number)
    }

    fn strip_id(mut item: Item) -> Value {
        item.remove(ID_FIELD);
        Value::Object(item)
    }

    #[test]
    fn test_create_collection_normalizes_name() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);

        assert_eq!(engine.create_collection("users", None).unwrap(), "Users");
        assert!(files.read().unwrap().contains("Users"));

        let err = engine.create_collection("Users", None).unwrap_err();
        assert!(matches!(err, PaperDbError::CollectionExists(ref n) if n == "Users"));
    }

    #[test]
    fn test_create_collection_persists_schema() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", Some(user_schema())).unwrap();

        let record = engine.get_collection("users").unwrap();
        assert_eq!(record.schema, Some(user_schema()));
        assert!(record.data.is_empty());
    }

    #[test]
    fn test_delete_collection() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();
        engine.insert_item("users", item(json!({ "name": "John" }))).unwrap();

        let removed = engine.delete_collection("users").unwrap();
        assert_eq!(removed.data.len(), 1);
        assert!(!files.read().unwrap().contains("Users"));

        let err = engine.delete_collection("users").unwrap_err();
        assert!(matches!(err, PaperDbError::CollectionNotFound(_)));
    }

    #[test]
    fn test_item_operations_require_collection() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        let filter = KeyValue::new("name", "John");

        assert!(matches!(
            engine.insert_item("ghosts", Item::new()),
            Err(PaperDbError::CollectionNotFound(_))
        ));
        assert!(matches!(
            engine.find_items("ghosts", None),
            Err(PaperDbError::CollectionNotFound(_))
        ));
        assert!(matches!(
            engine.find_one_item("ghosts", &Query::new()),
            Err(PaperDbError::CollectionNotFound(_))
        ));
        assert!(matches!(
            engine.update_item("ghosts", &filter, &Item::new()),
            Err(PaperDbError::CollectionNotFound(_))
        ));
        assert!(matches!(
            engine.delete_item("ghosts", &filter),
            Err(PaperDbError::CollectionNotFound(_))
        ));
        // Insert never creates the collection
        assert!(files.read().unwrap().is_empty());
    }

    #[test]
    fn test_insert_assigns_id() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Ulid);
        engine.create_collection("users", Some(user_schema())).unwrap();

        let stored = engine
            .insert_item("users", item(json!({ "name": "John", "age": 20 })))
            .unwrap();
        let id = stored[ID_FIELD].as_str().unwrap().to_string();
        assert!(!id.is_empty());

        let found = engine.find_item_by_id("users", &id).unwrap().unwrap();
        assert_eq!(found, stored);
    }

    #[test]
    fn test_insert_rejects_schema_mismatch() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", Some(user_schema())).unwrap();

        let err = engine
            .insert_item("users", item(json!({ "name": "John" })))
            .unwrap_err();
        assert!(matches!(err, PaperDbError::SchemaMismatch(_)));
        assert!(engine.find_items("users", None).unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Nanoid);
        engine.create_collection("events", None).unwrap();

        for n in 0..20 {
            engine.insert_item("events", item(json!({ "n": n }))).unwrap();
        }
        engine
            .insert_many_items("events", (0..20).map(|n| item(json!({ "n": n }))).collect())
            .unwrap();

        let all = engine.find_items("events", None).unwrap();
        let ids: HashSet<&str> = all.iter().map(|i| i[ID_FIELD].as_str().unwrap()).collect();
        assert_eq!(all.len(), 40);
        assert_eq!(ids.len(), 40);
    }

    #[test]
    fn test_insert_many_is_all_or_nothing() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", Some(user_schema())).unwrap();

        let batch = vec![
            item(json!({ "name": "John", "age": 20 })),
            item(json!({ "name": "Jane", "age": "twenty" })),
            item(json!({ "name": "Jim", "age": 30 })),
        ];
        let err = engine.insert_many_items("users", batch).unwrap_err();
        match err {
            PaperDbError::SchemaMismatch(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].starts_with("item 1:"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.find_items("users", None).unwrap().is_empty());
    }

    #[test]
    fn test_insert_many_preserves_order() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", Some(user_schema())).unwrap();

        let batch = vec![
            item(json!({ "name": "John", "age": 20 })),
            item(json!({ "name": "Jane", "age": 22 })),
        ];
        let stored = engine.insert_many_items("users", batch).unwrap();
        assert_eq!(stored.len(), 2);

        let names: Vec<Value> = engine
            .find_items("users", None)
            .unwrap()
            .into_iter()
            .map(|i| i["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("John"), json!("Jane")]);
    }

    #[test]
    fn test_find_honors_first_key_only() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();
        engine.insert_item("users", item(json!({ "name": "John", "age": 20 }))).unwrap();
        engine.insert_item("users", item(json!({ "name": "Jane", "age": 20 }))).unwrap();
        engine.insert_item("users", item(json!({ "name": "John", "age": 30 }))).unwrap();

        let query = item(json!({ "age": 20, "name": "John" }));
        let found: Vec<Value> = engine
            .find_items("users", Some(&query))
            .unwrap()
            .into_iter()
            .map(strip_id)
            .collect();
        assert_eq!(
            found,
            vec![
                json!({ "name": "John", "age": 20 }),
                json!({ "name": "Jane", "age": 20 }),
            ]
        );
    }

    #[test]
    fn test_find_one_returns_first_match_or_none() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();
        engine.insert_item("users", item(json!({ "name": "John", "age": 20 }))).unwrap();
        engine.insert_item("users", item(json!({ "name": "Jane", "age": 20 }))).unwrap();

        let first = engine
            .find_one_item("users", &item(json!({ "age": 20 })))
            .unwrap()
            .unwrap();
        assert_eq!(first["name"], json!("John"));

        let none = engine.find_one_item("users", &item(json!({ "age": 99 }))).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_float_query_matches_stored_integer() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();
        engine.insert_item("users", item(json!({ "name": "John", "age": 20 }))).unwrap();

        let query = item(json!({ "age": 20.0 }));
        assert_eq!(engine.find_items("users", Some(&query)).unwrap().len(), 1);
        assert!(engine.find_one_item("users", &query).unwrap().is_some());

        let updated = engine
            .update_item("users", &KeyValue::new("age", 20.0), &item(json!({ "age": 21 })))
            .unwrap();
        assert_eq!(updated["age"], json!(21));

        let removed = engine.delete_item("users", &KeyValue::new("age", 21.0)).unwrap();
        assert_eq!(removed["name"], json!("John"));
    }

    #[test]
    fn test_update_merges_fields() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", Some(user_schema())).unwrap();
        let stored = engine
            .insert_item("users", item(json!({ "name": "John", "age": 20 })))
            .unwrap();
        let id = stored[ID_FIELD].clone();

        let updated = engine
            .update_item("users", &KeyValue::new("age", 20), &item(json!({ "age": 21 })))
            .unwrap();
        assert_eq!(
            Value::Object(updated),
            json!({ "name": "John", "age": 21, "id": id })
        );

        let reread = engine.find_items("users", None).unwrap();
        assert_eq!(reread[0]["age"], json!(21));
        assert_eq!(reread[0][ID_FIELD], id);
    }

    #[test]
    fn test_update_touches_only_first_match() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();
        engine.insert_item("users", item(json!({ "name": "John", "age": 20 }))).unwrap();
        engine.insert_item("users", item(json!({ "name": "Jane", "age": 20 }))).unwrap();

        engine
            .update_item("users", &KeyValue::new("age", 20), &item(json!({ "age": 40 })))
            .unwrap();

        let ages: Vec<Value> = engine
            .find_items("users", None)
            .unwrap()
            .into_iter()
            .map(|i| i["age"].clone())
            .collect();
        assert_eq!(ages, vec![json!(40), json!(20)]);
    }

    #[test]
    fn test_update_missing_item() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();

        let err = engine
            .update_item("users", &KeyValue::new("name", "Nobody"), &Item::new())
            .unwrap_err();
        assert!(matches!(err, PaperDbError::ItemNotFound { ref collection } if collection == "Users"));
    }

    #[test]
    fn test_delete_then_find_is_empty() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();
        engine.insert_item("users", item(json!({ "name": "John" }))).unwrap();
        engine.insert_item("users", item(json!({ "name": "Jane" }))).unwrap();

        let removed = engine.delete_item("users", &KeyValue::new("name", "John")).unwrap();
        assert_eq!(removed["name"], json!("John"));

        let query = item(json!({ "name": "John" }));
        assert!(engine.find_items("users", Some(&query)).unwrap().is_empty());
        assert_eq!(engine.find_items("users", None).unwrap().len(), 1);

        let err = engine.delete_item("users", &KeyValue::new("name", "John")).unwrap_err();
        assert!(matches!(err, PaperDbError::ItemNotFound { .. }));
    }

    #[test]
    fn test_lookups_are_normalized() {
        let (_tmp, files) = setup();
        let engine = Engine::new(&files, IdStrategy::Uuid);
        engine.create_collection("users", None).unwrap();
        engine.insert_item("Users", item(json!({ "name": "John" }))).unwrap();

        assert_eq!(engine.find_items("users", None).unwrap().len(), 1);
        assert!(engine.get_collection("users").is_ok());
    }

    #[test]
    fn test_decode_failure_propagates() {
        let (_tmp, files) = setup();
        std::fs::write(files.path().unwrap(), "[1, 2").unwrap();
        let engine = Engine::new(&files, IdStrategy::Uuid);

        assert!(matches!(
            engine.find_items("users", None),
            Err(PaperDbError::Decode { .. })
        ));
    }
}
