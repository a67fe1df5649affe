use crate::config::StoreOptions;
use crate::document::{
    item_from_value, normalize_collection_name, CollectionRecord, Database, Item, KeyValue, Query,
};
use crate::engine::Engine;
use crate::error::{PaperDbError, Result};
use crate::file_store::FileStore;
use crate::report::reported;
use crate::schema::Schema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A collection known to the store, as recorded in the backing file.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionBinding {
    name: String,
    schema: Option<Schema>,
}

/// The main entry point for PaperDB.
/// Binds a database file, keeps a registry of its collections,
/// and hands out collection handles for CRUD operations.
pub struct Store {
    files: FileStore,
    options: StoreOptions,
    registry: BTreeMap<String, CollectionBinding>,
}

impl Store {
    /// Open (or create) `file_name` inside the default storage directory.
    pub fn open(file_name: &str) -> Result<Self> {
        Self::open_with(StoreOptions::default(), file_name)
    }

    /// Open (or create) `file_name` inside `options.dir`.
    /// Collections already present in the file are registered from their persisted schema.
    pub fn open_with(options: StoreOptions, file_name: &str) -> Result<Self> {
        reported(Self::boot(options, file_name))
    }

    fn boot(options: StoreOptions, file_name: &str) -> Result<Self> {
        let mut files = FileStore::new(&options.dir).with_pretty(options.pretty);
        files.open(file_name)?;

        let mut store = Store {
            files,
            options,
            registry: BTreeMap::new(),
        };
        store.rebuild_registry()?;
        Ok(store)
    }

    /// Rebuild the registry from whatever the bound file currently holds.
    fn rebuild_registry(&mut self) -> Result<()> {
        self.registry.clear();
        let db = self.files.read()?;
        for (name, record) in db.iter() {
            if normalize_collection_name(name) != name {
                log::warn!("Skipping collection {name}: name is not normalized and cannot be looked up");
                continue;
            }
            self.register(name, record.schema.clone());
        }
        log::debug!("Registered {} collection(s)", self.registry.len());
        Ok(())
    }

    fn register(&mut self, name: &str, schema: Option<Schema>) {
        self.registry.insert(
            name.to_string(),
            CollectionBinding {
                name: name.to_string(),
                schema,
            },
        );
    }

    fn engine(&self) -> Engine<'_> {
        Engine::new(&self.files, self.options.id_strategy)
    }

    /// Switch to another existing file in the storage directory.
    pub fn use_file(&mut self, file_name: &str) -> Result<PathBuf> {
        reported(self.files.use_file(file_name).and_then(|path| {
            self.rebuild_registry()?;
            Ok(path)
        }))
    }

    /// Create a new empty file in the storage directory and switch to it.
    pub fn create_file(&mut self, file_name: &str) -> Result<PathBuf> {
        reported(self.files.create_file(file_name).and_then(|path| {
            self.rebuild_registry()?;
            Ok(path)
        }))
    }

    /// The currently bound database file
    pub fn path(&self) -> Option<&Path> {
        self.files.path()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Collection management: add, find, delete.
    pub fn collections(&mut self) -> Collections<'_> {
        Collections { store: self }
    }

    /// Get a handle to a registered collection
    pub fn collection(&self, name: &str) -> Result<Collection<'_>> {
        let name = normalize_collection_name(name);
        let binding = self
            .registry
            .get(&name)
            .ok_or(PaperDbError::CollectionNotFound(name));
        reported(binding.map(|binding| Collection {
            store: self,
            binding,
        }))
    }

    /// Read the whole database. The contents are also logged at debug level.
    pub fn get(&self) -> Result<Database> {
        reported(self.files.read().and_then(|db| {
            log::debug!("{}", serde_json::to_string_pretty(&db)?);
            Ok(db)
        }))
    }
}

/// Handle for creating, inspecting, and dropping collections.
pub struct Collections<'a> {
    store: &'a mut Store,
}

impl<'a> Collections<'a> {
    /// Create a collection and register it. Returns the normalized name.
    pub fn add(&mut self, name: &str, schema: Option<Schema>) -> Result<String> {
        let created = self
            .store
            .engine()
            .create_collection(name, schema.clone());
        if let Ok(name) = &created {
            self.store.register(name, schema);
        }
        reported(created)
    }

    /// Read a collection record straight from the file.
    pub fn find(&self, name: &str) -> Result<CollectionRecord> {
        reported(self.store.engine().get_collection(name))
    }

    /// Drop a collection and deregister it. Returns the removed record.
    pub fn delete(&mut self, name: &str) -> Result<CollectionRecord> {
        let removed = self.store.engine().delete_collection(name);
        if removed.is_ok() {
            self.store.registry.remove(&normalize_collection_name(name));
        }
        reported(removed)
    }

    /// Names of all registered collections.
    pub fn names(&self) -> Vec<String> {
        self.store.registry.keys().cloned().collect()
    }
}

/// A handle to a collection within a store.
/// Every call dispatches to the engine by collection name.
pub struct Collection<'a> {
    store: &'a Store,
    binding: &'a CollectionBinding,
}

impl<'a> Collection<'a> {
    pub fn name(&self) -> &str {
        &self.binding.name
    }

    /// Schema the collection was registered with
    pub fn schema(&self) -> Option<&Schema> {
        self.binding.schema.as_ref()
    }

    /// Insert an item. Returns the stored item including its generated `id`.
    pub fn insert(&self, item: Item) -> Result<Item> {
        reported(self.store.engine().insert_item(self.name(), item))
    }

    /// Insert several items at once; nothing is written if any of them is invalid.
    pub fn insert_many(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        reported(self.store.engine().insert_many_items(self.name(), items))
    }

    /// Insert any serializable value that encodes as a JSON object.
    pub fn insert_typed<T: Serialize>(&self, record: &T) -> Result<Item> {
        let item = serde_json::to_value(record)
            .map_err(PaperDbError::from)
            .and_then(item_from_value);
        match item {
            Ok(item) => self.insert(item),
            Err(e) => reported(Err(e)),
        }
    }

    /// Items matching the first key of `query`, or every item without one.
    pub fn find(&self, query: Option<&Query>) -> Result<Vec<Item>> {
        reported(self.store.engine().find_items(self.name(), query))
    }

    /// Like `find`, deserializing each item into `T`.
    pub fn find_typed<T: DeserializeOwned>(&self, query: Option<&Query>) -> Result<Vec<T>> {
        let items = self.find(query)?;
        let decoded = items
            .into_iter()
            .map(|item| serde_json::from_value(serde_json::Value::Object(item)))
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(PaperDbError::from);
        reported(decoded)
    }

    pub fn find_one(&self, query: &Query) -> Result<Option<Item>> {
        reported(self.store.engine().find_one_item(self.name(), query))
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Item>> {
        reported(self.store.engine().find_item_by_id(self.name(), id))
    }

    /// Merge `patch` into the first item where `filter.key == filter.value`.
    pub fn update(&self, filter: &KeyValue, patch: &Item) -> Result<Item> {
        reported(self.store.engine().update_item(self.name(), filter, patch))
    }

    /// Remove the first item where `filter.key == filter.value`.
    pub fn delete(&self, filter: &KeyValue) -> Result<Item> {
        reported(self.store.engine().delete_item(self.name(), filter))
    }
}
