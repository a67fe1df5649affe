//! PaperDB keeps named, schema-typed collections in a single JSON file.
//!
//! Every operation reads the whole file, applies its change in memory, and
//! writes the whole file back. There is no cache, no locking, and no
//! multi-process coordination: the store assumes it is the only writer.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod file_store;
pub mod report;
pub mod schema;
pub mod store;
pub mod validation;

pub use config::{IdStrategy, StoreOptions};
pub use document::{CollectionRecord, Database, Item, KeyValue, Query};
pub use error::{PaperDbError, Result};
pub use schema::{FieldType, Schema};
pub use store::{Collection, Collections, Store};
