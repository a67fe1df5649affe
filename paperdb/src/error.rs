use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperDbError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("File already exists: {}", path.display())]
    FileAlreadyExists { path: PathBuf },

    #[error("No file selected")]
    NoFileSelected,

    #[error("Collection {0} not found.")]
    CollectionNotFound(String),

    #[error("Collection {0} already exists.")]
    CollectionExists(String),

    #[error("Schema mismatch: {}", .0.join("; "))]
    SchemaMismatch(Vec<String>),

    #[error("Item not found in {collection}.")]
    ItemNotFound { collection: String },

    #[error("Cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PaperDbError>;
