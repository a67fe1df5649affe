use crate::document::Database;
use crate::error::{PaperDbError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

const EMPTY_DOCUMENT: &str = "{}";

/// Whole-file JSON persistence for a single database file.
///
/// Files live under a storage directory. The store is bound to at most one
/// file at a time; every read loads the full document and every write
/// replaces the full document.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    file: Option<PathBuf>,
    pretty: bool,
}

impl FileStore {
    /// An unbound store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore {
            dir: dir.into(),
            file: None,
            pretty: false,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The currently bound file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Bind to `file_name`, creating the storage directory and an empty
    /// document as needed. Safe to call repeatedly.
    pub fn open(&mut self, file_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        if !path.exists() {
            std::fs::write(&path, EMPTY_DOCUMENT)?;
            log::debug!("Created {}", path.display());
        }
        self.bind(path.clone());
        Ok(path)
    }

    /// Rebind to an existing file. Never creates it.
    pub fn use_file(&mut self, file_name: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        if !path.exists() {
            return Err(PaperDbError::FileNotFound { path });
        }
        self.bind(path.clone());
        Ok(path)
    }

    /// Create a new empty database file and bind to it.
    pub fn create_file(&mut self, file_name: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        if path.exists() {
            return Err(PaperDbError::FileAlreadyExists { path });
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, EMPTY_DOCUMENT)?;
        self.bind(path.clone());
        Ok(path)
    }

    /// Read and decode the whole bound file.
    pub fn read(&self) -> Result<Database> {
        let path = self.file.as_ref().ok_or(PaperDbError::NoFileSelected)?;
        let content = std::fs::read(path)?;
        serde_json::from_slice(&content).map_err(|source| PaperDbError::Decode {
            path: path.clone(),
            source,
        })
    }

    /// Replace the bound file's contents with `db`.
    ///
    /// The document is written to a temporary file in the storage directory
    /// and renamed over the target, so readers never observe a half-written
    /// file. The rename is not followed by a directory sync.
    pub fn write(&self, db: &Database) -> Result<()> {
        let path = self.file.as_ref().ok_or(PaperDbError::NoFileSelected)?;
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(db)?
        } else {
            serde_json::to_vec(db)?
        };

        let parent = path.parent().unwrap_or(self.dir.as_path());
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&encoded)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| PaperDbError::Io(e.error))?;
        Ok(())
    }

    fn bind(&mut self, path: PathBuf) {
        log::debug!("Using database file {}", path.display());
        self.file = Some(path);
    }
}
