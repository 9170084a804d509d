//! File-per-capture storage.
//!
//! # Layout
//! ```text
//! {tmp_root_dir}/{port}/
//!     request-<uuid>.json      one record per capture
//!     .request-<uuid>.json.tmp in-flight write, never listed
//! ```
//!
//! Records are written to a hidden temporary file and renamed into place, so
//! a reader sees either the whole record or nothing. Writers never touch the
//! same file, so `put` needs no locking.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::capture::model::Capture;

const RECORD_EXTENSION: &str = "json";

/// Errors raised by capture storage. None of them are retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt capture record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("capture {id} already exists")]
    AlreadyExists { id: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Captures of one server instance, keyed by capture id.
#[derive(Debug, Clone)]
pub struct CaptureStore {
    dir: PathBuf,
}

impl CaptureStore {
    /// Open a store over `dir` without touching the filesystem.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open a store, creating its directory if needed.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir)
            .await
            .map_err(|e| StoreError::io(&store.dir, e))?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!(".{id}.{RECORD_EXTENSION}.tmp"))
    }

    /// Persist one capture. Fails if a record with the same id exists.
    pub async fn put(&self, capture: &Capture) -> Result<(), StoreError> {
        let id = capture.id();
        let target = self.record_path(id);
        if fs::try_exists(&target)
            .await
            .map_err(|e| StoreError::io(&target, e))?
        {
            return Err(StoreError::AlreadyExists { id: id.to_string() });
        }

        let bytes = serde_json::to_vec(capture).map_err(|e| StoreError::Corrupt {
            path: target.clone(),
            source: e,
        })?;

        let temp = self.temp_path(id);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StoreError::AlreadyExists { id: id.to_string() },
                _ => StoreError::io(&temp, e),
            })?;
        file.write_all(&bytes)
            .await
            .map_err(|e| StoreError::io(&temp, e))?;
        file.flush().await.map_err(|e| StoreError::io(&temp, e))?;
        drop(file);

        fs::rename(&temp, &target)
            .await
            .map_err(|e| StoreError::io(&target, e))?;

        tracing::debug!(id = %id, path = %target.display(), "Capture stored");
        Ok(())
    }

    /// Ids of all records currently stored, in id order.
    pub async fn ids(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = name.strip_suffix(&format!(".{RECORD_EXTENSION}")) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load one capture. `None` if it does not exist (or was just deleted).
    pub async fn get(&self, id: &str) -> Result<Option<Capture>, StoreError> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt { path, source: e })
    }

    /// Load every stored capture, keyed (and therefore ordered) by id.
    ///
    /// Records deleted between listing and reading are skipped.
    pub async fn list_all(&self) -> Result<BTreeMap<String, Capture>, StoreError> {
        let mut captures = BTreeMap::new();
        for id in self.ids().await? {
            if let Some(capture) = self.get(&id).await? {
                captures.insert(id, capture);
            }
        }
        Ok(captures)
    }

    /// Remove one capture. Returns whether a record was removed; a missing
    /// record is not an error.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.record_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(id = %id, "Capture deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Remove every capture. Returns the number of records removed.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for id in self.ids().await? {
            if self.delete(&id).await? {
                removed += 1;
            }
        }
        tracing::debug!(dir = %self.dir.display(), removed, "Capture store cleared");
        Ok(removed)
    }
}
