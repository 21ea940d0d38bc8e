//! File metadata records and the metadata store.
//!
//! The store is the single source of truth for which files exist. It keeps
//! records in insertion order and rewrites `files.json` on every mutation
//! before the mutation is reported as done:
//!
//! ```text
//! { "<id>": { "name": "a.txt", "size": 10, "modified": "2024-01-01T00:00:00Z", "owner": "admin" } }
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::document;
use crate::Result;

/// Metadata for one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique file ID (the key in the persisted document).
    #[serde(skip)]
    pub id: String,
    /// Original filename (display name).
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// When the file was uploaded.
    pub modified: DateTime<Utc>,
    /// Username of the uploader.
    pub owner: String,
}

/// Public view of a file, as returned by listings and pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    /// File ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload time.
    pub modified: DateTime<Utc>,
}

impl From<&FileRecord> for FileSummary {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            size: record.size,
            modified: record.modified,
        }
    }
}

/// Persisted mapping from file ID to [`FileRecord`].
pub struct MetadataStore {
    path: PathBuf,
    records: RwLock<IndexMap<String, FileRecord>>,
}

impl MetadataStore {
    /// Open the store at `path`, creating an empty document if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = match document::read::<IndexMap<String, FileRecord>>(&path)? {
            Some(mut records) => {
                for (id, record) in records.iter_mut() {
                    record.id = id.clone();
                }
                tracing::info!(files = records.len(), path = %path.display(), "Loaded file metadata");
                records
            }
            None => {
                let records = IndexMap::new();
                document::write(&path, &records)?;
                records
            }
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<FileRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Snapshot of all records as public summaries.
    pub fn summaries(&self) -> Vec<FileSummary> {
        self.records.read().values().map(FileSummary::from).collect()
    }

    /// Get a record by ID.
    pub fn get(&self, id: &str) -> Option<FileRecord> {
        self.records.read().get(id).cloned()
    }

    /// Insert or overwrite a record and persist the store.
    ///
    /// If the document cannot be written the in-memory change is undone.
    pub fn put(&self, record: FileRecord) -> Result<()> {
        let mut records = self.records.write();
        let id = record.id.clone();
        let previous = records.insert(id.clone(), record);

        if let Err(e) = document::write(&self.path, &*records) {
            match previous {
                Some(previous) => {
                    records.insert(id, previous);
                }
                None => {
                    records.shift_remove(&id);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove a record and persist the store.
    ///
    /// Returns `Ok(None)` if no record has this ID. The caller owns the blob.
    pub fn remove(&self, id: &str) -> Result<Option<FileRecord>> {
        let mut records = self.records.write();
        let Some((index, key, record)) = records.shift_remove_full(id) else {
            return Ok(None);
        };

        if let Err(e) = document::write(&self.path, &*records) {
            records.shift_insert(index, key, record);
            return Err(e);
        }
        Ok(Some(record))
    }

    /// Drop every record for which `keep` returns false, persisting once.
    ///
    /// Returns the removed records.
    pub fn retain(&self, mut keep: impl FnMut(&FileRecord) -> bool) -> Result<Vec<FileRecord>> {
        let mut records = self.records.write();
        let before = records.clone();

        let removed: Vec<FileRecord> = records.values().filter(|r| !keep(r)).cloned().collect();
        if removed.is_empty() {
            return Ok(removed);
        }
        records.retain(|id, _| !removed.iter().any(|r| &r.id == id));

        if let Err(e) = document::write(&self.path, &*records) {
            *records = before;
            return Err(e);
        }
        Ok(removed)
    }

    /// Sum of all record sizes.
    pub fn total_bytes(&self) -> u64 {
        self.records.read().values().map(|r| r.size).sum()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store has no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
