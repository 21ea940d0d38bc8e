//! Blob storage for filebox.
//!
//! Each file lives in its own directory named after its ID, under its
//! display name:
//! ```text
//! {base_path}/
//! ├── 3f2a...e1/
//! │   └── report.pdf
//! ├── 9b07...4c/
//! │   └── photo.jpg
//! └── .trash/
//!     └── {id}/        (staged for removal)
//! ```
//!
//! Removal is two-phase: [`BlobStorage::stage_removal`] moves the ID
//! directory into `.trash`, after which it can be put back with
//! [`BlobStorage::restore`] or dropped with [`BlobStorage::purge`].

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::document;
use crate::{FileboxError, Result};

use super::is_valid_file_id;

const TRASH_DIR: &str = ".trash";

/// Filesystem blob storage keyed by file ID.
#[derive(Debug, Clone)]
pub struct BlobStorage {
    base_path: PathBuf,
}

impl BlobStorage {
    /// Create a new BlobStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Full path of the blob for `id` stored under `name`.
    pub fn path_for(&self, id: &str, name: &str) -> PathBuf {
        self.base_path.join(id).join(name)
    }

    /// Write a blob, creating its ID directory.
    ///
    /// Returns once the content and its directory entries are on disk.
    pub fn write(&self, id: &str, name: &str, content: &[u8]) -> Result<()> {
        let dir = self.id_dir(id)?;
        fs::create_dir_all(&dir)?;

        let mut file = fs::File::create(dir.join(name))?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);

        document::sync_dir(&dir)?;
        document::sync_dir(&self.base_path)?;
        Ok(())
    }

    /// Read a blob's bytes.
    pub fn read(&self, id: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.id_dir(id)?.join(name);

        match fs::read(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FileboxError::NotFound(format!("Blob {id}/{name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a blob exists.
    pub fn exists(&self, id: &str, name: &str) -> bool {
        is_valid_file_id(id) && self.path_for(id, name).is_file()
    }

    /// Size on disk of a blob, or `None` if it is missing.
    pub fn stored_len(&self, id: &str, name: &str) -> Option<u64> {
        if !is_valid_file_id(id) {
            return None;
        }
        fs::metadata(self.path_for(id, name))
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    /// Remove the ID directory outright.
    ///
    /// Returns `false` if it didn't exist.
    pub fn remove(&self, id: &str) -> Result<bool> {
        match fs::remove_dir_all(self.id_dir(id)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Move the ID directory into the trash.
    ///
    /// Returns `false` if there was nothing to move.
    pub fn stage_removal(&self, id: &str) -> Result<bool> {
        let source = self.id_dir(id)?;
        if !source.exists() {
            return Ok(false);
        }

        let trash = self.base_path.join(TRASH_DIR);
        fs::create_dir_all(&trash)?;

        let target = trash.join(id);
        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        fs::rename(&source, &target)?;
        Ok(true)
    }

    /// Put a staged ID directory back in place.
    pub fn restore(&self, id: &str) -> Result<()> {
        let target = self.id_dir(id)?;
        let staged = self.base_path.join(TRASH_DIR).join(id);
        fs::rename(staged, target)?;
        Ok(())
    }

    /// Permanently delete a staged ID directory.
    pub fn purge(&self, id: &str) -> Result<()> {
        let staged = self.base_path.join(TRASH_DIR).join(self.checked_id(id)?);
        match fs::remove_dir_all(staged) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every ID directory not in `known`, and the whole trash.
    ///
    /// Returns the number of directories removed.
    pub fn sweep(&self, known: &HashSet<String>) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if !entry.file_type()?.is_dir() {
                continue;
            }

            if name == TRASH_DIR {
                fs::remove_dir_all(entry.path())?;
                removed += 1;
            } else if is_valid_file_id(&name) && !known.contains(name.as_ref()) {
                tracing::warn!(id = %name, "Removing orphaned blob directory");
                fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn checked_id<'a>(&self, id: &'a str) -> Result<&'a str> {
        if is_valid_file_id(id) {
            Ok(id)
        } else {
            Err(FileboxError::NotFound(format!("File {id}")))
        }
    }

    fn id_dir(&self, id: &str) -> Result<PathBuf> {
        Ok(self.base_path.join(self.checked_id(id)?))
    }
}
