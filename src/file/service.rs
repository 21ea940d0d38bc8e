//! File service: upload ingestion, retrieval, deletion and archiving.
//!
//! All mutations run under one async lock so that the quota check, the blob
//! write and the metadata update form a single step. Observers are notified
//! after the lock is released.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::auth::CredentialStore;
use crate::notify::ChangeNotifier;
use crate::{FileboxError, Result};

use super::archive::build_archive;
use super::{generate_file_id, sanitize_file_name, BlobStorage, FileRecord, MetadataStore};

/// Coordinates the metadata store, blob storage and notifier.
pub struct FileService {
    metadata: Arc<MetadataStore>,
    storage: BlobStorage,
    credentials: Arc<CredentialStore>,
    notifier: Arc<ChangeNotifier>,
    write_lock: Mutex<()>,
}

impl FileService {
    /// Create a new FileService.
    pub fn new(
        metadata: Arc<MetadataStore>,
        storage: BlobStorage,
        credentials: Arc<CredentialStore>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            metadata,
            storage,
            credentials,
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    /// Blob storage backing this service.
    pub fn storage(&self) -> &BlobStorage {
        &self.storage
    }

    /// All stored files in insertion order.
    pub fn list(&self) -> Vec<FileRecord> {
        self.metadata.list()
    }

    /// Sum of all stored file sizes.
    pub fn used_bytes(&self) -> u64 {
        self.metadata.total_bytes()
    }

    /// Get a file's metadata.
    pub fn get(&self, id: &str) -> Result<FileRecord> {
        self.metadata
            .get(id)
            .ok_or_else(|| FileboxError::NotFound("File".to_string()))
    }

    /// Store an upload for `owner`.
    ///
    /// The quota is the owner's ceiling on the total bytes held by the
    /// store. The upload is rejected if it would push the total past it.
    pub async fn upload(&self, owner: &str, file_name: &str, content: &[u8]) -> Result<FileRecord> {
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| FileboxError::BadRequest("invalid filename".to_string()))?;
        let quota = self
            .credentials
            .quota_for(owner)
            .ok_or_else(|| FileboxError::Unauthorized("unknown user".to_string()))?;
        let size = content.len() as u64;

        let record = {
            let _guard = self.write_lock.lock().await;

            let used = self.metadata.total_bytes();
            if used.saturating_add(size) > quota {
                return Err(FileboxError::QuotaExceeded {
                    requested: size,
                    available: quota.saturating_sub(used),
                });
            }

            let id = generate_file_id();
            if let Err(e) = self.storage.write(&id, &name, content) {
                self.discard_blob(&id);
                return Err(e);
            }

            let record = FileRecord {
                id,
                name,
                size,
                modified: Utc::now(),
                owner: owner.to_string(),
            };
            if let Err(e) = self.metadata.put(record.clone()) {
                self.discard_blob(&record.id);
                return Err(e);
            }
            record
        };

        tracing::info!(
            id = %record.id,
            name = %record.name,
            size = record.size,
            owner = %record.owner,
            "File uploaded"
        );
        self.notifier.broadcast();

        Ok(record)
    }

    /// Get a file's metadata and content.
    pub fn read(&self, id: &str) -> Result<(FileRecord, Vec<u8>)> {
        let record = self.get(id)?;
        let content = self.storage.read(&record.id, &record.name).map_err(|e| match e {
            FileboxError::NotFound(_) => FileboxError::NotFound("File".to_string()),
            other => other,
        })?;
        Ok((record, content))
    }

    /// Delete a file.
    ///
    /// The blob is moved aside first, then the record is removed. If the
    /// record cannot be removed the blob is put back. Metadata never points
    /// at a missing blob; a failed purge leaves only unreferenced garbage.
    pub async fn delete(&self, id: &str) -> Result<FileRecord> {
        let (record, staged) = {
            let _guard = self.write_lock.lock().await;

            if self.metadata.get(id).is_none() {
                return Err(FileboxError::NotFound("File".to_string()));
            }

            let staged = self.storage.stage_removal(id)?;

            let record = match self.metadata.remove(id) {
                Ok(Some(record)) => record,
                Ok(None) => return Err(FileboxError::NotFound("File".to_string())),
                Err(e) => {
                    if staged {
                        if let Err(restore_err) = self.storage.restore(id) {
                            tracing::error!(id, error = %restore_err, "Failed to restore staged blob");
                        }
                    }
                    return Err(e);
                }
            };
            (record, staged)
        };

        if staged {
            if let Err(e) = self.storage.purge(id) {
                tracing::warn!(id, error = %e, "Failed to purge deleted blob");
            }
        } else {
            tracing::warn!(id, "Deleted file had no blob");
        }

        tracing::info!(id, name = %record.name, "File deleted");
        self.notifier.broadcast();

        Ok(record)
    }

    /// Build a zip archive of all stored files.
    ///
    /// Archiving reads a snapshot of the listing and does not take the
    /// write lock; a file deleted meanwhile fails the archive.
    pub async fn archive(&self) -> Result<Vec<u8>> {
        let records = self.metadata.list();
        if records.is_empty() {
            return Err(FileboxError::NothingToArchive);
        }

        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || build_archive(&records, &storage))
            .await
            .map_err(|e| FileboxError::Internal(format!("archive task failed: {e}")))?
    }

    /// Bring storage in line with metadata at startup.
    ///
    /// Records whose blob is missing or not the recorded size are dropped,
    /// then blob directories without a record are removed along with
    /// anything left in the trash.
    pub async fn reconcile(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let dangling = self
            .metadata
            .retain(|r| self.storage.stored_len(&r.id, &r.name) == Some(r.size))?;
        for record in &dangling {
            tracing::warn!(
                id = %record.id,
                name = %record.name,
                size = record.size,
                "Dropping record with missing or truncated blob"
            );
        }

        let known: HashSet<String> = self.metadata.list().into_iter().map(|r| r.id).collect();
        let swept = self.storage.sweep(&known)?;

        if !dangling.is_empty() || swept > 0 {
            tracing::info!(
                dropped_records = dangling.len(),
                removed_blobs = swept,
                "Storage reconciled"
            );
        }
        Ok(())
    }

    fn discard_blob(&self, id: &str) {
        if let Err(e) = self.storage.remove(id) {
            tracing::warn!(id, error = %e, "Failed to clean up blob");
        }
    }
}
