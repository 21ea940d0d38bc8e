//! Zip archive building.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{FileboxError, Result};

use super::{BlobStorage, FileRecord};

/// Build a zip archive holding every blob in `records`, named by display name.
///
/// A record whose blob cannot be read fails the whole archive. Repeated
/// display names get a ` (n)` suffix before the extension.
pub fn build_archive(records: &[FileRecord], storage: &BlobStorage) -> Result<Vec<u8>> {
    if records.is_empty() {
        return Err(FileboxError::NothingToArchive);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = EntryNames::default();

    for record in records {
        let content = storage.read(&record.id, &record.name).map_err(|e| {
            FileboxError::ArchiveFailed(format!("cannot read {} ({}): {e}", record.name, record.id))
        })?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(content.len() as u64 >= u64::from(u32::MAX));

        zip.start_file(names.claim(&record.name), options)
            .map_err(archive_error)?;
        zip.write_all(&content)
            .map_err(|e| FileboxError::ArchiveFailed(e.to_string()))?;
    }

    let cursor = zip.finish().map_err(archive_error)?;
    tracing::debug!(entries = records.len(), "Built archive");
    Ok(cursor.into_inner())
}

fn archive_error(e: zip::result::ZipError) -> FileboxError {
    FileboxError::ArchiveFailed(e.to_string())
}

#[derive(Default)]
struct EntryNames {
    taken: HashSet<String>,
}

impl EntryNames {
    fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }

        let (stem, ext) = match name.rfind('.') {
            Some(i) if i > 0 => name.split_at(i),
            _ => (name, ""),
        };

        let mut n = 2;
        loop {
            let candidate = format!("{stem} ({n}){ext}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Read;
    use tempfile::TempDir;

    fn setup() -> (TempDir, BlobStorage) {
        let dir = TempDir::new().unwrap();
        let storage = BlobStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    fn stored(storage: &BlobStorage, id: &str, name: &str, content: &[u8]) -> FileRecord {
        storage.write(id, name, content).unwrap();
        FileRecord {
            id: id.to_string(),
            name: name.to_string(),
            size: content.len() as u64,
            modified: Utc::now(),
            owner: "admin".to_string(),
        }
    }

    fn entries(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_build_archive() {
        let (_dir, storage) = setup();
        let records = vec![
            stored(&storage, "a1", "a.txt", b"alpha"),
            stored(&storage, "b2", "b.bin", &[0u8, 1, 2, 255]),
        ];

        let bytes = build_archive(&records, &storage).unwrap();
        let entries = entries(bytes);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a.txt".to_string(), b"alpha".to_vec()));
        assert_eq!(entries[1], ("b.bin".to_string(), vec![0u8, 1, 2, 255]));
    }

    #[test]
    fn test_duplicate_names_are_suffixed() {
        let (_dir, storage) = setup();
        let records = vec![
            stored(&storage, "a1", "a.txt", b"one"),
            stored(&storage, "a2", "a.txt", b"two"),
            stored(&storage, "a3", "a.txt", b"three"),
            stored(&storage, "r1", "README", b"r1"),
            stored(&storage, "r2", "README", b"r2"),
        ];

        let names: Vec<String> = entries(build_archive(&records, &storage).unwrap())
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        assert_eq!(
            names,
            vec!["a.txt", "a (2).txt", "a (3).txt", "README", "README (2)"]
        );
    }

    #[test]
    fn test_empty_listing() {
        let (_dir, storage) = setup();
        let result = build_archive(&[], &storage);
        assert!(matches!(result, Err(FileboxError::NothingToArchive)));
    }

    #[test]
    fn test_missing_blob_fails() {
        let (_dir, storage) = setup();
        let mut records = vec![stored(&storage, "a1", "a.txt", b"alpha")];
        records.push(FileRecord {
            id: "gone".to_string(),
            name: "gone.txt".to_string(),
            size: 3,
            modified: Utc::now(),
            owner: "admin".to_string(),
        });

        let result = build_archive(&records, &storage);
        assert!(matches!(result, Err(FileboxError::ArchiveFailed(_))));
    }

    #[test]
    fn test_entry_names_dotfile() {
        let mut names = EntryNames::default();
        assert_eq!(names.claim(".env"), ".env");
        assert_eq!(names.claim(".env"), ".env (2)");
    }
}
