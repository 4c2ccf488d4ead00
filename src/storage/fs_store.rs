// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON record store on the local filesystem.
//!
//! Every record is one pretty-printed JSON file. Writes go to a temporary
//! sibling first and are renamed into place, so a reader never observes a
//! half-written record.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use super::StoragePaths;

/// Error type for record storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Filesystem-backed JSON record store.
#[derive(Debug, Clone)]
pub struct FileStorage {
    paths: StoragePaths,
    initialized: bool,
}

impl FileStorage {
    /// Create a new FileStorage instance.
    ///
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create all record directories. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for dir in self.paths.record_dirs() {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Write-read-delete check against the data root.
    pub fn health_check(&self) -> StorageResult<()> {
        self.ensure_initialized()?;

        let marker = self.paths.root().join(".health_check");
        let payload = b"health_check_data";

        fs::write(&marker, payload)?;
        let read_back = fs::read(&marker)?;
        fs::remove_file(&marker)?;

        if read_back != payload {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    // ========== JSON Records ==========

    /// Read a JSON file and deserialize it.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        self.ensure_initialized()?;
        let file = File::open(path.as_ref())?;
        let value = serde_json::from_reader(BufReader::new(file))?;
        Ok(value)
    }

    /// Write a JSON file (atomic write via rename).
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Unique temp name: concurrent writers of the same record must not
        // share a scratch file.
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    pub fn delete(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.ensure_initialized()?;
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// List the stems of all files in `dir` with the given extension, sorted.
    pub fn list_files(&self, dir: impl AsRef<Path>, extension: &str) -> StorageResult<Vec<String>> {
        self.ensure_initialized()?;

        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    // ========== Append-only Logs ==========

    /// Append one line to a text file, creating it if needed.
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> StorageResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> StorageResult<String> {
        self.ensure_initialized()?;
        Ok(fs::read_to_string(path.as_ref())?)
    }

    fn ensure_initialized(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use std::env;

    /// Fresh, initialised storage under a unique temp directory.
    pub(crate) fn temp_storage() -> FileStorage {
        let root = env::temp_dir().join(format!("cc_storage_test_{}", uuid::Uuid::new_v4()));
        let mut storage = FileStorage::new(StoragePaths::new(&root));
        storage.initialize().unwrap();
        storage
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        id: String,
        value: i32,
    }

    #[test]
    fn initialize_creates_record_dirs() {
        let storage = temp_storage();
        for dir in storage.paths().record_dirs() {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
        fs::remove_dir_all(storage.paths().root()).ok();
    }

    #[test]
    fn uninitialized_storage_rejects_io() {
        let storage = FileStorage::new(StoragePaths::new(env::temp_dir().join("never-created")));
        assert!(matches!(
            storage.read_json::<Record>("x.json"),
            Err(StorageError::NotInitialized)
        ));
    }

    #[test]
    fn json_write_then_read() {
        let storage = temp_storage();
        let path = storage.paths().chain("0001");
        let record = Record {
            id: "0001".into(),
            value: 42,
        };

        storage.write_json(&path, &record).unwrap();
        assert!(storage.exists(&path));
        let loaded: Record = storage.read_json(&path).unwrap();
        assert_eq!(loaded, record);

        storage.delete(&path).unwrap();
        assert!(!storage.exists(&path));
        fs::remove_dir_all(storage.paths().root()).ok();
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let storage = temp_storage();
        let err = storage
            .read_json::<Record>(storage.paths().chain("nope"))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        fs::remove_dir_all(storage.paths().root()).ok();
    }

    #[test]
    fn list_files_is_sorted_and_filters_extension() {
        let storage = temp_storage();
        let dir = storage.paths().chains_dir();
        for id in ["0021", "0001", "0005"] {
            storage
                .write_json(storage.paths().chain(id), &Record { id: id.into(), value: 0 })
                .unwrap();
        }
        fs::write(dir.join("stray.txt"), b"x").unwrap();

        let ids = storage.list_files(&dir, "json").unwrap();
        assert_eq!(ids, vec!["0001", "0005", "0021"]);
        fs::remove_dir_all(storage.paths().root()).ok();
    }

    #[test]
    fn append_line_accumulates() {
        let storage = temp_storage();
        let path = storage.paths().audit_events_file("2026-01-01");
        storage.append_line(&path, "one").unwrap();
        storage.append_line(&path, "two").unwrap();
        assert_eq!(storage.read_to_string(&path).unwrap(), "one\ntwo\n");
        fs::remove_dir_all(storage.paths().root()).ok();
    }

    #[test]
    fn health_check_passes_when_initialized() {
        let storage = temp_storage();
        storage.health_check().unwrap();
        fs::remove_dir_all(storage.paths().root()).ok();
    }
}
