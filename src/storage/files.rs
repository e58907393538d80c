// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! JSON file store primitives.
//!
//! Operations with plaintext payloads live only under the protected data
//! directory; whole-file writes go through a temp file and rename so a
//! crash never leaves a half-written record behind.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

/// Error type for file store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Thin wrapper over filesystem I/O rooted at the data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: super::StoragePaths,
}

impl FileStore {
    /// Create a store and ensure the directory layout exists.
    pub fn open(paths: super::StoragePaths) -> StorageResult<Self> {
        for dir in paths.all_dirs() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &super::StoragePaths {
        &self.paths
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// Read and deserialize a JSON file.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Serialize and write a JSON file atomically (temp file + rename).
    pub fn write_json<T: Serialize>(
        &self,
        path: impl AsRef<Path>,
        value: &T,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Delete a file; missing files are an error, callers check first.
    pub fn delete(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// List file stems with the given extension in a directory.
    pub fn list_stems(&self, dir: impl AsRef<Path>, ext: &str) -> StorageResult<Vec<String>> {
        let mut stems = Vec::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ext) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();
        Ok(stems)
    }

    /// Append a line to a file, creating it if needed.
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Read all lines of a file; missing file yields an empty list.
    pub fn read_lines(&self, path: impl AsRef<Path>) -> StorageResult<Vec<String>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(content.lines().map(|l| l.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        id: String,
        n: u32,
    }

    fn store() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(StoragePaths::new(temp.path())).unwrap();
        (temp, store)
    }

    #[test]
    fn open_creates_layout() {
        let (_temp, store) = store();
        for dir in store.paths().all_dirs() {
            assert!(dir.is_dir());
        }
    }

    #[test]
    fn json_round_trip_and_delete() {
        let (_temp, store) = store();
        let path = store.paths().operation("op-1");
        let record = Record {
            id: "op-1".into(),
            n: 7,
        };

        store.write_json(&path, &record).unwrap();
        let loaded: Record = store.read_json(&path).unwrap();
        assert_eq!(loaded, record);

        store.delete(&path).unwrap();
        assert!(matches!(
            store.read_json::<Record>(&path),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn list_stems_filters_extension() {
        let (_temp, store) = store();
        store
            .write_json(store.paths().operation("a"), &Record { id: "a".into(), n: 1 })
            .unwrap();
        store
            .write_json(store.paths().operation("b"), &Record { id: "b".into(), n: 2 })
            .unwrap();

        let stems = store
            .list_stems(store.paths().operations_dir(), "json")
            .unwrap();
        assert_eq!(stems, vec!["a", "b"]);
    }

    #[test]
    fn append_and_read_lines() {
        let (_temp, store) = store();
        let path = store.paths().audit_file("2026-08-29");
        store.append_line(&path, "one").unwrap();
        store.append_line(&path, "two").unwrap();
        assert_eq!(store.read_lines(&path).unwrap(), vec!["one", "two"]);
    }
}
