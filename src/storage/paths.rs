// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Data-directory layout.
//!
//! ```text
//! <data_dir>/
//!   operations/{operation_id}.json   # pending/terminal operations (plaintext payload,
//!                                    # purged after terminal state + retention)
//!   credentials/{credential_id}.json # WebAuthn credentials (public-key-only, safe to back up)
//!   audit/{date}.jsonl               # append-only daily audit logs
//! ```

use std::path::{Path, PathBuf};

/// Resolver for the on-disk layout under the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn operations_dir(&self) -> PathBuf {
        self.root.join("operations")
    }

    pub fn operation(&self, operation_id: &str) -> PathBuf {
        self.operations_dir().join(format!("{operation_id}.json"))
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.root.join("credentials")
    }

    pub fn credential(&self, credential_id: &str) -> PathBuf {
        self.credentials_dir().join(format!("{credential_id}.json"))
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Daily audit log file, `date` formatted as `YYYY-MM-DD`.
    pub fn audit_file(&self, date: &str) -> PathBuf {
        self.audit_dir().join(format!("{date}.jsonl"))
    }

    /// All directories that must exist before the engine starts.
    pub fn all_dirs(&self) -> [PathBuf; 3] {
        [
            self.operations_dir(),
            self.credentials_dir(),
            self.audit_dir(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_under_root() {
        let paths = StoragePaths::new("/data");
        assert_eq!(
            paths.operation("op-1"),
            PathBuf::from("/data/operations/op-1.json")
        );
        assert_eq!(
            paths.credential("cred-1"),
            PathBuf::from("/data/credentials/cred-1.json")
        );
        assert_eq!(
            paths.audit_file("2026-08-29"),
            PathBuf::from("/data/audit/2026-08-29.jsonl")
        );
    }
}
