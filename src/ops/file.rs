// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! File-backed operation store.
//!
//! Wraps the in-memory store and mirrors every record to
//! `operations/{id}.json` so pending approvals survive a restart.
//! Reloaded operations whose TTL elapsed while the server was down come
//! back as EXPIRED, never as approvable PENDING. Eviction deletes the
//! JSON file, which is the moment the plaintext payload leaves disk.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::storage::FileStore;

use super::{InMemoryOperationStore, OpState, OperationStore, PendingOperation};

pub struct FileOperationStore {
    inner: InMemoryOperationStore,
    store: FileStore,
}

impl FileOperationStore {
    /// Open the store and reload any operations persisted by a previous run.
    pub fn open(store: FileStore, ttl: Duration, retention: Duration) -> Result<Self> {
        let inner = InMemoryOperationStore::new(ttl, retention);
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::zero());
        let now = Utc::now();

        for id in store.list_stems(store.paths().operations_dir(), "json")? {
            let mut op: PendingOperation = store.read_json(store.paths().operation(&id))?;
            if op.state == OpState::Pending && op.created_at + ttl <= now {
                op.state = OpState::Expired;
                op.terminal_at = Some(now);
                store.write_json(store.paths().operation(&op.id), &op)?;
            }
            inner.insert(op)?;
        }

        Ok(Self { inner, store })
    }

    fn persist(&self, operation_id: &str) -> Result<()> {
        let op = self.inner.get(operation_id)?;
        self.store
            .write_json(self.store.paths().operation(operation_id), &op)?;
        Ok(())
    }

    fn remove_file(&self, operation_id: &str) -> Result<()> {
        let path = self.store.paths().operation(operation_id);
        if self.store.exists(&path) {
            self.store.delete(&path)?;
        }
        Ok(())
    }
}

impl OperationStore for FileOperationStore {
    fn insert(&self, op: PendingOperation) -> Result<()> {
        let id = op.id.clone();
        self.inner.insert(op)?;
        self.persist(&id)
    }

    fn get(&self, operation_id: &str) -> Result<PendingOperation> {
        self.inner.get(operation_id)
    }

    fn get_state(&self, operation_id: &str) -> Result<OpState> {
        self.inner.get_state(operation_id)
    }

    fn mark_approved(
        &self,
        operation_id: &str,
        credential_id: &str,
        device_label: &str,
    ) -> Result<()> {
        self.inner
            .mark_approved(operation_id, credential_id, device_label)?;
        self.persist(operation_id)
    }

    fn mark_denied(&self, operation_id: &str) -> Result<()> {
        self.inner.mark_denied(operation_id)?;
        self.persist(operation_id)
    }

    fn complete(&self, operation_id: &str) -> Result<BTreeMap<String, String>> {
        let payload = self.inner.complete(operation_id)?;
        self.persist(operation_id)?;
        Ok(payload)
    }

    fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let expired = self.inner.sweep_expired_at(now)?;
        for id in &expired {
            self.persist(id)?;
        }
        Ok(expired)
    }

    fn evict_terminal_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let evicted = self.inner.evict_terminal_at(now)?;
        for id in &evicted {
            self.remove_file(id)?;
        }
        Ok(evicted)
    }

    fn list(&self) -> Result<Vec<PendingOperation>> {
        self.inner.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpKind;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(300);
    const RETENTION: Duration = Duration::from_secs(3600);

    fn open(temp: &TempDir) -> FileOperationStore {
        let store = FileStore::open(StoragePaths::new(temp.path())).unwrap();
        FileOperationStore::open(store, TTL, RETENTION).unwrap()
    }

    fn pending(store: &FileOperationStore) -> String {
        let mut payload = BTreeMap::new();
        payload.insert("API_KEY".to_string(), "sk-value".to_string());
        let op = PendingOperation::new(OpKind::WriteSecrets, "svc".into(), payload);
        let id = op.id.clone();
        store.insert(op).unwrap();
        id
    }

    #[test]
    fn state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let id = {
            let store = open(&temp);
            let id = pending(&store);
            store.mark_approved(&id, "cred-1", "yubikey").unwrap();
            id
        };

        let reopened = open(&temp);
        assert_eq!(reopened.get_state(&id).unwrap(), OpState::Approved);
        let payload = reopened.complete(&id).unwrap();
        assert_eq!(payload.get("API_KEY").map(String::as_str), Some("sk-value"));
    }

    #[test]
    fn stale_pending_reloads_as_expired() {
        let temp = TempDir::new().unwrap();
        let id = {
            let store = open(&temp);
            pending(&store)
        };

        // Backdate the persisted record past the TTL to simulate downtime.
        let files = FileStore::open(StoragePaths::new(temp.path())).unwrap();
        let mut op: PendingOperation = files.read_json(files.paths().operation(&id)).unwrap();
        op.created_at = op.created_at - TimeDelta::seconds(301);
        files.write_json(files.paths().operation(&id), &op).unwrap();

        let reopened = open(&temp);
        assert_eq!(reopened.get_state(&id).unwrap(), OpState::Expired);
        assert!(reopened.mark_approved(&id, "c", "d").is_err());
    }

    #[test]
    fn eviction_deletes_the_payload_file() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        let id = pending(&store);
        store.mark_denied(&id).unwrap();

        let path = StoragePaths::new(temp.path()).operation(&id);
        assert!(path.exists());

        let later = Utc::now() + TimeDelta::seconds(3601);
        assert_eq!(store.evict_terminal_at(later).unwrap(), vec![id]);
        assert!(!path.exists());
    }

    #[test]
    fn sweep_persists_expiry() {
        let temp = TempDir::new().unwrap();
        let id = {
            let store = open(&temp);
            let id = pending(&store);
            let later = Utc::now() + TimeDelta::seconds(301);
            assert_eq!(store.sweep_expired_at(later).unwrap(), vec![id.clone()]);
            id
        };

        let reopened = open(&temp);
        assert_eq!(reopened.get_state(&id).unwrap(), OpState::Expired);
    }
}
