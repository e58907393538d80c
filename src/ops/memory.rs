// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! In-memory operation store.
//!
//! The map is guarded by an `RwLock`, each operation by its own `Mutex`.
//! Transitions take only the per-operation lock, so a slow approval on one
//! operation never blocks status checks or sweeps on another.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{Error, Result};

use super::{ApprovedBy, OpState, OperationStore, PendingOperation};

type SharedOp = Arc<Mutex<PendingOperation>>;

pub struct InMemoryOperationStore {
    ops: RwLock<HashMap<String, SharedOp>>,
    ttl: TimeDelta,
    retention: TimeDelta,
}

impl InMemoryOperationStore {
    pub fn new(ttl: Duration, retention: Duration) -> Self {
        Self {
            ops: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::zero()),
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::zero()),
        }
    }

    fn entry(&self, operation_id: &str) -> Result<SharedOp> {
        let ops = self.ops.read().expect("operation map lock poisoned");
        ops.get(operation_id)
            .cloned()
            .ok_or(Error::NotFound("operation"))
    }
}

impl OperationStore for InMemoryOperationStore {
    fn insert(&self, op: PendingOperation) -> Result<()> {
        let mut ops = self.ops.write().expect("operation map lock poisoned");
        ops.insert(op.id.clone(), Arc::new(Mutex::new(op)));
        Ok(())
    }

    fn get(&self, operation_id: &str) -> Result<PendingOperation> {
        let entry = self.entry(operation_id)?;
        let op = entry.lock().expect("operation lock poisoned");
        Ok(op.clone())
    }

    fn get_state(&self, operation_id: &str) -> Result<OpState> {
        let entry = self.entry(operation_id)?;
        let op = entry.lock().expect("operation lock poisoned");
        Ok(op.state)
    }

    fn mark_approved(
        &self,
        operation_id: &str,
        credential_id: &str,
        device_label: &str,
    ) -> Result<()> {
        let entry = self.entry(operation_id)?;
        let mut op = entry.lock().expect("operation lock poisoned");
        if op.state != OpState::Pending {
            return Err(Error::InvalidTransition {
                from: op.state.name(),
                to: OpState::Approved.name(),
            });
        }
        op.state = OpState::Approved;
        op.approved_at = Some(Utc::now());
        op.approved_by = Some(ApprovedBy {
            credential_id: credential_id.to_string(),
            device_label: device_label.to_string(),
        });
        Ok(())
    }

    fn mark_denied(&self, operation_id: &str) -> Result<()> {
        let entry = self.entry(operation_id)?;
        let mut op = entry.lock().expect("operation lock poisoned");
        if op.state != OpState::Pending {
            return Err(Error::InvalidTransition {
                from: op.state.name(),
                to: OpState::Denied.name(),
            });
        }
        op.state = OpState::Denied;
        op.terminal_at = Some(Utc::now());
        Ok(())
    }

    fn complete(&self, operation_id: &str) -> Result<BTreeMap<String, String>> {
        let entry = self.entry(operation_id)?;
        let mut op = entry.lock().expect("operation lock poisoned");
        match op.state {
            OpState::Approved => {
                op.state = OpState::Completed;
                op.terminal_at = Some(Utc::now());
                Ok(op.payload.clone())
            }
            OpState::Completed => Err(Error::AlreadyCompleted),
            other => Err(Error::InvalidTransition {
                from: other.name(),
                to: OpState::Completed.name(),
            }),
        }
    }

    fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let entries: Vec<SharedOp> = {
            let ops = self.ops.read().expect("operation map lock poisoned");
            ops.values().cloned().collect()
        };

        let mut expired = Vec::new();
        for entry in entries {
            let mut op = entry.lock().expect("operation lock poisoned");
            if op.state == OpState::Pending && op.created_at + self.ttl <= now {
                op.state = OpState::Expired;
                op.terminal_at = Some(now);
                expired.push(op.id.clone());
            }
        }
        Ok(expired)
    }

    fn evict_terminal_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut ops = self.ops.write().expect("operation map lock poisoned");
        let mut evicted = Vec::new();
        ops.retain(|id, entry| {
            let op = entry.lock().expect("operation lock poisoned");
            let stale = op
                .terminal_at
                .map(|t| t + self.retention <= now)
                .unwrap_or(false);
            if stale {
                evicted.push(id.clone());
            }
            !stale
        });
        Ok(evicted)
    }

    fn list(&self) -> Result<Vec<PendingOperation>> {
        let ops = self.ops.read().expect("operation map lock poisoned");
        let mut all: Vec<PendingOperation> = ops
            .values()
            .map(|entry| entry.lock().expect("operation lock poisoned").clone())
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
