// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Privileged-operation registry and state machine.
//!
//! The operation store is the single source of truth for operation state.
//! Transitions are monotonic and one-shot:
//!
//! ```text
//! PENDING ──▶ APPROVED ──▶ COMPLETED
//!    │
//!    ├──▶ DENIED
//!    └──▶ EXPIRED
//! ```
//!
//! `complete` releases the payload exactly once; everything an attacker
//! could learn after that point (the operation id, a stale approval) is
//! worthless. Re-approving an already approved operation is an error, not
//! a no-op, so a stale record can never be silently renewed.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Result;

pub use file::FileOperationStore;
pub use memory::InMemoryOperationStore;

/// What a privileged operation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Write a key→value mapping into the backing secret store
    WriteSecrets,
    /// Read and tokenize secrets detected in a local file
    ScanFile,
    /// Any other action requiring human approval
    OtherPrivileged,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::WriteSecrets => "write_secrets",
            OpKind::ScanFile => "scan_file",
            OpKind::OtherPrivileged => "other_privileged",
        }
    }
}

/// Operation lifecycle state. Forward transitions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OpState {
    Pending,
    Approved,
    Denied,
    Expired,
    Completed,
}

impl OpState {
    pub fn name(self) -> &'static str {
        match self {
            OpState::Pending => "pending",
            OpState::Approved => "approved",
            OpState::Denied => "denied",
            OpState::Expired => "expired",
            OpState::Completed => "completed",
        }
    }

    /// Terminal states cannot transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, OpState::Denied | OpState::Expired | OpState::Completed)
    }
}

/// Who approved an operation, recorded for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ApprovedBy {
    pub credential_id: String,
    pub device_label: String,
}

/// A privileged operation awaiting (or past) human approval.
///
/// The payload holds real secret values. It exists only inside the store
/// (memory or the protected data directory) and leaves exactly once,
/// through `complete`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingOperation {
    /// Unguessable identifier (uuid v4, 128 bits).
    pub id: String,
    pub kind: OpKind,
    /// Resource the operation acts on (service namespace).
    pub target: String,
    /// The operation's arguments; for `WriteSecrets`, key → real value.
    pub payload: BTreeMap<String, String>,
    /// Dangerous-pattern warnings shown on the approval page.
    pub warnings: Vec<String>,
    pub state: OpState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<ApprovedBy>,
    /// When the operation entered a terminal state (drives eviction).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_at: Option<DateTime<Utc>>,
}

impl PendingOperation {
    pub fn new(kind: OpKind, target: String, payload: BTreeMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            target,
            payload,
            warnings: Vec::new(),
            state: OpState::Pending,
            created_at: Utc::now(),
            approved_at: None,
            approved_by: None,
            terminal_at: None,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Injected store abstraction over operation lifecycle.
///
/// Implementations guarantee per-operation atomicity: every transition
/// (including the expiry sweep) happens under a lock scoped to that one
/// operation, so concurrent approve/execute/sweep calls racing on the same
/// id observe exactly one winner. No operation ever blocks on another.
pub trait OperationStore: Send + Sync {
    /// Register a freshly created operation.
    fn insert(&self, op: PendingOperation) -> Result<()>;

    /// Snapshot of an operation.
    fn get(&self, operation_id: &str) -> Result<PendingOperation>;

    /// Current state of an operation.
    fn get_state(&self, operation_id: &str) -> Result<OpState>;

    /// PENDING → APPROVED. Any other source state is `InvalidTransition`.
    fn mark_approved(
        &self,
        operation_id: &str,
        credential_id: &str,
        device_label: &str,
    ) -> Result<()>;

    /// PENDING → DENIED. Any other source state is `InvalidTransition`.
    fn mark_denied(&self, operation_id: &str) -> Result<()>;

    /// APPROVED → COMPLETED; returns the payload exactly once.
    ///
    /// A second call fails with `AlreadyCompleted` - this is what defeats
    /// operation-id replay.
    fn complete(&self, operation_id: &str) -> Result<BTreeMap<String, String>>;

    /// Flip PENDING operations older than the TTL to EXPIRED.
    /// Returns the ids that expired.
    fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    /// Evict terminal operations past the retention window, purging their
    /// plaintext payloads. Returns the evicted ids.
    fn evict_terminal_at(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    /// All live operations, newest first (for the approval index page).
    fn list(&self) -> Result<Vec<PendingOperation>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!OpState::Pending.is_terminal());
        assert!(!OpState::Approved.is_terminal());
        assert!(OpState::Denied.is_terminal());
        assert!(OpState::Expired.is_terminal());
        assert!(OpState::Completed.is_terminal());
    }

    #[test]
    fn new_operation_starts_pending_with_unique_id() {
        let a = PendingOperation::new(OpKind::WriteSecrets, "svc".into(), BTreeMap::new());
        let b = PendingOperation::new(OpKind::WriteSecrets, "svc".into(), BTreeMap::new());
        assert_eq!(a.state, OpState::Pending);
        assert_ne!(a.id, b.id);
        assert!(a.approved_at.is_none());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&OpKind::WriteSecrets).unwrap();
        assert_eq!(json, "\"write_secrets\"");
        let json = serde_json::to_string(&OpState::Expired).unwrap();
        assert_eq!(json, "\"expired\"");
    }
}
