// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Append-only audit log.
//!
//! Every operation state transition, every rejected transition, and every
//! credential event is appended to a daily JSONL file. Entries carry key
//! names and counts, never secret values and never token mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStore, StorageResult};

/// Who triggered an audited action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The AI-facing tool layer
    ToolLayer,
    /// A human on the approval surface
    Human,
    /// The background expiry sweep
    Sweep,
}

/// A single append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    /// Action name, e.g. `operation_created`, `approval_rejected`.
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Free-form details as JSON (key names, reasons - never values).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(actor: Actor, action: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor,
            action: action.into(),
            operation_id: None,
            details: None,
        }
    }

    pub fn with_operation(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Append-only audit log over daily JSONL files.
#[derive(Debug, Clone)]
pub struct AuditLog {
    store: FileStore,
}

impl AuditLog {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    /// Append an entry to today's log file.
    pub fn append(&self, entry: &AuditEntry) -> StorageResult<()> {
        let date = entry.timestamp.format("%Y-%m-%d").to_string();
        let path = self.store.paths().audit_file(&date);
        let line = serde_json::to_string(entry)?;
        self.store.append_line(&path, &line)
    }

    /// Read all entries for a specific date (`YYYY-MM-DD`).
    pub fn read_day(&self, date: &str) -> StorageResult<Vec<AuditEntry>> {
        let path = self.store.paths().audit_file(date);
        let mut entries = Vec::new();
        for line in self.store.read_lines(&path)? {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Entries for an operation across today's log, newest last.
    pub fn for_operation(&self, operation_id: &str) -> StorageResult<Vec<AuditEntry>> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        Ok(self
            .read_day(&today)?
            .into_iter()
            .filter(|e| e.operation_id.as_deref() == Some(operation_id))
            .collect())
    }
}
