// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! # Persistent Storage
//!
//! File-backed state under the configured data directory:
//!
//! - operations (plaintext payloads, purged after terminal state + retention)
//! - WebAuthn credentials (public-key-only, safe to back up)
//! - append-only audit logs
//!
//! The data directory is a protected local store; nothing here is world
//! readable in a correct deployment, and no secret value ever leaves it
//! except through an approved `complete` call.

pub mod audit;
pub mod files;
pub mod paths;

pub use audit::{Actor, AuditEntry, AuditLog};
pub use files::{FileStore, StorageError, StorageResult};
pub use paths::StoragePaths;
