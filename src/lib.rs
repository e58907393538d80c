// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Vault Approval Server - Human-in-the-loop secret gateway
//!
//! This crate keeps secret values out of AI-visible context and gates
//! every privileged secret-store operation behind a hardware-backed
//! (WebAuthn) human approval.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `approval` - Orchestration of the operation/approval lifecycle
//! - `tokenizer` - Session-scoped secret tokenization
//! - `ops` - Operation stores and the one-shot state machine
//! - `webauthn` - Credential registry and assertion verification
//! - `storage` - File-backed persistence and the append-only audit log

pub mod api;
pub mod approval;
pub mod config;
pub mod error;
pub mod models;
pub mod ops;
pub mod state;
pub mod storage;
pub mod sweep;
pub mod tokenizer;
pub mod validate;
pub mod webauthn;
