// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8091` |
//! | `DATA_DIR` | Root directory for persisted state | `~/.vault-approval` |
//! | `VAULT_ADDR` | Backing secret-store address (used by the tool layer) | `http://127.0.0.1:8200` |
//! | `OPERATION_TTL_SECS` | Pending-operation time-to-live | `300` |
//! | `OPERATION_RETENTION_SECS` | Retention of terminal operations before eviction | `3600` |
//! | `TOKEN_TTL_SECS` | Token session time-to-live | `7200` |
//! | `CHALLENGE_TTL_SECS` | WebAuthn challenge validity window | `60` |
//! | `APPROVAL_ORIGIN` | Expected WebAuthn origin | `http://localhost:8091` |
//! | `APPROVAL_RP_ID` | WebAuthn relying-party identifier | `localhost` |
//! | `MAX_SECRET_BYTES` | Per-value secret size limit | `8192` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const VAULT_ADDR_ENV: &str = "VAULT_ADDR";
pub const OPERATION_TTL_ENV: &str = "OPERATION_TTL_SECS";
pub const OPERATION_RETENTION_ENV: &str = "OPERATION_RETENTION_SECS";
pub const TOKEN_TTL_ENV: &str = "TOKEN_TTL_SECS";
pub const CHALLENGE_TTL_ENV: &str = "CHALLENGE_TTL_SECS";
pub const APPROVAL_ORIGIN_ENV: &str = "APPROVAL_ORIGIN";
pub const APPROVAL_RP_ID_ENV: &str = "APPROVAL_RP_ID";
pub const MAX_SECRET_BYTES_ENV: &str = "MAX_SECRET_BYTES";

/// Runtime configuration for the engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for persisted operations, credentials, and audit logs.
    pub data_dir: PathBuf,
    /// Backing secret-store address, handed to the tool layer as-is.
    pub vault_addr: String,
    /// How long a pending operation may wait for human approval.
    pub operation_ttl: Duration,
    /// How long terminal operations are retained before plaintext eviction.
    pub operation_retention: Duration,
    /// How long tokens stay resolvable within a session.
    pub token_ttl: Duration,
    /// Validity window for a WebAuthn challenge.
    pub challenge_ttl: Duration,
    /// Expected `origin` in the signed clientDataJSON.
    pub approval_origin: String,
    /// Relying-party ID bound into the authenticator data hash.
    pub rp_id: String,
    /// Maximum size of a single secret value in bytes.
    pub max_secret_bytes: usize,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var(DATA_DIR_ENV).map(PathBuf::from).unwrap_or_else(|_| {
                dirs_fallback_home().join(".vault-approval")
            }),
            vault_addr: env::var(VAULT_ADDR_ENV)
                .unwrap_or_else(|_| "http://127.0.0.1:8200".to_string()),
            operation_ttl: secs_from_env(OPERATION_TTL_ENV, 300),
            operation_retention: secs_from_env(OPERATION_RETENTION_ENV, 3600),
            token_ttl: secs_from_env(TOKEN_TTL_ENV, 7200),
            challenge_ttl: secs_from_env(CHALLENGE_TTL_ENV, 60),
            approval_origin: env::var(APPROVAL_ORIGIN_ENV)
                .unwrap_or_else(|_| "http://localhost:8091".to_string()),
            rp_id: env::var(APPROVAL_RP_ID_ENV).unwrap_or_else(|_| "localhost".to_string()),
            max_secret_bytes: env::var(MAX_SECRET_BYTES_ENV)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8192),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/tmp/vault-approval"),
            vault_addr: "http://127.0.0.1:8200".to_string(),
            operation_ttl: Duration::from_secs(300),
            operation_retention: Duration::from_secs(3600),
            token_ttl: Duration::from_secs(7200),
            challenge_ttl: Duration::from_secs(60),
            approval_origin: "http://localhost:8091".to_string(),
            rp_id: "localhost".to_string(),
            max_secret_bytes: 8192,
        }
    }
}

fn secs_from_env(var: &str, default: u64) -> Duration {
    Duration::from_secs(
        env::var(var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

fn dirs_fallback_home() -> PathBuf {
    env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}
