// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Request and response bodies for the HTTP API.
//!
//! Status responses never include payload values; the payload appears in
//! exactly one place, the execute response of an approved operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ops::{OpKind, OpState, PendingOperation};
use crate::webauthn::StoredCredential;

/// Tool-layer request to queue a privileged operation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOperationRequest {
    /// Session whose tokens may appear in the secret values.
    pub session_id: String,
    pub kind: OpKind,
    /// Service namespace the operation targets.
    pub target: String,
    /// Key → value; values may embed `@token-` references.
    pub secrets: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OperationCreatedResponse {
    pub operation_id: String,
    pub state: OpState,
    /// Where the human completes the approval.
    pub approval_url: String,
    /// Seconds until the pending operation expires.
    pub expires_in_secs: u64,
}

/// Status snapshot; carries key names and warnings, never values.
#[derive(Debug, Serialize, ToSchema)]
pub struct OperationStatusResponse {
    pub operation_id: String,
    pub state: OpState,
    pub kind: OpKind,
    pub target: String,
    pub keys: Vec<String>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by_device: Option<String>,
}

impl From<PendingOperation> for OperationStatusResponse {
    fn from(op: PendingOperation) -> Self {
        Self {
            operation_id: op.id,
            state: op.state,
            kind: op.kind,
            target: op.target,
            keys: op.payload.keys().cloned().collect(),
            warnings: op.warnings,
            created_at: op.created_at,
            approved_at: op.approved_at,
            approved_by_device: op.approved_by.map(|a| a.device_label),
        }
    }
}

/// The one place plaintext leaves the engine.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExecuteResponse {
    pub operation_id: String,
    pub state: OpState,
    pub target: String,
    pub payload: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenizeRequest {
    pub session_id: String,
    /// Plaintext secret value to replace with a token.
    pub value: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenizeResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequest {
    pub session_id: String,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResolveResponse {
    pub value: String,
}

/// Request a WebAuthn challenge for approving one operation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChallengeRequest {
    pub operation_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeResponse {
    /// Base64url single-use challenge.
    pub challenge: String,
    pub rp_id: String,
    pub origin: String,
    /// Credential ids to offer in `allowCredentials`.
    pub credential_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterOptionsResponse {
    pub challenge: String,
    pub rp_id: String,
    pub origin: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovalResponse {
    pub operation_id: String,
    pub state: OpState,
    pub device_label: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DenyResponse {
    pub operation_id: String,
    pub state: OpState,
}

/// Public view of a registered credential.
#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialView {
    pub id: String,
    pub device_label: String,
    pub sign_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<StoredCredential> for CredentialView {
    fn from(cred: StoredCredential) -> Self {
        Self {
            id: cred.id,
            device_label: cred.device_label,
            sign_count: cred.sign_count,
            created_at: cred.created_at,
            last_used_at: cred.last_used_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    pub removed: usize,
}
