// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Error taxonomy for the approval and tokenization engine.
//!
//! Every component error is a typed, recoverable [`Error`] variant. The
//! AI-facing caller receives the terse machine-readable `error_code`; the
//! human approval surface renders the `Display` text. Only storage failure
//! maps to a 500 - all other variants describe a rejected request, never a
//! broken process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StorageError;

/// Engine-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown operation, credential, or challenge identifier
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Token does not exist, belongs to another session, or has expired
    #[error("Unknown token")]
    UnknownToken,

    /// State-machine violation (transitions are monotonic and one-shot)
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// `complete` was already called for this operation
    #[error("Operation already completed")]
    AlreadyCompleted,

    /// Operation is no longer awaiting approval
    #[error("Operation is not pending, ask the assistant to retry with a new request")]
    OperationNotPending,

    /// Execution attempted without an approved operation
    #[error("Operation is not approved for execution")]
    NotApproved,

    /// TTL exceeded
    #[error("Operation expired, ask the assistant to retry")]
    Expired,

    /// Secret value exceeds the configured byte limit
    #[error("Secret value too large (max {limit} bytes)")]
    ValueTooLarge { limit: usize },

    /// Size/shape/pattern violation on an input
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// WebAuthn assertion signature did not verify
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Challenge unknown, expired, or already consumed
    #[error("Challenge expired or already used")]
    ChallengeExpiredOrReused,

    /// Authenticator reported a sign counter at or below the stored value
    #[error("Authenticator sign counter regressed (possible cloned credential)")]
    CounterRegression,

    /// Client-reported origin or RP ID does not match the configured one
    #[error("Origin does not match the configured approval origin")]
    OriginMismatch,

    /// Registration attestation came from an unsupported authenticator class
    #[error("Attestation rejected: {0}")]
    AttestationRejected(String),

    /// Persistence-layer failure - the only fatal class
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl Error {
    /// Machine-readable code surfaced to the AI-facing caller.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::UnknownToken => "unknown_token",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::AlreadyCompleted => "already_completed",
            Error::OperationNotPending => "operation_not_pending",
            Error::NotApproved => "not_approved",
            Error::Expired => "expired",
            Error::ValueTooLarge { .. } => "value_too_large",
            Error::ValidationFailed(_) => "validation_failed",
            Error::SignatureInvalid => "signature_invalid",
            Error::ChallengeExpiredOrReused => "challenge_expired_or_reused",
            Error::CounterRegression => "counter_regression",
            Error::OriginMismatch => "origin_mismatch",
            Error::AttestationRejected(_) => "attestation_rejected",
            Error::Storage(_) => "storage_error",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) | Error::UnknownToken => StatusCode::NOT_FOUND,
            Error::InvalidTransition { .. }
            | Error::AlreadyCompleted
            | Error::OperationNotPending => StatusCode::CONFLICT,
            Error::NotApproved => StatusCode::FORBIDDEN,
            Error::Expired => StatusCode::GONE,
            Error::ValueTooLarge { .. } | Error::ValidationFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::SignatureInvalid
            | Error::ChallengeExpiredOrReused
            | Error::CounterRegression
            | Error::OriginMismatch => StatusCode::UNAUTHORIZED,
            Error::AttestationRejected(_) => StatusCode::BAD_REQUEST,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
