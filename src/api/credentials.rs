// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

use axum::{extract::State, Json};

use crate::error::Error;
use crate::models::{CredentialView, RegisterOptionsResponse, ResetResponse};
use crate::state::AppState;
use crate::webauthn::RegistrationRequest;

#[utoipa::path(
    post,
    path = "/v1/webauthn/register/options",
    tag = "Credentials",
    responses((status = 200, body = RegisterOptionsResponse))
)]
pub async fn register_options(
    State(state): State<AppState>,
) -> Result<Json<RegisterOptionsResponse>, Error> {
    let challenge = state.engine.registry().issue_registration_challenge()?;
    Ok(Json(RegisterOptionsResponse {
        challenge,
        rp_id: state.config.rp_id.clone(),
        origin: state.config.approval_origin.clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/webauthn/register",
    request_body = RegistrationRequest,
    tag = "Credentials",
    responses(
        (status = 200, body = CredentialView),
        (status = 400, description = "Unsupported attestation"),
        (status = 401, description = "Stale or reused registration challenge")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Result<Json<CredentialView>, Error> {
    let credential = state.engine.register_credential(&request)?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    get,
    path = "/v1/credentials",
    tag = "Credentials",
    responses((status = 200, body = [CredentialView]))
)]
pub async fn list_credentials(State(state): State<AppState>) -> Json<Vec<CredentialView>> {
    Json(
        state
            .engine
            .registry()
            .list()
            .into_iter()
            .map(CredentialView::from)
            .collect(),
    )
}

/// Remove every registered credential. Recovery path for a lost or
/// compromised authenticator; the next approval requires re-registration.
#[utoipa::path(
    post,
    path = "/v1/credentials/reset",
    tag = "Credentials",
    responses((status = 200, body = ResetResponse))
)]
pub async fn reset_credentials(
    State(state): State<AppState>,
) -> Result<Json<ResetResponse>, Error> {
    let removed = state.engine.reset_credentials()?;
    Ok(Json(ResetResponse { removed }))
}
