// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

use axum::{extract::State, Json};

use crate::error::Error;
use crate::models::{ResolveRequest, ResolveResponse, TokenizeRequest, TokenizeResponse};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/v1/tokens",
    request_body = TokenizeRequest,
    tag = "Tokens",
    responses(
        (status = 200, body = TokenizeResponse),
        (status = 422, description = "Value exceeds the configured size limit")
    )
)]
pub async fn tokenize(
    State(state): State<AppState>,
    Json(request): Json<TokenizeRequest>,
) -> Result<Json<TokenizeResponse>, Error> {
    let token = state.tokenizer.tokenize(&request.session_id, &request.value)?;
    Ok(Json(TokenizeResponse { token }))
}

#[utoipa::path(
    post,
    path = "/v1/tokens/resolve",
    request_body = ResolveRequest,
    tag = "Tokens",
    responses(
        (status = 200, body = ResolveResponse),
        (status = 404, description = "Token unknown, expired, or from another session")
    )
)]
pub async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, Error> {
    let value = state.tokenizer.detokenize(&request.session_id, &request.token)?;
    Ok(Json(ResolveResponse { value }))
}
