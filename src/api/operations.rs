// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::Error;
use crate::models::{
    CreateOperationRequest, ExecuteResponse, OperationCreatedResponse, OperationStatusResponse,
};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/v1/operations",
    request_body = CreateOperationRequest,
    tag = "Operations",
    responses(
        (status = 200, body = OperationCreatedResponse),
        (status = 422, description = "Invalid target, key, or oversized value")
    )
)]
pub async fn create_operation(
    State(state): State<AppState>,
    Json(request): Json<CreateOperationRequest>,
) -> Result<Json<OperationCreatedResponse>, Error> {
    let op = state.engine.create_operation(
        &request.session_id,
        request.kind,
        &request.target,
        &request.secrets,
    )?;
    Ok(Json(OperationCreatedResponse {
        approval_url: format!("{}/approve/{}", state.config.approval_origin, op.id),
        expires_in_secs: state.config.operation_ttl.as_secs(),
        operation_id: op.id,
        state: op.state,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/operations/{operation_id}/status",
    params(("operation_id" = String, Path, description = "Operation id")),
    tag = "Operations",
    responses(
        (status = 200, body = OperationStatusResponse),
        (status = 404, description = "Unknown operation")
    )
)]
pub async fn operation_status(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Json<OperationStatusResponse>, Error> {
    let op = state.engine.operation(&operation_id)?;
    Ok(Json(op.into()))
}

#[utoipa::path(
    post,
    path = "/v1/operations/{operation_id}/execute",
    params(("operation_id" = String, Path, description = "Operation id")),
    tag = "Operations",
    responses(
        (status = 200, description = "Payload released", body = ExecuteResponse),
        (status = 403, description = "Operation is not approved"),
        (status = 409, description = "Operation was already executed")
    )
)]
pub async fn execute_operation(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Json<ExecuteResponse>, Error> {
    let payload = state.engine.execute(&operation_id)?;
    let op = state.engine.operation(&operation_id)?;
    Ok(Json(ExecuteResponse {
        operation_id: op.id,
        state: op.state,
        target: op.target,
        payload,
    }))
}
