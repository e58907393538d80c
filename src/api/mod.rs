// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        ApprovalResponse, ChallengeRequest, ChallengeResponse, CreateOperationRequest,
        CredentialView, DenyResponse, ExecuteResponse, OperationCreatedResponse,
        OperationStatusResponse, RegisterOptionsResponse, ResetResponse, ResolveRequest,
        ResolveResponse, TokenizeRequest, TokenizeResponse,
    },
    state::AppState,
    webauthn::{AssertionRequest, RegistrationRequest},
};

use self::health::{HealthChecks, HealthResponse};

pub mod approval;
pub mod credentials;
pub mod health;
pub mod operations;
pub mod tokens;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/operations", post(operations::create_operation))
        .route(
            "/operations/{operation_id}/status",
            get(operations::operation_status),
        )
        .route(
            "/operations/{operation_id}/execute",
            post(operations::execute_operation),
        )
        .route(
            "/operations/{operation_id}/approve",
            post(approval::approve_operation),
        )
        .route(
            "/operations/{operation_id}/deny",
            post(approval::deny_operation),
        )
        .route("/tokens", post(tokens::tokenize))
        .route("/tokens/resolve", post(tokens::resolve))
        .route("/webauthn/challenge", post(approval::webauthn_challenge))
        .route(
            "/webauthn/register/options",
            post(credentials::register_options),
        )
        .route("/webauthn/register", post(credentials::register))
        .route(
            "/credentials",
            get(credentials::list_credentials),
        )
        .route("/credentials/reset", post(credentials::reset_credentials));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/approve", get(approval::approval_index))
        .route("/approve/{operation_id}", get(approval::approval_page))
        .route("/health", get(health::health))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        operations::create_operation,
        operations::operation_status,
        operations::execute_operation,
        approval::webauthn_challenge,
        approval::approve_operation,
        approval::deny_operation,
        approval::approval_index,
        approval::approval_page,
        tokens::tokenize,
        tokens::resolve,
        credentials::register_options,
        credentials::register,
        credentials::list_credentials,
        credentials::reset_credentials,
        health::health
    ),
    components(
        schemas(
            CreateOperationRequest,
            OperationCreatedResponse,
            OperationStatusResponse,
            ExecuteResponse,
            TokenizeRequest,
            TokenizeResponse,
            ResolveRequest,
            ResolveResponse,
            ChallengeRequest,
            ChallengeResponse,
            RegisterOptionsResponse,
            RegistrationRequest,
            AssertionRequest,
            ApprovalResponse,
            DenyResponse,
            CredentialView,
            ResetResponse,
            HealthResponse,
            HealthChecks
        )
    ),
    tags(
        (name = "Operations", description = "Privileged-operation lifecycle"),
        (name = "Approval", description = "Human approval ceremony"),
        (name = "Tokens", description = "Session-scoped secret tokenization"),
        (name = "Credentials", description = "WebAuthn device registry"),
        (name = "Health", description = "Service health")
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::approval::ApprovalEngine;
    use crate::config::Config;
    use crate::ops::FileOperationStore;
    use crate::storage::{AuditLog, FileStore, StoragePaths};
    use crate::tokenizer::Tokenizer;
    use crate::webauthn::CredentialRegistry;
    use base64ct::{Base64UrlUnpadded, Encoding};
    use p256::ecdsa::{signature::Signer, Signature, SigningKey};
    use serde_json::json;
    use sha2::{Digest, Sha256};
    use std::sync::Arc;
    use tempfile::TempDir;

    pub(crate) fn test_state() -> (TempDir, AppState) {
        let temp = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            ..Config::default()
        };

        let store = FileStore::open(StoragePaths::new(&config.data_dir)).unwrap();
        let registry = Arc::new(
            CredentialRegistry::open(
                store.clone(),
                config.challenge_ttl,
                config.approval_origin.clone(),
                config.rp_id.clone(),
            )
            .unwrap(),
        );
        let ops = Arc::new(
            FileOperationStore::open(
                store.clone(),
                config.operation_ttl,
                config.operation_retention,
            )
            .unwrap(),
        );
        let tokenizer = Arc::new(Tokenizer::new(config.token_ttl, config.max_secret_bytes));
        let engine = Arc::new(ApprovalEngine::new(
            ops,
            registry,
            tokenizer.clone(),
            AuditLog::new(store),
            config.max_secret_bytes,
        ));

        let state = AppState::new(Arc::new(config), engine, tokenizer);
        (temp, state)
    }

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    pub(crate) fn register_test_device(state: &AppState) {
        let registry = state.engine.registry();
        if registry.has_credentials() {
            return;
        }
        let challenge = registry.issue_registration_challenge().unwrap();
        let cdj = json!({
            "type": "webauthn.create",
            "challenge": challenge,
            "origin": state.config.approval_origin,
        })
        .to_string();
        let point = signing_key().verifying_key().to_encoded_point(false);
        registry
            .register(&RegistrationRequest {
                credential_id: "cred-test".into(),
                device_label: "yubikey".into(),
                attestation_format: "none".into(),
                public_key: Base64UrlUnpadded::encode_string(point.as_bytes()),
                client_data_json: Base64UrlUnpadded::encode_string(cdj.as_bytes()),
                sign_count: 0,
            })
            .unwrap();
    }

    /// Drive a full WebAuthn approval for an operation, as the browser
    /// page would.
    pub(crate) fn approve_via_engine(state: &AppState, operation_id: &str) {
        register_test_device(state);
        let registry = state.engine.registry();
        let counter = registry.list()[0].sign_count + 1;

        let challenge = state.engine.request_approval(operation_id).unwrap();
        let cdj = json!({
            "type": "webauthn.get",
            "challenge": challenge.challenge,
            "origin": state.config.approval_origin,
        })
        .to_string();
        let mut auth = Sha256::digest(state.config.rp_id.as_bytes()).to_vec();
        auth.push(0b0000_0101);
        auth.extend_from_slice(&counter.to_be_bytes());

        let mut message = auth.clone();
        message.extend_from_slice(&Sha256::digest(cdj.as_bytes()));
        let signature: Signature = signing_key().sign(&message);

        state
            .engine
            .submit_approval(
                operation_id,
                &AssertionRequest {
                    credential_id: "cred-test".into(),
                    client_data_json: Base64UrlUnpadded::encode_string(cdj.as_bytes()),
                    authenticator_data: Base64UrlUnpadded::encode_string(&auth),
                    signature: Base64UrlUnpadded::encode_string(signature.to_der().as_bytes()),
                },
            )
            .unwrap();
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (_temp, state) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
