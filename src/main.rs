// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

use std::{env, net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vault_approval_server::api::router;
use vault_approval_server::approval::ApprovalEngine;
use vault_approval_server::config::{Config, HOST_ENV, PORT_ENV};
use vault_approval_server::ops::FileOperationStore;
use vault_approval_server::state::AppState;
use vault_approval_server::storage::{AuditLog, FileStore, StoragePaths};
use vault_approval_server::sweep::Sweeper;
use vault_approval_server::tokenizer::Tokenizer;
use vault_approval_server::webauthn::CredentialRegistry;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Arc::new(Config::from_env());

    let store = FileStore::open(StoragePaths::new(&config.data_dir))
        .expect("Failed to open data directory");
    let registry = Arc::new(
        CredentialRegistry::open(
            store.clone(),
            config.challenge_ttl,
            config.approval_origin.clone(),
            config.rp_id.clone(),
        )
        .expect("Failed to load credential registry"),
    );
    let ops = Arc::new(
        FileOperationStore::open(
            store.clone(),
            config.operation_ttl,
            config.operation_retention,
        )
        .expect("Failed to load operation store"),
    );
    let tokenizer = Arc::new(Tokenizer::new(config.token_ttl, config.max_secret_bytes));
    let engine = Arc::new(ApprovalEngine::new(
        ops,
        registry.clone(),
        tokenizer.clone(),
        AuditLog::new(store),
        config.max_secret_bytes,
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn(Sweeper::new(engine.clone()).run(shutdown.clone()));

    let state = AppState::new(config.clone(), engine, tokenizer);
    let app = router(state);

    let host = env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var(PORT_ENV)
        .unwrap_or_else(|_| "8091".to_string())
        .parse()
        .unwrap_or(8091);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    tracing::info!(
        %addr,
        data_dir = %config.data_dir.display(),
        devices = registry.credential_ids().len(),
        "Vault approval server listening (docs at /docs)"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server failed");
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}
