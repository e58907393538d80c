// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Background TTL sweeper.
//!
//! Timeout is enforced solely here: a periodic pass expires stale pending
//! operations, evicts terminal records past retention, and drops expired
//! tokens and challenges. Handlers never race the clock themselves.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::approval::ApprovalEngine;

/// How often the sweeper wakes up.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Periodic expiry sweep that runs as a background tokio task.
pub struct Sweeper {
    engine: Arc<ApprovalEngine>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(engine: Arc<ApprovalEngine>) -> Self {
        Self {
            engine,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// This should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "TTL sweeper starting");

        loop {
            if shutdown.is_cancelled() {
                tracing::info!("TTL sweeper shutting down");
                return;
            }

            match self.engine.sweep_at(Utc::now()) {
                Ok(outcome) => {
                    if outcome.expired_operations > 0
                        || outcome.evicted_operations > 0
                        || outcome.expired_tokens > 0
                        || outcome.expired_challenges > 0
                    {
                        tracing::info!(
                            expired_operations = outcome.expired_operations,
                            evicted_operations = outcome.evicted_operations,
                            expired_tokens = outcome.expired_tokens,
                            expired_challenges = outcome.expired_challenges,
                            "Sweep pass"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Sweep pass failed, will retry");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!("TTL sweeper shutting down");
                    return;
                }
            }
        }
    }
}
