// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Approval engine.
//!
//! Orchestrates the pieces: operations come in from the tool layer with
//! tokenized values, get resolved and validated, wait for a WebAuthn
//! approval from a registered device, and release their payload exactly
//! once on execute. Every transition, including rejected ones, lands in
//! the audit log.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::{Error, Result};
use crate::ops::{OpKind, OpState, OperationStore, PendingOperation};
use crate::storage::{Actor, AuditEntry, AuditLog};
use crate::tokenizer::Tokenizer;
use crate::validate;
use crate::webauthn::{AssertionRequest, CredentialRegistry, VerifiedApproval};

/// Challenge material handed to the approval page.
#[derive(Debug)]
pub struct ApprovalChallenge {
    pub challenge: String,
    pub credential_ids: Vec<String>,
}

/// Counts from one background sweep pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub expired_operations: usize,
    pub evicted_operations: usize,
    pub expired_tokens: usize,
    pub expired_challenges: usize,
}

pub struct ApprovalEngine {
    ops: Arc<dyn OperationStore>,
    registry: Arc<CredentialRegistry>,
    tokenizer: Arc<Tokenizer>,
    audit: AuditLog,
    max_secret_bytes: usize,
}

impl ApprovalEngine {
    pub fn new(
        ops: Arc<dyn OperationStore>,
        registry: Arc<CredentialRegistry>,
        tokenizer: Arc<Tokenizer>,
        audit: AuditLog,
        max_secret_bytes: usize,
    ) -> Self {
        Self {
            ops,
            registry,
            tokenizer,
            audit,
            max_secret_bytes,
        }
    }

    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Audit writes never mask the outcome of the transition they record.
    fn record(&self, entry: AuditEntry) {
        if let Err(error) = self.audit.append(&entry) {
            tracing::warn!(%error, action = %entry.action, "audit append failed");
        }
    }

    /// Create a pending operation from tool-layer input.
    ///
    /// Values may carry `@token-` references from `session_id`; they are
    /// resolved to plaintext here, before the human ever sees the approval
    /// page. Unresolvable tokens stay literal and show up as exactly what
    /// the assistant passed.
    pub fn create_operation(
        &self,
        session_id: &str,
        kind: OpKind,
        target: &str,
        secrets: &BTreeMap<String, String>,
    ) -> Result<PendingOperation> {
        validate::validate_target(target)?;

        let mut payload = BTreeMap::new();
        let mut warnings = Vec::new();
        for (key, value) in secrets {
            validate::validate_key(key)?;
            let resolved = self.tokenizer.detokenize_text(session_id, value);
            validate::validate_value_size(&resolved, self.max_secret_bytes)?;
            for warning in validate::scan_dangerous_patterns(&resolved) {
                warnings.push(format!("{key}: {warning}"));
            }
            payload.insert(key.clone(), resolved);
        }

        let op = PendingOperation::new(kind, target.to_string(), payload).with_warnings(warnings);
        self.ops.insert(op.clone())?;

        self.record(
            AuditEntry::new(Actor::ToolLayer, "operation_created")
                .with_operation(&op.id)
                .with_details(json!({
                    "kind": op.kind,
                    "target": op.target,
                    "keys": op.payload.keys().collect::<Vec<_>>(),
                    "warnings": op.warnings.len(),
                })),
        );
        Ok(op)
    }

    /// Snapshot for the status endpoint and the approval page.
    pub fn operation(&self, operation_id: &str) -> Result<PendingOperation> {
        self.ops.get(operation_id)
    }

    /// Live operations, newest first.
    pub fn list_operations(&self) -> Result<Vec<PendingOperation>> {
        self.ops.list()
    }

    /// Issue a WebAuthn challenge for approving one pending operation.
    ///
    /// An expired operation gets its own error here so the approval page
    /// can tell the human to ask for a fresh request.
    pub fn request_approval(&self, operation_id: &str) -> Result<ApprovalChallenge> {
        match self.ops.get_state(operation_id)? {
            OpState::Pending => {}
            OpState::Expired => return Err(Error::Expired),
            _ => return Err(Error::OperationNotPending),
        }
        Ok(ApprovalChallenge {
            challenge: self.registry.issue_approval_challenge(operation_id)?,
            credential_ids: self.registry.credential_ids(),
        })
    }

    /// Verify an assertion and move the operation to APPROVED.
    ///
    /// A failed ceremony leaves the operation PENDING; the human can fetch
    /// a fresh challenge and try again until the TTL runs out.
    pub fn submit_approval(
        &self,
        operation_id: &str,
        assertion: &AssertionRequest,
    ) -> Result<VerifiedApproval> {
        if self.ops.get_state(operation_id)? != OpState::Pending {
            self.record(
                AuditEntry::new(Actor::Human, "approval_rejected")
                    .with_operation(operation_id)
                    .with_details(json!({"reason": "operation_not_pending"})),
            );
            return Err(Error::OperationNotPending);
        }

        let approval = match self.registry.verify_approval(operation_id, assertion) {
            Ok(approval) => approval,
            Err(error) => {
                self.record(
                    AuditEntry::new(Actor::Human, "approval_rejected")
                        .with_operation(operation_id)
                        .with_details(json!({"reason": error.error_code()})),
                );
                return Err(error);
            }
        };

        self.ops.mark_approved(
            operation_id,
            &approval.credential_id,
            &approval.device_label,
        )?;
        self.record(
            AuditEntry::new(Actor::Human, "operation_approved")
                .with_operation(operation_id)
                .with_details(json!({"device": approval.device_label})),
        );
        Ok(approval)
    }

    /// Human denial of a pending operation.
    pub fn deny(&self, operation_id: &str) -> Result<()> {
        if self.ops.get_state(operation_id)? != OpState::Pending {
            self.record(
                AuditEntry::new(Actor::Human, "deny_rejected")
                    .with_operation(operation_id)
                    .with_details(json!({"reason": "operation_not_pending"})),
            );
            return Err(Error::OperationNotPending);
        }
        self.ops.mark_denied(operation_id)?;
        self.record(AuditEntry::new(Actor::Human, "operation_denied").with_operation(operation_id));
        Ok(())
    }

    /// Release the payload of an approved operation, exactly once.
    pub fn execute(&self, operation_id: &str) -> Result<BTreeMap<String, String>> {
        let state = self.ops.get_state(operation_id)?;
        let result = match state {
            OpState::Approved => self.ops.complete(operation_id),
            OpState::Completed => Err(Error::AlreadyCompleted),
            _ => Err(Error::NotApproved),
        };

        match &result {
            Ok(payload) => self.record(
                AuditEntry::new(Actor::ToolLayer, "operation_completed")
                    .with_operation(operation_id)
                    .with_details(json!({"keys": payload.keys().collect::<Vec<_>>()})),
            ),
            Err(error) => self.record(
                AuditEntry::new(Actor::ToolLayer, "execute_rejected")
                    .with_operation(operation_id)
                    .with_details(json!({"reason": error.error_code(), "state": state.name()})),
            ),
        }
        result
    }

    /// Register a new approval device, audited.
    pub fn register_credential(
        &self,
        request: &crate::webauthn::RegistrationRequest,
    ) -> Result<crate::webauthn::StoredCredential> {
        let credential = self.registry.register(request)?;
        self.record(
            AuditEntry::new(Actor::Human, "credential_registered")
                .with_details(json!({"device": credential.device_label})),
        );
        Ok(credential)
    }

    /// Wipe all registered devices, audited. Recovery path for a lost or
    /// compromised authenticator.
    pub fn reset_credentials(&self) -> Result<usize> {
        let removed = self.registry.reset()?;
        self.record(
            AuditEntry::new(Actor::Human, "credentials_reset")
                .with_details(json!({"removed": removed})),
        );
        Ok(removed)
    }

    /// One pass of TTL enforcement across operations, tokens, and
    /// challenges, plus eviction of stale terminal records.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let expired = self.ops.sweep_expired_at(now)?;
        for id in &expired {
            self.record(AuditEntry::new(Actor::Sweep, "operation_expired").with_operation(id));
        }

        let evicted = self.ops.evict_terminal_at(now)?;
        for id in &evicted {
            self.record(AuditEntry::new(Actor::Sweep, "operation_evicted").with_operation(id));
        }

        Ok(SweepOutcome {
            expired_operations: expired.len(),
            evicted_operations: evicted.len(),
            expired_tokens: self.tokenizer.sweep_expired_at(now),
            expired_challenges: self.registry.sweep_challenges_at(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::InMemoryOperationStore;
    use crate::storage::{FileStore, StoragePaths};
    use base64ct::{Base64UrlUnpadded, Encoding};
    use chrono::TimeDelta;
    use p256::ecdsa::{signature::Signer, Signature, SigningKey};
    use serde_json::json;
    use sha2::{Digest, Sha256};
    use std::time::Duration;
    use tempfile::TempDir;

    const ORIGIN: &str = "http://localhost:8091";
    const RP_ID: &str = "localhost";

    fn engine(temp: &TempDir) -> ApprovalEngine {
        let store = FileStore::open(StoragePaths::new(temp.path())).unwrap();
        let registry = Arc::new(
            CredentialRegistry::open(
                store.clone(),
                Duration::from_secs(60),
                ORIGIN.to_string(),
                RP_ID.to_string(),
            )
            .unwrap(),
        );
        let ops = Arc::new(InMemoryOperationStore::new(
            Duration::from_secs(300),
            Duration::from_secs(3600),
        ));
        let tokenizer = Arc::new(Tokenizer::new(Duration::from_secs(7200), 8192));
        ApprovalEngine::new(ops, registry, tokenizer, AuditLog::new(store), 8192)
    }

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    fn register_device(engine: &ApprovalEngine, key: &SigningKey) {
        let challenge = engine.registry().issue_registration_challenge().unwrap();
        let cdj = json!({
            "type": "webauthn.create",
            "challenge": challenge,
            "origin": ORIGIN,
        })
        .to_string();
        let point = key.verifying_key().to_encoded_point(false);
        engine
            .registry()
            .register(&crate::webauthn::RegistrationRequest {
                credential_id: "cred-test".into(),
                device_label: "yubikey".into(),
                attestation_format: "none".into(),
                public_key: Base64UrlUnpadded::encode_string(point.as_bytes()),
                client_data_json: Base64UrlUnpadded::encode_string(cdj.as_bytes()),
                sign_count: 0,
            })
            .unwrap();
    }

    fn sign_challenge(key: &SigningKey, challenge: &str, counter: u32) -> AssertionRequest {
        let cdj = json!({
            "type": "webauthn.get",
            "challenge": challenge,
            "origin": ORIGIN,
        })
        .to_string();
        let mut auth = Sha256::digest(RP_ID.as_bytes()).to_vec();
        auth.push(0b0000_0101);
        auth.extend_from_slice(&counter.to_be_bytes());

        let mut message = auth.clone();
        message.extend_from_slice(&Sha256::digest(cdj.as_bytes()));
        let signature: Signature = key.sign(&message);

        AssertionRequest {
            credential_id: "cred-test".into(),
            client_data_json: Base64UrlUnpadded::encode_string(cdj.as_bytes()),
            authenticator_data: Base64UrlUnpadded::encode_string(&auth),
            signature: Base64UrlUnpadded::encode_string(signature.to_der().as_bytes()),
        }
    }

    fn secrets(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn create_resolves_tokens_before_the_human_sees_them() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);

        let token = engine.tokenizer.tokenize("sess-1", "sk-real-value").unwrap();
        let op = engine
            .create_operation(
                "sess-1",
                OpKind::WriteSecrets,
                "my-service",
                &secrets(&[("API_KEY", &token)]),
            )
            .unwrap();

        assert_eq!(
            op.payload.get("API_KEY").map(String::as_str),
            Some("sk-real-value")
        );
        assert_eq!(op.state, OpState::Pending);
        assert!(op.warnings.is_empty());
    }

    #[test]
    fn create_collects_warnings_per_key() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);

        let op = engine
            .create_operation(
                "sess-1",
                OpKind::WriteSecrets,
                "svc",
                &secrets(&[("HOOK", "x$(whoami)"), ("PLAIN", "ok")]),
            )
            .unwrap();
        assert_eq!(op.warnings.len(), 1);
        assert!(op.warnings[0].starts_with("HOOK: "));
    }

    #[test]
    fn create_rejects_bad_names() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);

        assert!(engine
            .create_operation("s", OpKind::WriteSecrets, "../etc", &secrets(&[]))
            .is_err());
        assert!(engine
            .create_operation("s", OpKind::WriteSecrets, "svc", &secrets(&[("A=B", "v")]))
            .is_err());
    }

    #[test]
    fn full_approval_flow_releases_payload_once() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let key = signing_key();
        register_device(&engine, &key);

        let op = engine
            .create_operation(
                "sess-1",
                OpKind::WriteSecrets,
                "svc",
                &secrets(&[("API_KEY", "sk-value")]),
            )
            .unwrap();

        // Execute before approval is forbidden.
        assert!(matches!(
            engine.execute(&op.id).unwrap_err(),
            Error::NotApproved
        ));

        let challenge = engine.request_approval(&op.id).unwrap();
        assert_eq!(challenge.credential_ids, vec!["cred-test"]);

        let assertion = sign_challenge(&key, &challenge.challenge, 1);
        let approval = engine.submit_approval(&op.id, &assertion).unwrap();
        assert_eq!(approval.device_label, "yubikey");
        assert_eq!(engine.operation(&op.id).unwrap().state, OpState::Approved);

        let payload = engine.execute(&op.id).unwrap();
        assert_eq!(payload.get("API_KEY").map(String::as_str), Some("sk-value"));

        // Replay of the operation id.
        assert!(matches!(
            engine.execute(&op.id).unwrap_err(),
            Error::AlreadyCompleted
        ));
    }

    #[test]
    fn failed_assertion_leaves_operation_pending() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let key = signing_key();
        register_device(&engine, &key);

        let op = engine
            .create_operation("s", OpKind::WriteSecrets, "svc", &secrets(&[("K", "v")]))
            .unwrap();
        let challenge = engine.request_approval(&op.id).unwrap();

        // Counter 0 fails the strictly-greater rule.
        let stale = sign_challenge(&key, &challenge.challenge, 0);
        assert!(matches!(
            engine.submit_approval(&op.id, &stale).unwrap_err(),
            Error::CounterRegression
        ));
        assert_eq!(engine.operation(&op.id).unwrap().state, OpState::Pending);

        // A fresh challenge still works.
        let retry = engine.request_approval(&op.id).unwrap();
        let assertion = sign_challenge(&key, &retry.challenge, 1);
        engine.submit_approval(&op.id, &assertion).unwrap();
    }

    #[test]
    fn deny_then_approve_is_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let key = signing_key();
        register_device(&engine, &key);

        let op = engine
            .create_operation("s", OpKind::WriteSecrets, "svc", &secrets(&[("K", "v")]))
            .unwrap();
        let challenge = engine.request_approval(&op.id).unwrap();

        engine.deny(&op.id).unwrap();
        assert_eq!(engine.operation(&op.id).unwrap().state, OpState::Denied);

        let assertion = sign_challenge(&key, &challenge.challenge, 1);
        assert!(matches!(
            engine.submit_approval(&op.id, &assertion).unwrap_err(),
            Error::OperationNotPending
        ));
    }

    #[test]
    fn expired_operation_cannot_be_approved() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let key = signing_key();
        register_device(&engine, &key);

        let op = engine
            .create_operation("s", OpKind::WriteSecrets, "svc", &secrets(&[("K", "v")]))
            .unwrap();
        let challenge = engine.request_approval(&op.id).unwrap();

        let later = Utc::now() + TimeDelta::seconds(301);
        let outcome = engine.sweep_at(later).unwrap();
        assert_eq!(outcome.expired_operations, 1);
        assert_eq!(engine.operation(&op.id).unwrap().state, OpState::Expired);

        let assertion = sign_challenge(&key, &challenge.challenge, 1);
        assert!(matches!(
            engine.submit_approval(&op.id, &assertion).unwrap_err(),
            Error::OperationNotPending
        ));
        assert!(matches!(
            engine.request_approval(&op.id).unwrap_err(),
            Error::Expired
        ));
    }

    #[test]
    fn audit_trail_covers_the_lifecycle() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let key = signing_key();
        register_device(&engine, &key);

        let op = engine
            .create_operation("s", OpKind::WriteSecrets, "svc", &secrets(&[("K", "v")]))
            .unwrap();
        let challenge = engine.request_approval(&op.id).unwrap();
        let assertion = sign_challenge(&key, &challenge.challenge, 1);
        engine.submit_approval(&op.id, &assertion).unwrap();
        engine.execute(&op.id).unwrap();
        let _ = engine.execute(&op.id);

        let actions: Vec<String> = engine
            .audit()
            .for_operation(&op.id)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                "operation_created",
                "operation_approved",
                "operation_completed",
                "execute_rejected",
            ]
        );
    }

    #[test]
    fn audit_never_contains_secret_values() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);

        let op = engine
            .create_operation(
                "s",
                OpKind::WriteSecrets,
                "svc",
                &secrets(&[("API_KEY", "sk-hyper-secret")]),
            )
            .unwrap();
        engine.execute(&op.id).ok();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        for entry in engine.audit().read_day(&today).unwrap() {
            let line = serde_json::to_string(&entry).unwrap();
            assert!(!line.contains("sk-hyper-secret"));
        }
    }
}
