// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! WebAuthn credential registry and challenge table.
//!
//! Credentials are persisted public-key-only (id, SEC1 point, sign
//! counter, device label) so the credential files are safe to back up.
//! Challenges are random 32-byte values held in memory, bound to a
//! purpose (registration, or approval of one specific operation), and
//! strictly single-use: a challenge is consumed the moment an assertion
//! presents it, whether or not the rest of the ceremony verifies.
//!
//! The sign counter is the clone detector. Every assertion must report a
//! counter strictly greater than the stored one; an authenticator that
//! never increments (0 → 0 included) is treated as cloned and rejected.

pub mod assertion;

use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, TimeDelta, Utc};
use p256::ecdsa::VerifyingKey;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::storage::{FileStore, StorageError};

use assertion::{CEREMONY_CREATE, CEREMONY_GET};

const CHALLENGE_BYTES: usize = 32;

/// Attestation formats accepted at registration.
const ACCEPTED_ATTESTATION_FORMATS: &[&str] = &["none", "packed"];

/// A registered WebAuthn credential. Contains no private material.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredCredential {
    /// Base64url (unpadded) credential id as reported by the authenticator.
    pub id: String,
    /// Human-chosen label shown on the approval page.
    pub device_label: String,
    /// Base64url (unpadded) uncompressed SEC1 P-256 point.
    pub public_key: String,
    /// Last accepted authenticator sign counter.
    pub sign_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// What a challenge was issued for. An approval challenge is bound to a
/// single operation and cannot authorize any other.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChallengePurpose {
    Registration,
    Approval { operation_id: String },
}

#[derive(Debug)]
struct IssuedChallenge {
    purpose: ChallengePurpose,
    expires_at: DateTime<Utc>,
}

/// Registration request with the authenticator response fields the
/// approval page extracts client-side.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegistrationRequest {
    /// Base64url credential id.
    pub credential_id: String,
    pub device_label: String,
    /// Attestation statement format (`none` and `packed` are accepted).
    pub attestation_format: String,
    /// Base64url uncompressed SEC1 P-256 public key.
    pub public_key: String,
    /// Base64url `clientDataJSON` from the create ceremony.
    pub client_data_json: String,
    /// Initial sign counter from the authenticator data.
    pub sign_count: u32,
}

/// Assertion fields from a `navigator.credentials.get()` response.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssertionRequest {
    /// Base64url credential id.
    pub credential_id: String,
    /// Base64url `clientDataJSON`.
    pub client_data_json: String,
    /// Base64url authenticator data.
    pub authenticator_data: String,
    /// Base64url DER-encoded ES256 signature.
    pub signature: String,
}

/// Outcome of a verified approval assertion.
#[derive(Debug, Clone)]
pub struct VerifiedApproval {
    pub credential_id: String,
    pub device_label: String,
}

pub struct CredentialRegistry {
    store: FileStore,
    credentials: RwLock<HashMap<String, StoredCredential>>,
    challenges: Mutex<HashMap<String, IssuedChallenge>>,
    rng: SystemRandom,
    challenge_ttl: TimeDelta,
    origin: String,
    rp_id: String,
}

fn decode_b64(field: &'static str, value: &str) -> Result<Vec<u8>> {
    Base64UrlUnpadded::decode_vec(value)
        .map_err(|_| Error::ValidationFailed(format!("{field} is not valid base64url")))
}

impl CredentialRegistry {
    /// Open the registry and load persisted credentials.
    pub fn open(
        store: FileStore,
        challenge_ttl: Duration,
        origin: String,
        rp_id: String,
    ) -> Result<Self> {
        let mut credentials = HashMap::new();
        for id in store.list_stems(store.paths().credentials_dir(), "json")? {
            let cred: StoredCredential = store.read_json(store.paths().credential(&id))?;
            credentials.insert(cred.id.clone(), cred);
        }

        Ok(Self {
            store,
            credentials: RwLock::new(credentials),
            challenges: Mutex::new(HashMap::new()),
            rng: SystemRandom::new(),
            challenge_ttl: TimeDelta::from_std(challenge_ttl).unwrap_or(TimeDelta::zero()),
            origin,
            rp_id,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    pub fn has_credentials(&self) -> bool {
        !self
            .credentials
            .read()
            .expect("credential map lock poisoned")
            .is_empty()
    }

    /// Credential ids to offer in `allowCredentials`.
    pub fn credential_ids(&self) -> Vec<String> {
        self.credentials
            .read()
            .expect("credential map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Registered credentials, public fields only.
    pub fn list(&self) -> Vec<StoredCredential> {
        let mut all: Vec<StoredCredential> = self
            .credentials
            .read()
            .expect("credential map lock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    fn issue(&self, purpose: ChallengePurpose) -> Result<String> {
        let mut bytes = [0u8; CHALLENGE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| Error::Storage(StorageError::Io(io::Error::other("rng failure"))))?;
        let challenge = Base64UrlUnpadded::encode_string(&bytes);

        let mut challenges = self.challenges.lock().expect("challenge table lock poisoned");
        challenges.insert(
            challenge.clone(),
            IssuedChallenge {
                purpose,
                expires_at: Utc::now() + self.challenge_ttl,
            },
        );
        Ok(challenge)
    }

    /// Issue a single-use challenge for registering a new device.
    pub fn issue_registration_challenge(&self) -> Result<String> {
        self.issue(ChallengePurpose::Registration)
    }

    /// Issue a single-use challenge bound to one operation's approval.
    pub fn issue_approval_challenge(&self, operation_id: &str) -> Result<String> {
        self.issue(ChallengePurpose::Approval {
            operation_id: operation_id.to_string(),
        })
    }

    /// Remove a challenge from the table; any miss (unknown, expired, or
    /// wrong purpose) reports the same error so a probe learns nothing.
    fn consume_challenge(&self, challenge: &str, expected: &ChallengePurpose) -> Result<()> {
        let mut challenges = self.challenges.lock().expect("challenge table lock poisoned");
        let issued = challenges
            .remove(challenge)
            .ok_or(Error::ChallengeExpiredOrReused)?;
        if Utc::now() > issued.expires_at || issued.purpose != *expected {
            return Err(Error::ChallengeExpiredOrReused);
        }
        Ok(())
    }

    /// Register a new credential from a create-ceremony response.
    pub fn register(&self, req: &RegistrationRequest) -> Result<StoredCredential> {
        let client_data_json = decode_b64("client_data_json", &req.client_data_json)?;
        let client_data =
            assertion::parse_client_data(&client_data_json, CEREMONY_CREATE, &self.origin)?;
        self.consume_challenge(&client_data.challenge, &ChallengePurpose::Registration)?;

        if !ACCEPTED_ATTESTATION_FORMATS.contains(&req.attestation_format.as_str()) {
            return Err(Error::AttestationRejected(format!(
                "unsupported attestation format '{}'",
                req.attestation_format
            )));
        }

        let public_key = decode_b64("public_key", &req.public_key)?;
        if VerifyingKey::from_sec1_bytes(&public_key).is_err() {
            return Err(Error::AttestationRejected(
                "public key is not a valid P-256 point".into(),
            ));
        }

        let credential = StoredCredential {
            id: req.credential_id.clone(),
            device_label: req.device_label.clone(),
            public_key: req.public_key.clone(),
            sign_count: req.sign_count,
            created_at: Utc::now(),
            last_used_at: None,
        };
        self.store.write_json(
            self.store.paths().credential(&credential.id),
            &credential,
        )?;

        let mut credentials = self.credentials.write().expect("credential map lock poisoned");
        credentials.insert(credential.id.clone(), credential.clone());
        Ok(credential)
    }

    /// Verify an approval assertion for `operation_id`.
    ///
    /// On success the stored sign counter advances and the credential's
    /// last-use timestamp is persisted. On any failure the credential is
    /// untouched, but the presented challenge is gone either way.
    pub fn verify_approval(
        &self,
        operation_id: &str,
        req: &AssertionRequest,
    ) -> Result<VerifiedApproval> {
        let client_data_json = decode_b64("client_data_json", &req.client_data_json)?;
        let authenticator_data = decode_b64("authenticator_data", &req.authenticator_data)?;
        let signature = decode_b64("signature", &req.signature)?;

        let client_data =
            assertion::parse_client_data(&client_data_json, CEREMONY_GET, &self.origin)?;
        self.consume_challenge(
            &client_data.challenge,
            &ChallengePurpose::Approval {
                operation_id: operation_id.to_string(),
            },
        )?;

        let credential = {
            let credentials = self.credentials.read().expect("credential map lock poisoned");
            credentials
                .get(&req.credential_id)
                .cloned()
                .ok_or(Error::NotFound("credential"))?
        };

        let auth = assertion::parse_authenticator_data(&authenticator_data, &self.rp_id)?;

        let public_key = decode_b64("public_key", &credential.public_key)?;
        assertion::verify_signature(
            &public_key,
            &authenticator_data,
            &client_data_json,
            &signature,
        )?;

        if auth.sign_count <= credential.sign_count {
            return Err(Error::CounterRegression);
        }

        let updated = {
            let mut credentials =
                self.credentials.write().expect("credential map lock poisoned");
            let entry = credentials
                .get_mut(&req.credential_id)
                .ok_or(Error::NotFound("credential"))?;
            entry.sign_count = auth.sign_count;
            entry.last_used_at = Some(Utc::now());
            entry.clone()
        };
        self.store
            .write_json(self.store.paths().credential(&updated.id), &updated)?;

        Ok(VerifiedApproval {
            credential_id: updated.id,
            device_label: updated.device_label,
        })
    }

    /// Delete every credential and outstanding challenge. Returns how many
    /// credentials were removed.
    pub fn reset(&self) -> Result<usize> {
        let mut credentials = self.credentials.write().expect("credential map lock poisoned");
        for id in credentials.keys() {
            let path = self.store.paths().credential(id);
            if self.store.exists(&path) {
                self.store.delete(&path)?;
            }
        }
        let removed = credentials.len();
        credentials.clear();

        self.challenges
            .lock()
            .expect("challenge table lock poisoned")
            .clear();
        Ok(removed)
    }

    /// Drop expired challenges. Returns the eviction count.
    pub fn sweep_challenges_at(&self, now: DateTime<Utc>) -> usize {
        let mut challenges = self.challenges.lock().expect("challenge table lock poisoned");
        let before = challenges.len();
        challenges.retain(|_, c| now <= c.expires_at);
        before - challenges.len()
    }
}
