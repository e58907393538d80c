// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! WebAuthn assertion verification primitives.
//!
//! The pieces of a `navigator.credentials.get()` response are checked
//! here: the collected client data (ceremony type, challenge echo,
//! origin), the authenticator data (RP ID hash, presence flags, sign
//! counter), and the ES256 signature over
//! `authenticatorData || SHA-256(clientDataJSON)`.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Ceremony type for `navigator.credentials.get()`.
pub const CEREMONY_GET: &str = "webauthn.get";
/// Ceremony type for `navigator.credentials.create()`.
pub const CEREMONY_CREATE: &str = "webauthn.create";

const FLAG_USER_PRESENT: u8 = 1 << 0;
const FLAG_USER_VERIFIED: u8 = 1 << 2;

/// The browser-built `clientDataJSON` payload.
#[derive(Debug, Deserialize)]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub ceremony: String,
    /// Base64url (unpadded) echo of the server-issued challenge.
    pub challenge: String,
    pub origin: String,
}

/// Parse `clientDataJSON` and check ceremony type and origin.
///
/// The challenge echo is returned to the caller, which owns the
/// single-use challenge table.
pub fn parse_client_data(
    client_data_json: &[u8],
    expected_ceremony: &str,
    expected_origin: &str,
) -> Result<CollectedClientData> {
    let data: CollectedClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| Error::ValidationFailed(format!("malformed clientDataJSON: {e}")))?;
    if data.ceremony != expected_ceremony {
        return Err(Error::SignatureInvalid);
    }
    if data.origin != expected_origin {
        return Err(Error::OriginMismatch);
    }
    Ok(data)
}

/// Parsed fields of the authenticator data blob.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatorData {
    pub user_verified: bool,
    pub sign_count: u32,
}

/// Parse authenticator data and check it against the configured RP ID.
///
/// The first 32 bytes are `SHA-256(rp_id)`; a mismatch means the
/// assertion was produced for a different relying party. The user-present
/// flag is mandatory.
pub fn parse_authenticator_data(bytes: &[u8], rp_id: &str) -> Result<AuthenticatorData> {
    if bytes.len() < 37 {
        return Err(Error::ValidationFailed(
            "authenticator data too short".into(),
        ));
    }

    let rp_id_hash = Sha256::digest(rp_id.as_bytes());
    if bytes[..32] != rp_id_hash[..] {
        return Err(Error::OriginMismatch);
    }

    let flags = bytes[32];
    if flags & FLAG_USER_PRESENT == 0 {
        return Err(Error::SignatureInvalid);
    }

    let mut counter = [0u8; 4];
    counter.copy_from_slice(&bytes[33..37]);

    Ok(AuthenticatorData {
        user_verified: flags & FLAG_USER_VERIFIED != 0,
        sign_count: u32::from_be_bytes(counter),
    })
}

/// Verify the ES256 signature over `authenticatorData || SHA-256(clientDataJSON)`.
pub fn verify_signature(
    public_key_sec1: &[u8],
    authenticator_data: &[u8],
    client_data_json: &[u8],
    signature_der: &[u8],
) -> Result<()> {
    let key =
        VerifyingKey::from_sec1_bytes(public_key_sec1).map_err(|_| Error::SignatureInvalid)?;
    let signature = Signature::from_der(signature_der).map_err(|_| Error::SignatureInvalid)?;

    let client_data_hash = Sha256::digest(client_data_json);
    let mut message = Vec::with_capacity(authenticator_data.len() + client_data_hash.len());
    message.extend_from_slice(authenticator_data);
    message.extend_from_slice(&client_data_hash);

    key.verify(&message, &signature)
        .map_err(|_| Error::SignatureInvalid)
}
