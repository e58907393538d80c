// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Session-scoped secret tokenization.
//!
//! The tokenizer replaces plaintext secret values with opaque
//! `@token-<hex32>` strings before anything crosses into an AI-visible
//! context. Tokens resolve only within the session that minted them and
//! only until the session TTL; the mapping lives in memory and is never
//! persisted or logged.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Prefix that makes tokens recognizable in text blobs.
pub const TOKEN_PREFIX: &str = "@token-";

/// Length of the hex portion of a token (uuid v4 simple form, 128 bits).
const TOKEN_HEX_LEN: usize = 32;

#[derive(Debug, Clone)]
struct TokenEntry {
    value: String,
    session_id: String,
    expires_at: DateTime<Utc>,
}

/// Aggregate counters for a session, safe to show to any caller.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionStats {
    pub live_tokens: usize,
    pub expired_tokens: usize,
}

/// Owns the token table. One instance per process, shared via `Arc`.
#[derive(Debug)]
pub struct Tokenizer {
    tokens: Mutex<HashMap<String, TokenEntry>>,
    ttl: Duration,
    max_value_bytes: usize,
}

impl Tokenizer {
    pub fn new(ttl: Duration, max_value_bytes: usize) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            ttl,
            max_value_bytes,
        }
    }

    /// Mint a fresh token for `value` within `session_id`.
    ///
    /// A new token is minted on every call, even for a value already seen
    /// in the session. Fails with `ValueTooLarge` above the configured
    /// byte limit; no token is created in that case.
    pub fn tokenize(&self, session_id: &str, value: &str) -> Result<String> {
        if value.len() > self.max_value_bytes {
            return Err(Error::ValueTooLarge {
                limit: self.max_value_bytes,
            });
        }

        let token = format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple());
        let entry = TokenEntry {
            value: value.to_string(),
            session_id: session_id.to_string(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero()),
        };

        let mut tokens = self.tokens.lock().expect("token table lock poisoned");
        tokens.insert(token.clone(), entry);
        Ok(token)
    }

    /// Resolve a token back to its plaintext value.
    pub fn detokenize(&self, session_id: &str, token: &str) -> Result<String> {
        self.detokenize_at(session_id, token, Utc::now())
    }

    fn detokenize_at(
        &self,
        session_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let tokens = self.tokens.lock().expect("token table lock poisoned");
        let entry = tokens.get(token).ok_or(Error::UnknownToken)?;
        if entry.session_id != session_id || now > entry.expires_at {
            return Err(Error::UnknownToken);
        }
        Ok(entry.value.clone())
    }

    /// Replace every resolvable `@token-<hex32>` occurrence in `text`.
    ///
    /// Unknown or foreign-session tokens are left untouched so the caller
    /// can see exactly what failed to resolve. Used by the tool layer when
    /// rendering `.env`-style files.
    pub fn detokenize_text(&self, session_id: &str, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(TOKEN_PREFIX) {
            let (before, candidate) = rest.split_at(start);
            out.push_str(before);

            let hex_end = TOKEN_PREFIX.len() + TOKEN_HEX_LEN;
            let token_len = candidate
                .get(TOKEN_PREFIX.len()..hex_end)
                .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
                .map(|_| hex_end);

            match token_len {
                Some(len) => {
                    let token = &candidate[..len];
                    match self.detokenize(session_id, token) {
                        Ok(value) => out.push_str(&value),
                        Err(_) => out.push_str(token),
                    }
                    rest = &candidate[len..];
                }
                None => {
                    out.push_str(TOKEN_PREFIX);
                    rest = &candidate[TOKEN_PREFIX.len()..];
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Counters for a session; never exposes values or token strings.
    pub fn stats(&self, session_id: &str) -> SessionStats {
        let now = Utc::now();
        let tokens = self.tokens.lock().expect("token table lock poisoned");
        let mut stats = SessionStats {
            live_tokens: 0,
            expired_tokens: 0,
        };
        for entry in tokens.values().filter(|e| e.session_id == session_id) {
            if now > entry.expires_at {
                stats.expired_tokens += 1;
            } else {
                stats.live_tokens += 1;
            }
        }
        stats
    }

    /// Evict every token past its expiry. Returns the eviction count.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.lock().expect("token table lock poisoned");
        let before = tokens.len();
        tokens.retain(|_, entry| now <= entry.expires_at);
        before - tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(Duration::from_secs(7200), 8192)
    }

    #[test]
    fn round_trip_within_session() {
        let t = tokenizer();
        let token = t.tokenize("sess-1", "sk-supersecret").unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(t.detokenize("sess-1", &token).unwrap(), "sk-supersecret");
    }

    #[test]
    fn fresh_token_per_call() {
        let t = tokenizer();
        let a = t.tokenize("sess-1", "same-value").unwrap();
        let b = t.tokenize("sess-1", "same-value").unwrap();
        assert_ne!(a, b);
        assert_eq!(t.detokenize("sess-1", &a).unwrap(), "same-value");
        assert_eq!(t.detokenize("sess-1", &b).unwrap(), "same-value");
    }

    #[test]
    fn cross_session_detokenize_fails() {
        let t = tokenizer();
        let token = t.tokenize("sess-1", "secret").unwrap();
        let err = t.detokenize("sess-2", &token).unwrap_err();
        assert!(matches!(err, Error::UnknownToken));
    }

    #[test]
    fn unknown_token_fails() {
        let t = tokenizer();
        let err = t
            .detokenize("sess-1", "@token-00000000000000000000000000000000")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownToken));
    }

    #[test]
    fn oversized_value_rejected_without_minting() {
        let t = Tokenizer::new(Duration::from_secs(60), 8);
        let err = t.tokenize("sess-1", "way-too-long-value").unwrap_err();
        assert!(matches!(err, Error::ValueTooLarge { limit: 8 }));
        assert_eq!(t.stats("sess-1").live_tokens, 0);
    }

    #[test]
    fn expired_token_fails_and_sweeps() {
        let t = tokenizer();
        let token = t.tokenize("sess-1", "secret").unwrap();

        let later = Utc::now() + chrono::Duration::hours(3);
        let err = t.detokenize_at("sess-1", &token, later).unwrap_err();
        assert!(matches!(err, Error::UnknownToken));

        assert_eq!(t.sweep_expired_at(later), 1);
        assert_eq!(t.stats("sess-1").live_tokens, 0);
    }

    #[test]
    fn detokenize_text_replaces_known_tokens_only() {
        let t = tokenizer();
        let token = t.tokenize("sess-1", "hunter2").unwrap();
        let text = format!(
            "DB_PASSWORD={token}\nOTHER=@token-ffffffffffffffffffffffffffffffff\nPLAIN=1\n"
        );

        let rendered = t.detokenize_text("sess-1", &text);
        assert!(rendered.contains("DB_PASSWORD=hunter2"));
        assert!(rendered.contains("OTHER=@token-ffffffffffffffffffffffffffffffff"));
        assert!(rendered.contains("PLAIN=1"));
    }

    #[test]
    fn detokenize_text_ignores_malformed_prefix() {
        let t = tokenizer();
        let text = "note: @token-zzz is not a token";
        assert_eq!(t.detokenize_text("sess-1", text), text);
    }
}
