// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vault Approval Server contributors

//! Input validation and dangerous-pattern scanning.
//!
//! Target and key names are restricted to a conservative character set so
//! they can never smuggle path traversal or shell metacharacters into the
//! backing store. Values are scanned for injection-looking patterns; hits
//! do not reject the operation, they become warnings rendered on the human
//! approval page.

use crate::error::{Error, Result};

const MAX_TARGET_LEN: usize = 64;
const MAX_KEY_LEN: usize = 128;

/// Patterns in a secret value that warrant a human warning.
const DANGEROUS_PATTERNS: &[(&str, &str)] = &[
    ("$(", "command substitution: $(...)"),
    ("`", "backticks (command execution)"),
    ("${", "variable expansion: ${...}"),
    ("&&", "command chaining: &&"),
    ("||", "command chaining: ||"),
    (";", "command separator: ;"),
    ("\n", "newline character"),
    ("\r", "carriage return"),
];

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Validate a target (service namespace) name.
pub fn validate_target(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::ValidationFailed("target name cannot be empty".into()));
    }
    if name.len() > MAX_TARGET_LEN {
        return Err(Error::ValidationFailed(format!(
            "target name too long (max {MAX_TARGET_LEN} characters)"
        )));
    }
    if !name.chars().all(is_name_char) {
        return Err(Error::ValidationFailed(
            "target name must contain only letters, numbers, dash, and underscore".into(),
        ));
    }
    Ok(())
}

/// Validate a secret key name.
pub fn validate_key(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::ValidationFailed("key name cannot be empty".into()));
    }
    if name.len() > MAX_KEY_LEN {
        return Err(Error::ValidationFailed(format!(
            "key name too long (max {MAX_KEY_LEN} characters)"
        )));
    }
    if !name.chars().all(is_name_char) {
        return Err(Error::ValidationFailed(format!(
            "key '{name}' must contain only letters, numbers, dash, and underscore"
        )));
    }
    Ok(())
}

/// Enforce the configured per-value byte limit.
pub fn validate_value_size(value: &str, limit: usize) -> Result<()> {
    if value.len() > limit {
        return Err(Error::ValueTooLarge { limit });
    }
    Ok(())
}

/// Scan a value for injection-looking patterns. Returns warning strings.
pub fn scan_dangerous_patterns(value: &str) -> Vec<String> {
    DANGEROUS_PATTERNS
        .iter()
        .filter(|(needle, _)| value.contains(needle))
        .map(|(_, description)| description.to_string())
        .collect()
}
