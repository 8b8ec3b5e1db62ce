// crates/decision-link-config/src/secrets.rs
// ============================================================================
// Module: Secret Resolution
// Description: Resolves signing, webhook, and admin secrets from the
//              environment.
// Purpose: Keep secret material out of config files and out of logs.
// Dependencies: decision-link-core
// ============================================================================

//! ## Overview
//! The config file only names environment variables. This module reads them
//! once at startup and wraps the values in types whose `Debug` output is
//! redacted. Admin tokens are compared in constant time and identified in
//! audit records by a SHA-256 fingerprint prefix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;

use decision_link_core::SigningKey;
use decision_link_core::WebhookSecret;
use decision_link_core::hashing::constant_time_eq_str;
use decision_link_core::hashing::sha256_hex;

use crate::config::ConfigError;
use crate::config::DecisionLinkConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum admin token length in bytes.
pub const MIN_ADMIN_TOKEN_BYTES: usize = 16;
/// Maximum admin tokens accepted from one variable.
const MAX_ADMIN_TOKENS: usize = 32;
/// Hex characters kept in an admin token fingerprint.
const FINGERPRINT_CHARS: usize = 16;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Admin bearer token for the bulk-send API.
#[derive(Clone)]
pub struct AdminToken(String);

impl AdminToken {
    /// Wraps a token value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the token is too short.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.len() < MIN_ADMIN_TOKEN_BYTES {
            return Err(ConfigError::Invalid(format!(
                "admin tokens must be at least {MIN_ADMIN_TOKEN_BYTES} bytes"
            )));
        }
        Ok(Self(value))
    }

    /// Compares a presented token in constant time.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq_str(&self.0, presented)
    }

    /// Returns a short, non-reversible identifier for audit records.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut digest = sha256_hex(self.0.as_bytes());
        digest.truncate(FINGERPRINT_CHARS);
        digest
    }
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdminToken({})", self.fingerprint())
    }
}

/// Secrets resolved for a running server.
#[derive(Debug, Clone)]
pub struct ResolvedSecrets {
    /// Link signing key.
    pub signing_key: SigningKey,
    /// Webhook shared secret.
    pub webhook_secret: WebhookSecret,
    /// Accepted admin tokens.
    pub admin_tokens: Vec<AdminToken>,
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

impl DecisionLinkConfig {
    /// Resolves secrets from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is missing or weak.
    pub fn resolve_secrets(&self) -> Result<ResolvedSecrets, ConfigError> {
        self.resolve_secrets_with(|name| env::var(name).ok())
    }

    /// Resolves secrets through a caller-supplied lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is missing or weak.
    pub fn resolve_secrets_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedSecrets, ConfigError> {
        Ok(ResolvedSecrets {
            signing_key: self.resolve_signing_key_with(&lookup)?,
            webhook_secret: resolve_webhook_secret(&self.webhook.secret_env, &lookup)?,
            admin_tokens: resolve_admin_tokens(&self.server.admin_token_env, &lookup)?,
        })
    }

    /// Resolves only the signing key, for offline tooling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the variable is missing or weak.
    pub fn resolve_signing_key_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<SigningKey, ConfigError> {
        let name = &self.tokens.signing_key_env;
        let value = required(name, &lookup)?;
        SigningKey::new(value.into_bytes())
            .map_err(|err| ConfigError::Invalid(format!("{name}: {err}")))
    }

    /// Resolves only the webhook secret, for offline tooling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the variable is missing or weak.
    pub fn resolve_webhook_secret_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<WebhookSecret, ConfigError> {
        resolve_webhook_secret(&self.webhook.secret_env, &lookup)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a required, non-empty variable.
fn required(name: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Invalid(format!("{name} is not set"))),
    }
}

/// Resolves the webhook secret.
fn resolve_webhook_secret(
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<WebhookSecret, ConfigError> {
    let value = required(name, lookup)?;
    WebhookSecret::new(value.into_bytes())
        .map_err(|err| ConfigError::Invalid(format!("{name}: {err}")))
}

/// Resolves the comma-separated admin token list.
fn resolve_admin_tokens(
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Vec<AdminToken>, ConfigError> {
    let value = required(name, lookup)?;
    let tokens = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(AdminToken::new)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ConfigError::Invalid(format!("{name}: {err}")))?;
    if tokens.is_empty() {
        return Err(ConfigError::Invalid(format!("{name} is not set")));
    }
    if tokens.len() > MAX_ADMIN_TOKENS {
        return Err(ConfigError::Invalid(format!(
            "{name} lists more than {MAX_ADMIN_TOKENS} tokens"
        )));
    }
    Ok(tokens)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn admin_token_debug_shows_only_fingerprint() {
        let token = AdminToken::new("admin-token-0123456789").unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("admin-token-0123456789"));
        assert!(debug.contains(&token.fingerprint()));
        assert_eq!(token.fingerprint().len(), FINGERPRINT_CHARS);
    }

    #[test]
    fn admin_token_matches_exact_value_only() {
        let token = AdminToken::new("admin-token-0123456789").unwrap();
        assert!(token.matches("admin-token-0123456789"));
        assert!(!token.matches("admin-token-012345678"));
        assert!(!token.matches(""));
    }
}
