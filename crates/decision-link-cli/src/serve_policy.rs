// crates/decision-link-cli/src/serve_policy.rs
// ============================================================================
// Module: Serve Policy
// Description: Network exposure policy checks for the CLI server launcher.
// Purpose: Enforce safe-by-default bind behavior with explicit opt-in.
// Dependencies: decision-link-config, thiserror
// ============================================================================

//! ## Overview
//! Provides safety checks for binding the link server to non-loopback
//! addresses. The policy is fail-closed: explicit opt-in is required, and
//! published links must use `https` before network exposure is allowed,
//! since every link carries a bearer credential.

use std::env;
use std::net::SocketAddr;

use decision_link_config::DecisionLinkConfig;
use thiserror::Error;

/// Environment variable enabling non-loopback server binds.
pub const ALLOW_NON_LOOPBACK_ENV: &str = "DECISION_LINK_ALLOW_NON_LOOPBACK";

/// Bind outcome metadata for startup warnings.
#[derive(Debug, Clone)]
pub struct BindOutcome {
    /// Listen address.
    pub bind_addr: SocketAddr,
    /// True when the server is bound to a non-loopback address.
    pub network_exposed: bool,
    /// Whether audit logging is enabled.
    pub audit_enabled: bool,
}

/// Serve policy failures for bind safety.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServePolicyError {
    /// Environment variable was set to an invalid value.
    #[error("invalid {} value '{value}' (expected true/false)", ALLOW_NON_LOOPBACK_ENV)]
    InvalidEnv {
        /// Raw environment value.
        value: String,
    },
    /// Bind string failed to parse.
    #[error("invalid bind address: {error}")]
    InvalidBind {
        /// Parse error message.
        error: String,
    },
    /// Public base URL failed to parse.
    #[error("invalid public base url: {error}")]
    InvalidBaseUrl {
        /// Parse error message.
        error: String,
    },
    /// Non-loopback binding requires explicit opt-in.
    #[error(
        "refusing non-loopback bind {bind}; pass --allow-non-loopback or set {}=1",
        ALLOW_NON_LOOPBACK_ENV
    )]
    NonLoopbackOptInRequired {
        /// Bind address.
        bind: SocketAddr,
    },
    /// Non-loopback binding requires https links.
    #[error("non-loopback bind {bind} requires an https server.public_base_url")]
    NonLoopbackHttpsRequired {
        /// Bind address.
        bind: SocketAddr,
    },
}

/// Resolves the non-loopback opt-in flag from CLI and environment.
///
/// # Errors
/// Returns [`ServePolicyError::InvalidEnv`] when the environment value is invalid.
pub fn resolve_allow_non_loopback(flag: bool) -> Result<bool, ServePolicyError> {
    if flag {
        return Ok(true);
    }
    let Some(value) = env::var_os(ALLOW_NON_LOOPBACK_ENV) else {
        return Ok(false);
    };
    parse_allow_non_loopback_value(&value.to_string_lossy())
}

/// Enforces local-only binding for the link server.
///
/// # Errors
/// Returns [`ServePolicyError`] when configuration violates exposure requirements.
pub fn enforce_local_only(
    config: &DecisionLinkConfig,
    allow_non_loopback: bool,
) -> Result<BindOutcome, ServePolicyError> {
    let bind_addr = config.server.bind_addr().map_err(|err| ServePolicyError::InvalidBind {
        error: err.to_string(),
    })?;
    let audit_enabled = config.server.audit.enabled;
    if bind_addr.ip().is_loopback() {
        return Ok(BindOutcome {
            bind_addr,
            network_exposed: false,
            audit_enabled,
        });
    }
    if !allow_non_loopback {
        return Err(ServePolicyError::NonLoopbackOptInRequired {
            bind: bind_addr,
        });
    }
    let base = config.server.public_base().map_err(|err| ServePolicyError::InvalidBaseUrl {
        error: err.to_string(),
    })?;
    if base.scheme() != "https" {
        return Err(ServePolicyError::NonLoopbackHttpsRequired {
            bind: bind_addr,
        });
    }
    Ok(BindOutcome {
        bind_addr,
        network_exposed: true,
        audit_enabled,
    })
}

/// Parses a bool-ish string (true/false/1/0/yes/no/on/off).
fn parse_boolish(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parses an env value for allow-non-loopback.
fn parse_allow_non_loopback_value(value: &str) -> Result<bool, ServePolicyError> {
    parse_boolish(value).ok_or_else(|| ServePolicyError::InvalidEnv {
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        reason = "Test helpers use expect/expect_err for concise failure messages."
    )]

    use decision_link_config::DecisionLinkConfig;

    use super::ServePolicyError;
    use super::enforce_local_only;
    use super::parse_allow_non_loopback_value;

    fn config(contents: &str) -> DecisionLinkConfig {
        DecisionLinkConfig::from_toml(contents).expect("parse config")
    }

    #[test]
    fn loopback_bind_is_allowed() {
        let outcome =
            enforce_local_only(&DecisionLinkConfig::default(), false).expect("loopback bind");
        assert!(!outcome.network_exposed);
        assert!(outcome.audit_enabled);
    }

    #[test]
    fn non_loopback_requires_opt_in() {
        let config = config(
            r#"
[server]
bind = "0.0.0.0:8080"
public_base_url = "https://links.example.edu"
"#,
        );
        let err = enforce_local_only(&config, false).expect_err("expected opt-in error");
        assert!(matches!(err, ServePolicyError::NonLoopbackOptInRequired { .. }));
    }

    #[test]
    fn non_loopback_requires_https_links() {
        let config = config(
            r#"
[server]
bind = "0.0.0.0:8080"
public_base_url = "http://links.example.edu"
"#,
        );
        let err = enforce_local_only(&config, true).expect_err("expected https error");
        assert!(matches!(err, ServePolicyError::NonLoopbackHttpsRequired { .. }));
    }

    #[test]
    fn https_check_uses_parsed_scheme() {
        let mut config = config(
            r#"
[server]
bind = "0.0.0.0:8080"
public_base_url = "HTTPS://links.example.edu"
"#,
        );
        let outcome = enforce_local_only(&config, true).expect("uppercase scheme is https");
        assert!(outcome.network_exposed);

        config.server.public_base_url = "https//links.example.edu".to_string();
        let err = enforce_local_only(&config, true).expect_err("expected url error");
        assert!(matches!(err, ServePolicyError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn non_loopback_allows_https_with_opt_in() {
        let config = config(
            r#"
[server]
bind = "0.0.0.0:8080"
public_base_url = "https://links.example.edu"
"#,
        );
        let outcome = enforce_local_only(&config, true).expect("expected success");
        assert!(outcome.network_exposed);
    }

    #[test]
    fn parse_allow_non_loopback_accepts_true() {
        let result = parse_allow_non_loopback_value("true").expect("parse env");
        assert!(result);
        assert!(!parse_allow_non_loopback_value(" OFF ").expect("parse env"));
    }

    #[test]
    fn parse_allow_non_loopback_rejects_invalid() {
        let err = parse_allow_non_loopback_value("maybe").expect_err("expected invalid env");
        assert!(matches!(err, ServePolicyError::InvalidEnv { .. }));
    }
}
