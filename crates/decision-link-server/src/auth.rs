// crates/decision-link-server/src/auth.rs
// ============================================================================
// Module: Admin Authentication
// Description: Bearer-token authentication for the bulk-send API.
// Purpose: Fail-closed admin checks with constant-time token comparison.
// Dependencies: decision-link-config, thiserror
// ============================================================================

//! ## Overview
//! Link routes are authorized by the link itself. Only the admin API needs a
//! caller credential: an `Authorization: Bearer <token>` header matched in
//! constant time against the configured admin tokens. Callers are identified
//! downstream by token fingerprint only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use decision_link_config::AdminToken;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authenticated admin caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCaller {
    /// Fingerprint of the matching admin token.
    pub fingerprint: String,
}

/// Admin authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No authorization header.
    #[error("missing authorization")]
    Missing,
    /// Header present but not a usable bearer token.
    #[error("invalid authorization header")]
    Malformed,
    /// Token did not match any admin token.
    #[error("invalid bearer token")]
    Rejected,
}

impl AuthError {
    /// Returns a stable audit label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Missing => "missing_authorization",
            Self::Malformed => "malformed_authorization",
            Self::Rejected => "invalid_token",
        }
    }
}

// ============================================================================
// SECTION: Authentication
// ============================================================================

/// Authenticates an admin request from its authorization header.
///
/// Every configured token is compared so the time taken does not depend on
/// which one matched.
///
/// # Errors
///
/// Returns [`AuthError`] when the header is missing, malformed, or unknown.
pub fn authorize_admin(
    tokens: &[AdminToken],
    auth_header: Option<&str>,
) -> Result<AdminCaller, AuthError> {
    let presented = parse_bearer_token(auth_header)?;
    let mut matched = None;
    for token in tokens {
        if token.matches(presented) && matched.is_none() {
            matched = Some(token.fingerprint());
        }
    }
    matched
        .map(|fingerprint| AdminCaller {
            fingerprint,
        })
        .ok_or(AuthError::Rejected)
}

/// Extracts the token from a `Bearer` authorization header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header.ok_or(AuthError::Missing)?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Malformed);
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(token)
}
