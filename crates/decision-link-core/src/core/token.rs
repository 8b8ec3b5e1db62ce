// crates/decision-link-core/src/core/token.rs
// ============================================================================
// Module: Decision Link Token Model
// Description: Token records, lifecycle states, claims, and decisions.
// Purpose: Define the single-use capability and the actions it authorizes.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A token is a single-use capability bound to one subject and one action
//! kind. Stored tokens move from `Active` to exactly one terminal state and
//! are never deleted. `Expired` is never written; it is derived from the
//! current time by [`TokenRecord::effective_state`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::SubjectId;
use crate::core::identifiers::TokenId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Action Kind
// ============================================================================

/// Privileged action a token authorizes.
///
/// # Invariants
/// - Wire codes and labels are stable; they are embedded in bearer strings
///   and stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Record an enrollment decision for a prospective student.
    EnrollmentDecision,
    /// Attach a signed form document to a record.
    FormUpload,
}

impl ActionKind {
    /// Every action kind, in wire-code order.
    pub const ALL: [Self; 2] = [Self::EnrollmentDecision, Self::FormUpload];

    /// Returns the stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnrollmentDecision => "enrollment_decision",
            Self::FormUpload => "form_upload",
        }
    }

    /// Returns the one-byte wire code used inside bearer strings.
    #[must_use]
    pub const fn wire_code(self) -> u8 {
        match self {
            Self::EnrollmentDecision => 1,
            Self::FormUpload => 2,
        }
    }

    /// Parses a wire code.
    #[must_use]
    pub const fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::EnrollmentDecision),
            2 => Some(Self::FormUpload),
            _ => None,
        }
    }

    /// Returns the URL path segment for links of this kind.
    #[must_use]
    pub const fn link_path(self) -> &'static str {
        match self {
            Self::EnrollmentDecision => "secure-decision",
            Self::FormUpload => "secure-upload",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownLabel {
    /// Label family being parsed.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

impl FromStr for ActionKind {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "enrollment_decision" => Ok(Self::EnrollmentDecision),
            "form_upload" => Ok(Self::FormUpload),
            other => Err(UnknownLabel {
                kind: "action kind",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// SECTION: Token State
// ============================================================================

/// Token lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Issued and not yet used.
    Active,
    /// Used exactly once.
    Consumed,
    /// Past its expiry without being used (derived, never stored).
    Expired,
    /// Superseded or withdrawn administratively.
    Revoked,
}

impl TokenState {
    /// Returns the stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Consumed => "consumed",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Returns true for states that can never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenState {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "consumed" => Ok(Self::Consumed),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(UnknownLabel {
                kind: "token state",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// SECTION: Claims and Records
// ============================================================================

/// Fields authenticated by a bearer string's integrity tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token identifier.
    pub token_id: TokenId,
    /// Subject the action applies to.
    pub subject_id: SubjectId,
    /// Authorized action.
    pub action_kind: ActionKind,
    /// Expiry instant (exclusive).
    pub expires_at: Timestamp,
}

/// Stored token row.
///
/// # Invariants
/// - `expires_at > issued_at`.
/// - `consumed_at` is `Some` iff `state == Consumed`.
/// - `revoked_at` is `Some` iff `state == Revoked`.
/// - `state` is never `Expired` in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token identifier.
    pub token_id: TokenId,
    /// Subject the action applies to.
    pub subject_id: SubjectId,
    /// Authorized action.
    pub action_kind: ActionKind,
    /// Issue instant.
    pub issued_at: Timestamp,
    /// Expiry instant (exclusive).
    pub expires_at: Timestamp,
    /// Stored lifecycle state.
    pub state: TokenState,
    /// Consumption instant.
    pub consumed_at: Option<Timestamp>,
    /// Revocation instant.
    pub revoked_at: Option<Timestamp>,
    /// SHA-256 (hex) of the bearer integrity tag.
    pub payload_digest: String,
}

impl TokenRecord {
    /// Returns the state as observed at `now`, deriving `Expired`.
    #[must_use]
    pub fn effective_state(&self, now: Timestamp) -> TokenState {
        if self.state == TokenState::Active && now >= self.expires_at {
            TokenState::Expired
        } else {
            self.state
        }
    }

    /// Returns true when the record was issued for exactly these claims.
    #[must_use]
    pub fn matches_claims(&self, claims: &TokenClaims) -> bool {
        self.token_id == claims.token_id
            && self.subject_id == claims.subject_id
            && self.action_kind == claims.action_kind
            && self.expires_at == claims.expires_at
    }

    /// Checks the structural invariants of a record about to be stored.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate_new(&self) -> Result<(), String> {
        if self.state != TokenState::Active {
            return Err(format!("new token must be active, got {}", self.state));
        }
        if self.expires_at <= self.issued_at {
            return Err("expires_at must be after issued_at".to_string());
        }
        if self.consumed_at.is_some() || self.revoked_at.is_some() {
            return Err("new token must not carry terminal timestamps".to_string());
        }
        if self.payload_digest.is_empty() {
            return Err("payload_digest must be non-empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Enrollment decision recorded through a decision link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentChoice {
    /// The student accepts the offer.
    Enrolled,
    /// The student declines the offer.
    Declined,
    /// The student defers to a later intake.
    Deferred,
}

impl EnrollmentChoice {
    /// Returns the display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enrolled => "Enrolled",
            Self::Declined => "Declined",
            Self::Deferred => "Deferred",
        }
    }
}

impl fmt::Display for EnrollmentChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentChoice {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enrolled" => Ok(Self::Enrolled),
            "declined" => Ok(Self::Declined),
            "deferred" => Ok(Self::Deferred),
            _ => Err(UnknownLabel {
                kind: "enrollment decision",
                value: value.to_string(),
            }),
        }
    }
}

/// Signed form document submitted through an upload link.
#[derive(Clone, PartialEq, Eq)]
pub struct FormDocument {
    /// Client-supplied file name, if any.
    pub filename: Option<String>,
    /// Raw document bytes.
    pub content: Vec<u8>,
}

impl fmt::Debug for FormDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormDocument")
            .field("filename", &self.filename)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Business effect requested by the holder of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Record an enrollment decision.
    Enrollment(EnrollmentChoice),
    /// Attach a signed form.
    FormUpload(FormDocument),
}

impl Decision {
    /// Returns the action kind this decision requires.
    #[must_use]
    pub const fn action_kind(&self) -> ActionKind {
        match self {
            Self::Enrollment(_) => ActionKind::EnrollmentDecision,
            Self::FormUpload(_) => ActionKind::FormUpload,
        }
    }

    /// Returns a short, non-sensitive label for audit and confirmation views.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Enrollment(choice) => choice.as_str().to_string(),
            Self::FormUpload(document) => {
                document.filename.clone().unwrap_or_else(|| "signed form".to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
