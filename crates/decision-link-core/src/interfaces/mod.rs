// crates/decision-link-core/src/interfaces/mod.rs
// ============================================================================
// Module: Decision Link Interfaces
// Description: Storage, clock, persistence, and delivery contracts.
// Purpose: Define the seams between the link engine and its collaborators.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! Interfaces decouple the engine from storage backends and from the external
//! collaborators that deliver mail and persist business effects.
//! Implementations must fail closed: an ambiguous answer is an error, never a
//! success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::ActionKind;
use crate::core::Decision;
use crate::core::SubjectId;
use crate::core::Timestamp;
use crate::core::TokenId;
use crate::core::TokenRecord;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time for hosts and long-running coordinators.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Token Store
// ============================================================================

/// Token store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient backend failure; the operation did not take effect and may
    /// be retried with backoff.
    #[error("token store unavailable: {0}")]
    Unavailable(String),
    /// Non-transient backend failure.
    #[error("token store error: {0}")]
    Store(String),
    /// Stored data failed integrity checks.
    #[error("token store corruption: {0}")]
    Corrupt(String),
    /// Input rejected before any write.
    #[error("token store invalid data: {0}")]
    Invalid(String),
    /// Write conflicted with an existing row.
    #[error("token store conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Returns true when the failure is transient.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Reasons a consume attempt did not transition the token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumeError {
    /// No token with this identifier exists.
    #[error("token not found")]
    NotFound,
    /// The token was already consumed.
    #[error("token already consumed")]
    AlreadyConsumed {
        /// Instant of the winning consumption.
        consumed_at: Option<Timestamp>,
    },
    /// The token reached its expiry before use.
    #[error("token expired")]
    Expired {
        /// Expiry instant.
        expires_at: Timestamp,
    },
    /// The token was superseded or revoked.
    #[error("token revoked")]
    Revoked {
        /// Revocation instant.
        revoked_at: Option<Timestamp>,
    },
    /// Storage failure; the outcome of the attempt is not a link verdict.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConsumeError {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyConsumed {
                ..
            } => "already_consumed",
            Self::Expired {
                ..
            } => "expired",
            Self::Revoked {
                ..
            } => "revoked",
            Self::Store(StoreError::Unavailable(_)) => "store_unavailable",
            Self::Store(_) => "store_error",
        }
    }
}

/// Result of a successful issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReceipt {
    /// Active token revoked by this issue, if any.
    pub revoked: Option<TokenId>,
}

/// Durable token lifecycle store.
///
/// # Invariants
/// - At most one `Active` row per `(subject_id, action_kind)` is ever visible.
/// - `try_consume` is a single conditional write; concurrent callers on the
///   same token observe exactly one success.
/// - Rows are never deleted.
pub trait TokenStore: Send + Sync {
    /// Revokes any active token for the record's subject and action, then
    /// inserts the record, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record is invalid or the write fails;
    /// on error no state changes.
    fn issue(&self, record: &TokenRecord) -> Result<IssueReceipt, StoreError>;

    /// Transitions the token from `Active` to `Consumed` if it is active and
    /// `now < expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumeError`] describing why the transition did not happen.
    fn try_consume(&self, token_id: &TokenId, now: Timestamp)
    -> Result<TokenRecord, ConsumeError>;

    /// Revokes the active token for a subject and action, if any. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn revoke(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
        now: Timestamp,
    ) -> Result<Option<TokenId>, StoreError>;

    /// Loads a token by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn load(&self, token_id: &TokenId) -> Result<Option<TokenRecord>, StoreError>;

    /// Loads the stored `Active` token for a subject and action, if any. The
    /// returned row may already be past its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn active_for(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
    ) -> Result<Option<TokenRecord>, StoreError>;
}

// ============================================================================
// SECTION: Persistence Collaborators
// ============================================================================

/// Errors reported by persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The collaborator refused the effect.
    #[error("collaborator rejected request: {0}")]
    Rejected(String),
    /// The collaborator could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Business-facing summary returned after a decision is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEffect {
    /// Display name of the subject.
    pub subject_name: String,
    /// Division or program the subject belongs to.
    pub division: Option<String>,
}

/// Writes the business effect of a consumed token.
pub trait DecisionSink: Send + Sync {
    /// Applies `decision` against the token's subject.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the effect could not be written.
    fn apply(&self, token: &TokenRecord, decision: &Decision) -> Result<AppliedEffect, SinkError>;
}

/// Receives authenticated webhook payloads for form processing.
pub trait FormEventSink: Send + Sync {
    /// Accepts a verified raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the payload could not be handed off.
    fn accept(&self, raw_body: &[u8], received_at: Timestamp) -> Result<(), SinkError>;
}

// ============================================================================
// SECTION: Delivery Collaborator
// ============================================================================

/// Delivery failures reported by a mailer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    /// Temporary failure; the same message may be retried.
    #[error("transient delivery failure: {0}")]
    Transient(String),
    /// Permanent failure; retrying will not help.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl MailError {
    /// Returns true when the failure may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Link delivery request handed to the mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkMessage {
    /// Recipient subject.
    pub subject_id: SubjectId,
    /// Action the link authorizes.
    pub action_kind: ActionKind,
    /// Token identifier (for correlation only).
    pub token_id: TokenId,
    /// Full link URL containing the bearer string.
    pub link: String,
    /// Link expiry.
    pub expires_at: Timestamp,
    /// Decision deadline communicated to the recipient.
    pub deadline: Timestamp,
}

/// Sends issued links to their recipients.
#[async_trait]
pub trait LinkMailer: Send + Sync {
    /// Delivers one link.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when delivery fails.
    async fn send(&self, message: &LinkMessage) -> Result<(), MailError>;
}
