// crates/decision-link-core/src/runtime/recorder.rs
// ============================================================================
// Module: Decision Recorder
// Description: Exactly-once application of link-authorized decisions.
// Purpose: Consume the token first, then write the business effect.
// Dependencies: crate::core, crate::interfaces, crate::runtime::codec
// ============================================================================

//! ## Overview
//! [`DecisionRecorder::apply`] authenticates the bearer string, consumes the
//! token through the store's conditional write, and only the winner of that
//! write reaches the [`DecisionSink`]. If the sink fails after the consume,
//! the token stays consumed and the outcome is reported as
//! [`ApplyOutcome::ConsumedButUnapplied`] so an operator can reconcile it.
//! The same token is never retried.
//!
//! Storage failures surface as [`ApplyError::Unavailable`] and are never
//! reported as an invalid or used link.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::ActionKind;
use crate::core::Decision;
use crate::core::SubjectId;
use crate::core::Timestamp;
use crate::core::TokenClaims;
use crate::core::TokenId;
use crate::core::TokenRecord;
use crate::core::TokenState;
use crate::interfaces::AppliedEffect;
use crate::interfaces::ConsumeError;
use crate::interfaces::DecisionSink;
use crate::interfaces::SinkError;
use crate::interfaces::StoreError;
use crate::interfaces::TokenStore;
use crate::runtime::codec::TokenCodec;
use crate::runtime::store::SharedTokenStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// User-visible link failures.
///
/// # Invariants
/// - `InvalidLink`, `LinkAlreadyUsed`, `LinkExpired`, and `Unavailable` stay
///   distinct all the way to the HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Malformed, forged, unknown, or wrong-route link.
    #[error("invalid link ({reason})")]
    InvalidLink {
        /// Internal reason label for audit.
        reason: &'static str,
    },
    /// The link was already used.
    #[error("link already used")]
    LinkAlreadyUsed {
        /// Authenticated token identifier.
        token_id: TokenId,
        /// When the link was used.
        consumed_at: Option<Timestamp>,
    },
    /// The link expired or was superseded by a newer one.
    #[error("link expired ({reason})")]
    LinkExpired {
        /// Authenticated token identifier.
        token_id: TokenId,
        /// Internal reason label for audit (`expired` or `revoked`).
        reason: &'static str,
    },
    /// Storage is temporarily unavailable; nothing was consumed.
    #[error("link service unavailable: {detail}")]
    Unavailable {
        /// Backend detail for audit; not shown to users.
        detail: String,
    },
}

impl ApplyError {
    /// Returns the stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidLink {
                ..
            } => "invalid_link",
            Self::LinkAlreadyUsed {
                ..
            } => "link_already_used",
            Self::LinkExpired {
                ..
            } => "link_expired",
            Self::Unavailable {
                ..
            } => "unavailable",
        }
    }

    /// Returns the user-facing message for this failure.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::InvalidLink {
                ..
            } => "This link is not valid.",
            Self::LinkAlreadyUsed {
                ..
            } => "This link has already been used.",
            Self::LinkExpired {
                ..
            } => "This link has expired. Please request a new one.",
            Self::Unavailable {
                ..
            } => "The service is temporarily unavailable. Please try again shortly.",
        }
    }

    /// Returns the internal reason label for audit events.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidLink {
                reason,
            }
            | Self::LinkExpired {
                reason, ..
            } => reason,
            Self::LinkAlreadyUsed {
                ..
            } => "already_consumed",
            Self::Unavailable {
                ..
            } => "store_unavailable",
        }
    }
}

impl From<StoreError> for ApplyError {
    fn from(error: StoreError) -> Self {
        Self::Unavailable {
            detail: error.to_string(),
        }
    }
}

impl ApplyError {
    /// Returns the token identifier when the link authenticated before
    /// failing.
    #[must_use]
    pub const fn token_id(&self) -> Option<&TokenId> {
        match self {
            Self::LinkAlreadyUsed {
                token_id, ..
            }
            | Self::LinkExpired {
                token_id, ..
            } => Some(token_id),
            Self::InvalidLink {
                ..
            }
            | Self::Unavailable {
                ..
            } => None,
        }
    }

    /// Classifies a consume failure for an authenticated token.
    fn from_consume(token_id: &TokenId, error: ConsumeError) -> Self {
        match error {
            ConsumeError::NotFound => Self::InvalidLink {
                reason: "not_found",
            },
            ConsumeError::AlreadyConsumed {
                consumed_at,
            } => Self::LinkAlreadyUsed {
                token_id: token_id.clone(),
                consumed_at,
            },
            ConsumeError::Expired {
                ..
            } => Self::LinkExpired {
                token_id: token_id.clone(),
                reason: "expired",
            },
            ConsumeError::Revoked {
                ..
            } => Self::LinkExpired {
                token_id: token_id.clone(),
                reason: "revoked",
            },
            ConsumeError::Store(err) => err.into(),
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of a successful consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Token consumed and the effect written.
    Applied {
        /// Consumed token row.
        token: TokenRecord,
        /// Business summary from the sink.
        effect: AppliedEffect,
        /// Non-sensitive decision label.
        decision: String,
    },
    /// Token consumed but the effect could not be written; needs manual
    /// reconciliation.
    ConsumedButUnapplied {
        /// Consumed token row.
        token: TokenRecord,
        /// Non-sensitive decision label.
        decision: String,
        /// Sink failure.
        error: SinkError,
    },
}

impl ApplyOutcome {
    /// Returns the consumed token row.
    #[must_use]
    pub const fn token(&self) -> &TokenRecord {
        match self {
            Self::Applied {
                token, ..
            }
            | Self::ConsumedButUnapplied {
                token, ..
            } => token,
        }
    }
}

/// Read-only view of a still-usable link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPreview {
    /// Token identifier.
    pub token_id: TokenId,
    /// Subject the link acts on.
    pub subject_id: SubjectId,
    /// Authorized action.
    pub action_kind: ActionKind,
    /// Expiry instant.
    pub expires_at: Timestamp,
}

// ============================================================================
// SECTION: Recorder
// ============================================================================

/// Applies link-authorized decisions exactly once.
#[derive(Clone)]
pub struct DecisionRecorder {
    /// Credential codec.
    codec: TokenCodec,
    /// Token store.
    store: SharedTokenStore,
    /// Persistence collaborator.
    sink: Arc<dyn DecisionSink>,
}

impl DecisionRecorder {
    /// Creates a recorder.
    #[must_use]
    pub fn new(codec: TokenCodec, store: SharedTokenStore, sink: Arc<dyn DecisionSink>) -> Self {
        Self {
            codec,
            store,
            sink,
        }
    }

    /// Consumes the link and applies `decision`.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the link is invalid, used, expired, or the
    /// store is unavailable. Nothing is consumed on error. A consumed row that
    /// does not match the link's claims is never applied and is reported as
    /// [`ApplyOutcome::ConsumedButUnapplied`].
    pub fn apply(
        &self,
        bearer: &str,
        expected_action: ActionKind,
        decision: &Decision,
        now: Timestamp,
    ) -> Result<ApplyOutcome, ApplyError> {
        let claims = self.authenticate(bearer, expected_action)?;
        if decision.action_kind() != expected_action {
            return Err(ApplyError::InvalidLink {
                reason: "decision_mismatch",
            });
        }
        let token = self
            .store
            .try_consume(&claims.token_id, now)
            .map_err(|err| ApplyError::from_consume(&claims.token_id, err))?;
        let label = decision.label();
        if !token.matches_claims(&claims) {
            return Ok(ApplyOutcome::ConsumedButUnapplied {
                token,
                decision: label,
                error: SinkError::Rejected(
                    "claims_mismatch: stored token differs from link".to_string(),
                ),
            });
        }
        match self.sink.apply(&token, decision) {
            Ok(effect) => Ok(ApplyOutcome::Applied {
                token,
                effect,
                decision: label,
            }),
            Err(error) => Ok(ApplyOutcome::ConsumedButUnapplied {
                token,
                decision: label,
                error,
            }),
        }
    }

    /// Checks that a link is still usable without consuming it.
    ///
    /// # Errors
    ///
    /// Returns the same [`ApplyError`] that [`Self::apply`] would return at
    /// `now`.
    pub fn preview(
        &self,
        bearer: &str,
        expected_action: ActionKind,
        now: Timestamp,
    ) -> Result<LinkPreview, ApplyError> {
        let claims = self.authenticate(bearer, expected_action)?;
        let token = self.store.load(&claims.token_id)?.ok_or(ApplyError::InvalidLink {
            reason: "not_found",
        })?;
        if !token.matches_claims(&claims) {
            return Err(ApplyError::InvalidLink {
                reason: "claims_mismatch",
            });
        }
        match token.effective_state(now) {
            TokenState::Active => Ok(LinkPreview {
                token_id: token.token_id,
                subject_id: token.subject_id,
                action_kind: token.action_kind,
                expires_at: token.expires_at,
            }),
            TokenState::Consumed => Err(ApplyError::LinkAlreadyUsed {
                token_id: token.token_id,
                consumed_at: token.consumed_at,
            }),
            TokenState::Expired => Err(ApplyError::LinkExpired {
                token_id: token.token_id,
                reason: "expired",
            }),
            TokenState::Revoked => Err(ApplyError::LinkExpired {
                token_id: token.token_id,
                reason: "revoked",
            }),
        }
    }

    /// Decodes the bearer and checks it belongs to this route.
    fn authenticate(
        &self,
        bearer: &str,
        expected_action: ActionKind,
    ) -> Result<TokenClaims, ApplyError> {
        let claims = self.codec.decode(bearer).map_err(|err| ApplyError::InvalidLink {
            reason: err.label(),
        })?;
        if claims.action_kind != expected_action {
            return Err(ApplyError::InvalidLink {
                reason: "action_mismatch",
            });
        }
        Ok(claims)
    }
}
