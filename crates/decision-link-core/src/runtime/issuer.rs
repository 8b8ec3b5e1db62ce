// crates/decision-link-core/src/runtime/issuer.rs
// ============================================================================
// Module: Link Issuer
// Description: Issues a token, records it, and builds its public link.
// Purpose: Keep codec output and store rows in lockstep.
// Dependencies: crate::core, crate::interfaces, crate::runtime::codec
// ============================================================================

//! ## Overview
//! [`LinkIssuer`] is the single entry point for creating a usable link. It
//! asks the codec for a fresh credential, stores the `Active` row (which
//! supersedes any previous active link for the same subject and action), and
//! only then returns the link text. A link is never returned for a token the
//! store did not accept.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::core::ActionKind;
use crate::core::SubjectId;
use crate::core::Timestamp;
use crate::core::TokenId;
use crate::core::TokenRecord;
use crate::interfaces::StoreError;
use crate::interfaces::TokenStore;
use crate::runtime::codec::BearerString;
use crate::runtime::codec::CodecError;
use crate::runtime::codec::TokenCodec;
use crate::runtime::store::SharedTokenStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Link issuance errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueError {
    /// The credential could not be produced.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The store rejected or failed the write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// A stored token plus the link that carries it.
#[derive(Clone)]
pub struct IssuedLink {
    /// Stored row for the new token.
    pub record: TokenRecord,
    /// Bearer string embedded in the link.
    pub bearer: BearerString,
    /// Absolute link URL.
    pub link: String,
    /// Previously active token superseded by this issue.
    pub superseded: Option<TokenId>,
}

impl fmt::Debug for IssuedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedLink")
            .field("record", &self.record)
            .field("link", &"<redacted>")
            .field("superseded", &self.superseded)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Issuer
// ============================================================================

/// Issues single-use links against a token store.
#[derive(Clone)]
pub struct LinkIssuer {
    /// Credential codec.
    codec: TokenCodec,
    /// Durable token store.
    store: SharedTokenStore,
    /// Public base URL without trailing slash.
    base_url: String,
}

impl LinkIssuer {
    /// Creates an issuer that builds links under `public_base_url`.
    #[must_use]
    pub fn new(codec: TokenCodec, store: SharedTokenStore, public_base_url: &str) -> Self {
        Self {
            codec,
            store,
            base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the codec used for issuance.
    #[must_use]
    pub const fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &SharedTokenStore {
        &self.store
    }

    /// Issues and stores a new token, superseding any active one.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError`] when the TTL is invalid or the store write
    /// fails. On error no link exists.
    pub fn issue(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<IssuedLink, IssueError> {
        let credential = self.codec.issue(subject_id, action_kind, now, ttl)?;
        let record = credential.to_record();
        let receipt = self.store.issue(&record)?;
        let link = self.link_for(action_kind, &credential.bearer);
        Ok(IssuedLink {
            record,
            bearer: credential.bearer,
            link,
            superseded: receipt.revoked,
        })
    }

    /// Builds the public URL for a bearer string.
    #[must_use]
    pub fn link_for(&self, action_kind: ActionKind, bearer: &BearerString) -> String {
        format!("{}/{}/{}", self.base_url, action_kind.link_path(), bearer.as_str())
    }
}
