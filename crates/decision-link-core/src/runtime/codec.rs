// crates/decision-link-core/src/runtime/codec.rs
// ============================================================================
// Module: Token Codec
// Description: Bearer string issuance and authenticity verification.
// Purpose: Produce unguessable, tamper-evident link credentials.
// Dependencies: base64, rand, crate::core
// ============================================================================

//! ## Overview
//! A bearer string is the URL-safe base64 (no padding) encoding of
//!
//! ```text
//! version(1) | token_id(16) | action(1) | expires_at(8, BE) | subject_len(1) | subject | tag(32)
//! ```
//!
//! where `tag` is HMAC-SHA256 under the server signing key over a domain
//! label followed by every preceding byte. Decoding recomputes the tag and
//! compares in constant time. The codec performs no I/O and knows nothing
//! about whether a token is still usable; that is the store's job.
//!
//! Security posture: bearer strings are attacker controlled. Size is checked
//! before decoding and every structural error collapses into
//! [`InvalidToken`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

use crate::core::ActionKind;
use crate::core::SubjectId;
use crate::core::TOKEN_ID_BYTES;
use crate::core::Timestamp;
use crate::core::TokenClaims;
use crate::core::TokenId;
use crate::core::TokenRecord;
use crate::core::TokenState;
use crate::core::hashing::DIGEST_BYTES;
use crate::core::hashing::constant_time_eq;
use crate::core::hashing::hmac_sha256;
use crate::core::hashing::sha256_hex;
use crate::core::identifiers::MAX_SUBJECT_ID_BYTES;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current bearer layout version.
const BEARER_VERSION: u8 = 1;
/// Domain separation label mixed into every tag.
const TAG_DOMAIN: &[u8] = b"decision-link/bearer/v1";
/// Fixed bytes preceding the subject: version, id, action, expiry, length.
const HEADER_BYTES: usize = 1 + TOKEN_ID_BYTES + 1 + 8 + 1;
/// Smallest valid decoded bearer (one-byte subject).
const MIN_BEARER_BYTES: usize = HEADER_BYTES + 1 + DIGEST_BYTES;
/// Largest valid decoded bearer.
const MAX_BEARER_BYTES: usize = HEADER_BYTES + MAX_SUBJECT_ID_BYTES + DIGEST_BYTES;
/// Maximum accepted bearer string length in characters.
pub const MAX_BEARER_CHARS: usize = MAX_BEARER_BYTES.div_ceil(3) * 4;
/// Minimum signing key length in bytes.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a bearer string failed verification.
///
/// # Invariants
/// - Every variant is terminal; callers must never retry a rejected bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidToken {
    /// Input exceeds the maximum bearer length.
    #[error("bearer exceeds size limit")]
    Oversize,
    /// Input is not URL-safe base64.
    #[error("bearer is not valid base64url")]
    Encoding,
    /// Decoded length is inconsistent with the layout.
    #[error("bearer has invalid length")]
    Length,
    /// Unknown layout version.
    #[error("bearer version is not supported")]
    Version,
    /// Unknown action code.
    #[error("bearer action is not recognized")]
    Action,
    /// Embedded subject is invalid.
    #[error("bearer subject is invalid")]
    Subject,
    /// Integrity tag mismatch.
    #[error("bearer integrity check failed")]
    Tag,
}

impl InvalidToken {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Oversize => "oversize",
            Self::Encoding => "encoding",
            Self::Length => "length",
            Self::Version => "version",
            Self::Action => "action",
            Self::Subject => "subject",
            Self::Tag => "tag",
        }
    }
}

/// Codec construction and issuance errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Signing key is shorter than [`MIN_SIGNING_KEY_BYTES`].
    #[error("signing key must be at least {min} bytes")]
    WeakKey {
        /// Minimum key length.
        min: usize,
    },
    /// TTL is zero or pushes the expiry out of range.
    #[error("ttl must be positive and representable")]
    InvalidTtl,
}

// ============================================================================
// SECTION: Keys and Bearer Strings
// ============================================================================

/// Server-held HMAC key for bearer tags.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wraps raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::WeakKey`] when the key is too short.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CodecError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SIGNING_KEY_BYTES {
            return Err(CodecError::WeakKey {
                min: MIN_SIGNING_KEY_BYTES,
            });
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Opaque credential embedded in a link.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerString(String);

impl BearerString {
    /// Returns the URL-safe bearer text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerString(<redacted>)")
    }
}

/// Output of [`TokenCodec::issue`].
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// Authenticated claims.
    pub claims: TokenClaims,
    /// Issue instant.
    pub issued_at: Timestamp,
    /// Bearer string for the link.
    pub bearer: BearerString,
    /// SHA-256 (hex) of the integrity tag, for storage.
    pub payload_digest: String,
}

impl IssuedCredential {
    /// Builds the `Active` store record for this credential.
    #[must_use]
    pub fn to_record(&self) -> TokenRecord {
        TokenRecord {
            token_id: self.claims.token_id.clone(),
            subject_id: self.claims.subject_id.clone(),
            action_kind: self.claims.action_kind,
            issued_at: self.issued_at,
            expires_at: self.claims.expires_at,
            state: TokenState::Active,
            consumed_at: None,
            revoked_at: None,
            payload_digest: self.payload_digest.clone(),
        }
    }
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Issues and verifies bearer strings.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    /// HMAC key.
    key: SigningKey,
}

impl TokenCodec {
    /// Creates a codec bound to a signing key.
    #[must_use]
    pub const fn new(key: SigningKey) -> Self {
        Self {
            key,
        }
    }

    /// Generates a fresh token identifier and bearer string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTtl`] when `ttl` is zero or the expiry
    /// overflows.
    pub fn issue(
        &self,
        subject_id: &SubjectId,
        action_kind: ActionKind,
        issued_at: Timestamp,
        ttl: Duration,
    ) -> Result<IssuedCredential, CodecError> {
        let expires_at = issued_at.checked_add(ttl).ok_or(CodecError::InvalidTtl)?;
        if expires_at <= issued_at {
            return Err(CodecError::InvalidTtl);
        }
        let mut id_bytes = [0u8; TOKEN_ID_BYTES];
        OsRng.fill_bytes(&mut id_bytes);
        let claims = TokenClaims {
            token_id: TokenId::from_bytes(id_bytes),
            subject_id: subject_id.clone(),
            action_kind,
            expires_at,
        };
        let (bearer, payload_digest) = self.seal(&claims);
        Ok(IssuedCredential {
            claims,
            issued_at,
            bearer,
            payload_digest,
        })
    }

    /// Verifies a bearer string and returns its authenticated claims.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidToken`] on malformed input or tag mismatch.
    pub fn decode(&self, bearer: &str) -> Result<TokenClaims, InvalidToken> {
        if bearer.len() > MAX_BEARER_CHARS {
            return Err(InvalidToken::Oversize);
        }
        let bytes = URL_SAFE_NO_PAD.decode(bearer).map_err(|_| InvalidToken::Encoding)?;
        if bytes.len() < MIN_BEARER_BYTES || bytes.len() > MAX_BEARER_BYTES {
            return Err(InvalidToken::Length);
        }
        let subject_len = usize::from(bytes[HEADER_BYTES - 1]);
        if bytes.len() != HEADER_BYTES + subject_len + DIGEST_BYTES {
            return Err(InvalidToken::Length);
        }
        let (body, tag) = bytes.split_at(HEADER_BYTES + subject_len);
        let expected = hmac_sha256(&self.key.0, &[TAG_DOMAIN, body]);
        if !constant_time_eq(&expected, tag) {
            return Err(InvalidToken::Tag);
        }
        if body[0] != BEARER_VERSION {
            return Err(InvalidToken::Version);
        }
        let mut id_bytes = [0u8; TOKEN_ID_BYTES];
        id_bytes.copy_from_slice(&body[1..=TOKEN_ID_BYTES]);
        let action_kind = ActionKind::from_wire_code(body[1 + TOKEN_ID_BYTES])
            .ok_or(InvalidToken::Action)?;
        let mut expiry_bytes = [0u8; 8];
        expiry_bytes.copy_from_slice(&body[TOKEN_ID_BYTES + 2..TOKEN_ID_BYTES + 10]);
        let expires_at = Timestamp::from_unix_millis(i64::from_be_bytes(expiry_bytes));
        let subject = std::str::from_utf8(&body[HEADER_BYTES..]).map_err(|_| InvalidToken::Subject)?;
        let subject_id = SubjectId::new(subject).map_err(|_| InvalidToken::Subject)?;
        Ok(TokenClaims {
            token_id: TokenId::from_bytes(id_bytes),
            subject_id,
            action_kind,
            expires_at,
        })
    }

    /// Encodes claims and returns the bearer plus the stored tag digest.
    fn seal(&self, claims: &TokenClaims) -> (BearerString, String) {
        let subject = claims.subject_id.as_str().as_bytes();
        let mut body = Vec::with_capacity(HEADER_BYTES + subject.len() + DIGEST_BYTES);
        body.push(BEARER_VERSION);
        body.extend_from_slice(&claims.token_id.to_bytes());
        body.push(claims.action_kind.wire_code());
        body.extend_from_slice(&claims.expires_at.as_unix_millis().to_be_bytes());
        // SubjectId caps length at MAX_SUBJECT_ID_BYTES, which fits in one byte.
        body.push(u8::try_from(subject.len()).unwrap_or(u8::MAX));
        body.extend_from_slice(subject);
        let tag = hmac_sha256(&self.key.0, &[TAG_DOMAIN, &body]);
        let digest = sha256_hex(&tag);
        body.extend_from_slice(&tag);
        (BearerString(URL_SAFE_NO_PAD.encode(body)), digest)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    fn codec(byte: u8) -> TokenCodec {
        TokenCodec::new(SigningKey::new(vec![byte; MIN_SIGNING_KEY_BYTES]).unwrap())
    }

    #[test]
    fn max_bearer_chars_covers_longest_subject() {
        let subject = SubjectId::new("s".repeat(MAX_SUBJECT_ID_BYTES)).unwrap();
        let issued = codec(1)
            .issue(
                &subject,
                ActionKind::FormUpload,
                Timestamp::from_unix_millis(0),
                Duration::from_secs(60),
            )
            .unwrap();
        assert!(issued.bearer.as_str().len() <= MAX_BEARER_CHARS);
        assert_eq!(codec(1).decode(issued.bearer.as_str()).unwrap(), issued.claims);
    }

    #[test]
    fn digest_is_sha256_of_tag() {
        let subject = SubjectId::new("S1").unwrap();
        let issued = codec(2)
            .issue(
                &subject,
                ActionKind::EnrollmentDecision,
                Timestamp::from_unix_millis(10),
                Duration::from_secs(1),
            )
            .unwrap();
        let raw = URL_SAFE_NO_PAD.decode(issued.bearer.as_str()).unwrap();
        let tag = &raw[raw.len() - DIGEST_BYTES..];
        assert_eq!(issued.payload_digest, sha256_hex(tag));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let subject = SubjectId::new("S1").unwrap();
        let result = codec(3).issue(
            &subject,
            ActionKind::EnrollmentDecision,
            Timestamp::from_unix_millis(10),
            Duration::ZERO,
        );
        assert_eq!(result.unwrap_err(), CodecError::InvalidTtl);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let key = SigningKey::new(vec![9; MIN_SIGNING_KEY_BYTES]).unwrap();
        assert_eq!(format!("{key:?}"), "SigningKey(<redacted>)");
    }
}
