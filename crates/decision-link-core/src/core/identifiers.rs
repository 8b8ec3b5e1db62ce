// crates/decision-link-core/src/core/identifiers.rs
// ============================================================================
// Module: Decision Link Identifiers
// Description: Opaque identifiers for tokens and the subjects they act on.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Token identifiers are 128-bit random values rendered as lowercase hex.
//! Subject identifiers are opaque strings supplied by the surrounding records
//! system; they are validated at construction because they are embedded in
//! bearer strings and must round-trip byte for byte.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Raw token identifier length in bytes (128 bits of entropy).
pub const TOKEN_ID_BYTES: usize = 16;
/// Maximum subject identifier length in bytes.
pub const MAX_SUBJECT_ID_BYTES: usize = 128;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Token identifier is not 32 lowercase hex characters.
    #[error("token id must be {expected} lowercase hex characters")]
    InvalidTokenId {
        /// Expected character count.
        expected: usize,
    },
    /// Subject identifier is empty.
    #[error("subject id must be non-empty")]
    EmptySubject,
    /// Subject identifier exceeds the size limit.
    #[error("subject id exceeds {max} bytes")]
    SubjectTooLong {
        /// Maximum allowed bytes.
        max: usize,
    },
    /// Subject identifier contains whitespace or control characters.
    #[error("subject id contains whitespace or control characters")]
    SubjectInvalidChar,
}

// ============================================================================
// SECTION: Token Identifier
// ============================================================================

/// Token identifier; also the lookup key embedded in every bearer string.
///
/// # Invariants
/// - Always [`TOKEN_ID_BYTES`] bytes, stored as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Builds a token identifier from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; TOKEN_ID_BYTES]) -> Self {
        Self(crate::core::hashing::hex_encode(&bytes))
    }

    /// Parses a token identifier from its hex form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidTokenId`] when the value is not
    /// lowercase hex of the expected length.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let valid = value.len() == TOKEN_ID_BYTES * 2
            && value.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(IdentifierError::InvalidTokenId {
                expected: TOKEN_ID_BYTES * 2,
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the raw identifier bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; TOKEN_ID_BYTES] {
        let mut out = [0u8; TOKEN_ID_BYTES];
        if let Some(decoded) = crate::core::hashing::hex_decode(&self.0) {
            for (slot, byte) in out.iter_mut().zip(decoded) {
                *slot = byte;
            }
        }
        out
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TokenId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TokenId> for String {
    fn from(value: TokenId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Subject Identifier
// ============================================================================

/// Identifier of the record a token acts on (for example a student record).
///
/// # Invariants
/// - Non-empty, at most [`MAX_SUBJECT_ID_BYTES`] bytes, no whitespace or
///   control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a validated subject identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value is empty, too long, or
    /// contains whitespace/control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentifierError::EmptySubject);
        }
        if id.len() > MAX_SUBJECT_ID_BYTES {
            return Err(IdentifierError::SubjectTooLong {
                max: MAX_SUBJECT_ID_BYTES,
            });
        }
        if id.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            return Err(IdentifierError::SubjectInvalidChar);
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SubjectId {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
