// crates/decision-link-core/src/core/mod.rs
// ============================================================================
// Module: Decision Link Core Types
// Description: Canonical token, identifier, time, and hashing definitions.
// Purpose: Provide stable, serializable types shared by every Decision Link crate.
// Dependencies: serde, hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! Core types describe single-use tokens and the decisions they authorize.
//! They carry no I/O and are the source of truth for storage rows, bearer
//! claims, and HTTP payloads.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod time;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::IdentifierError;
pub use identifiers::MAX_SUBJECT_ID_BYTES;
pub use identifiers::SubjectId;
pub use identifiers::TOKEN_ID_BYTES;
pub use identifiers::TokenId;
pub use time::Timestamp;
pub use token::ActionKind;
pub use token::Decision;
pub use token::EnrollmentChoice;
pub use token::FormDocument;
pub use token::TokenClaims;
pub use token::TokenRecord;
pub use token::TokenState;
pub use token::UnknownLabel;
