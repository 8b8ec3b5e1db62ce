// crates/decision-link-core/src/runtime/mod.rs
// ============================================================================
// Module: Decision Link Runtime
// Description: Codec, stores, issuance, verification, recording, dispatch.
// Purpose: Implement the link lifecycle against the core interfaces.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! Runtime modules implement every operation that touches a token: issuing
//! and decoding bearer strings, storing and consuming tokens, applying the
//! authorized decision, verifying webhooks, and bulk dispatch. HTTP and CLI
//! surfaces call into these types and add no lifecycle logic of their own.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod codec;
pub mod dispatch;
pub mod issuer;
pub mod recorder;
pub mod store;
pub mod webhook;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::FixedClock;
pub use clock::SystemClock;
pub use codec::BearerString;
pub use codec::CodecError;
pub use codec::InvalidToken;
pub use codec::IssuedCredential;
pub use codec::MAX_BEARER_CHARS;
pub use codec::MIN_SIGNING_KEY_BYTES;
pub use codec::SigningKey;
pub use codec::TokenCodec;
pub use dispatch::BatchDispatchCoordinator;
pub use dispatch::BatchReport;
pub use dispatch::DispatchConfig;
pub use dispatch::DispatchFailure;
pub use dispatch::DispatchFailureKind;
pub use issuer::IssueError;
pub use issuer::IssuedLink;
pub use issuer::LinkIssuer;
pub use recorder::ApplyError;
pub use recorder::ApplyOutcome;
pub use recorder::DecisionRecorder;
pub use recorder::LinkPreview;
pub use store::InMemoryTokenStore;
pub use store::SharedTokenStore;
pub use webhook::WeakWebhookSecret;
pub use webhook::WebhookError;
pub use webhook::WebhookSecret;
pub use webhook::WebhookVerifier;
