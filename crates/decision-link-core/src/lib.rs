// crates/decision-link-core/src/lib.rs
// ============================================================================
// Module: Decision Link Core Library
// Description: Public API surface for the Decision Link engine.
// Purpose: Expose token types, collaborator interfaces, and runtime services.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Decision Link issues single-use, time-bounded links that let an outside
//! party perform exactly one privileged change without an account, and it
//! authenticates inbound webhook notifications. The engine is framework
//! agnostic: storage, mail delivery, and business persistence plug in
//! through the traits in [`interfaces`]. Every path fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::AppliedEffect;
pub use interfaces::Clock;
pub use interfaces::ConsumeError;
pub use interfaces::DecisionSink;
pub use interfaces::FormEventSink;
pub use interfaces::IssueReceipt;
pub use interfaces::LinkMailer;
pub use interfaces::LinkMessage;
pub use interfaces::MailError;
pub use interfaces::SinkError;
pub use interfaces::StoreError;
pub use interfaces::TokenStore;
pub use crate::runtime::*;
