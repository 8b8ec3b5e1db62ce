// crates/decision-link-config/src/lib.rs
// ============================================================================
// Module: Decision Link Config Library
// Description: Canonical config model, validation, and secret resolution.
// Purpose: Single source of truth for decision-link.toml semantics.
// Dependencies: decision-link-core, decision-link-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `decision-link-config` defines the configuration model for Decision Link.
//! Files are parsed strictly and validated fail-closed. Secrets never appear
//! in the file; it only names the environment variables that carry them, and
//! [`DecisionLinkConfig::resolve_secrets`] turns those into redacting types.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod secrets;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use secrets::AdminToken;
pub use secrets::ResolvedSecrets;
