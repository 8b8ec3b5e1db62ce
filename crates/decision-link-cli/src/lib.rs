// crates/decision-link-cli/src/lib.rs
// ============================================================================
// Module: Decision Link CLI Library
// Description: Shared helpers for the Decision Link command-line interface.
// Purpose: Provide reusable policy checks for the CLI binary and tests.
// Dependencies: decision-link-config
// ============================================================================

//! ## Overview
//! This library houses the serve-time network exposure policy. The binary
//! entry point (`src/main.rs`) imports it so the checks can be tested without
//! launching a server.
//!
//! Security posture: CLI inputs are untrusted and must be validated.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Bind safety checks for `decision-link serve`.
pub mod serve_policy;
