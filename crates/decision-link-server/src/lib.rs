// crates/decision-link-server/src/lib.rs
// ============================================================================
// Module: Decision Link Server
// Description: HTTP surface and local collaborators for Decision Link.
// Purpose: Serve decision links, uploads, webhooks, and the bulk-send API.
// Dependencies: decision-link-core, decision-link-config, axum, tokio
// ============================================================================

//! ## Overview
//! Decision Link Server maps HTTP requests onto the core engine. Link routes
//! are authorized by the bearer string in the path, webhooks by their shared
//! secret signature, and the bulk-send API by an admin bearer token. Every
//! decision is written to a redacted JSON-lines audit trail.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod collaborators;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditRecord;
pub use audit::FileLinkAuditSink;
pub use audit::LinkAuditSink;
pub use audit::MemoryLinkAuditSink;
pub use audit::NoopLinkAuditSink;
pub use audit::StderrLinkAuditSink;
pub use auth::AdminCaller;
pub use auth::AuthError;
pub use collaborators::AuditingMailer;
pub use collaborators::DecisionLedger;
pub use collaborators::FormEventLedger;
pub use collaborators::OutboxMailer;
pub use server::AppState;
pub use server::LinkServer;
pub use server::LinkServerError;
pub use server::StateParts;
pub use server::build_audit_sink;
pub use server::build_token_store;
pub use server::router;
