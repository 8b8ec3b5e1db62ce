// crates/decision-link-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Token Store
// Description: Durable TokenStore backend using SQLite WAL.
// Purpose: Provide production persistence for Decision Link tokens.
// Dependencies: decision-link-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`decision_link_core::TokenStore`].
//! Consumption is a single conditional `UPDATE` inside an immediate
//! transaction, and a partial unique index keeps at most one active token
//! per subject and action, even across processes sharing the file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteTokenStore;
