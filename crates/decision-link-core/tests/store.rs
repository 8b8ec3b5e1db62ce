// crates/decision-link-core/tests/store.rs
// ============================================================================
// Module: In-Memory Token Store Tests
// Description: Consume races, supersession, expiry, and revocation.
// Purpose: Validate the single-winner consume primitive and active-row rules.
// Dependencies: decision-link-core
// ============================================================================
//! ## Overview
//! Drives [`InMemoryTokenStore`] through the lifecycle transitions and
//! races many threads on one token.
//!
//! Security posture: a token must never be consumed twice.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use decision_link_core::ActionKind;
use decision_link_core::ConsumeError;
use decision_link_core::InMemoryTokenStore;
use decision_link_core::StoreError;
use decision_link_core::SubjectId;
use decision_link_core::Timestamp;
use decision_link_core::TokenId;
use decision_link_core::TokenRecord;
use decision_link_core::TokenState;
use decision_link_core::TokenStore;

fn record(id: u8, subject: &str, issued_at: i64, expires_at: i64) -> TokenRecord {
    TokenRecord {
        token_id: TokenId::from_bytes([id; 16]),
        subject_id: SubjectId::new(subject).unwrap(),
        action_kind: ActionKind::EnrollmentDecision,
        issued_at: Timestamp::from_unix_millis(issued_at),
        expires_at: Timestamp::from_unix_millis(expires_at),
        state: TokenState::Active,
        consumed_at: None,
        revoked_at: None,
        payload_digest: format!("digest-{id}"),
    }
}

/// Verifies exactly one of N concurrent consumers wins.
#[test]
fn concurrent_consume_has_single_winner() {
    for workers in [1_usize, 2, 8, 32] {
        let store = Arc::new(InMemoryTokenStore::new());
        let token = record(1, "S1", 0, 10_000);
        store.issue(&token).unwrap();
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let token_id = token.token_id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.try_consume(&token_id, Timestamp::from_unix_millis(5_000))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
        let winners = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(winners, 1, "workers={workers}");
        for result in results.iter().filter(|result| result.is_err()) {
            assert!(matches!(result, Err(ConsumeError::AlreadyConsumed { consumed_at: Some(_) })));
        }
    }
}

/// Verifies issuing supersedes the previous active token.
#[test]
fn issue_supersedes_previous_token() {
    let store = InMemoryTokenStore::new();
    let first = record(1, "S1", 0, 10_000);
    let second = record(2, "S1", 100, 10_000);
    assert_eq!(store.issue(&first).unwrap().revoked, None);
    assert_eq!(store.issue(&second).unwrap().revoked, Some(first.token_id.clone()));

    let err = store.try_consume(&first.token_id, Timestamp::from_unix_millis(200)).unwrap_err();
    assert_eq!(
        err,
        ConsumeError::Revoked {
            revoked_at: Some(Timestamp::from_unix_millis(100))
        }
    );
    let active = store.active_for(&first.subject_id, ActionKind::EnrollmentDecision).unwrap();
    assert_eq!(active.map(|row| row.token_id), Some(second.token_id.clone()));
    assert!(store.try_consume(&second.token_id, Timestamp::from_unix_millis(200)).is_ok());
}

/// Verifies tokens for other actions are not superseded.
#[test]
fn supersession_is_scoped_to_action_kind() {
    let store = InMemoryTokenStore::new();
    let decision = record(1, "S1", 0, 10_000);
    let mut upload = record(2, "S1", 0, 10_000);
    upload.action_kind = ActionKind::FormUpload;
    store.issue(&decision).unwrap();
    assert_eq!(store.issue(&upload).unwrap().revoked, None);
    assert!(store.try_consume(&decision.token_id, Timestamp::from_unix_millis(1)).is_ok());
}

/// Verifies the expiry boundary is exclusive.
#[test]
fn consume_respects_expiry_boundary() {
    let store = InMemoryTokenStore::new();
    let early = record(1, "S1", 0, 10_000);
    let late = record(2, "S2", 0, 10_000);
    store.issue(&early).unwrap();
    store.issue(&late).unwrap();
    assert!(store.try_consume(&early.token_id, Timestamp::from_unix_millis(9_999)).is_ok());
    assert_eq!(
        store.try_consume(&late.token_id, Timestamp::from_unix_millis(10_001)),
        Err(ConsumeError::Expired {
            expires_at: Timestamp::from_unix_millis(10_000)
        })
    );
    assert!(matches!(
        store.try_consume(&late.token_id, Timestamp::from_unix_millis(10_000)),
        Err(ConsumeError::Expired { .. })
    ));
}

/// Verifies unknown tokens report not found.
#[test]
fn unknown_token_is_not_found() {
    let store = InMemoryTokenStore::new();
    assert_eq!(
        store.try_consume(&TokenId::from_bytes([9; 16]), Timestamp::from_unix_millis(0)),
        Err(ConsumeError::NotFound)
    );
}

/// Verifies revoke is idempotent and leaves consumed rows alone.
#[test]
fn revoke_is_idempotent() {
    let store = InMemoryTokenStore::new();
    let token = record(1, "S1", 0, 10_000);
    store.issue(&token).unwrap();
    let now = Timestamp::from_unix_millis(50);
    assert_eq!(
        store.revoke(&token.subject_id, ActionKind::EnrollmentDecision, now).unwrap(),
        Some(token.token_id.clone())
    );
    assert_eq!(store.revoke(&token.subject_id, ActionKind::EnrollmentDecision, now).unwrap(), None);
    let stored = store.load(&token.token_id).unwrap().unwrap();
    assert_eq!(stored.state, TokenState::Revoked);
    assert_eq!(stored.revoked_at, Some(now));

    let consumed = record(2, "S2", 0, 10_000);
    store.issue(&consumed).unwrap();
    store.try_consume(&consumed.token_id, now).unwrap();
    assert_eq!(store.revoke(&consumed.subject_id, ActionKind::EnrollmentDecision, now).unwrap(), None);
    assert_eq!(store.load(&consumed.token_id).unwrap().unwrap().state, TokenState::Consumed);
}

/// Verifies invalid and duplicate rows are refused without side effects.
#[test]
fn issue_rejects_invalid_and_duplicate_rows() {
    let store = InMemoryTokenStore::new();
    let inverted = record(1, "S1", 100, 100);
    assert!(matches!(store.issue(&inverted), Err(StoreError::Invalid(_))));
    let token = record(2, "S1", 0, 100);
    store.issue(&token).unwrap();
    assert!(matches!(store.issue(&token), Err(StoreError::Conflict(_))));
    assert_eq!(store.load(&token.token_id).unwrap().unwrap().state, TokenState::Active);
}
