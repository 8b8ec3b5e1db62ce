// crates/decision-link-core/tests/webhook.rs
// ============================================================================
// Module: Webhook Verifier Tests
// Description: Signature, freshness, and replay checks for inbound webhooks.
// Purpose: Ensure only authentic, fresh, first-seen notifications pass.
// Dependencies: decision-link-core, proptest
// ============================================================================
//! ## Overview
//! Signs payloads with the shared secret and verifies tamper, skew, and
//! replay handling.
//!
//! Security posture: webhook requests are attacker controlled.

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

use std::time::Duration;

use decision_link_core::Timestamp;
use decision_link_core::WebhookError;
use decision_link_core::WebhookSecret;
use decision_link_core::WebhookVerifier;
use proptest::prelude::*;

const SECRET: &[u8] = b"webhook-shared-secret-0123456789";
const BODY: &[u8] = br#"{"form":"enrollment-contract","subject":"S1","status":"signed"}"#;
const SENT_AT: &str = "1700000000";

fn verifier() -> WebhookVerifier {
    WebhookVerifier::new(WebhookSecret::new(SECRET).unwrap(), Duration::from_secs(300), 64)
}

fn now() -> Timestamp {
    Timestamp::from_unix_secs(1_700_000_010)
}

fn signature(timestamp: &str, body: &[u8]) -> String {
    WebhookSecret::new(SECRET).unwrap().sign(timestamp, body)
}

proptest! {
    /// Verifies flipping any body byte after signing fails the signature.
    #[test]
    fn body_tamper_is_detected(index in 0_usize..BODY.len(), mask in 1_u8..=255) {
        let signature = signature(SENT_AT, BODY);
        let mut tampered = BODY.to_vec();
        tampered[index] ^= mask;
        prop_assert_eq!(
            verifier().verify(&tampered, &signature, SENT_AT, now()),
            Err(WebhookError::BadSignature)
        );
    }
}

/// Verifies an identical second delivery is rejected as a replay.
#[test]
fn replay_is_rejected_within_window() {
    let verifier = verifier();
    let signature = signature(SENT_AT, BODY);
    assert_eq!(verifier.verify(BODY, &signature, SENT_AT, now()), Ok(()));
    assert_eq!(
        verifier.verify(BODY, &signature, SENT_AT, now()),
        Err(WebhookError::Replayed)
    );
}

/// Verifies the prefixed and uppercase header forms are accepted and share
/// one replay entry.
#[test]
fn prefixed_signature_is_equivalent() {
    let verifier = verifier();
    let signature = signature(SENT_AT, BODY);
    let prefixed = format!("sha256={}", signature.to_ascii_uppercase());
    assert_eq!(verifier.verify(BODY, &prefixed, SENT_AT, now()), Ok(()));
    assert_eq!(verifier.verify(BODY, &signature, SENT_AT, now()), Err(WebhookError::Replayed));
}

/// Verifies timestamps outside the tolerance fail even with a valid signature.
#[test]
fn stale_and_future_timestamps_are_rejected() {
    let verifier = verifier();
    let old = "1699999000";
    assert_eq!(
        verifier.verify(BODY, &signature(old, BODY), old, now()),
        Err(WebhookError::StaleTimestamp)
    );
    let future = "1700001000";
    assert_eq!(
        verifier.verify(BODY, &signature(future, BODY), future, now()),
        Err(WebhookError::StaleTimestamp)
    );
    let edge = "1699999710";
    assert_eq!(verifier.verify(BODY, &signature(edge, BODY), edge, now()), Ok(()));
}

/// Verifies malformed headers fail closed.
#[test]
fn malformed_headers_are_rejected() {
    let verifier = verifier();
    assert_eq!(
        verifier.verify(BODY, &signature(SENT_AT, BODY), "yesterday", now()),
        Err(WebhookError::StaleTimestamp)
    );
    assert_eq!(verifier.verify(BODY, "zz", SENT_AT, now()), Err(WebhookError::BadSignature));
    assert_eq!(verifier.verify(BODY, "", SENT_AT, now()), Err(WebhookError::BadSignature));
}

/// Verifies the timestamp is covered by the signature.
#[test]
fn timestamp_is_bound_to_signature() {
    let verifier = verifier();
    let signature = signature(SENT_AT, BODY);
    assert_eq!(
        verifier.verify(BODY, &signature, "1700000001", now()),
        Err(WebhookError::BadSignature)
    );
}

/// Verifies sweeping forgets entries once they leave the window.
#[test]
fn sweep_evicts_expired_entries() {
    let verifier = verifier();
    verifier.verify(BODY, &signature(SENT_AT, BODY), SENT_AT, now()).unwrap();
    assert_eq!(verifier.replay_entries(), 1);
    assert_eq!(verifier.sweep(Timestamp::from_unix_secs(1_700_000_100)), 0);
    assert_eq!(verifier.sweep(Timestamp::from_unix_secs(1_700_000_301)), 1);
    assert_eq!(verifier.replay_entries(), 0);
}

/// Verifies a replay is still refused at the last instant the timestamp is
/// fresh.
#[test]
fn replay_is_rejected_at_window_edge() {
    let verifier = verifier();
    let signature = signature(SENT_AT, BODY);
    assert_eq!(verifier.verify(BODY, &signature, SENT_AT, now()), Ok(()));
    let edge = Timestamp::from_unix_secs(1_700_000_300);
    for _ in 0..2 {
        assert_eq!(
            verifier.verify(BODY, &signature, SENT_AT, edge),
            Err(WebhookError::Replayed)
        );
    }
    let past = Timestamp::from_unix_millis(1_700_000_300_001);
    assert_eq!(
        verifier.verify(BODY, &signature, SENT_AT, past),
        Err(WebhookError::StaleTimestamp)
    );
}

/// Verifies a released notification can be delivered again exactly once.
#[test]
fn released_notification_is_admitted_again() {
    let verifier = verifier();
    let signature = signature(SENT_AT, BODY);
    assert_eq!(verifier.verify(BODY, &signature, SENT_AT, now()), Ok(()));
    assert!(verifier.release(BODY, SENT_AT));
    assert!(!verifier.release(BODY, SENT_AT));
    assert_eq!(verifier.verify(BODY, &signature, SENT_AT, now()), Ok(()));
    assert_eq!(verifier.verify(BODY, &signature, SENT_AT, now()), Err(WebhookError::Replayed));
}
