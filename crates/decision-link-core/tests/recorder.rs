// crates/decision-link-core/tests/recorder.rs
// ============================================================================
// Module: Decision Recorder Tests
// Description: Consume-then-apply ordering and error classification.
// Purpose: Ensure decisions apply exactly once and failures stay distinct.
// Dependencies: decision-link-core
// ============================================================================
//! ## Overview
//! Runs the decision-link flow end to end against the in-memory store and
//! scripted sinks.
//!
//! Security posture: a link must never apply a decision twice.

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
use std::sync::Mutex;
use std::time::Duration;

use decision_link_core::ActionKind;
use decision_link_core::AppliedEffect;
use decision_link_core::ApplyError;
use decision_link_core::ApplyOutcome;
use decision_link_core::ConsumeError;
use decision_link_core::Decision;
use decision_link_core::DecisionRecorder;
use decision_link_core::DecisionSink;
use decision_link_core::EnrollmentChoice;
use decision_link_core::FormDocument;
use decision_link_core::InMemoryTokenStore;
use decision_link_core::IssueReceipt;
use decision_link_core::LinkIssuer;
use decision_link_core::SharedTokenStore;
use decision_link_core::SigningKey;
use decision_link_core::SinkError;
use decision_link_core::StoreError;
use decision_link_core::SubjectId;
use decision_link_core::Timestamp;
use decision_link_core::TokenCodec;
use decision_link_core::TokenId;
use decision_link_core::TokenRecord;
use decision_link_core::TokenState;
use decision_link_core::TokenStore;

const THIRTY_DAYS: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Sink that records every applied decision.
#[derive(Default)]
struct RecordingSink {
    applied: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl DecisionSink for RecordingSink {
    fn apply(&self, token: &TokenRecord, decision: &Decision) -> Result<AppliedEffect, SinkError> {
        if self.fail {
            return Err(SinkError::Unavailable("records database offline".to_string()));
        }
        self.applied
            .lock()
            .unwrap()
            .push((token.subject_id.to_string(), decision.label()));
        Ok(AppliedEffect {
            subject_name: format!("Student {}", token.subject_id),
            division: Some("Upper School".to_string()),
        })
    }
}

/// Store whose every call reports a transient outage.
struct OfflineStore;

impl TokenStore for OfflineStore {
    fn issue(&self, _record: &TokenRecord) -> Result<IssueReceipt, StoreError> {
        Err(StoreError::Unavailable("database is locked".to_string()))
    }

    fn try_consume(&self, _token_id: &TokenId, _now: Timestamp) -> Result<TokenRecord, ConsumeError> {
        Err(StoreError::Unavailable("database is locked".to_string()).into())
    }

    fn revoke(
        &self,
        _subject_id: &SubjectId,
        _action_kind: ActionKind,
        _now: Timestamp,
    ) -> Result<Option<TokenId>, StoreError> {
        Err(StoreError::Unavailable("database is locked".to_string()))
    }

    fn load(&self, _token_id: &TokenId) -> Result<Option<TokenRecord>, StoreError> {
        Err(StoreError::Unavailable("database is locked".to_string()))
    }

    fn active_for(
        &self,
        _subject_id: &SubjectId,
        _action_kind: ActionKind,
    ) -> Result<Option<TokenRecord>, StoreError> {
        Err(StoreError::Unavailable("database is locked".to_string()))
    }
}

struct Fixture {
    issuer: LinkIssuer,
    recorder: DecisionRecorder,
    sink: Arc<RecordingSink>,
    store: SharedTokenStore,
}

fn codec() -> TokenCodec {
    TokenCodec::new(SigningKey::new(vec![42; 32]).unwrap())
}

fn fixture(fail: bool) -> Fixture {
    let store = SharedTokenStore::from_store(InMemoryTokenStore::new());
    let sink = Arc::new(RecordingSink {
        fail,
        ..RecordingSink::default()
    });
    Fixture {
        issuer: LinkIssuer::new(codec(), store.clone(), "https://records.example.org/"),
        recorder: DecisionRecorder::new(codec(), store.clone(), sink.clone()),
        sink,
        store,
    }
}

fn t(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn enrolled() -> Decision {
    Decision::Enrollment(EnrollmentChoice::Enrolled)
}

/// Verifies the issue, apply, and re-use scenario for subject S1.
#[test]
fn decision_link_applies_once_then_reports_used() {
    let fx = fixture(false);
    let subject = SubjectId::new("S1").unwrap();
    let issued = fx.issuer.issue(&subject, ActionKind::EnrollmentDecision, t(0), THIRTY_DAYS).unwrap();
    assert!(issued.link.starts_with("https://records.example.org/secure-decision/"));
    let claims = codec().decode(issued.bearer.as_str()).unwrap();
    assert_eq!(claims.subject_id, subject);

    let outcome = fx
        .recorder
        .apply(issued.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(1_000))
        .unwrap();
    match &outcome {
        ApplyOutcome::Applied { token, effect, decision } => {
            assert_eq!(token.state, TokenState::Consumed);
            assert_eq!(token.consumed_at, Some(t(1_000)));
            assert_eq!(effect.subject_name, "Student S1");
            assert_eq!(decision, "Enrolled");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let again = fx
        .recorder
        .apply(issued.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(2_000))
        .unwrap_err();
    assert_eq!(
        again,
        ApplyError::LinkAlreadyUsed {
            token_id: issued.record.token_id.clone(),
            consumed_at: Some(t(1_000))
        }
    );
    assert_eq!(again.token_id(), Some(&issued.record.token_id));
    assert_eq!(again.code(), "link_already_used");
    assert_eq!(fx.sink.applied.lock().unwrap().len(), 1);
}

/// Verifies a sink failure leaves the token consumed and flags reconciliation.
#[test]
fn sink_failure_is_consumed_but_unapplied() {
    let fx = fixture(true);
    let subject = SubjectId::new("S1").unwrap();
    let issued = fx.issuer.issue(&subject, ActionKind::EnrollmentDecision, t(0), THIRTY_DAYS).unwrap();
    let outcome = fx
        .recorder
        .apply(issued.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(10))
        .unwrap();
    assert!(matches!(outcome, ApplyOutcome::ConsumedButUnapplied { .. }));
    let stored = fx.store.load(&issued.record.token_id).unwrap().unwrap();
    assert_eq!(stored.state, TokenState::Consumed);
    assert!(matches!(
        fx.recorder.apply(issued.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(20)),
        Err(ApplyError::LinkAlreadyUsed { .. })
    ));
}

/// Verifies tampered, wrong-route, expired, and superseded links stay distinct.
#[test]
fn failures_are_classified_distinctly() {
    let fx = fixture(false);
    let subject = SubjectId::new("S1").unwrap();
    let first = fx.issuer.issue(&subject, ActionKind::EnrollmentDecision, t(0), THIRTY_DAYS).unwrap();
    let second = fx.issuer.issue(&subject, ActionKind::EnrollmentDecision, t(5), THIRTY_DAYS).unwrap();

    let mut tampered = second.bearer.as_str().to_string();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    assert_eq!(
        fx.recorder
            .apply(&tampered, ActionKind::EnrollmentDecision, &enrolled(), t(10))
            .unwrap_err()
            .code(),
        "invalid_link"
    );

    let upload = Decision::FormUpload(FormDocument {
        filename: Some("contract.pdf".to_string()),
        content: b"%PDF".to_vec(),
    });
    assert_eq!(
        fx.recorder.apply(second.bearer.as_str(), ActionKind::FormUpload, &upload, t(10)),
        Err(ApplyError::InvalidLink {
            reason: "action_mismatch"
        })
    );
    assert_eq!(
        fx.recorder.apply(first.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(10)),
        Err(ApplyError::LinkExpired {
            token_id: first.record.token_id.clone(),
            reason: "revoked"
        })
    );
    let expiry = second.record.expires_at.as_unix_millis();
    assert_eq!(
        fx.recorder.apply(second.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(expiry + 1)),
        Err(ApplyError::LinkExpired {
            token_id: second.record.token_id.clone(),
            reason: "expired"
        })
    );
    assert!(fx.sink.applied.lock().unwrap().is_empty());
    assert_eq!(
        fx.store.load(&second.record.token_id).unwrap().unwrap().state,
        TokenState::Active
    );
}

/// Verifies a consumed row that disagrees with the link is flagged for
/// reconciliation instead of being applied or silently dropped.
#[test]
fn claims_mismatch_after_consume_needs_reconciliation() {
    let store = SharedTokenStore::from_store(InMemoryTokenStore::new());
    let sink = Arc::new(RecordingSink::default());
    let recorder = DecisionRecorder::new(codec(), store.clone(), sink.clone());
    let issued = codec()
        .issue(&SubjectId::new("S1").unwrap(), ActionKind::EnrollmentDecision, t(0), THIRTY_DAYS)
        .unwrap();
    let mut record = issued.to_record();
    record.subject_id = SubjectId::new("S2").unwrap();
    store.issue(&record).unwrap();

    let outcome = recorder
        .apply(issued.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(1))
        .unwrap();
    match outcome {
        ApplyOutcome::ConsumedButUnapplied { token, error, .. } => {
            assert_eq!(token.token_id, issued.claims.token_id);
            assert!(error.to_string().contains("claims_mismatch"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(sink.applied.lock().unwrap().is_empty());
    assert_eq!(store.load(&issued.claims.token_id).unwrap().unwrap().state, TokenState::Consumed);
}

/// Verifies a storage outage is reported as unavailable, not invalid.
#[test]
fn store_outage_is_unavailable() {
    let issued = codec()
        .issue(&SubjectId::new("S1").unwrap(), ActionKind::EnrollmentDecision, t(0), THIRTY_DAYS)
        .unwrap();
    let recorder = DecisionRecorder::new(
        codec(),
        SharedTokenStore::from_store(OfflineStore),
        Arc::new(RecordingSink::default()),
    );
    let err = recorder
        .apply(issued.bearer.as_str(), ActionKind::EnrollmentDecision, &enrolled(), t(1))
        .unwrap_err();
    assert_eq!(err.code(), "unavailable");
    let err = recorder.preview(issued.bearer.as_str(), ActionKind::EnrollmentDecision, t(1)).unwrap_err();
    assert_eq!(err.code(), "unavailable");
}

/// Verifies preview never consumes.
#[test]
fn preview_is_read_only() {
    let fx = fixture(false);
    let subject = SubjectId::new("S9").unwrap();
    let issued = fx.issuer.issue(&subject, ActionKind::FormUpload, t(0), THIRTY_DAYS).unwrap();
    assert!(issued.link.contains("/secure-upload/"));
    let preview = fx.recorder.preview(issued.bearer.as_str(), ActionKind::FormUpload, t(1)).unwrap();
    assert_eq!(preview.subject_id, subject);
    let preview_again = fx.recorder.preview(issued.bearer.as_str(), ActionKind::FormUpload, t(2)).unwrap();
    assert_eq!(preview, preview_again);

    let upload = Decision::FormUpload(FormDocument {
        filename: None,
        content: b"%PDF-1.7".to_vec(),
    });
    let outcome = fx.recorder.apply(issued.bearer.as_str(), ActionKind::FormUpload, &upload, t(3)).unwrap();
    assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
    assert!(matches!(
        fx.recorder.preview(issued.bearer.as_str(), ActionKind::FormUpload, t(4)),
        Err(ApplyError::LinkAlreadyUsed { .. })
    ));
}
