// crates/decision-link-server/tests/file_collaborators.rs
// ============================================================================
// Module: File Collaborator Tests
// Description: Tests for the JSON-lines outbox and decision ledger.
// Purpose: Ensure local collaborators record effects and honor the roster.
// Dependencies: decision-link-server, tempfile
// ============================================================================
//! ## Overview
//! Exercises the file-backed collaborators against a temporary directory.

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

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use decision_link_core::ActionKind;
use decision_link_core::Decision;
use decision_link_core::DecisionSink;
use decision_link_core::EnrollmentChoice;
use decision_link_core::FixedClock;
use decision_link_core::FormDocument;
use decision_link_core::LinkMailer;
use decision_link_core::LinkMessage;
use decision_link_core::SigningKey;
use decision_link_core::SinkError;
use decision_link_core::SubjectId;
use decision_link_core::Timestamp;
use decision_link_core::TokenCodec;
use decision_link_core::TokenRecord;
use decision_link_core::hashing::sha256_hex;
use decision_link_server::AuditingMailer;
use decision_link_server::DecisionLedger;
use decision_link_server::MemoryLinkAuditSink;
use decision_link_server::OutboxMailer;
use serde_json::Value;

fn record(subject: &str, action_kind: ActionKind) -> TokenRecord {
    let codec = TokenCodec::new(SigningKey::new(vec![3_u8; 32]).unwrap());
    codec
        .issue(
            &SubjectId::new(subject).unwrap(),
            action_kind,
            Timestamp::from_unix_millis(1_000),
            Duration::from_secs(60),
        )
        .unwrap()
        .to_record()
}

fn read_lines(path: &std::path::Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Verifies the roster supplies display details and rejects unknown subjects.
#[test]
fn decision_ledger_uses_subject_roster() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("subjects.json"),
        r#"{"s-1": {"name": "Avery Chen", "division": "Upper School"}}"#,
    )
    .unwrap();
    let ledger = DecisionLedger::open(dir.path()).unwrap();

    let known = record("s-1", ActionKind::EnrollmentDecision);
    let effect =
        ledger.apply(&known, &Decision::Enrollment(EnrollmentChoice::Enrolled)).unwrap();
    assert_eq!(effect.subject_name, "Avery Chen");
    assert_eq!(effect.division.as_deref(), Some("Upper School"));

    let unknown = record("s-404", ActionKind::EnrollmentDecision);
    let err =
        ledger.apply(&unknown, &Decision::Enrollment(EnrollmentChoice::Declined)).unwrap_err();
    assert!(matches!(err, SinkError::Rejected(_)));

    let lines = read_lines(&dir.path().join("decisions.jsonl"));
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["subject_id"], "s-1");
    assert_eq!(lines[0]["decision"], "Enrolled");
}

/// Verifies uploads are stored by token id with their digest.
#[test]
fn decision_ledger_stores_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = DecisionLedger::open(dir.path()).unwrap();
    let token = record("s-2", ActionKind::FormUpload);
    let content = b"%PDF-1.7 signed consent".to_vec();
    let decision = Decision::FormUpload(FormDocument {
        filename: Some("consent.pdf".to_string()),
        content: content.clone(),
    });

    let effect = ledger.apply(&token, &decision).unwrap();
    assert_eq!(effect.subject_name, "s-2");

    let stored = dir.path().join("uploads").join(format!("{}.bin", token.token_id));
    assert_eq!(fs::read(stored).unwrap(), content);
    let lines = read_lines(&dir.path().join("decisions.jsonl"));
    assert_eq!(lines[0]["decision"], "consent.pdf");
    assert_eq!(lines[0]["document_sha256"], sha256_hex(&content));
}

/// Verifies the outbox appends messages and deliveries are audited.
#[tokio::test]
async fn outbox_appends_and_audits_deliveries() {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(MemoryLinkAuditSink::new());
    let clock = Arc::new(FixedClock::new(Timestamp::from_unix_millis(9_000)));
    let mailer = AuditingMailer::new(
        Arc::new(OutboxMailer::open(dir.path()).unwrap()),
        audit.clone(),
        clock,
    );
    let token = record("s-3", ActionKind::EnrollmentDecision);
    let message = LinkMessage {
        subject_id: token.subject_id.clone(),
        action_kind: token.action_kind,
        token_id: token.token_id.clone(),
        link: "https://links.example.edu/secure-decision/bearer-text".to_string(),
        expires_at: token.expires_at,
        deadline: token.expires_at,
    };

    mailer.send(&message).await.unwrap();

    let lines = read_lines(&dir.path().join("outbox.jsonl"));
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["link"], message.link.as_str());
    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event.name(), "link_delivery");
    assert_eq!(records[0].timestamp_ms, 9_000);
    assert!(!audit.rendered().contains("bearer-text"));
}
