// crates/decision-link-server/src/collaborators.rs
// ============================================================================
// Module: File-Backed Collaborators
// Description: Local outbox, decision ledger, and form ledger implementations.
// Purpose: Run the link service end to end without external systems.
// Dependencies: decision-link-core, base64, serde_json, tokio
// ============================================================================

//! ## Overview
//! Deployments normally plug their CRM, mail relay, and document store in
//! behind the core traits. These implementations append JSON lines to files
//! under one directory so a single node can run without them:
//!
//! - `outbox.jsonl`: one [`LinkMessage`] per delivered link ([`OutboxMailer`]).
//! - `decisions.jsonl`: applied decisions ([`DecisionLedger`]).
//! - `uploads/<token_id>.bin`: uploaded form documents.
//! - `form-events.jsonl`: verified webhook payloads ([`FormEventLedger`]).
//!
//! An optional `subjects.json` maps subject ids to display names and
//! divisions. When present, decisions for unknown subjects are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use decision_link_core::AppliedEffect;
use decision_link_core::Clock;
use decision_link_core::Decision;
use decision_link_core::DecisionSink;
use decision_link_core::FormEventSink;
use decision_link_core::LinkMailer;
use decision_link_core::LinkMessage;
use decision_link_core::MailError;
use decision_link_core::SinkError;
use decision_link_core::Timestamp;
use decision_link_core::TokenRecord;
use decision_link_core::hashing::sha256_hex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::audit::AuditEvent;
use crate::audit::AuditRecord;
use crate::audit::DeliveryAuditEvent;
use crate::audit::LinkAuditSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Outbox file name.
pub const OUTBOX_FILE: &str = "outbox.jsonl";
/// Decision ledger file name.
pub const DECISIONS_FILE: &str = "decisions.jsonl";
/// Form event ledger file name.
pub const FORM_EVENTS_FILE: &str = "form-events.jsonl";
/// Subject directory file name.
pub const SUBJECTS_FILE: &str = "subjects.json";
/// Upload directory name.
pub const UPLOADS_DIR: &str = "uploads";
/// Maximum filename length recorded in the ledger.
const MAX_RECORDED_FILENAME: usize = 255;

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Append-only JSON-lines file.
#[derive(Clone)]
struct JsonLines {
    /// Shared handle.
    file: Arc<Mutex<File>>,
}

impl JsonLines {
    /// Opens `path` for appending, creating it when missing.
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Appends one serialized line and flushes it to the OS.
    fn append(&self, value: &impl Serialize) -> Result<(), String> {
        let payload = serde_json::to_string(value).map_err(|err| err.to_string())?;
        let mut file = self.file.lock().map_err(|_| "ledger lock poisoned".to_string())?;
        writeln!(file, "{payload}").map_err(|err| err.to_string())?;
        file.flush().map_err(|err| err.to_string())
    }
}

/// Creates the collaborator directory and its uploads subdirectory.
fn prepare_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir.join(UPLOADS_DIR))
}

// ============================================================================
// SECTION: Outbox Mailer
// ============================================================================

/// Mailer that appends each message to `outbox.jsonl` for a relay to pick up.
#[derive(Clone)]
pub struct OutboxMailer {
    /// Outbox file.
    outbox: JsonLines,
}

impl OutboxMailer {
    /// Opens the outbox under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or file cannot be created.
    pub fn open(dir: &Path) -> io::Result<Self> {
        prepare_dir(dir)?;
        Ok(Self {
            outbox: JsonLines::open(&dir.join(OUTBOX_FILE))?,
        })
    }
}

#[async_trait]
impl LinkMailer for OutboxMailer {
    async fn send(&self, message: &LinkMessage) -> Result<(), MailError> {
        let outbox = self.outbox.clone();
        let message = message.clone();
        tokio::task::spawn_blocking(move || outbox.append(&message))
            .await
            .map_err(|err| MailError::Transient(err.to_string()))?
            .map_err(MailError::Transient)
    }
}

/// Mailer decorator that records every delivery attempt in the audit log.
pub struct AuditingMailer {
    /// Wrapped mailer.
    inner: Arc<dyn LinkMailer>,
    /// Audit sink.
    audit: Arc<dyn LinkAuditSink>,
    /// Time source for audit stamps.
    clock: Arc<dyn Clock>,
}

impl AuditingMailer {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(
        inner: Arc<dyn LinkMailer>,
        audit: Arc<dyn LinkAuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            audit,
            clock,
        }
    }
}

#[async_trait]
impl LinkMailer for AuditingMailer {
    async fn send(&self, message: &LinkMessage) -> Result<(), MailError> {
        let result = self.inner.send(message).await;
        let outcome = match &result {
            Ok(()) => "delivered",
            Err(MailError::Transient(_)) => "transient_failure",
            Err(MailError::Permanent(_)) => "permanent_failure",
        };
        self.audit.record(&AuditRecord::new(
            self.clock.now(),
            AuditEvent::LinkDelivery(DeliveryAuditEvent {
                token_id: message.token_id.to_string(),
                subject_id: message.subject_id.to_string(),
                action_kind: message.action_kind,
                outcome,
            }),
        ));
        result
    }
}

// ============================================================================
// SECTION: Decision Ledger
// ============================================================================

/// Display details for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectProfile {
    /// Display name.
    pub name: String,
    /// Division or program.
    #[serde(default)]
    pub division: Option<String>,
}

/// One applied decision as written to `decisions.jsonl`.
#[derive(Debug, Serialize)]
struct DecisionEntry<'a> {
    /// Token identifier.
    token_id: &'a str,
    /// Subject identifier.
    subject_id: &'a str,
    /// Action kind label.
    action_kind: &'static str,
    /// Decision label.
    decision: String,
    /// Consumption instant (unix ms).
    consumed_at: Option<i64>,
    /// Stored upload path for form uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    document_path: Option<String>,
    /// SHA-256 of the uploaded document.
    #[serde(skip_serializing_if = "Option::is_none")]
    document_sha256: Option<String>,
}

/// Decision sink that records effects in a local ledger.
pub struct DecisionLedger {
    /// Collaborator directory.
    dir: PathBuf,
    /// Ledger file.
    ledger: JsonLines,
    /// Optional subject directory.
    subjects: Option<BTreeMap<String, SubjectProfile>>,
}

impl DecisionLedger {
    /// Opens the ledger under `dir`, loading `subjects.json` when present.
    ///
    /// # Errors
    ///
    /// Returns an error when files cannot be opened or the subject directory
    /// is malformed.
    pub fn open(dir: &Path) -> io::Result<Self> {
        prepare_dir(dir)?;
        let subjects_path = dir.join(SUBJECTS_FILE);
        let subjects = match fs::read(&subjects_path) {
            Ok(bytes) => Some(
                serde_json::from_slice(&bytes)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?,
            ),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            ledger: JsonLines::open(&dir.join(DECISIONS_FILE))?,
            subjects,
        })
    }

    /// Resolves display details for a subject.
    fn profile(&self, subject_id: &str) -> Result<SubjectProfile, SinkError> {
        match &self.subjects {
            None => Ok(SubjectProfile {
                name: subject_id.to_string(),
                division: None,
            }),
            Some(directory) => directory
                .get(subject_id)
                .cloned()
                .ok_or_else(|| SinkError::Rejected(format!("unknown subject {subject_id}"))),
        }
    }

    /// Writes an uploaded document and returns its relative path and digest.
    fn store_upload(
        &self,
        token: &TokenRecord,
        content: &[u8],
    ) -> Result<(String, String), SinkError> {
        let relative = format!("{UPLOADS_DIR}/{}.bin", token.token_id);
        fs::write(self.dir.join(&relative), content)
            .map_err(|err| SinkError::Unavailable(err.to_string()))?;
        Ok((relative, sha256_hex(content)))
    }
}

impl DecisionSink for DecisionLedger {
    fn apply(&self, token: &TokenRecord, decision: &Decision) -> Result<AppliedEffect, SinkError> {
        let profile = self.profile(token.subject_id.as_str())?;
        let (document_path, document_sha256) = match decision {
            Decision::Enrollment(_) => (None, None),
            Decision::FormUpload(document) => {
                let (path, digest) = self.store_upload(token, &document.content)?;
                (Some(path), Some(digest))
            }
        };
        let mut label = decision.label();
        truncate_on_char_boundary(&mut label, MAX_RECORDED_FILENAME);
        self.ledger
            .append(&DecisionEntry {
                token_id: token.token_id.as_str(),
                subject_id: token.subject_id.as_str(),
                action_kind: token.action_kind.as_str(),
                decision: label,
                consumed_at: token.consumed_at.map(Timestamp::as_unix_millis),
                document_path,
                document_sha256,
            })
            .map_err(SinkError::Unavailable)?;
        Ok(AppliedEffect {
            subject_name: profile.name,
            division: profile.division,
        })
    }
}

/// Shortens `value` to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(value: &mut String, max: usize) {
    if value.len() <= max {
        return;
    }
    let mut cut = max;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    value.truncate(cut);
}

// ============================================================================
// SECTION: Form Event Ledger
// ============================================================================

/// One verified webhook payload as written to `form-events.jsonl`.
#[derive(Debug, Serialize)]
struct FormEventEntry {
    /// Receipt instant (unix ms).
    received_at: i64,
    /// SHA-256 of the raw body.
    body_sha256: String,
    /// Parsed JSON body when the payload is JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    /// Base64 body when the payload is not JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_base64: Option<String>,
}

/// Form event sink that records verified payloads in a local ledger.
pub struct FormEventLedger {
    /// Ledger file.
    ledger: JsonLines,
}

impl FormEventLedger {
    /// Opens the ledger under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or file cannot be created.
    pub fn open(dir: &Path) -> io::Result<Self> {
        prepare_dir(dir)?;
        Ok(Self {
            ledger: JsonLines::open(&dir.join(FORM_EVENTS_FILE))?,
        })
    }
}

impl FormEventSink for FormEventLedger {
    fn accept(&self, raw_body: &[u8], received_at: Timestamp) -> Result<(), SinkError> {
        let payload = serde_json::from_slice::<Value>(raw_body).ok();
        let payload_base64 = payload.is_none().then(|| STANDARD.encode(raw_body));
        self.ledger
            .append(&FormEventEntry {
                received_at: received_at.as_unix_millis(),
                body_sha256: sha256_hex(raw_body),
                payload,
                payload_base64,
            })
            .map_err(SinkError::Unavailable)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut value = "ééé".to_string();
        truncate_on_char_boundary(&mut value, 3);
        assert_eq!(value, "é");
        let mut short = "abc".to_string();
        truncate_on_char_boundary(&mut short, 10);
        assert_eq!(short, "abc");
    }

    #[test]
    fn form_ledger_keeps_json_and_encodes_binary() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FormEventLedger::open(dir.path()).unwrap();
        ledger.accept(br#"{"form":"w9"}"#, Timestamp::from_unix_millis(5)).unwrap();
        ledger.accept(&[0xff, 0x00], Timestamp::from_unix_millis(6)).unwrap();
        let content = fs::read_to_string(dir.path().join(FORM_EVENTS_FILE)).unwrap();
        let lines: Vec<Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines[0]["payload"]["form"], "w9");
        assert_eq!(lines[1]["payload_base64"], "/wA=");
    }
}
