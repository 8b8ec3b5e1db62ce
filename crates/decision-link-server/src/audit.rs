// crates/decision-link-server/src/audit.rs
// ============================================================================
// Module: Link Audit Logging
// Description: Structured audit events for link, webhook, and admin traffic.
// Purpose: Emit redacted JSON-lines audit records without hard dependencies.
// Dependencies: decision-link-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every security-relevant request produces one [`AuditRecord`]: a timestamp
//! plus a tagged [`AuditEvent`]. Records reference tokens by id and admin
//! tokens by fingerprint. Bearer strings, webhook bodies, and secrets are
//! never part of an event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use decision_link_core::ActionKind;
use decision_link_core::Timestamp;
use serde::Serialize;

// ============================================================================
// SECTION: Event Payloads
// ============================================================================

/// Decision or upload link use (consume or preview).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkAuditEvent {
    /// Route action kind.
    pub action_kind: ActionKind,
    /// Token identifier when the bearer decoded.
    pub token_id: Option<String>,
    /// Subject identifier when the token was found.
    pub subject_id: Option<String>,
    /// `applied`, `ready`, or `rejected`.
    pub outcome: &'static str,
    /// Failure reason label.
    pub reason: Option<&'static str>,
    /// Non-sensitive decision label.
    pub decision: Option<String>,
}

/// Single token issuance outside bulk dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueAuditEvent {
    /// Token identifier.
    pub token_id: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Authorized action.
    pub action_kind: ActionKind,
    /// Expiry instant (unix ms).
    pub expires_at: i64,
    /// Token superseded by this issue.
    pub superseded: Option<String>,
    /// Who triggered the issue (`cli` or an admin fingerprint).
    pub issued_by: String,
}

/// One delivery attempt made by bulk dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAuditEvent {
    /// Token identifier.
    pub token_id: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Authorized action.
    pub action_kind: ActionKind,
    /// `delivered`, `transient_failure`, or `permanent_failure`.
    pub outcome: &'static str,
}

/// Webhook verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAuditEvent {
    /// `accepted`, `rejected`, or `handoff_failed`.
    pub outcome: &'static str,
    /// Failure reason label.
    pub reason: Option<&'static str>,
    /// Raw body length.
    pub body_bytes: usize,
    /// SHA-256 of the raw body.
    pub body_sha256: String,
}

/// Bulk dispatch summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchAuditEvent {
    /// Admin token fingerprint.
    pub requested_by: String,
    /// Subject ids in the request.
    pub requested: usize,
    /// Links delivered.
    pub sent_count: usize,
    /// Subjects not dispatched.
    pub failed_count: usize,
    /// Deadline communicated to recipients (unix ms).
    pub deadline: i64,
}

/// A consumed token whose effect could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationAuditEvent {
    /// Token identifier.
    pub token_id: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Authorized action.
    pub action_kind: ActionKind,
    /// Non-sensitive decision label.
    pub decision: String,
    /// Consumption instant (unix ms).
    pub consumed_at: Option<i64>,
    /// Collaborator failure.
    pub error: String,
}

/// Admin API authentication decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminAuthAuditEvent {
    /// Request route.
    pub route: &'static str,
    /// Whether access was allowed.
    pub allowed: bool,
    /// Decision reason label.
    pub reason: &'static str,
    /// Matching admin token fingerprint.
    pub token_fingerprint: Option<String>,
}

/// Audit event, tagged by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Link consume attempt.
    LinkConsume(LinkAuditEvent),
    /// Upload link preview.
    LinkPreview(LinkAuditEvent),
    /// Single link issue.
    LinkIssue(IssueAuditEvent),
    /// Bulk delivery attempt.
    LinkDelivery(DeliveryAuditEvent),
    /// Webhook verification.
    WebhookVerify(WebhookAuditEvent),
    /// Bulk dispatch summary.
    BulkDispatch(DispatchAuditEvent),
    /// Consumed but unapplied decision.
    ReconciliationRequired(ReconciliationAuditEvent),
    /// Admin authentication.
    AdminAuth(AdminAuthAuditEvent),
}

impl AuditEvent {
    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LinkConsume(_) => "link_consume",
            Self::LinkPreview(_) => "link_preview",
            Self::LinkIssue(_) => "link_issue",
            Self::LinkDelivery(_) => "link_delivery",
            Self::WebhookVerify(_) => "webhook_verify",
            Self::BulkDispatch(_) => "bulk_dispatch",
            Self::ReconciliationRequired(_) => "reconciliation_required",
            Self::AdminAuth(_) => "admin_auth",
        }
    }
}

/// Timestamped audit record written as one JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Event payload.
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    /// Creates a record stamped at `at`.
    #[must_use]
    pub const fn new(at: Timestamp, event: AuditEvent) -> Self {
        Self {
            timestamp_ms: at.as_unix_millis(),
            event,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for link service events.
pub trait LinkAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, record: &AuditRecord);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrLinkAuditSink;

impl LinkAuditSink for StderrLinkAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(payload) = serde_json::to_string(record) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileLinkAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileLinkAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LinkAuditSink for FileLinkAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(payload) = serde_json::to_string(record)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopLinkAuditSink;

impl LinkAuditSink for NoopLinkAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

/// Audit sink that keeps records in memory, for embedding and tests.
#[derive(Default)]
pub struct MemoryLinkAuditSink {
    /// Recorded events.
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryLinkAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    /// Returns every record rendered as JSON lines.
    #[must_use]
    pub fn rendered(&self) -> String {
        self.records()
            .iter()
            .filter_map(|record| serde_json::to_string(record).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl LinkAuditSink for MemoryLinkAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
