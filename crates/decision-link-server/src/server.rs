// crates/decision-link-server/src/server.rs
// ============================================================================
// Module: Link Server
// Description: HTTP routes for decision links, uploads, webhooks, and bulk
//              sends.
// Purpose: Expose the link engine over HTTP with fail-closed mapping.
// Dependencies: decision-link-core, decision-link-config, axum, tokio
// ============================================================================

//! ## Overview
//! [`LinkServer`] wires the core components to four route groups:
//!
//! - `GET /secure-decision/{bearer}?decision=` consumes a decision link.
//! - `GET /secure-upload/{bearer}` previews an upload link;
//!   `POST /secure-upload/{bearer}` consumes it with the request body.
//! - `POST /webhooks/forms` verifies and hands off form notifications.
//! - `POST /api/enrollment-emails/send-bulk` issues and mails links (admin).
//!
//! Store and collaborator calls are synchronous and run on the blocking pool.
//! Link failures keep their distinct status codes; webhook failures all
//! collapse into one generic `401`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path as UrlPath;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use decision_link_config::AdminToken;
use decision_link_config::DecisionLinkConfig;
use decision_link_config::ResolvedSecrets;
use decision_link_config::ServerAuditConfig;
use decision_link_config::StoreConfig;
use decision_link_config::StoreType;
use decision_link_core::ActionKind;
use decision_link_core::ApplyError;
use decision_link_core::ApplyOutcome;
use decision_link_core::BatchDispatchCoordinator;
use decision_link_core::Clock;
use decision_link_core::Decision;
use decision_link_core::DecisionRecorder;
use decision_link_core::EnrollmentChoice;
use decision_link_core::FormDocument;
use decision_link_core::FormEventSink;
use decision_link_core::InMemoryTokenStore;
use decision_link_core::LinkIssuer;
use decision_link_core::SharedTokenStore;
use decision_link_core::SubjectId;
use decision_link_core::SystemClock;
use decision_link_core::Timestamp;
use decision_link_core::TokenCodec;
use decision_link_core::WebhookError;
use decision_link_core::WebhookVerifier;
use decision_link_core::hashing::sha256_hex;
use decision_link_store_sqlite::SqliteTokenStore;
use serde::Deserialize;
use serde::Serialize;

use crate::audit::AdminAuthAuditEvent;
use crate::audit::AuditEvent;
use crate::audit::AuditRecord;
use crate::audit::DispatchAuditEvent;
use crate::audit::FileLinkAuditSink;
use crate::audit::LinkAuditEvent;
use crate::audit::LinkAuditSink;
use crate::audit::NoopLinkAuditSink;
use crate::audit::ReconciliationAuditEvent;
use crate::audit::StderrLinkAuditSink;
use crate::audit::WebhookAuditEvent;
use crate::auth::authorize_admin;
use crate::collaborators::AuditingMailer;
use crate::collaborators::DecisionLedger;
use crate::collaborators::FormEventLedger;
use crate::collaborators::OutboxMailer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signature header on webhook requests.
const SIGNATURE_HEADER: &str = "x-signature";
/// Timestamp header on webhook requests.
const TIMESTAMP_HEADER: &str = "x-timestamp";
/// Maximum characters of a rejected subject id echoed back.
const MAX_ECHOED_SUBJECT_CHARS: usize = 128;
/// Maximum upload filename length kept.
const MAX_FILENAME_BYTES: usize = 255;

// ============================================================================
// SECTION: State
// ============================================================================

/// Components a router is built from.
pub struct StateParts {
    /// Decision recorder for link routes.
    pub recorder: DecisionRecorder,
    /// Bulk dispatch coordinator.
    pub coordinator: BatchDispatchCoordinator,
    /// Webhook verifier.
    pub verifier: Arc<WebhookVerifier>,
    /// Form-processing collaborator.
    pub form_sink: Arc<dyn FormEventSink>,
    /// Audit sink.
    pub audit: Arc<dyn LinkAuditSink>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Accepted admin tokens.
    pub admin_tokens: Vec<AdminToken>,
    /// Upper bound on bulk-issued token lifetime.
    pub max_ttl: Duration,
    /// Maximum subjects per bulk request.
    pub max_bulk_subjects: usize,
    /// Maximum request body size.
    pub max_body_bytes: usize,
}

/// Shared server state for handlers.
pub struct AppState {
    /// Decision recorder.
    recorder: DecisionRecorder,
    /// Bulk dispatch coordinator.
    coordinator: BatchDispatchCoordinator,
    /// Webhook verifier.
    verifier: Arc<WebhookVerifier>,
    /// Form-processing collaborator.
    form_sink: Arc<dyn FormEventSink>,
    /// Audit sink.
    audit: Arc<dyn LinkAuditSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Accepted admin tokens.
    admin_tokens: Vec<AdminToken>,
    /// Upper bound on bulk-issued token lifetime.
    max_ttl: Duration,
    /// Maximum subjects per bulk request.
    max_bulk_subjects: usize,
    /// Maximum request body size.
    max_body_bytes: usize,
}

impl AppState {
    /// Builds state from its parts.
    #[must_use]
    pub fn new(parts: StateParts) -> Self {
        Self {
            recorder: parts.recorder,
            coordinator: parts.coordinator,
            verifier: parts.verifier,
            form_sink: parts.form_sink,
            audit: parts.audit,
            clock: parts.clock,
            admin_tokens: parts.admin_tokens,
            max_ttl: parts.max_ttl,
            max_bulk_subjects: parts.max_bulk_subjects,
            max_body_bytes: parts.max_body_bytes,
        }
    }

    /// Records an audit event stamped with the current time.
    fn emit(&self, event: AuditEvent) {
        self.audit.record(&AuditRecord::new(self.clock.now(), event));
    }
}

/// Builds the HTTP router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/secure-decision/{bearer}", get(handle_decision))
        .route("/secure-upload/{bearer}", get(handle_upload_preview).post(handle_upload))
        .route("/webhooks/forms", post(handle_webhook))
        .route("/api/enrollment-emails/send-bulk", post(handle_send_bulk))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Link Server
// ============================================================================

/// Link server instance.
pub struct LinkServer {
    /// Listen address.
    bind: SocketAddr,
    /// Shared handler state.
    state: Arc<AppState>,
}

impl LinkServer {
    /// Builds a server from validated configuration and resolved secrets.
    ///
    /// # Errors
    ///
    /// Returns [`LinkServerError`] when initialization fails.
    pub fn from_config(
        config: &DecisionLinkConfig,
        secrets: ResolvedSecrets,
    ) -> Result<Self, LinkServerError> {
        config.validate().map_err(|err| LinkServerError::Config(err.to_string()))?;
        let bind =
            config.server.bind_addr().map_err(|err| LinkServerError::Config(err.to_string()))?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let audit = build_audit_sink(&config.server.audit)?;
        let store = build_token_store(&config.store)?;
        let codec = TokenCodec::new(secrets.signing_key);
        let issuer = LinkIssuer::new(codec.clone(), store.clone(), &config.server.public_base_url);

        let dir = Path::new(config.collaborators.dir.trim());
        let ledger =
            DecisionLedger::open(dir).map_err(|err| LinkServerError::Init(err.to_string()))?;
        let forms =
            FormEventLedger::open(dir).map_err(|err| LinkServerError::Init(err.to_string()))?;
        let outbox =
            OutboxMailer::open(dir).map_err(|err| LinkServerError::Init(err.to_string()))?;
        let mailer = AuditingMailer::new(Arc::new(outbox), Arc::clone(&audit), Arc::clone(&clock));

        let state = AppState::new(StateParts {
            recorder: DecisionRecorder::new(codec, store, Arc::new(ledger)),
            coordinator: BatchDispatchCoordinator::new(
                issuer,
                Arc::new(mailer),
                Arc::clone(&clock),
                config.dispatch.to_dispatch_config(),
            ),
            verifier: Arc::new(WebhookVerifier::new(
                secrets.webhook_secret,
                config.webhook.tolerance(),
                config.webhook.replay_capacity,
            )),
            form_sink: Arc::new(forms),
            audit,
            clock,
            admin_tokens: secrets.admin_tokens,
            max_ttl: config.tokens.max_ttl(),
            max_bulk_subjects: config.server.max_bulk_subjects,
            max_body_bytes: config.server.max_body_bytes,
        });
        Ok(Self {
            bind,
            state: Arc::new(state),
        })
    }

    /// Returns the configured listen address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`LinkServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), LinkServerError> {
        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|_| LinkServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, router(self.state))
            .await
            .map_err(|_| LinkServerError::Transport("http server failed".to_string()))
    }
}

/// Builds the token store from configuration.
///
/// # Errors
///
/// Returns [`LinkServerError`] when the store cannot be opened.
pub fn build_token_store(config: &StoreConfig) -> Result<SharedTokenStore, LinkServerError> {
    match config.store_type {
        StoreType::Memory => Ok(SharedTokenStore::from_store(InMemoryTokenStore::new())),
        StoreType::Sqlite => {
            let sqlite_config = config.sqlite_config().ok_or_else(|| {
                LinkServerError::Config("sqlite store requires path".to_string())
            })?;
            let store = SqliteTokenStore::new(&sqlite_config)
                .map_err(|err| LinkServerError::Init(err.to_string()))?;
            Ok(SharedTokenStore::from_store(store))
        }
    }
}

/// Builds the audit sink from configuration.
///
/// # Errors
///
/// Returns [`LinkServerError::Init`] when the audit file cannot be opened.
pub fn build_audit_sink(
    config: &ServerAuditConfig,
) -> Result<Arc<dyn LinkAuditSink>, LinkServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopLinkAuditSink));
    }
    match &config.path {
        Some(path) => FileLinkAuditSink::new(Path::new(path.trim()))
            .map(|sink| Arc::new(sink) as Arc<dyn LinkAuditSink>)
            .map_err(|err| LinkServerError::Init(format!("audit log: {err}"))),
        None => Ok(Arc::new(StderrLinkAuditSink)),
    }
}

// ============================================================================
// SECTION: Views
// ============================================================================

/// Successful link use.
#[derive(Debug, Serialize)]
struct ConfirmedView {
    /// Always `confirmed`.
    status: &'static str,
    /// Subject display name.
    subject_name: String,
    /// Subject division.
    division: Option<String>,
    /// Decision label.
    decision: String,
    /// Consumption instant (unix ms).
    consumed_at: Option<i64>,
}

/// Still-usable upload link.
#[derive(Debug, Serialize)]
struct PreviewView {
    /// Always `ready`.
    status: &'static str,
    /// Authorized action.
    action_kind: ActionKind,
    /// Expiry instant (unix ms).
    expires_at: i64,
}

/// Status-only response.
#[derive(Debug, Serialize)]
struct StatusView {
    /// Status label.
    status: &'static str,
    /// User-facing message.
    message: &'static str,
}

/// Error response.
#[derive(Debug, Serialize)]
struct ErrorView {
    /// Always `error`.
    status: &'static str,
    /// Stable error code.
    error: &'static str,
    /// User-facing message.
    message: &'static str,
}

/// Builds an error response.
fn error_view(status: StatusCode, error: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(ErrorView {
            status: "error",
            error,
            message,
        }),
    )
        .into_response()
}

/// Maps a link failure to its HTTP status.
const fn apply_error_status(error: &ApplyError) -> StatusCode {
    match error {
        ApplyError::InvalidLink {
            ..
        } => StatusCode::BAD_REQUEST,
        ApplyError::LinkAlreadyUsed {
            ..
        } => StatusCode::CONFLICT,
        ApplyError::LinkExpired {
            ..
        } => StatusCode::GONE,
        ApplyError::Unavailable {
            ..
        } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Builds the response for a link failure.
fn apply_error_view(error: &ApplyError) -> Response {
    error_view(apply_error_status(error), error.code(), error.message())
}

// ============================================================================
// SECTION: Link Handlers
// ============================================================================

/// Decision link query parameters.
#[derive(Debug, Deserialize)]
struct DecisionQuery {
    /// Requested enrollment decision.
    decision: Option<String>,
}

/// Upload link query parameters.
#[derive(Debug, Deserialize)]
struct UploadQuery {
    /// Client-supplied filename.
    filename: Option<String>,
}

/// Consumes a decision link.
async fn handle_decision(
    State(state): State<Arc<AppState>>,
    UrlPath(bearer): UrlPath<String>,
    Query(query): Query<DecisionQuery>,
) -> Response {
    let choice = query.decision.as_deref().map(str::parse::<EnrollmentChoice>);
    let Some(Ok(choice)) = choice else {
        return error_view(
            StatusCode::BAD_REQUEST,
            "invalid_decision",
            "Please choose Enrolled, Declined, or Deferred.",
        );
    };
    consume(state, bearer, ActionKind::EnrollmentDecision, Decision::Enrollment(choice)).await
}

/// Previews an upload link without consuming it.
async fn handle_upload_preview(
    State(state): State<Arc<AppState>>,
    UrlPath(bearer): UrlPath<String>,
) -> Response {
    let now = state.clock.now();
    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        worker.recorder.preview(&bearer, ActionKind::FormUpload, now)
    })
    .await
    .unwrap_or_else(|err| {
        Err(ApplyError::Unavailable {
            detail: err.to_string(),
        })
    });
    match result {
        Ok(preview) => {
            state.emit(AuditEvent::LinkPreview(LinkAuditEvent {
                action_kind: ActionKind::FormUpload,
                token_id: Some(preview.token_id.to_string()),
                subject_id: Some(preview.subject_id.to_string()),
                outcome: "ready",
                reason: None,
                decision: None,
            }));
            (
                StatusCode::OK,
                Json(PreviewView {
                    status: "ready",
                    action_kind: preview.action_kind,
                    expires_at: preview.expires_at.as_unix_millis(),
                }),
            )
                .into_response()
        }
        Err(error) => {
            state.emit(AuditEvent::LinkPreview(rejected_event(ActionKind::FormUpload, &error)));
            apply_error_view(&error)
        }
    }
}

/// Consumes an upload link with the request body as the document.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    UrlPath(bearer): UrlPath<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return error_view(
            StatusCode::BAD_REQUEST,
            "empty_document",
            "Please attach the signed form.",
        );
    }
    let document = FormDocument {
        filename: query.filename.as_deref().and_then(clean_filename),
        content: body.to_vec(),
    };
    consume(state, bearer, ActionKind::FormUpload, Decision::FormUpload(document)).await
}

/// Runs the recorder on the blocking pool and renders the outcome.
async fn consume(
    state: Arc<AppState>,
    bearer: String,
    action_kind: ActionKind,
    decision: Decision,
) -> Response {
    let now = state.clock.now();
    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        worker.recorder.apply(&bearer, action_kind, &decision, now)
    })
    .await
    .unwrap_or_else(|err| {
        Err(ApplyError::Unavailable {
            detail: err.to_string(),
        })
    });
    match result {
        Ok(ApplyOutcome::Applied {
            token,
            effect,
            decision,
        }) => {
            state.emit(AuditEvent::LinkConsume(LinkAuditEvent {
                action_kind,
                token_id: Some(token.token_id.to_string()),
                subject_id: Some(token.subject_id.to_string()),
                outcome: "applied",
                reason: None,
                decision: Some(decision.clone()),
            }));
            (
                StatusCode::OK,
                Json(ConfirmedView {
                    status: "confirmed",
                    subject_name: effect.subject_name,
                    division: effect.division,
                    decision,
                    consumed_at: token.consumed_at.map(Timestamp::as_unix_millis),
                }),
            )
                .into_response()
        }
        Ok(ApplyOutcome::ConsumedButUnapplied {
            token,
            decision,
            error,
        }) => {
            state.emit(AuditEvent::LinkConsume(LinkAuditEvent {
                action_kind,
                token_id: Some(token.token_id.to_string()),
                subject_id: Some(token.subject_id.to_string()),
                outcome: "consumed_unapplied",
                reason: Some("sink_failed"),
                decision: Some(decision.clone()),
            }));
            state.emit(AuditEvent::ReconciliationRequired(ReconciliationAuditEvent {
                token_id: token.token_id.to_string(),
                subject_id: token.subject_id.to_string(),
                action_kind,
                decision,
                consumed_at: token.consumed_at.map(Timestamp::as_unix_millis),
                error: error.to_string(),
            }));
            (
                StatusCode::ACCEPTED,
                Json(StatusView {
                    status: "pending_reconciliation",
                    message: "Your response was received and is being processed.",
                }),
            )
                .into_response()
        }
        Err(error) => {
            state.emit(AuditEvent::LinkConsume(rejected_event(action_kind, &error)));
            apply_error_view(&error)
        }
    }
}

/// Builds the audit payload for a rejected link. Only authenticated token
/// ids are recorded.
fn rejected_event(action_kind: ActionKind, error: &ApplyError) -> LinkAuditEvent {
    LinkAuditEvent {
        action_kind,
        token_id: error.token_id().map(ToString::to_string),
        subject_id: None,
        outcome: "rejected",
        reason: Some(error.reason()),
        decision: None,
    }
}

/// Keeps the final path component of a client filename, bounded in size.
fn clean_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name.chars().filter(|ch| !ch.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    let mut out = String::new();
    for ch in cleaned.chars() {
        if out.len() + ch.len_utf8() > MAX_FILENAME_BYTES {
            break;
        }
        out.push(ch);
    }
    Some(out)
}

// ============================================================================
// SECTION: Webhook Handler
// ============================================================================

/// Verifies a form webhook and hands it off.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now = state.clock.now();
    let body_sha256 = sha256_hex(&body);
    let signature = header_str(&headers, SIGNATURE_HEADER);
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let verdict = match (signature, timestamp) {
        (Some(signature), Some(timestamp)) => state
            .verifier
            .verify(&body, signature, timestamp, now)
            .map_err(WebhookError::label),
        _ => Err("missing_headers"),
    };
    if let Err(reason) = verdict {
        state.emit(AuditEvent::WebhookVerify(WebhookAuditEvent {
            outcome: "rejected",
            reason: Some(reason),
            body_bytes: body.len(),
            body_sha256,
        }));
        return error_view(StatusCode::UNAUTHORIZED, "unauthorized", "Request not authorized.");
    }

    let sink = Arc::clone(&state.form_sink);
    let payload = body.clone();
    let handoff = tokio::task::spawn_blocking(move || sink.accept(&payload, now)).await;
    let accepted = matches!(handoff, Ok(Ok(())));
    if !accepted {
        if let Some(timestamp) = timestamp {
            state.verifier.release(&body, timestamp);
        }
    }
    state.emit(AuditEvent::WebhookVerify(WebhookAuditEvent {
        outcome: if accepted { "accepted" } else { "handoff_failed" },
        reason: None,
        body_bytes: body.len(),
        body_sha256,
    }));
    if accepted {
        (
            StatusCode::OK,
            Json(StatusView {
                status: "accepted",
                message: "Notification accepted.",
            }),
        )
            .into_response()
    } else {
        error_view(StatusCode::BAD_GATEWAY, "handoff_failed", "Form processing is unavailable.")
    }
}

/// Returns a header value as text.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// SECTION: Bulk Send Handler
// ============================================================================

/// Bulk send request body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BulkSendRequest {
    /// Subjects to send links to.
    subject_ids: Vec<String>,
    /// Decision deadline (unix ms).
    deadline: i64,
}

/// Per-subject failure in a bulk send response.
#[derive(Debug, Serialize)]
struct BulkSendError {
    /// Subject as supplied.
    subject_id: String,
    /// Failure class.
    kind: &'static str,
    /// Operator-facing detail.
    detail: String,
    /// Delivery attempts made.
    attempts: u32,
}

/// Bulk send response body.
#[derive(Debug, Serialize)]
struct BulkSendResponse {
    /// Links delivered.
    sent_count: usize,
    /// Subjects not dispatched.
    failed_count: usize,
    /// Failure details.
    errors: Vec<BulkSendError>,
}

/// Issues and mails enrollment decision links.
async fn handle_send_bulk(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth_header = header_str(&headers, AUTHORIZATION.as_str());
    let caller = match authorize_admin(&state.admin_tokens, auth_header) {
        Ok(caller) => caller,
        Err(err) => {
            state.emit(AuditEvent::AdminAuth(AdminAuthAuditEvent {
                route: "send_bulk",
                allowed: false,
                reason: err.label(),
                token_fingerprint: None,
            }));
            return error_view(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Admin authentication required.",
            );
        }
    };
    state.emit(AuditEvent::AdminAuth(AdminAuthAuditEvent {
        route: "send_bulk",
        allowed: true,
        reason: "token_matched",
        token_fingerprint: Some(caller.fingerprint.clone()),
    }));

    let Ok(request) = serde_json::from_slice::<BulkSendRequest>(&body) else {
        return error_view(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Expected {\"subject_ids\": [...], \"deadline\": <unix ms>}.",
        );
    };
    if request.subject_ids.is_empty() || request.subject_ids.len() > state.max_bulk_subjects {
        return error_view(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "subject_ids must be non-empty and within the configured limit.",
        );
    }
    let now = state.clock.now();
    let deadline = Timestamp::from_unix_millis(request.deadline);
    let Some(ttl) = now.until(deadline) else {
        return error_view(
            StatusCode::BAD_REQUEST,
            "deadline_in_past",
            "The deadline must be in the future.",
        );
    };
    let ttl = ttl.min(state.max_ttl);

    let requested = request.subject_ids.len();
    let mut errors = Vec::new();
    let mut subjects = Vec::with_capacity(requested);
    for raw in request.subject_ids {
        match SubjectId::new(raw.as_str()) {
            Ok(subject) => subjects.push(subject),
            Err(err) => errors.push(BulkSendError {
                subject_id: raw.chars().take(MAX_ECHOED_SUBJECT_CHARS).collect(),
                kind: "invalid_subject",
                detail: err.to_string(),
                attempts: 0,
            }),
        }
    }
    let report = state
        .coordinator
        .send_bulk(subjects, ActionKind::EnrollmentDecision, ttl, deadline)
        .await;
    errors.extend(report.failed.iter().map(|failure| BulkSendError {
        subject_id: failure.subject_id.to_string(),
        kind: failure.kind.as_str(),
        detail: failure.detail.clone(),
        attempts: failure.attempts,
    }));
    let response = BulkSendResponse {
        sent_count: report.sent_count(),
        failed_count: errors.len(),
        errors,
    };
    state.emit(AuditEvent::BulkDispatch(DispatchAuditEvent {
        requested_by: caller.fingerprint,
        requested,
        sent_count: response.sent_count,
        failed_count: response.failed_count,
        deadline: deadline.as_unix_millis(),
    }));
    (StatusCode::OK, Json(response)).into_response()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Link server errors.
#[derive(Debug, thiserror::Error)]
pub enum LinkServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::clean_filename;

    #[test]
    fn filenames_keep_last_component() {
        assert_eq!(clean_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(clean_filename("C:\\forms\\w9.pdf").as_deref(), Some("w9.pdf"));
        assert_eq!(clean_filename("dir/.."), None);
        assert_eq!(clean_filename("  "), None);
    }

    #[test]
    fn filenames_are_bounded() {
        let long = "é".repeat(300);
        let cleaned = clean_filename(&long).unwrap_or_default();
        assert!(cleaned.len() <= 255);
        assert!(cleaned.chars().all(|ch| ch == 'é'));
    }
}
