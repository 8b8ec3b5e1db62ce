// crates/decision-link-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Batch Dispatch Coordinator
// Description: Bulk link issuance and delivery with per-subject outcomes.
// Purpose: Send many links concurrently without duplicate issuance.
// Dependencies: tokio, crate::interfaces, crate::runtime::issuer
// ============================================================================

//! ## Overview
//! [`BatchDispatchCoordinator::send_bulk`] issues one token per distinct
//! subject and hands each link to the [`LinkMailer`]. Concurrency is bounded
//! by a semaphore. Issuance is attempted exactly once per subject: issuing
//! again would supersede a link that may already be on its way. Delivery is
//! retried on transient failures with exponential backoff, up to a fixed
//! attempt count.
//!
//! A timeout while issuing or sending is recorded as
//! [`DispatchFailureKind::OutcomeUnknown`] and never retried, because the
//! write or the message may have gone through.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::core::ActionKind;
use crate::core::SubjectId;
use crate::core::Timestamp;
use crate::interfaces::Clock;
use crate::interfaces::LinkMailer;
use crate::interfaces::LinkMessage;
use crate::runtime::issuer::IssueError;
use crate::runtime::issuer::LinkIssuer;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Dispatch tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum subjects processed at once.
    pub concurrency: usize,
    /// Maximum delivery attempts per subject (at least 1).
    pub max_attempts: u32,
    /// Delay before the second delivery attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single backoff delay.
    pub max_backoff: Duration,
    /// Time limit for one issuance or one delivery attempt.
    pub subject_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            subject_timeout: Duration::from_secs(10),
        }
    }
}

impl DispatchConfig {
    /// Returns the delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1_u32 << shift).min(self.max_backoff)
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Why a subject did not receive a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailureKind {
    /// No token was issued.
    IssueFailed,
    /// A token was issued but delivery failed.
    DeliveryFailed,
    /// Issuance or delivery timed out; the link may or may not exist or
    /// have been sent.
    OutcomeUnknown,
}

impl DispatchFailureKind {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IssueFailed => "issue_failed",
            Self::DeliveryFailed => "delivery_failed",
            Self::OutcomeUnknown => "outcome_unknown",
        }
    }
}

/// One subject that was not dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    /// Affected subject.
    pub subject_id: SubjectId,
    /// Failure class.
    pub kind: DispatchFailureKind,
    /// Operator-facing detail.
    pub detail: String,
    /// Delivery attempts made.
    pub attempts: u32,
}

/// Per-subject results of a bulk send, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Subjects whose link was issued and delivered.
    pub sent: Vec<SubjectId>,
    /// Subjects that were not dispatched.
    pub failed: Vec<DispatchFailure>,
}

impl BatchReport {
    /// Number of delivered links.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    /// Number of failed subjects.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Issues and delivers links for many subjects.
#[derive(Clone)]
pub struct BatchDispatchCoordinator {
    /// Link issuer.
    issuer: LinkIssuer,
    /// Delivery collaborator.
    mailer: Arc<dyn LinkMailer>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Tuning.
    config: DispatchConfig,
}

impl BatchDispatchCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        issuer: LinkIssuer,
        mailer: Arc<dyn LinkMailer>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            issuer,
            mailer,
            clock,
            config,
        }
    }

    /// Issues and delivers one link per distinct subject.
    ///
    /// Duplicate subject ids are dispatched once. Never fails as a whole;
    /// every subject appears in exactly one of `sent` or `failed`.
    pub async fn send_bulk(
        &self,
        subject_ids: Vec<SubjectId>,
        action_kind: ActionKind,
        ttl: Duration,
        deadline: Timestamp,
    ) -> BatchReport {
        let mut seen = BTreeSet::new();
        let subjects: Vec<SubjectId> =
            subject_ids.into_iter().filter(|subject| seen.insert(subject.clone())).collect();

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(subjects.len());
        for subject_id in &subjects {
            let job = SubjectJob {
                issuer: self.issuer.clone(),
                mailer: Arc::clone(&self.mailer),
                clock: Arc::clone(&self.clock),
                config: self.config,
                subject_id: subject_id.clone(),
                action_kind,
                ttl,
                deadline,
            };
            let permits = Arc::clone(&permits);
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Err(failure(
                        &job.subject_id,
                        DispatchFailureKind::IssueFailed,
                        "dispatch semaphore closed".to_string(),
                        0,
                    ));
                };
                job.run().await
            }));
        }

        let mut report = BatchReport::default();
        for (subject_id, handle) in subjects.into_iter().zip(handles) {
            match handle.await {
                Ok(Ok(())) => report.sent.push(subject_id),
                Ok(Err(failed)) => report.failed.push(failed),
                Err(err) => report.failed.push(failure(
                    &subject_id,
                    DispatchFailureKind::OutcomeUnknown,
                    format!("dispatch task aborted: {err}"),
                    0,
                )),
            }
        }
        report
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Work item for one subject.
struct SubjectJob {
    /// Link issuer.
    issuer: LinkIssuer,
    /// Delivery collaborator.
    mailer: Arc<dyn LinkMailer>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Tuning.
    config: DispatchConfig,
    /// Target subject.
    subject_id: SubjectId,
    /// Action the link authorizes.
    action_kind: ActionKind,
    /// Link lifetime.
    ttl: Duration,
    /// Deadline communicated to the recipient.
    deadline: Timestamp,
}

impl SubjectJob {
    /// Issues once, then delivers with bounded retries.
    async fn run(self) -> Result<(), DispatchFailure> {
        let issuer = self.issuer.clone();
        let subject_id = self.subject_id.clone();
        let (action_kind, ttl, now) = (self.action_kind, self.ttl, self.clock.now());
        let issuing = tokio::task::spawn_blocking(move || {
            issuer.issue(&subject_id, action_kind, now, ttl)
        });
        let issued = match tokio::time::timeout(self.config.subject_timeout, issuing).await {
            Err(_) => {
                return Err(self.fail(
                    DispatchFailureKind::OutcomeUnknown,
                    "issuance timed out".to_string(),
                    0,
                ));
            }
            Ok(Err(err)) => {
                return Err(self.fail(
                    DispatchFailureKind::OutcomeUnknown,
                    format!("issuance task failed: {err}"),
                    0,
                ));
            }
            Ok(Ok(Err(err))) => return Err(self.issue_failure(&err)),
            Ok(Ok(Ok(issued))) => issued,
        };

        let message = LinkMessage {
            subject_id: self.subject_id.clone(),
            action_kind: self.action_kind,
            token_id: issued.record.token_id.clone(),
            link: issued.link.clone(),
            expires_at: issued.record.expires_at,
            deadline: self.deadline,
        };
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match tokio::time::timeout(self.config.subject_timeout, self.mailer.send(&message)).await
            {
                Ok(Ok(())) => return Ok(()),
                Err(_) => {
                    return Err(self.fail(
                        DispatchFailureKind::OutcomeUnknown,
                        "delivery timed out".to_string(),
                        attempt,
                    ));
                }
                Ok(Err(err)) if err.is_transient() && attempt < max_attempts => {
                    tokio::time::sleep(self.config.backoff_for(attempt)).await;
                }
                Ok(Err(err)) => {
                    return Err(self.fail(
                        DispatchFailureKind::DeliveryFailed,
                        err.to_string(),
                        attempt,
                    ));
                }
            }
        }
    }

    /// Builds a failure entry for this job's subject.
    fn fail(&self, kind: DispatchFailureKind, detail: String, attempts: u32) -> DispatchFailure {
        failure(&self.subject_id, kind, detail, attempts)
    }

    /// Classifies an issuance error.
    fn issue_failure(&self, err: &IssueError) -> DispatchFailure {
        self.fail(DispatchFailureKind::IssueFailed, err.to_string(), 0)
    }
}

/// Builds a failure entry.
fn failure(
    subject_id: &SubjectId,
    kind: DispatchFailureKind,
    detail: String,
    attempts: u32,
) -> DispatchFailure {
    DispatchFailure {
        subject_id: subject_id.clone(),
        kind,
        detail,
        attempts,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = DispatchConfig {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            ..DispatchConfig::default()
        };
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(350));
    }
}
