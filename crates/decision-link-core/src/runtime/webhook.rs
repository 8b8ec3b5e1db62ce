// crates/decision-link-core/src/runtime/webhook.rs
// ============================================================================
// Module: Webhook Verifier
// Description: Shared-secret signature and freshness checks for inbound
//              form notifications.
// Purpose: Accept only authentic, fresh, never-seen-before webhook calls.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The sender signs `timestamp_header || raw_body` with HMAC-SHA256 under a
//! shared secret and sends the lowercase hex digest (optionally prefixed with
//! `sha256=`) together with the timestamp in unix seconds. Verification runs
//! freshness first, then the constant-time signature check, then the replay
//! check. A signature is remembered until its timestamp leaves the tolerance
//! window, after which freshness alone rejects it.
//!
//! Security posture: every failure is terminal and the HTTP layer collapses
//! all of them into one generic response. The replay cache is bounded; when
//! it is full of live entries new requests are refused rather than admitted
//! unchecked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

use crate::core::Timestamp;
use crate::core::hashing::DIGEST_BYTES;
use crate::core::hashing::constant_time_eq;
use crate::core::hashing::hex_decode;
use crate::core::hashing::hex_encode;
use crate::core::hashing::hmac_sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Optional scheme prefix accepted on the signature header.
const SIGNATURE_PREFIX: &str = "sha256=";
/// Minimum webhook secret length in bytes.
pub const MIN_WEBHOOK_SECRET_BYTES: usize = 16;
/// Default freshness tolerance.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);
/// Default replay cache capacity.
pub const DEFAULT_REPLAY_CAPACITY: usize = 10_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Webhook verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Signature is malformed or does not match.
    #[error("webhook signature mismatch")]
    BadSignature,
    /// Timestamp is malformed or outside the tolerance window.
    #[error("webhook timestamp outside tolerance")]
    StaleTimestamp,
    /// Signature already accepted within the window, or the replay cache is
    /// saturated.
    #[error("webhook replay rejected")]
    Replayed,
}

impl WebhookError {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BadSignature => "bad_signature",
            Self::StaleTimestamp => "stale_timestamp",
            Self::Replayed => "replayed",
        }
    }
}

/// Webhook secret construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("webhook secret must be at least {min} bytes")]
pub struct WeakWebhookSecret {
    /// Minimum length.
    pub min: usize,
}

// ============================================================================
// SECTION: Secret
// ============================================================================

/// Shared secret agreed with the webhook sender.
#[derive(Clone)]
pub struct WebhookSecret(Vec<u8>);

impl WebhookSecret {
    /// Wraps raw secret material.
    ///
    /// # Errors
    ///
    /// Returns [`WeakWebhookSecret`] when the secret is too short.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, WeakWebhookSecret> {
        let bytes = bytes.into();
        if bytes.len() < MIN_WEBHOOK_SECRET_BYTES {
            return Err(WeakWebhookSecret {
                min: MIN_WEBHOOK_SECRET_BYTES,
            });
        }
        Ok(Self(bytes))
    }

    /// Computes the lowercase hex signature a sender would attach.
    #[must_use]
    pub fn sign(&self, timestamp_header: &str, raw_body: &[u8]) -> String {
        hex_encode(&self.mac(timestamp_header, raw_body))
    }

    /// Computes the raw MAC over the signed message.
    fn mac(&self, timestamp_header: &str, raw_body: &[u8]) -> [u8; DIGEST_BYTES] {
        hmac_sha256(&self.0, &[timestamp_header.as_bytes(), raw_body])
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

// ============================================================================
// SECTION: Replay Cache
// ============================================================================

/// Bounded map of accepted signatures to the last instant their timestamp is
/// still fresh.
#[derive(Debug)]
struct ReplayCache {
    /// Normalized signature hex to expiry.
    entries: HashMap<String, Timestamp>,
    /// Maximum live entries.
    capacity: usize,
}

impl ReplayCache {
    /// Drops entries whose timestamp can no longer pass the freshness check
    /// and returns how many were removed.
    fn sweep(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, fresh_until| *fresh_until >= now);
        before - self.entries.len()
    }

    /// Records a signature unless it is already present or the cache is full.
    fn admit(
        &mut self,
        signature: String,
        fresh_until: Timestamp,
        now: Timestamp,
    ) -> Result<(), WebhookError> {
        self.sweep(now);
        if self.entries.contains_key(&signature) {
            return Err(WebhookError::Replayed);
        }
        if self.entries.len() >= self.capacity {
            return Err(WebhookError::Replayed);
        }
        self.entries.insert(signature, fresh_until);
        Ok(())
    }

    /// Removes one signature. Returns true when it was present.
    fn release(&mut self, signature: &str) -> bool {
        self.entries.remove(signature).is_some()
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies inbound webhook notifications.
#[derive(Debug)]
pub struct WebhookVerifier {
    /// Shared secret.
    secret: WebhookSecret,
    /// Allowed clock skew in either direction.
    tolerance: Duration,
    /// Replay cache shared across requests.
    cache: Mutex<ReplayCache>,
}

impl WebhookVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(secret: WebhookSecret, tolerance: Duration, replay_capacity: usize) -> Self {
        Self {
            secret,
            tolerance,
            cache: Mutex::new(ReplayCache {
                entries: HashMap::new(),
                capacity: replay_capacity,
            }),
        }
    }

    /// Creates a verifier with the default tolerance and capacity.
    #[must_use]
    pub fn with_defaults(secret: WebhookSecret) -> Self {
        Self::new(secret, DEFAULT_TOLERANCE, DEFAULT_REPLAY_CAPACITY)
    }

    /// Returns the configured tolerance.
    #[must_use]
    pub const fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Verifies one inbound notification and records it against replay.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError`] when the timestamp is stale or malformed, the
    /// signature does not match, or the signature was already accepted.
    pub fn verify(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        timestamp_header: &str,
        now: Timestamp,
    ) -> Result<(), WebhookError> {
        let sent_at = timestamp_header
            .trim()
            .parse::<i64>()
            .map(Timestamp::from_unix_secs)
            .map_err(|_| WebhookError::StaleTimestamp)?;
        let tolerance_ms = u64::try_from(self.tolerance.as_millis()).unwrap_or(u64::MAX);
        if sent_at.abs_diff_millis(now) > tolerance_ms {
            return Err(WebhookError::StaleTimestamp);
        }

        let provided = signature_header.trim();
        let provided = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);
        let provided = hex_decode(provided).ok_or(WebhookError::BadSignature)?;
        let expected = self.secret.mac(timestamp_header, raw_body);
        if !constant_time_eq(&expected, &provided) {
            return Err(WebhookError::BadSignature);
        }

        let tolerance_ms = i64::try_from(tolerance_ms).unwrap_or(i64::MAX);
        let fresh_until = sent_at.saturating_add_millis(tolerance_ms);
        self.cache
            .lock()
            .map_err(|_| WebhookError::Replayed)?
            .admit(hex_encode(&expected), fresh_until, now)
    }

    /// Releases the replay entry of a notification accepted by
    /// [`Self::verify`] whose hand-off then failed, so the sender's retry of
    /// the same signed delivery is admitted. Returns true when an entry was
    /// removed.
    ///
    /// The entry stays reserved while the hand-off runs, so concurrent
    /// duplicates are still refused as replays.
    pub fn release(&self, raw_body: &[u8], timestamp_header: &str) -> bool {
        let signature = hex_encode(&self.secret.mac(timestamp_header, raw_body));
        self.cache.lock().is_ok_and(|mut cache| cache.release(&signature))
    }

    /// Removes replay entries that have left the window. Returns the number
    /// removed.
    pub fn sweep(&self, now: Timestamp) -> usize {
        self.cache.lock().map_or(0, |mut cache| cache.sweep(now))
    }

    /// Returns the number of live replay entries.
    #[must_use]
    pub fn replay_entries(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.entries.len())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
