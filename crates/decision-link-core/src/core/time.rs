// crates/decision-link-core/src/core/time.rs
// ============================================================================
// Module: Decision Link Time Model
// Description: Canonical timestamp representation for token lifecycles.
// Purpose: Keep expiry and replay decisions deterministic and testable.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Decision Link operations take the current time as an explicit argument.
//! The core never reads wall-clock time itself; hosts supply it through the
//! [`crate::interfaces::Clock`] interface or directly in tests. Timestamps
//! are unix epoch milliseconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds.
///
/// # Invariants
/// - Values are caller supplied; no monotonicity is enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Creates a timestamp from unix epoch seconds, saturating on overflow.
    #[must_use]
    pub const fn from_unix_secs(value: i64) -> Self {
        Self(value.saturating_mul(1_000))
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Adds a duration, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        let millis = i64::try_from(duration.as_millis()).ok()?;
        self.0.checked_add(millis).map(Self)
    }

    /// Adds signed milliseconds, saturating at the representable bounds.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the absolute distance between two timestamps in milliseconds.
    #[must_use]
    pub const fn abs_diff_millis(self, other: Self) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Returns the duration from `self` until `later`, or `None` when `later`
    /// is not after `self`.
    #[must_use]
    pub fn until(self, later: Self) -> Option<Duration> {
        let delta = later.0.checked_sub(self.0)?;
        if delta <= 0 {
            return None;
        }
        u64::try_from(delta).ok().map(Duration::from_millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
