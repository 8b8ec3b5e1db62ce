// crates/decision-link-core/src/runtime/clock.rs
// ============================================================================
// Module: Decision Link Clocks
// Description: Wall-clock and fixed clock implementations.
// Purpose: Supply explicit time to the engine from hosts and tests.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The engine never reads the system clock directly. Hosts use
//! [`SystemClock`]; tests use [`FixedClock`] to pin time and move it by hand.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

/// Manually driven clock.
#[derive(Debug, Default)]
pub struct FixedClock {
    /// Current unix milliseconds.
    millis: AtomicI64,
}

impl FixedClock {
    /// Creates a clock pinned at `now`.
    #[must_use]
    pub const fn new(now: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(now.as_unix_millis()),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_unix_millis(), Ordering::SeqCst);
    }

    /// Advances the clock by `millis`.
    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
