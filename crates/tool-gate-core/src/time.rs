// crates/tool-gate-core/src/time.rs
// ============================================================================
// Module: Tool Gate Time Model
// Description: Clock abstraction for rate windows, expiry, and audit stamps.
// Purpose: Keep wall-clock reads behind an injectable interface.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Components never read wall-clock time directly. They hold a [`Clock`] so
//! window rollover and credential expiry can be driven deterministically in
//! tests through [`ManualClock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of unix-epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in unix milliseconds.
    fn now_ms(&self) -> u64;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Manually advanced clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time in unix milliseconds.
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock starting at the given unix milliseconds.
    #[must_use]
    pub const fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Advances the current time by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
