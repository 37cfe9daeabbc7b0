// crates/tool-gate-core/src/rate_limit.rs
// ============================================================================
// Module: Tool Gate Rate Limiter
// Description: Fixed-window budgets per client, per client-tool, and per source.
// Purpose: Enforce multi-scope budgets atomically under concurrent load.
// Dependencies: tokio, thiserror
// ============================================================================

//! ## Overview
//! Budgets are counted in fixed windows aligned to wall-clock multiples of the
//! window size. An invocation charges two scopes (client global and
//! client-tool) through a [`CounterStore`], which evaluates every scope first
//! and commits the cost to all of them only when every scope fits. Failed
//! authentications charge a separate scope keyed by caller source.
//!
//! ## Invariants
//! - Check and commit for a set of keys happen under the locks of all those
//!   keys, acquired in canonical key order.
//! - A window start never decreases; a request at a boundary lands in the new
//!   window.
//! - A denial commits nothing to any scope.
//! - Eviction never blocks on a window held by a live caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::identifiers::ToolName;
use crate::identity::ClientIdentity;
use crate::time::Clock;
use crate::tool::ToolSpec;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default window size in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;
/// Default global budget per client per window.
pub const DEFAULT_CLIENT_LIMIT: u64 = 600;
/// Default per-tool budget per client per window.
pub const DEFAULT_TOOL_LIMIT: u64 = 120;
/// Default failed-authentication budget per source per window.
pub const DEFAULT_AUTH_FAILURE_LIMIT: u64 = 10;
/// Default failed-authentication window in milliseconds.
pub const DEFAULT_AUTH_FAILURE_WINDOW_MS: u64 = 60_000;
/// Default idle period before a window may be evicted.
pub const DEFAULT_IDLE_EVICT_MS: u64 = 300_000;
/// Default shard count for the in-memory store.
pub const DEFAULT_SHARDS: usize = 16;
/// Default maximum number of tracked windows.
pub const DEFAULT_MAX_ENTRIES: usize = 65_536;
/// Subject used for callers without a known source address.
pub const ANONYMOUS_SOURCE: &str = "anonymous";

// ============================================================================
// SECTION: Keys and Charges
// ============================================================================

/// Budget scope counted by a window.
///
/// Variant order is the canonical lock order within one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RateScope {
    /// All tools for one client.
    Global,
    /// One tool for one client.
    Tool(ToolName),
    /// Failed authentications from one source.
    AuthFailure,
}

impl RateScope {
    /// Returns a stable label for logs and audit records.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Tool(_) => "tool",
            Self::AuthFailure => "auth_failure",
        }
    }
}

/// Identity of one counting window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    /// Client identifier or caller source.
    pub subject: String,
    /// Scope counted for the subject.
    pub scope: RateScope,
}

/// One scope evaluated as part of a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeCharge {
    /// Window key.
    pub key: WindowKey,
    /// Budget per window.
    pub limit: u64,
    /// Window size in milliseconds.
    pub window_ms: u64,
}

/// Outcome of a rate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Every scope had room for the cost.
    Allowed,
    /// At least one scope was exhausted.
    Denied {
        /// Longest remaining time across the exhausted scopes.
        retry_after: Duration,
        /// Scope that produced `retry_after`.
        scope: RateScope,
    },
}

impl RateDecision {
    /// Returns true when the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

// ============================================================================
// SECTION: Counter Store
// ============================================================================

/// Linearizable counter storage for rate windows.
///
/// Implementations must evaluate and commit a multi-scope charge as one atomic
/// step with respect to every key it touches. A distributed store provides
/// the same contract through its own atomic primitives.
pub trait CounterStore: Send + Sync {
    /// Evaluates the charges without consuming budget.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the store cannot serve the request.
    fn check(&self, charges: &[ScopeCharge], cost: u64, now_ms: u64) -> Result<RateDecision, CounterStoreError>;

    /// Evaluates the charges and, when every scope fits, consumes `cost` from all.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the store cannot serve the request.
    fn check_and_consume(
        &self,
        charges: &[ScopeCharge],
        cost: u64,
        now_ms: u64,
    ) -> Result<RateDecision, CounterStoreError>;

    /// Removes windows whose period ended and that were idle for `idle_ms`.
    fn evict_idle(&self, now_ms: u64, idle_ms: u64) -> usize;

    /// Returns the number of tracked windows.
    fn len(&self) -> usize;

    /// Returns true when no windows are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counter store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterStoreError {
    /// The store refused to track another window.
    #[error("counter store capacity exhausted ({0} windows)")]
    CapacityExhausted(usize),
    /// The backing store is unreachable or failed.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Counting state for one key.
#[derive(Debug)]
struct RateWindow {
    /// Start of the current window in unix milliseconds.
    start_ms: u64,
    /// Cost consumed in the current window.
    count: u64,
    /// Window size in milliseconds.
    window_ms: u64,
    /// Budget per window.
    limit: u64,
    /// Last time a caller touched the window.
    last_seen_ms: u64,
}

impl RateWindow {
    /// Creates an empty window for the charge at `now_ms`.
    fn new(charge: &ScopeCharge, now_ms: u64) -> Self {
        Self {
            start_ms: align(now_ms, charge.window_ms),
            count: 0,
            window_ms: charge.window_ms,
            limit: charge.limit,
            last_seen_ms: now_ms,
        }
    }

    /// Applies the charge's limits and rolls the window forward when due.
    fn refresh(&mut self, charge: &ScopeCharge, now_ms: u64) {
        self.window_ms = charge.window_ms;
        self.limit = charge.limit;
        let aligned = align(now_ms, self.window_ms);
        if aligned > self.start_ms {
            self.start_ms = aligned;
            self.count = 0;
        }
        self.last_seen_ms = self.last_seen_ms.max(now_ms);
    }

    /// Returns true when `cost` fits the remaining budget.
    const fn fits(&self, cost: u64) -> bool {
        match self.count.checked_add(cost) {
            Some(total) => total <= self.limit,
            None => false,
        }
    }

    /// Returns milliseconds until the window resets (at least 1).
    const fn remaining_ms(&self, now_ms: u64) -> u64 {
        let end = self.start_ms.saturating_add(self.window_ms);
        let remaining = end.saturating_sub(now_ms);
        if remaining == 0 { 1 } else { remaining }
    }

    /// Returns true when the window period has ended.
    const fn period_ended(&self, now_ms: u64) -> bool {
        now_ms >= self.start_ms.saturating_add(self.window_ms)
    }
}

/// Shared handle to one window.
type WindowSlot = Arc<Mutex<RateWindow>>;

/// Sharded in-memory counter store.
///
/// Each window sits behind its own mutex; shard maps are locked only to look
/// up or insert window handles, never while a window lock is held.
#[derive(Debug)]
pub struct InMemoryCounterStore {
    /// Key-partitioned window maps.
    shards: Vec<Mutex<HashMap<WindowKey, WindowSlot>>>,
    /// Maximum tracked windows.
    max_entries: usize,
    /// Currently tracked windows.
    entries: AtomicUsize,
}

impl InMemoryCounterStore {
    /// Creates a store with `shards` partitions and a window cap.
    #[must_use]
    pub fn new(shards: usize, max_entries: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shards,
            max_entries,
            entries: AtomicUsize::new(0),
        }
    }

    /// Returns the shard owning a key.
    fn shard_for(&self, key: &WindowKey) -> &Mutex<HashMap<WindowKey, WindowSlot>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let count = u64::try_from(self.shards.len()).unwrap_or(1);
        let index = usize::try_from(hasher.finish() % count).unwrap_or(0);
        &self.shards[index]
    }

    /// Looks up a window handle, creating it when `create` is set.
    fn slot_for(
        &self,
        charge: &ScopeCharge,
        now_ms: u64,
        create: bool,
    ) -> Result<Option<WindowSlot>, CounterStoreError> {
        let mut shard = lock(self.shard_for(&charge.key));
        if let Some(slot) = shard.get(&charge.key) {
            return Ok(Some(Arc::clone(slot)));
        }
        if !create {
            return Ok(None);
        }
        if self.entries.fetch_add(1, Ordering::SeqCst) >= self.max_entries {
            self.entries.fetch_sub(1, Ordering::SeqCst);
            return Err(CounterStoreError::CapacityExhausted(self.max_entries));
        }
        let slot = Arc::new(Mutex::new(RateWindow::new(charge, now_ms)));
        shard.insert(charge.key.clone(), Arc::clone(&slot));
        Ok(Some(slot))
    }

    /// Evaluates charges and optionally commits them.
    fn evaluate(
        &self,
        charges: &[ScopeCharge],
        cost: u64,
        now_ms: u64,
        commit: bool,
    ) -> Result<RateDecision, CounterStoreError> {
        let mut ordered: Vec<&ScopeCharge> = charges.iter().collect();
        ordered.sort_by(|left, right| left.key.cmp(&right.key));
        ordered.dedup_by(|left, right| left.key == right.key);

        let slots = ordered
            .iter()
            .map(|charge| self.slot_for(charge, now_ms, commit))
            .collect::<Result<Vec<_>, _>>()?;
        let mut guards: Vec<Option<MutexGuard<'_, RateWindow>>> =
            slots.iter().map(|slot| slot.as_deref().map(lock)).collect();

        let mut denied: Option<(u64, RateScope)> = None;
        for (guard, charge) in guards.iter_mut().zip(&ordered) {
            let (fits, remaining) = match guard {
                Some(window) => {
                    window.refresh(charge, now_ms);
                    (window.fits(cost), window.remaining_ms(now_ms))
                }
                None => {
                    let fresh = RateWindow::new(charge, now_ms);
                    (fresh.fits(cost), fresh.remaining_ms(now_ms))
                }
            };
            if !fits && denied.as_ref().is_none_or(|(longest, _)| remaining > *longest) {
                denied = Some((remaining, charge.key.scope.clone()));
            }
        }
        if let Some((remaining, scope)) = denied {
            return Ok(RateDecision::Denied {
                retry_after: Duration::from_millis(remaining),
                scope,
            });
        }
        if commit {
            for window in guards.iter_mut().flatten() {
                window.count = window.count.saturating_add(cost);
            }
        }
        Ok(RateDecision::Allowed)
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS, DEFAULT_MAX_ENTRIES)
    }
}

impl CounterStore for InMemoryCounterStore {
    fn check(&self, charges: &[ScopeCharge], cost: u64, now_ms: u64) -> Result<RateDecision, CounterStoreError> {
        self.evaluate(charges, cost, now_ms, false)
    }

    fn check_and_consume(
        &self,
        charges: &[ScopeCharge],
        cost: u64,
        now_ms: u64,
    ) -> Result<RateDecision, CounterStoreError> {
        self.evaluate(charges, cost, now_ms, true)
    }

    fn evict_idle(&self, now_ms: u64, idle_ms: u64) -> usize {
        let mut evicted = 0;
        for shard in &self.shards {
            let mut map = lock(shard);
            map.retain(|_, slot| {
                if Arc::strong_count(slot) > 1 {
                    return true;
                }
                let Ok(window) = slot.try_lock() else {
                    return true;
                };
                let idle = window.period_ended(now_ms)
                    && now_ms.saturating_sub(window.last_seen_ms) >= idle_ms;
                drop(window);
                if idle {
                    evicted += 1;
                }
                !idle
            });
        }
        self.entries.fetch_sub(evicted, Ordering::SeqCst);
        evicted
    }

    fn len(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Window sizes and default budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Window size shared by the global and tool scopes.
    pub window_ms: u64,
    /// Global budget when the client has no override.
    pub default_client_limit: u64,
    /// Tool budget when neither client nor tool override it.
    pub default_tool_limit: u64,
    /// Failed authentications allowed per source per window.
    pub auth_failure_limit: u64,
    /// Window size for failed authentications.
    pub auth_failure_window_ms: u64,
    /// Idle period before a window may be evicted.
    pub idle_evict_ms: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            default_client_limit: DEFAULT_CLIENT_LIMIT,
            default_tool_limit: DEFAULT_TOOL_LIMIT,
            auth_failure_limit: DEFAULT_AUTH_FAILURE_LIMIT,
            auth_failure_window_ms: DEFAULT_AUTH_FAILURE_WINDOW_MS,
            idle_evict_ms: DEFAULT_IDLE_EVICT_MS,
        }
    }
}

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Budget enforcement over a pluggable counter store.
pub struct RateLimiter {
    /// Counter storage.
    store: Arc<dyn CounterStore>,
    /// Time source for window alignment.
    clock: Arc<dyn Clock>,
    /// Window sizes and defaults.
    policy: RateLimitPolicy,
}

impl RateLimiter {
    /// Creates a limiter over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Creates a limiter over a default in-memory store.
    #[must_use]
    pub fn in_memory(clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self::new(Arc::new(InMemoryCounterStore::default()), clock, policy)
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Returns the number of tracked windows.
    #[must_use]
    pub fn tracked_windows(&self) -> usize {
        self.store.len()
    }

    /// Resolves the (global, tool) budgets for a client and tool.
    #[must_use]
    pub fn budgets(&self, client: &ClientIdentity, tool: &ToolSpec) -> (u64, u64) {
        let global = client.global_limit.unwrap_or(self.policy.default_client_limit);
        let per_tool = client
            .tool_limits
            .get(&tool.name)
            .copied()
            .or(tool.rate_limit)
            .unwrap_or(self.policy.default_tool_limit);
        (global, per_tool)
    }

    /// Checks both invocation scopes and consumes `cost` only if both fit.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the counter store fails.
    pub fn check_and_consume(
        &self,
        client: &ClientIdentity,
        tool: &ToolSpec,
        cost: u64,
    ) -> Result<RateDecision, CounterStoreError> {
        let (global, per_tool) = self.budgets(client, tool);
        let subject = client.client_id.as_str();
        let charges = [
            ScopeCharge {
                key: WindowKey {
                    subject: subject.to_string(),
                    scope: RateScope::Global,
                },
                limit: global,
                window_ms: self.policy.window_ms,
            },
            ScopeCharge {
                key: WindowKey {
                    subject: subject.to_string(),
                    scope: RateScope::Tool(tool.name.clone()),
                },
                limit: per_tool,
                window_ms: self.policy.window_ms,
            },
        ];
        self.store.check_and_consume(&charges, cost, self.clock.now_ms())
    }

    /// Checks whether the source may attempt another authentication.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the counter store fails.
    pub fn check_auth_attempt(&self, source: &str) -> Result<RateDecision, CounterStoreError> {
        self.store.check(&[self.auth_charge(source)], 1, self.clock.now_ms())
    }

    /// Records one failed authentication for the source.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the counter store fails.
    pub fn record_auth_failure(&self, source: &str) -> Result<RateDecision, CounterStoreError> {
        self.store.check_and_consume(&[self.auth_charge(source)], 1, self.clock.now_ms())
    }

    /// Evicts idle windows and returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.store.evict_idle(self.clock.now_ms(), self.policy.idle_evict_ms)
    }

    /// Spawns a background task sweeping idle windows every `interval`.
    ///
    /// The task stops once the limiter is dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep();
            }
        })
    }

    /// Builds the failed-authentication charge for a source.
    fn auth_charge(&self, source: &str) -> ScopeCharge {
        ScopeCharge {
            key: WindowKey {
                subject: source.to_string(),
                scope: RateScope::AuthFailure,
            },
            limit: self.policy.auth_failure_limit,
            window_ms: self.policy.auth_failure_window_ms,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Aligns a timestamp down to its window boundary.
const fn align(now_ms: u64, window_ms: u64) -> u64 {
    if window_ms == 0 { now_ms } else { now_ms - now_ms % window_ms }
}

/// Locks a mutex, recovering the data from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
