// crates/tool-gate-core/src/rate_limit/tests.rs
// ============================================================================
// Module: Rate Limiter Unit Tests
// Description: Window alignment, two-phase commits, retry hints, and eviction.
// Purpose: Validate budget accounting against a manual clock.
// Dependencies: tool-gate-core
// ============================================================================

//! ## Overview
//! Exercises [`InMemoryCounterStore`] and [`RateLimiter`] deterministically.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::CounterStore;
use super::CounterStoreError;
use super::InMemoryCounterStore;
use super::RateDecision;
use super::RateLimitPolicy;
use super::RateLimiter;
use super::RateScope;
use super::ScopeCharge;
use super::WindowKey;
use crate::identifiers::ClientId;
use crate::identifiers::ToolName;
use crate::identity::ClientIdentity;
use crate::identity::PermissionSet;
use crate::time::ManualClock;
use crate::tool::ToolSpec;

const WINDOW_MS: u64 = 1_000;

fn charge(subject: &str, scope: RateScope, limit: u64) -> ScopeCharge {
    ScopeCharge {
        key: WindowKey {
            subject: subject.to_string(),
            scope,
        },
        limit,
        window_ms: WINDOW_MS,
    }
}

fn tool_scope(name: &str) -> RateScope {
    RateScope::Tool(ToolName::parse(name).unwrap())
}

fn client(limit: Option<u64>) -> ClientIdentity {
    let identity = ClientIdentity::new(ClientId::parse("client-a").unwrap(), PermissionSet::All);
    match limit {
        Some(limit) => identity.with_global_limit(limit),
        None => identity,
    }
}

fn policy() -> RateLimitPolicy {
    RateLimitPolicy {
        window_ms: WINDOW_MS,
        default_client_limit: 100,
        default_tool_limit: 3,
        auth_failure_limit: 2,
        auth_failure_window_ms: WINDOW_MS,
        idle_evict_ms: WINDOW_MS,
    }
}

fn denied_after(decision: &RateDecision) -> Duration {
    match decision {
        RateDecision::Denied {
            retry_after,
            ..
        } => *retry_after,
        RateDecision::Allowed => panic!("expected denial"),
    }
}

#[test]
fn denial_commits_nothing_to_the_other_scope() {
    let store = InMemoryCounterStore::new(4, 64);
    let global = charge("c", RateScope::Global, 10);
    let tight = charge("c", tool_scope("search"), 1);
    let loose = charge("c", tool_scope("notify"), 10);

    assert!(store.check_and_consume(&[global.clone(), tight.clone()], 1, 100).unwrap().is_allowed());
    assert!(!store.check_and_consume(&[global.clone(), tight], 1, 200).unwrap().is_allowed());
    // Global consumed once only: nine more calls fit.
    for offset in 0..9 {
        assert!(store.check_and_consume(&[global.clone(), loose.clone()], 1, 300 + offset).unwrap().is_allowed());
    }
    assert!(!store.check_and_consume(&[global, loose], 1, 400).unwrap().is_allowed());
}

#[test]
fn request_at_boundary_lands_in_new_window() {
    let store = InMemoryCounterStore::new(1, 16);
    let scope = [charge("c", RateScope::Global, 1)];
    assert!(store.check_and_consume(&scope, 1, 1_999).unwrap().is_allowed());
    assert!(store.check_and_consume(&scope, 1, 2_000).unwrap().is_allowed());
    let decision = store.check_and_consume(&scope, 1, 2_250).unwrap();
    assert_eq!(denied_after(&decision), Duration::from_millis(750));
}

#[test]
fn window_never_rewinds_when_clock_steps_back() {
    let store = InMemoryCounterStore::new(1, 16);
    let scope = [charge("c", RateScope::Global, 1)];
    assert!(store.check_and_consume(&scope, 1, 5_100).unwrap().is_allowed());
    // An earlier timestamp must not reopen the previous window or reset the count.
    assert!(!store.check_and_consume(&scope, 1, 4_900).unwrap().is_allowed());
    assert!(!store.check_and_consume(&scope, 1, 5_900).unwrap().is_allowed());
    assert!(store.check_and_consume(&scope, 1, 6_000).unwrap().is_allowed());
}

#[test]
fn retry_after_reports_the_longest_exhausted_scope() {
    let store = InMemoryCounterStore::new(2, 16);
    let short = ScopeCharge {
        window_ms: 1_000,
        ..charge("c", RateScope::Global, 1)
    };
    let long = ScopeCharge {
        window_ms: 10_000,
        ..charge("c", tool_scope("search"), 1)
    };
    assert!(store.check_and_consume(&[short.clone(), long.clone()], 1, 500).unwrap().is_allowed());
    let decision = store.check_and_consume(&[short, long], 1, 600).unwrap();
    assert_eq!(
        decision,
        RateDecision::Denied {
            retry_after: Duration::from_millis(9_400),
            scope: tool_scope("search"),
        }
    );
}

#[test]
fn cost_above_limit_is_always_denied() {
    let store = InMemoryCounterStore::new(1, 16);
    let scope = [charge("c", RateScope::Global, 3)];
    assert!(!store.check_and_consume(&scope, 4, 0).unwrap().is_allowed());
    assert!(store.check_and_consume(&scope, 3, 0).unwrap().is_allowed());
}

#[test]
fn check_does_not_consume_or_track_new_keys() {
    let store = InMemoryCounterStore::new(1, 16);
    let scope = [charge("10.0.0.1", RateScope::AuthFailure, 1)];
    assert!(store.check(&scope, 1, 0).unwrap().is_allowed());
    assert!(store.is_empty());
    assert!(store.check_and_consume(&scope, 1, 0).unwrap().is_allowed());
    assert!(!store.check(&scope, 1, 10).unwrap().is_allowed());
}

#[test]
fn capacity_limit_refuses_new_windows() {
    let store = InMemoryCounterStore::new(2, 1);
    assert!(store.check_and_consume(&[charge("a", RateScope::Global, 5)], 1, 0).unwrap().is_allowed());
    let err = store.check_and_consume(&[charge("b", RateScope::Global, 5)], 1, 0).unwrap_err();
    assert_eq!(err, CounterStoreError::CapacityExhausted(1));
    assert_eq!(store.len(), 1);
}

#[test]
fn eviction_requires_ended_period_and_idleness() {
    let store = InMemoryCounterStore::new(2, 16);
    store.check_and_consume(&[charge("a", RateScope::Global, 5)], 1, 100).unwrap();
    store.check_and_consume(&[charge("b", RateScope::Global, 5)], 1, 1_900).unwrap();
    assert_eq!(store.evict_idle(900, 0), 0, "period still open");
    assert_eq!(store.evict_idle(2_000, 500), 1, "only the idle window goes");
    assert_eq!(store.len(), 1);
    assert_eq!(store.evict_idle(2_400, 500), 1);
    assert!(store.is_empty());
}

#[test]
fn eviction_skips_windows_held_by_callers() {
    let store = Arc::new(InMemoryCounterStore::new(1, 16));
    let scope = charge("held", RateScope::Global, 5);
    store.check_and_consume(std::slice::from_ref(&scope), 1, 100).unwrap();
    let slot = store.slot_for(&scope, 100, false).unwrap().unwrap();
    let guard = slot.lock().unwrap();

    // The window is expired and idle, but a caller still owns its lock.
    let (done, finished) = mpsc::channel();
    let sweeper = {
        let store = Arc::clone(&store);
        thread::spawn(move || done.send(store.evict_idle(5_000, 0)).unwrap())
    };
    let evicted = finished.recv_timeout(Duration::from_secs(5)).expect("eviction blocked on a held window");
    sweeper.join().unwrap();
    assert_eq!(evicted, 0);
    assert_eq!(store.len(), 1);

    drop(guard);
    assert_eq!(store.evict_idle(5_000, 0), 0, "handle still shared");
    drop(slot);
    assert_eq!(store.evict_idle(5_000, 0), 1);
    assert!(store.is_empty());
}

#[test]
fn limiter_resolves_budgets_by_precedence() {
    let limiter = RateLimiter::in_memory(Arc::new(ManualClock::new(0)), policy());
    let name = ToolName::parse("search").unwrap();
    let plain = ToolSpec::new(name.clone(), "search");
    let tool_default = plain.clone().with_rate_limit(7);
    let overridden = client(Some(50)).with_tool_limit(name, 2);
    assert_eq!(limiter.budgets(&client(None), &plain), (100, 3));
    assert_eq!(limiter.budgets(&client(None), &tool_default), (100, 7));
    assert_eq!(limiter.budgets(&overridden, &tool_default), (50, 2));
}

#[test]
fn limiter_enforces_tool_budget_then_recovers_after_rollover() {
    let clock = Arc::new(ManualClock::new(10_000));
    let limiter = RateLimiter::in_memory(clock.clone(), policy());
    let tool = ToolSpec::new(ToolName::parse("check_order").unwrap(), "orders");
    for _ in 0..3 {
        assert!(limiter.check_and_consume(&client(None), &tool, 1).unwrap().is_allowed());
    }
    clock.advance(400);
    let decision = limiter.check_and_consume(&client(None), &tool, 1).unwrap();
    assert_eq!(denied_after(&decision), Duration::from_millis(600));
    clock.advance(599);
    assert!(!limiter.check_and_consume(&client(None), &tool, 1).unwrap().is_allowed());
    clock.advance(1);
    assert!(limiter.check_and_consume(&client(None), &tool, 1).unwrap().is_allowed());
}

#[test]
fn auth_failures_use_their_own_budget() {
    let clock = Arc::new(ManualClock::new(0));
    let limiter = RateLimiter::in_memory(clock.clone(), policy());
    assert!(limiter.check_auth_attempt("10.0.0.9").unwrap().is_allowed());
    limiter.record_auth_failure("10.0.0.9").unwrap();
    limiter.record_auth_failure("10.0.0.9").unwrap();
    assert!(!limiter.check_auth_attempt("10.0.0.9").unwrap().is_allowed());
    assert!(limiter.check_auth_attempt("10.0.0.10").unwrap().is_allowed());
    let tool = ToolSpec::new(ToolName::parse("search").unwrap(), "search");
    assert!(limiter.check_and_consume(&client(None), &tool, 1).unwrap().is_allowed());
    clock.advance(WINDOW_MS);
    assert!(limiter.check_auth_attempt("10.0.0.9").unwrap().is_allowed());
}

#[test]
fn sweep_uses_policy_idle_period() {
    let clock = Arc::new(ManualClock::new(0));
    let limiter = RateLimiter::in_memory(clock.clone(), policy());
    let tool = ToolSpec::new(ToolName::parse("search").unwrap(), "search");
    limiter.check_and_consume(&client(None), &tool, 1).unwrap();
    assert_eq!(limiter.tracked_windows(), 2);
    clock.advance(WINDOW_MS - 1);
    assert_eq!(limiter.sweep(), 0);
    clock.advance(1);
    assert_eq!(limiter.sweep(), 2);
    assert_eq!(limiter.tracked_windows(), 0);
}
