// crates/tool-gate-core/tests/rate_limit_concurrency.rs
// ============================================================================
// Module: Rate Limiter Concurrency Tests
// Description: Admission counts under parallel check-and-consume.
// Purpose: Prove that simultaneous callers never exceed a window's limit.
// ============================================================================

//! ## Overview
//! Races many callers against one (client, scope) key from OS threads and
//! from a multi-threaded tokio runtime, then checks exact admission counts.
//! One race runs with a sweeper evicting idle windows the whole time.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use serde_json::json;
use tool_gate_core::ManualClock;
use tool_gate_core::PermissionSet;
use tool_gate_core::RateLimitPolicy;
use tool_gate_core::RateLimiter;
use tool_gate_core::ToolSpec;
use tool_gate_core::ValidationOrder;

mod common;
use crate::common::WILDCARD_TOKEN;
use crate::common::WINDOW_MS;
use crate::common::bearer;
use crate::common::client;
use crate::common::fixture;
use crate::common::invocation;
use crate::common::tool_name;

const LIMIT: u64 = 25;
const CALLERS: usize = 200;

fn limiter(clock: Arc<ManualClock>) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::in_memory(
        clock,
        RateLimitPolicy {
            window_ms: WINDOW_MS,
            default_client_limit: 10_000,
            default_tool_limit: LIMIT,
            ..RateLimitPolicy::default()
        },
    ))
}

#[test]
fn threads_racing_one_key_admit_exactly_the_limit() {
    let clock = Arc::new(ManualClock::new(0));
    let limiter = limiter(clock.clone());
    let tool = Arc::new(ToolSpec::new(tool_name("search"), "search"));
    let identity = Arc::new(client("racer", PermissionSet::All));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let tool = Arc::clone(&tool);
            let identity = Arc::clone(&identity);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                limiter.check_and_consume(&identity, &tool, 1).unwrap().is_allowed()
            })
        })
        .collect();
    let admitted = handles.into_iter().map(|handle| handle.join().unwrap()).filter(|allowed| *allowed).count();
    assert_eq!(admitted, usize::try_from(LIMIT).unwrap());

    clock.advance(WINDOW_MS);
    assert!(limiter.check_and_consume(&identity, &tool, 1).unwrap().is_allowed());
}

#[test]
fn sweeping_while_racing_across_windows_keeps_counts_exact() {
    const ROUNDS: u64 = 6;
    const RACERS: usize = 64;
    let clock = Arc::new(ManualClock::new(WINDOW_MS - 1));
    let limiter = Arc::new(RateLimiter::in_memory(
        clock.clone(),
        RateLimitPolicy {
            window_ms: WINDOW_MS,
            default_client_limit: 10_000,
            default_tool_limit: LIMIT,
            idle_evict_ms: 0,
            ..RateLimitPolicy::default()
        },
    ));
    let tool = Arc::new(ToolSpec::new(tool_name("search"), "search"));
    let identity = Arc::new(client("racer", PermissionSet::All));
    let stop = Arc::new(AtomicBool::new(false));
    let sweeps = Arc::new(AtomicUsize::new(0));

    let sweeper = {
        let limiter = Arc::clone(&limiter);
        let stop = Arc::clone(&stop);
        let sweeps = Arc::clone(&sweeps);
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                limiter.sweep();
                sweeps.fetch_add(1, Ordering::SeqCst);
                thread::yield_now();
            }
        })
    };

    for round in 0..ROUNDS {
        let barrier = Arc::new(Barrier::new(RACERS));
        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let tool = Arc::clone(&tool);
                let identity = Arc::clone(&identity);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    limiter.check_and_consume(&identity, &tool, 1).unwrap().is_allowed()
                })
            })
            .collect();
        let admitted = handles.into_iter().map(|handle| handle.join().unwrap()).filter(|allowed| *allowed).count();
        assert_eq!(admitted, usize::try_from(LIMIT).unwrap(), "window {round}");
        // Step onto the next boundary so the previous window becomes evictable.
        clock.advance(if round == 0 { 1 } else { WINDOW_MS });
    }

    stop.store(true, Ordering::SeqCst);
    sweeper.join().unwrap();
    assert!(sweeps.load(Ordering::SeqCst) > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_invocations_never_over_admit() {
    let fixture = Arc::new(fixture(ValidationOrder::ConsumeBeforeValidation, LIMIT));
    let auth = bearer(WILDCARD_TOKEN);
    let mut tasks = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let fixture = Arc::clone(&fixture);
        let auth = auth.clone();
        tasks.push(tokio::spawn(async move {
            fixture.gateway.invoke(invocation(Some(&auth), "check_order", json!({"order_id": "A1"}))).await
        }));
    }
    let mut successes = 0_u64;
    let mut limited = 0_u64;
    for task in tasks {
        let result = task.await.unwrap();
        if result.is_success() {
            successes += 1;
        } else {
            assert_eq!(result.status_code(), 429);
            limited += 1;
        }
    }
    assert_eq!(successes, LIMIT);
    assert_eq!(limited, u64::try_from(CALLERS).unwrap() - LIMIT);
    assert_eq!(fixture.audit.invocations().len(), CALLERS);
}

#[test]
fn scopes_for_different_clients_do_not_share_budget() {
    let clock = Arc::new(ManualClock::new(0));
    let limiter = limiter(clock);
    let tool = ToolSpec::new(tool_name("search"), "search");
    let first = client("first", PermissionSet::All);
    let second = client("second", PermissionSet::All);
    for _ in 0..LIMIT {
        assert!(limiter.check_and_consume(&first, &tool, 1).unwrap().is_allowed());
    }
    assert!(!limiter.check_and_consume(&first, &tool, 1).unwrap().is_allowed());
    assert!(limiter.check_and_consume(&second, &tool, 1).unwrap().is_allowed());
}
