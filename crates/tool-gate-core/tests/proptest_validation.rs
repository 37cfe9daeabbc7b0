// crates/tool-gate-core/tests/proptest_validation.rs
// ============================================================================
// Module: Validation and Budget Property-Based Tests
// Description: Randomized payloads and call sequences.
// Purpose: Show validation is total and idempotent and budgets admit exactly.
// ============================================================================

//! ## Overview
//! Generates arbitrary JSON payloads against a fixed tool and arbitrary
//! request schedules against a fixed window.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::Value;
use tool_gate_core::ManualClock;
use tool_gate_core::PermissionSet;
use tool_gate_core::RateLimitPolicy;
use tool_gate_core::RateLimiter;
use tool_gate_core::SchemaValidator;
use tool_gate_core::ToolSpec;
use tool_gate_core::UnknownFieldPolicy;

mod common;
use crate::common::catalog;
use crate::common::client;

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e6_f64..1.0e6).prop_map(Value::from),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("(query|limit|order_id|channel|[a-z]{1,6})", inner, 0..5)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn search_tool() -> ToolSpec {
    catalog().into_iter().next().unwrap()
}

proptest! {
    #[test]
    fn validation_is_total_and_idempotent(payload in arb_json()) {
        let validator = SchemaValidator::new(UnknownFieldPolicy::Reject);
        let tool = search_tool();
        let first = validator.validate(&tool, &payload);
        let second = validator.validate(&tool, &payload);
        prop_assert_eq!(&first, &second);
        match first {
            Ok(input) => {
                prop_assert!(input.get("query").is_some_and(Value::is_string));
                prop_assert!(input.get("limit").is_some_and(Value::is_i64));
                let revalidated = validator.validate(&tool, &input.clone().into_value());
                prop_assert_eq!(revalidated, Ok(input));
            }
            Err(error) => prop_assert!(!error.violations.is_empty()),
        }
    }

    #[test]
    fn admissions_per_window_never_exceed_the_limit(
        limit in 1_u64..8,
        offsets in prop::collection::vec(0_u64..3_000, 1..64),
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::in_memory(clock.clone(), RateLimitPolicy {
            window_ms: 1_000,
            default_client_limit: 1_000,
            default_tool_limit: limit,
            ..RateLimitPolicy::default()
        });
        let tool = search_tool();
        let identity = client("prop", PermissionSet::All);
        let mut schedule = offsets;
        schedule.sort_unstable();
        let mut admitted: BTreeMap<u64, u64> = BTreeMap::new();
        let mut requested: BTreeMap<u64, u64> = BTreeMap::new();
        for at in schedule {
            clock.set(at);
            let window = at / 1_000;
            *requested.entry(window).or_default() += 1;
            if limiter.check_and_consume(&identity, &tool, 1).unwrap().is_allowed() {
                *admitted.entry(window).or_default() += 1;
            }
        }
        for (window, count) in requested {
            prop_assert_eq!(admitted.get(&window).copied().unwrap_or(0), count.min(limit));
        }
    }
}
