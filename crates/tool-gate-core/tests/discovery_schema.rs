// crates/tool-gate-core/tests/discovery_schema.rs
// ============================================================================
// Module: Discovery Schema Tests
// Description: Cross-checks projected JSON Schemas against the validator.
// Purpose: Ensure advertised schemas accept what invocation accepts.
// ============================================================================

//! ## Overview
//! Compiles every projected input schema with `jsonschema` (draft 2020-12)
//! and compares its verdict with [`SchemaValidator`] on representative
//! payloads.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use serde_json::json;
use tool_gate_core::DiscoveryService;
use tool_gate_core::FieldSpec;
use tool_gate_core::FieldType;
use tool_gate_core::PermissionSet;
use tool_gate_core::RegistrationPolicy;
use tool_gate_core::SchemaValidator;
use tool_gate_core::ToolRegistry;
use tool_gate_core::ToolSpec;
use tool_gate_core::UnknownFieldPolicy;

mod common;
use crate::common::catalog;
use crate::common::client;
use crate::common::tool_name;

fn compile(schema: &Value) -> Validator {
    jsonschema::options().with_draft(Draft::Draft202012).build(schema).unwrap()
}

#[test]
fn projected_schemas_agree_with_the_validator() {
    let registry = Arc::new(ToolRegistry::new(RegistrationPolicy::Reject));
    for tool in catalog() {
        registry.register(tool).unwrap();
    }
    let discovery = DiscoveryService::new(registry.clone(), UnknownFieldPolicy::Reject);
    let validator = SchemaValidator::new(UnknownFieldPolicy::Reject);
    let cases: [(&str, Vec<Value>); 3] = [
        (
            "search",
            vec![
                json!({"query": "refunds"}),
                json!({"query": "refunds", "limit": 50}),
                json!({"query": ""}),
                json!({"query": "refunds", "limit": 0}),
                json!({"query": "refunds", "limit": "5"}),
                json!({"query": 7}),
                json!({"limit": 5}),
                json!({"query": "refunds", "extra": true}),
                json!([1, 2]),
            ],
        ),
        ("check_order", vec![json!({"order_id": "A123"}), json!({}), json!({"order_id": false})]),
        ("notify", vec![json!({}), json!({"channel": "sms"}), json!({"channel": "pager"})]),
    ];

    let descriptors = discovery.discover(&client("schema", PermissionSet::All));
    assert_eq!(descriptors.len(), 3);
    for (name, payloads) in cases {
        let descriptor = descriptors.iter().find(|descriptor| descriptor.name.as_str() == name).unwrap();
        let tool = registry.get(&descriptor.name).unwrap();
        let schema = compile(&descriptor.input_schema);
        for payload in payloads {
            let by_schema = schema.is_valid(&payload);
            let by_validator = validator.validate(tool.spec(), &payload).is_ok();
            assert_eq!(by_schema, by_validator, "{name}: disagreement on {payload}");
        }
    }
}

#[test]
fn output_schemas_allow_undeclared_keys() {
    let registry = Arc::new(ToolRegistry::new(RegistrationPolicy::Reject));
    registry.register(catalog().remove(0)).unwrap();
    let discovery = DiscoveryService::new(registry, UnknownFieldPolicy::Reject);
    let descriptor = discovery.discover(&client("schema", PermissionSet::All)).remove(0);
    let schema = compile(&descriptor.output_schema);
    assert!(schema.is_valid(&json!({"anything": [1, 2, 3]})));
}

#[test]
fn numeric_enums_agree_across_number_representations() {
    let registry = Arc::new(ToolRegistry::new(RegistrationPolicy::Reject));
    registry
        .register(
            ToolSpec::new(tool_name("levels"), "Pick a level")
                .with_input(FieldSpec::new("level", FieldType::Number).required().with_enum(vec![json!(1), json!(2)])),
        )
        .unwrap();
    let discovery = DiscoveryService::new(registry.clone(), UnknownFieldPolicy::Reject);
    let validator = SchemaValidator::new(UnknownFieldPolicy::Reject);
    let descriptor = discovery.discover(&client("schema", PermissionSet::All)).remove(0);
    let tool = registry.get(&descriptor.name).unwrap();
    let schema = compile(&descriptor.input_schema);
    for (payload, expected) in [
        (json!({"level": 1}), true),
        (json!({"level": 1.0}), true),
        (json!({"level": 2.0}), true),
        (json!({"level": 1.5}), false),
        (json!({"level": 3}), false),
        (json!({"level": "1"}), false),
    ] {
        assert_eq!(schema.is_valid(&payload), expected, "schema verdict on {payload}");
        assert_eq!(validator.validate(tool.spec(), &payload).is_ok(), expected, "validator verdict on {payload}");
    }
}
