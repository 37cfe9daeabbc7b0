// crates/tool-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared gateway fixtures for tool-gate-core integration tests.
// Purpose: Build a fully wired gateway over in-memory collaborators.
// Dependencies: tool-gate-core, serde_json
// ============================================================================

//! ## Overview
//! Provides a [`Fixture`] holding a [`Gateway`] plus handles to its manual
//! clock, credential store, and memory audit sink.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Shared helpers; not every test binary uses every helper."
)]

use std::sync::Arc;

use serde_json::Value;
use tool_gate_core::ClientId;
use tool_gate_core::ClientIdentity;
use tool_gate_core::CredentialRecord;
use tool_gate_core::ExecutorRouter;
use tool_gate_core::FieldSpec;
use tool_gate_core::FieldType;
use tool_gate_core::Gateway;
use tool_gate_core::GatewayParts;
use tool_gate_core::GatewaySettings;
use tool_gate_core::InMemoryCounterStore;
use tool_gate_core::InvocationRequest;
use tool_gate_core::ManualClock;
use tool_gate_core::MemoryAuditSink;
use tool_gate_core::NoopMetrics;
use tool_gate_core::PermissionSet;
use tool_gate_core::RateLimitPolicy;
use tool_gate_core::RegistrationPolicy;
use tool_gate_core::StaticCredentialStore;
use tool_gate_core::ToolName;
use tool_gate_core::ToolRegistry;
use tool_gate_core::ToolSpec;
use tool_gate_core::ValidationOrder;
use tool_gate_core::executor::EchoExecutor;

/// Window size used by fixtures.
pub const WINDOW_MS: u64 = 1_000;
/// Token granting every tool.
pub const WILDCARD_TOKEN: &str = "tok_wildcard_client";
/// Token granting `search` and `notify` only.
pub const SCOPED_TOKEN: &str = "tok_scoped_client_1";
/// Token that expires at the fixture start time.
pub const EXPIRED_TOKEN: &str = "tok_expired_client";
/// Fixture start time (window aligned).
pub const START_MS: u64 = 50_000;

pub struct Fixture {
    pub gateway: Gateway,
    pub clock: Arc<ManualClock>,
    pub credentials: Arc<StaticCredentialStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn tool_name(value: &str) -> ToolName {
    ToolName::parse(value).unwrap()
}

pub fn client(id: &str, permissions: PermissionSet) -> ClientIdentity {
    ClientIdentity::new(ClientId::parse(id).unwrap(), permissions)
}

pub fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(tool_name("search"), "Search the knowledge base")
            .with_input(FieldSpec::new("query", FieldType::String).required().with_length(Some(1), Some(256)))
            .with_input(
                FieldSpec::new("limit", FieldType::Integer).with_default(serde_json::json!(10)).with_range(Some(1.0), Some(50.0)),
            ),
        ToolSpec::new(tool_name("check_order"), "Look up an order")
            .with_input(FieldSpec::new("order_id", FieldType::String).required()),
        ToolSpec::new(tool_name("notify"), "Send a notification")
            .with_input(FieldSpec::new("channel", FieldType::String).with_enum(vec![
                serde_json::json!("email"),
                serde_json::json!("sms"),
            ])),
    ]
}

pub fn fixture(order: ValidationOrder, default_tool_limit: u64) -> Fixture {
    let clock = Arc::new(ManualClock::new(START_MS));
    let audit = Arc::new(MemoryAuditSink::default());
    let registry = Arc::new(ToolRegistry::new(RegistrationPolicy::Reject));
    let mut executors = ExecutorRouter::new();
    for tool in catalog() {
        executors.insert(tool.name.clone(), Arc::new(EchoExecutor));
        registry.register(tool).unwrap();
    }
    let credentials = Arc::new(StaticCredentialStore::new());
    credentials.insert_token(WILDCARD_TOKEN, CredentialRecord::active(client("wildcard", PermissionSet::All)));
    credentials.insert_token(
        SCOPED_TOKEN,
        CredentialRecord::active(client("scoped", PermissionSet::from_entries(["search", "notify"]).unwrap())),
    );
    credentials.insert_token(
        EXPIRED_TOKEN,
        CredentialRecord::active(client("expired", PermissionSet::All)).expiring_at(START_MS),
    );
    let mut settings = GatewaySettings {
        rate_limit: RateLimitPolicy {
            window_ms: WINDOW_MS,
            default_client_limit: 1_000,
            default_tool_limit,
            ..RateLimitPolicy::default()
        },
        ..GatewaySettings::default()
    };
    settings.dispatch.validation_order = order;
    let gateway = Gateway::new(GatewayParts {
        registry,
        credentials: credentials.clone(),
        counters: Arc::new(InMemoryCounterStore::default()),
        executors,
        audit: audit.clone(),
        metrics: Arc::new(NoopMetrics),
        clock: clock.clone(),
        settings,
    });
    Fixture {
        gateway,
        clock,
        credentials,
        audit,
    }
}

pub fn invocation(authorization: Option<&str>, tool: &str, input: Value) -> InvocationRequest {
    InvocationRequest {
        authorization: authorization.map(str::to_string),
        source: Some("192.0.2.10".to_string()),
        tool: tool.to_string(),
        input,
        request_id: None,
        timeout_ms: None,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
