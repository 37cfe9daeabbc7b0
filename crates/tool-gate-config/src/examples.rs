// crates/tool-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Tool Gate configuration. The output is static and
//! must always pass [`crate::GatewayConfig::validate`].

/// Returns a canonical example `tool-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 1048576
admin_tokens = ["admin-token-change-me"]

[auth]
lookup_timeout_ms = 2000
failure_limit = 10
failure_window_ms = 60000

[[auth.credentials]]
client_id = "orchestrator"
token = "orchestrator-token-change-me"
permissions = ["*"]
global_limit = 600

[[auth.credentials]]
client_id = "support-bot"
token_sha256 = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
permissions = ["search", "check_order"]
expires_at_ms = 4102444800000
tool_limits = { check_order = 3 }

[rate_limit]
window_ms = 60000
default_client_limit = 600
default_tool_limit = 120
idle_evict_ms = 300000
sweep_interval_ms = 30000
max_entries = 65536
shards = 16

[validation]
unknown_fields = "reject"
order = "consume_before_validation"

[dispatch]
default_timeout_ms = 10000
max_timeout_ms = 60000

[registry]
on_duplicate = "reject"

[audit]
enabled = true
# path = "/var/log/tool-gate/audit.jsonl"

[[tools]]
name = "search"
description = "Full-text search over the help center."
executor = { kind = "http", url = "https://tools.example.com/search" }
input = [
  { name = "query", type = "string", required = true, min_length = 1, max_length = 256 },
  { name = "limit", type = "integer", default = 10, coerce = true, minimum = 1, maximum = 50 },
]
output = [
  { name = "total", type = "integer", required = true },
]

[[tools]]
name = "check_order"
description = "Looks up the status of an order."
cost = 1
timeout_ms = 5000
executor = { kind = "http", url = "https://tools.example.com/orders" }
input = [
  { name = "order_id", type = "string", required = true },
]

[[tools]]
name = "echo"
description = "Returns its input unchanged."
unknown_fields = "allow"
executor = { kind = "echo" }
"#,
    )
}
