// crates/tool-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for tool-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use tool_gate_config::ConfigError;
use tool_gate_config::CredentialConfig;
use tool_gate_config::GatewayConfig;

/// Shared result type for config tests.
pub type TestResult = Result<(), String>;

/// Plaintext token used by test credentials.
pub const TOKEN: &str = "test-token-0001";

/// Parses a TOML string into a `GatewayConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<GatewayConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<GatewayConfig, toml::de::Error> {
    config_from_toml("")
}

/// Returns a config with one echo tool and one wildcard credential.
pub fn config_with_tool() -> Result<GatewayConfig, toml::de::Error> {
    config_from_toml(&format!(
        r#"
[[auth.credentials]]
client_id = "orchestrator"
token = "{TOKEN}"
permissions = ["*"]

[[tools]]
name = "search"
description = "Searches documents."
executor = {{ kind = "echo" }}
input = [{{ name = "query", type = "string", required = true }}]
"#
    ))
}

/// Builds a credential for `client_id` with the given token and permissions.
pub fn credential(client_id: &str, token: &str, permissions: &[&str]) -> CredentialConfig {
    CredentialConfig {
        client_id: client_id.to_string(),
        token: Some(token.to_string()),
        token_sha256: None,
        permissions: permissions.iter().map(ToString::to_string).collect(),
        expires_at_ms: None,
        revoked: false,
        global_limit: None,
        tool_limits: std::collections::BTreeMap::new(),
    }
}

/// Asserts that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
