//! Tool entry validation tests for tool-gate-config.
// crates/tool-gate-config/tests/tool_validation.rs
// =============================================================================
// Module: Tool Validation Tests
// Description: Validate tool contracts and executor bindings.
// Purpose: Ensure malformed tools are rejected before registration.
// =============================================================================

use tool_gate_config::ExecutorConfig;
use tool_gate_config::GatewayConfig;
use tool_gate_core::RegistrationPolicy;
use tool_gate_core::ToolName;

mod common;
use crate::common::TestResult;
use crate::common::assert_invalid;

fn tool_toml(name: &str, executor: &str, extra: &str) -> String {
    format!(
        r#"
[[tools]]
name = "{name}"
description = "A tool."
executor = {executor}
{extra}
"#
    )
}

#[test]
fn executors_parse_by_kind() -> TestResult {
    let content = [
        tool_toml("remote", r#"{ kind = "http", url = "https://tools.example.com/run" }"#, ""),
        tool_toml("mirror", r#"{ kind = "echo" }"#, ""),
        tool_toml("fixed", r#"{ kind = "static", output = { ok = true } }"#, ""),
    ]
    .concat();
    let config = GatewayConfig::from_toml(&content).map_err(|err| err.to_string())?;
    let kinds: Vec<&ExecutorConfig> = config.tools.iter().map(|tool| &tool.executor).collect();
    if !matches!(kinds[0], ExecutorConfig::Http { .. })
        || *kinds[1] != ExecutorConfig::Echo
        || *kinds[2] != (ExecutorConfig::Static { output: serde_json::json!({"ok": true}) })
    {
        return Err("executor kinds did not parse as declared".to_string());
    }
    Ok(())
}

#[test]
fn executor_urls_must_be_http() -> TestResult {
    let content = tool_toml("remote", r#"{ kind = "http", url = "ftp://tools.example.com/run" }"#, "");
    let result = GatewayConfig::from_toml(&content).map(|_| ());
    assert_invalid(result, "tool remote executor url must use http or https")?;
    let content = tool_toml("remote", r#"{ kind = "http", url = "not a url" }"#, "");
    assert_invalid(GatewayConfig::from_toml(&content).map(|_| ()), "tool remote executor url invalid")
}

#[test]
fn unknown_executor_kind_is_parse_error() -> TestResult {
    let content = tool_toml("remote", r#"{ kind = "grpc" }"#, "");
    match GatewayConfig::from_toml(&content) {
        Err(tool_gate_config::ConfigError::Parse(_)) => Ok(()),
        Err(other) => Err(format!("expected parse error, got {other}")),
        Ok(_) => Err("expected parse error".to_string()),
    }
}

#[test]
fn invalid_tool_names_are_parse_errors() -> TestResult {
    let content = tool_toml("bad name", r#"{ kind = "echo" }"#, "");
    if GatewayConfig::from_toml(&content).is_ok() {
        return Err("tool names with spaces should be rejected".to_string());
    }
    Ok(())
}

#[test]
fn duplicate_names_follow_registry_policy() -> TestResult {
    let content = [tool_toml("search", r#"{ kind = "echo" }"#, ""), tool_toml("search", r#"{ kind = "echo" }"#, "")]
        .concat();
    assert_invalid(GatewayConfig::from_toml(&content).map(|_| ()), "duplicate tool name: search")?;

    let replacing = format!("[registry]\non_duplicate = \"replace\"\n{content}");
    let config = GatewayConfig::from_toml(&replacing).map_err(|err| err.to_string())?;
    if config.registry.on_duplicate != RegistrationPolicy::Replace {
        return Err("replace policy should parse".to_string());
    }
    let registry = config.build_registry().map_err(|err| err.to_string())?;
    let search = ToolName::parse("search").ok_or_else(|| "tool name".to_string())?;
    registry.get(&search).map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn field_defaults_must_satisfy_constraints() -> TestResult {
    let extra = r#"input = [{ name = "limit", type = "integer", default = 99, minimum = 1, maximum = 50 }]"#;
    let content = tool_toml("search", r#"{ kind = "echo" }"#, extra);
    assert_invalid(GatewayConfig::from_toml(&content).map(|_| ()), "tool search")
}

#[test]
fn tool_timeout_cannot_exceed_dispatch_max() -> TestResult {
    let content = format!(
        "[dispatch]\nmax_timeout_ms = 1000\ndefault_timeout_ms = 500\n{}",
        tool_toml("slow", r#"{ kind = "echo" }"#, "timeout_ms = 5000")
    );
    assert_invalid(GatewayConfig::from_toml(&content).map(|_| ()), "tool slow timeout_ms exceeds dispatch max_timeout_ms")
}

#[test]
fn tool_rate_limit_must_be_positive() -> TestResult {
    let content = tool_toml("search", r#"{ kind = "echo" }"#, "rate_limit = 0");
    assert_invalid(GatewayConfig::from_toml(&content).map(|_| ()), "rate_limit must be greater than zero")
}

#[test]
fn disabled_tools_register_disabled() -> TestResult {
    let content = tool_toml("search", r#"{ kind = "echo" }"#, "enabled = false");
    let config = GatewayConfig::from_toml(&content).map_err(|err| err.to_string())?;
    let registry = config.build_registry().map_err(|err| err.to_string())?;
    let search = ToolName::parse("search").ok_or_else(|| "tool name".to_string())?;
    if registry.get(&search).map_err(|err| err.to_string())?.is_enabled() {
        return Err("enabled = false should carry into the registry".to_string());
    }
    Ok(())
}
