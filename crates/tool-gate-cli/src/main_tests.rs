// crates/tool-gate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and offline CLI helpers.
// Purpose: Ensure the CLI fails closed on unsafe binds and malformed tokens.
// Dependencies: tool-gate-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Covers subcommand parsing, the loopback guard, token fingerprinting, and
//! tool listing output.
//!
//! Security posture: CLI inputs are untrusted; validation must fail closed.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;

use clap::Parser;
use tool_gate_config::GatewayConfig;
use tool_gate_config::config_toml_example;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ConfigPathArgs;
use super::ListFormat;
use super::TokenCommand;
use super::ToolsCommand;
use super::command_config_validate;
use super::enforce_loopback;
use super::fingerprint_token;
use super::render_tools;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Config with one enabled and one disabled tool.
const TWO_TOOLS: &str = r#"
[[tools]]
name = "search"
description = "Searches documents."
cost = 2
executor = { kind = "echo" }

[[tools]]
name = "lookup"
description = "Looks up records."
enabled = false
executor = { kind = "static", output = { ok = true } }
"#;

fn two_tools() -> GatewayConfig {
    GatewayConfig::from_toml(TWO_TOOLS).expect("config")
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn parses_serve_flags() {
    let cli = Cli::try_parse_from(["tool-gate", "serve", "--config", "gate.toml", "--allow-non-loopback"])
        .expect("parse");
    match cli.command {
        Commands::Serve(command) => {
            assert!(command.allow_non_loopback);
            assert_eq!(command.config.as_deref(), Some(std::path::Path::new("gate.toml")));
        }
        _ => panic!("expected serve"),
    }
}

#[test]
fn parses_nested_subcommands() {
    let cli = Cli::try_parse_from(["tool-gate", "tools", "list", "--format", "json"]).expect("parse");
    match cli.command {
        Commands::Tools {
            command: ToolsCommand::List(command),
        } => {
            assert_eq!(command.format, ListFormat::Json);
            assert!(command.path.config.is_none());
        }
        _ => panic!("expected tools list"),
    }

    let cli = Cli::try_parse_from(["tool-gate", "config", "example"]).expect("parse");
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommand::Example
        }
    ));

    let cli = Cli::try_parse_from(["tool-gate", "token", "fingerprint"]).expect("parse");
    match cli.command {
        Commands::Token {
            command: TokenCommand::Fingerprint(command),
        } => assert!(command.token.is_none()),
        _ => panic!("expected token fingerprint"),
    }
}

#[test]
fn rejects_missing_subcommand_and_unknown_format() {
    assert!(Cli::try_parse_from(["tool-gate"]).is_err());
    assert!(Cli::try_parse_from(["tool-gate", "tools", "list", "--format", "yaml"]).is_err());
}

// ============================================================================
// SECTION: Serve Guard
// ============================================================================

#[test]
fn loopback_binds_are_allowed() {
    let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
    assert!(enforce_loopback(addr, false).is_ok());
    let addr: SocketAddr = "[::1]:8080".parse().unwrap();
    assert!(enforce_loopback(addr, false).is_ok());
}

#[test]
fn non_loopback_binds_require_opt_in() {
    let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
    let err = enforce_loopback(addr, false).unwrap_err();
    assert!(err.to_string().contains("--allow-non-loopback"));
    assert!(enforce_loopback(addr, true).is_ok());
}

// ============================================================================
// SECTION: Token Fingerprint
// ============================================================================

#[test]
fn fingerprint_matches_sha256_hex() {
    let fingerprint = fingerprint_token("orchestrator-token-01").unwrap();
    assert_eq!(fingerprint, "9530561ffc5a3f40d1f9c0a19e28b11e3a757c3c7c41ddd2cd1ab1b5e21c7222");
}

#[test]
fn fingerprint_trims_trailing_newline() {
    let piped = fingerprint_token("orchestrator-token-01\n").unwrap();
    let direct = fingerprint_token("orchestrator-token-01").unwrap();
    assert_eq!(piped, direct);
}

#[test]
fn fingerprint_rejects_malformed_tokens() {
    assert!(fingerprint_token("short").is_err());
    assert!(fingerprint_token("has space inside").is_err());
    assert!(fingerprint_token("").is_err());
}

// ============================================================================
// SECTION: Tools Listing
// ============================================================================

#[test]
fn text_listing_shows_state_cost_and_executor() {
    let output = render_tools(&two_tools(), ListFormat::Text).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "search\tenabled\tcost=2\techo\tSearches documents.");
    assert_eq!(lines[1], "lookup\tdisabled\tcost=1\tstatic\tLooks up records.");
}

#[test]
fn json_listing_is_an_array_of_rows() {
    let output = render_tools(&two_tools(), ListFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    let rows = value.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "search");
    assert_eq!(rows[0]["cost"], 2);
    assert_eq!(rows[1]["enabled"], false);
    assert_eq!(rows[1]["executor"], "static");
}

#[test]
fn example_config_lists_every_tool() {
    let config = GatewayConfig::from_toml(&config_toml_example()).unwrap();
    let output = render_tools(&config, ListFormat::Text).unwrap();
    assert_eq!(output.lines().count(), config.tools.len());
}

// ============================================================================
// SECTION: Config Validate
// ============================================================================

#[test]
fn validate_accepts_a_valid_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TWO_TOOLS.as_bytes()).unwrap();
    let args = ConfigPathArgs {
        config: Some(file.path().to_path_buf()),
    };
    assert!(command_config_validate(&args).is_ok());
}

#[test]
fn validate_reports_invalid_files() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[rate_limit]\nwindow_ms = 1\n").unwrap();
    let args = ConfigPathArgs {
        config: Some(file.path().to_path_buf()),
    };
    let err = command_config_validate(&args).unwrap_err();
    assert!(err.to_string().starts_with("failed to load config:"));
}
