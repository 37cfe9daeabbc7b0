// crates/tool-gate-cli/src/main.rs
// ============================================================================
// Module: Tool Gate CLI Entry Point
// Description: Command dispatcher for the Tool Gate server and config tooling.
// Purpose: Provide a safe CLI for serving, config checks, and token hashing.
// Dependencies: clap, tool-gate-config, tool-gate-core, tool-gate-server, tokio
// ============================================================================

//! ## Overview
//! The `tool-gate` binary starts the HTTP gateway and offers offline helpers:
//! config validation, an example config, a tool listing, and token
//! fingerprinting for `token_sha256` credential entries. Output goes through
//! explicit stdout/stderr writers. Security posture: inputs are untrusted and
//! configuration fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use tool_gate_config::GatewayConfig;
use tool_gate_config::config_toml_example;
use tool_gate_core::auth::BearerToken;
use tool_gate_core::auth::MAX_TOKEN_LENGTH;
use tool_gate_server::GatewayServer;
use tool_gate_server::ServerError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum bytes read from stdin for a token.
const MAX_STDIN_TOKEN_BYTES: usize = MAX_TOKEN_LENGTH + 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "tool-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Tool Gate HTTP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Tool catalog utilities.
    Tools {
        /// Selected tools subcommand.
        #[command(subcommand)]
        command: ToolsCommand,
    },
    /// Credential token utilities.
    Token {
        /// Selected token subcommand.
        #[command(subcommand)]
        command: TokenCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to tool-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Allow binding to non-loopback addresses.
    #[arg(long)]
    allow_non_loopback: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file.
    Validate(ConfigPathArgs),
    /// Print the canonical example config.
    Example,
}

/// Tools subcommands.
#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List tools declared in a config file.
    List(ToolsListCommand),
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Print the SHA-256 fingerprint of a bearer token.
    Fingerprint(TokenFingerprintCommand),
}

/// Config path argument shared by offline commands.
#[derive(Args, Debug)]
struct ConfigPathArgs {
    /// Optional config file path (defaults to tool-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `tools list`.
#[derive(Args, Debug)]
struct ToolsListCommand {
    /// Config path.
    #[command(flatten)]
    path: ConfigPathArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = ListFormat::Text)]
    format: ListFormat,
}

/// Arguments for `token fingerprint`.
#[derive(Args, Debug)]
struct TokenFingerprintCommand {
    /// Token to hash; read from stdin when omitted.
    #[arg(value_name = "TOKEN")]
    token: Option<String>,
}

/// Output format for listings.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ListFormat {
    /// One line per tool.
    Text,
    /// JSON array.
    Json,
}

/// JSON row for `tools list`.
#[derive(Debug, Serialize)]
struct ToolRow<'a> {
    /// Tool name.
    name: &'a str,
    /// Enabled state at startup.
    enabled: bool,
    /// Rate-limit cost.
    cost: u32,
    /// Executor kind label.
    executor: &'static str,
    /// Description.
    description: &'a str,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Tools {
            command,
        } => command_tools(command),
        Commands::Token {
            command,
        } => command_token(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = GatewayConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let addr = config.server.bind_addr().map_err(|err| CliError::new(err.to_string()))?;
    enforce_loopback(addr, command.allow_non_loopback)?;
    let server = GatewayServer::from_config(config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("tool-gate: listening on http://{addr}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err: ServerError| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Refuses non-loopback binds unless explicitly allowed.
fn enforce_loopback(addr: SocketAddr, allow_non_loopback: bool) -> CliResult<()> {
    if addr.ip().is_loopback() {
        return Ok(());
    }
    if !allow_non_loopback {
        return Err(CliError::new(format!(
            "refusing to bind non-loopback address {addr}; pass --allow-non-loopback to override"
        )));
    }
    write_stderr_line(&format!(
        "tool-gate: WARNING: binding {addr} exposes the gateway beyond this host; terminate TLS in front of it"
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => command_config_validate(&args),
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(args: &ConfigPathArgs) -> CliResult<ExitCode> {
    let config = GatewayConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line(&format!(
        "config ok: {} tool(s), {} credential(s)",
        config.tools.len(),
        config.auth.credentials.len()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Tools Commands
// ============================================================================

/// Dispatches tools subcommands.
fn command_tools(command: ToolsCommand) -> CliResult<ExitCode> {
    match command {
        ToolsCommand::List(command) => command_tools_list(&command),
    }
}

/// Lists tools declared in the config file.
fn command_tools_list(command: &ToolsListCommand) -> CliResult<ExitCode> {
    let config = GatewayConfig::load(command.path.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let output = render_tools(&config, command.format)?;
    write_stdout_bytes(output.as_bytes()).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Renders the tool listing in the requested format.
fn render_tools(config: &GatewayConfig, format: ListFormat) -> CliResult<String> {
    let rows: Vec<ToolRow<'_>> = config
        .tools
        .iter()
        .map(|tool| ToolRow {
            name: tool.spec.name.as_str(),
            enabled: tool.spec.enabled,
            cost: tool.spec.cost.get(),
            executor: tool.executor.kind(),
            description: &tool.spec.description,
        })
        .collect();
    match format {
        ListFormat::Json => {
            let mut json = serde_json::to_string_pretty(&rows)
                .map_err(|err| CliError::new(format!("failed to render tools: {err}")))?;
            json.push('\n');
            Ok(json)
        }
        ListFormat::Text => {
            let mut out = String::new();
            for row in rows {
                let state = if row.enabled { "enabled" } else { "disabled" };
                out.push_str(&format!(
                    "{}\t{state}\tcost={}\t{}\t{}\n",
                    row.name, row.cost, row.executor, row.description
                ));
            }
            Ok(out)
        }
    }
}

// ============================================================================
// SECTION: Token Commands
// ============================================================================

/// Dispatches token subcommands.
fn command_token(command: TokenCommand) -> CliResult<ExitCode> {
    match command {
        TokenCommand::Fingerprint(command) => {
            let raw = match command.token {
                Some(token) => token,
                None => read_stdin_token()?,
            };
            let fingerprint = fingerprint_token(&raw)?;
            write_stdout_line(&fingerprint).map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Validates a token and returns its fingerprint.
fn fingerprint_token(raw: &str) -> CliResult<String> {
    let token = BearerToken::parse(raw.trim())
        .ok_or_else(|| CliError::new("token must be 8..=512 token68 characters".to_string()))?;
    Ok(token.fingerprint())
}

/// Reads one bounded line from stdin.
fn read_stdin_token() -> CliResult<String> {
    let mut line = String::new();
    let stdin = std::io::stdin();
    let mut handle = std::io::Read::take(stdin.lock(), u64::try_from(MAX_STDIN_TOKEN_BYTES).unwrap_or(u64::MAX));
    handle.read_line(&mut line).map_err(|err| CliError::new(format!("failed to read stdin: {err}")))?;
    Ok(line)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
