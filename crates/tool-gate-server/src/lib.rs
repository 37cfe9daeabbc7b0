// crates/tool-gate-server/src/lib.rs
// ============================================================================
// Module: Tool Gate Server
// Description: HTTP transport and runtime assembly for Tool Gate.
// Purpose: Expose discovery, invocation, and admin operations over HTTP.
// Dependencies: tool-gate-core, tool-gate-config, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! `tool-gate-server` turns a validated [`tool_gate_config::GatewayConfig`]
//! into a running [`tool_gate_core::Gateway`] and serves it over HTTP with
//! axum. The transport only translates wire formats; every decision is made
//! by the core pipeline.
//!
//! Security posture: request bodies and headers are untrusted and bounded
//! before they reach the gateway.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http_executor;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http_executor::HttpToolExecutor;
pub use server::GatewayServer;
pub use server::ServerError;
