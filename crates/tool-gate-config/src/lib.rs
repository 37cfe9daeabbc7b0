// crates/tool-gate-config/src/lib.rs
// ============================================================================
// Module: Tool Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for tool-gate.toml semantics.
// Dependencies: tool-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `tool-gate-config` defines the configuration model for Tool Gate. It
//! provides strict, fail-closed validation and converts a validated file into
//! the registry, credential store, and settings the core gateway consumes.
//!
//! Security posture: config inputs are untrusted. Plaintext tokens are hashed
//! before they reach the credential store.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
