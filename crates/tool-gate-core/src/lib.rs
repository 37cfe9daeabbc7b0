// crates/tool-gate-core/src/lib.rs
// ============================================================================
// Module: Tool Gate Core
// Description: Tool execution gateway between LLM orchestrators and tools.
// Purpose: Discover, authenticate, rate limit, validate, and dispatch tool calls.
// Dependencies: async-trait, rand, serde, serde_json, sha2, thiserror, tokio
// ============================================================================

//! ## Overview
//! Tool Gate sits between an orchestrator and a set of callable tools. The
//! [`Gateway`] facade wires a copy-on-write [`ToolRegistry`], a
//! [`SchemaValidator`], an [`AuthGate`], a two-scope [`RateLimiter`], the
//! [`Dispatcher`] pipeline, and the [`DiscoveryService`]. Transports (HTTP,
//! CLI) live in sibling crates and only translate wire formats.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod identifiers;
pub mod identity;
pub mod rate_limit;
pub mod registry;
pub mod telemetry;
pub mod time;
pub mod tool;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use auth::AdminTokens;
pub use auth::AuthGate;
pub use auth::AuthSettings;
pub use auth::CredentialRecord;
pub use auth::CredentialStore;
pub use auth::StaticCredentialStore;
pub use discovery::DiscoveryService;
pub use discovery::ToolDescriptor;
pub use dispatcher::Dispatcher;
pub use dispatcher::DispatcherConfig;
pub use dispatcher::InvocationRequest;
pub use dispatcher::InvocationResult;
pub use dispatcher::ValidationOrder;
pub use error::ErrorKind;
pub use error::GatewayError;
pub use executor::ExecutorRouter;
pub use executor::ToolExecutor;
pub use gateway::CallerRequest;
pub use gateway::Gateway;
pub use gateway::GatewayParts;
pub use gateway::GatewaySettings;
pub use identifiers::ClientId;
pub use identifiers::RequestId;
pub use identifiers::ToolName;
pub use identity::ClientIdentity;
pub use identity::PermissionSet;
pub use rate_limit::CounterStore;
pub use rate_limit::InMemoryCounterStore;
pub use rate_limit::RateDecision;
pub use rate_limit::RateLimitPolicy;
pub use rate_limit::RateLimiter;
pub use registry::RegistrationPolicy;
pub use registry::ToolRegistry;
pub use telemetry::GatewayMetrics;
pub use telemetry::NoopMetrics;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;
pub use tool::FieldSpec;
pub use tool::FieldType;
pub use tool::ToolSpec;
pub use tool::UnknownFieldPolicy;
pub use validation::SchemaValidator;
pub use validation::ValidatedInput;
pub use validation::ValidationError;
