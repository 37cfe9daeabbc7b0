// crates/tool-gate-core/src/gateway.rs
// ============================================================================
// Module: Tool Gate Facade
// Description: Wires registry, auth, limiter, dispatcher, and discovery.
// Purpose: Give transports a single entry point for every gateway operation.
// Dependencies: tool-gate-core internals
// ============================================================================

//! ## Overview
//! [`Gateway`] owns one instance of every component and shares the same rate
//! limiter between the auth gate (failure budget) and the dispatcher
//! (invocation budgets). Transports call [`Gateway::discover`],
//! [`Gateway::invoke`], [`Gateway::authorize_admin`], and
//! [`Gateway::set_tool_enabled`] only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::audit::RegistryAuditEvent;
use crate::auth::AdminTokens;
use crate::auth::AuthGate;
use crate::auth::AuthRequest;
use crate::auth::AuthSettings;
use crate::auth::CredentialStore;
use crate::discovery::DiscoveryService;
use crate::discovery::ToolDescriptor;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::DispatcherConfig;
use crate::dispatcher::DispatcherParts;
use crate::dispatcher::InvocationRequest;
use crate::dispatcher::InvocationResult;
use crate::error::GatewayError;
use crate::executor::ExecutorRouter;
use crate::identifiers::RequestId;
use crate::identifiers::ToolName;
use crate::rate_limit::CounterStore;
use crate::rate_limit::RateLimitPolicy;
use crate::rate_limit::RateLimiter;
use crate::registry::RegistryError;
use crate::registry::ToolRegistry;
use crate::telemetry::GatewayMetrics;
use crate::time::Clock;
use crate::tool::UnknownFieldPolicy;
use crate::validation::SchemaValidator;

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Tunables shared across components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Window sizes and default budgets.
    pub rate_limit: RateLimitPolicy,
    /// Auth gate settings.
    pub auth: AuthSettings,
    /// Dispatcher settings.
    pub dispatch: DispatcherConfig,
    /// Unknown-field default for validation and discovery.
    pub unknown_fields: UnknownFieldPolicy,
}

/// Collaborators required to build a [`Gateway`].
pub struct GatewayParts {
    /// Tool registry, already populated.
    pub registry: Arc<ToolRegistry>,
    /// Credential lookup.
    pub credentials: Arc<dyn CredentialStore>,
    /// Rate counter storage.
    pub counters: Arc<dyn CounterStore>,
    /// Executor routes.
    pub executors: ExecutorRouter,
    /// Audit destination.
    pub audit: Arc<dyn AuditSink>,
    /// Metrics destination.
    pub metrics: Arc<dyn GatewayMetrics>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Tunables.
    pub settings: GatewaySettings,
}

/// Credentials and correlation data of a discovery or admin call.
#[derive(Debug, Clone, Copy)]
pub struct CallerRequest<'a> {
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
    /// Caller source (peer IP).
    pub source: Option<&'a str>,
    /// Effective request identifier.
    pub request_id: &'a RequestId,
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Tool execution gateway.
pub struct Gateway {
    /// Tool registry.
    registry: Arc<ToolRegistry>,
    /// Shared rate limiter.
    limiter: Arc<RateLimiter>,
    /// Auth gate.
    auth: Arc<AuthGate>,
    /// Invocation pipeline.
    dispatcher: Dispatcher,
    /// Discovery projection.
    discovery: DiscoveryService,
    /// Audit destination.
    audit: Arc<dyn AuditSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
}

impl Gateway {
    /// Builds a gateway from its collaborators.
    #[must_use]
    pub fn new(parts: GatewayParts) -> Self {
        let settings = parts.settings;
        let limiter =
            Arc::new(RateLimiter::new(parts.counters, Arc::clone(&parts.clock), settings.rate_limit));
        let auth = Arc::new(AuthGate::new(
            parts.credentials,
            Arc::clone(&limiter),
            Arc::clone(&parts.clock),
            Arc::clone(&parts.audit),
            settings.auth,
        ));
        let dispatcher = Dispatcher::new(DispatcherParts {
            registry: Arc::clone(&parts.registry),
            auth: Arc::clone(&auth),
            limiter: Arc::clone(&limiter),
            validator: SchemaValidator::new(settings.unknown_fields),
            executors: parts.executors,
            audit: Arc::clone(&parts.audit),
            metrics: parts.metrics,
            clock: Arc::clone(&parts.clock),
            config: settings.dispatch,
        });
        let discovery = DiscoveryService::new(Arc::clone(&parts.registry), settings.unknown_fields);
        Self {
            registry: parts.registry,
            limiter,
            auth,
            dispatcher,
            discovery,
            audit: parts.audit,
            clock: parts.clock,
        }
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Authenticates the caller and lists the tools it may invoke.
    ///
    /// # Errors
    ///
    /// Returns the auth gate's error when authentication fails.
    pub async fn discover(&self, request: &CallerRequest<'_>) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let identity = self
            .auth
            .authenticate(&AuthRequest {
                authorization: request.authorization,
                source: request.source,
                request_id: request.request_id,
                deadline: None,
            })
            .await?;
        Ok(self.discovery.discover(&identity))
    }

    /// Runs one invocation.
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        self.dispatcher.invoke(request).await
    }

    /// Checks an admin credential against `tokens` and returns the audit actor.
    ///
    /// # Errors
    ///
    /// Returns the auth gate's error when authorization fails; failed
    /// attempts charge the caller source's failure budget.
    pub fn authorize_admin(&self, tokens: &AdminTokens, request: &CallerRequest<'_>) -> Result<String, GatewayError> {
        self.auth.authorize_admin(
            tokens,
            &AuthRequest {
                authorization: request.authorization,
                source: request.source,
                request_id: request.request_id,
                deadline: None,
            },
        )
    }

    /// Enables or disables a tool and returns whether the state changed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ToolNotFound`] for unknown tools.
    pub fn set_tool_enabled(&self, tool: &str, enabled: bool, actor: &str) -> Result<bool, GatewayError> {
        let name = ToolName::parse(tool).ok_or(GatewayError::ToolNotFound)?;
        let changed = self.registry.set_enabled(&name, enabled).map_err(|err| match err {
            RegistryError::NotFound(_) => GatewayError::ToolNotFound,
            RegistryError::DuplicateName(_) | RegistryError::InvalidTool(_) => GatewayError::Internal,
        })?;
        self.audit.record_registry(&RegistryAuditEvent::toggled(
            self.clock.now_ms(),
            name.as_str(),
            enabled,
            changed,
            actor.to_string(),
        ));
        Ok(changed)
    }
}
