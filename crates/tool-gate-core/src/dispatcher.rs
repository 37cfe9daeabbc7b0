// crates/tool-gate-core/src/dispatcher.rs
// ============================================================================
// Module: Tool Gate Dispatcher
// Description: Invocation pipeline from credential to structured result.
// Purpose: Run auth, lookup, permission, budget, validation, and execution.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`Dispatcher::invoke`] runs one invocation through a fixed pipeline:
//! authenticate, resolve the tool, check permission, check the enabled flag,
//! charge the rate budget and validate the input (in the configured
//! [`ValidationOrder`]), then execute under a deadline. The first failure
//! short-circuits the rest.
//!
//! ## Invariants
//! - Every invocation produces exactly one audit record and one metric.
//! - Budget consumed before an executor timeout is never refunded.
//! - Internal faults reach callers only as [`GatewayError::Internal`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::audit::AuditSink;
use crate::audit::InternalFaultEvent;
use crate::audit::InvocationAuditEvent;
use crate::audit::InvocationAuditParams;
use crate::auth::AuthGate;
use crate::auth::AuthRequest;
use crate::error::ErrorBody;
use crate::error::GatewayError;
use crate::error::duration_ms;
use crate::executor::Deadline;
use crate::executor::ExecutorRouter;
use crate::identifiers::ClientId;
use crate::identifiers::RequestId;
use crate::identifiers::ToolName;
use crate::identity::ClientIdentity;
use crate::rate_limit::RateDecision;
use crate::rate_limit::RateLimiter;
use crate::registry::RegisteredTool;
use crate::registry::RegistryError;
use crate::registry::ToolRegistry;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::InvocationMetric;
use crate::telemetry::InvocationOutcome;
use crate::time::Clock;
use crate::validation::SchemaValidator;
use crate::validation::ValidatedInput;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default executor timeout.
pub const DEFAULT_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(10);
/// Default upper bound on any executor timeout.
pub const DEFAULT_MAX_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(60);
/// Tool label used when a request never resolved a tool.
const UNKNOWN_TOOL_LABEL: &str = "unknown";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Order in which budget accounting and input validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOrder {
    /// Charge the budget first so malformed but frequent calls are throttled.
    #[default]
    ConsumeBeforeValidation,
    /// Validate first; a validation failure consumes no budget.
    ValidateBeforeConsume,
}

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Budget/validation ordering policy.
    pub validation_order: ValidationOrder,
    /// Timeout when neither the request nor the tool sets one.
    pub default_timeout: Duration,
    /// Upper bound applied to every resolved timeout.
    pub max_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            validation_order: ValidationOrder::default(),
            default_timeout: DEFAULT_EXECUTOR_TIMEOUT,
            max_timeout: DEFAULT_MAX_EXECUTOR_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: Request and Result
// ============================================================================

/// One invocation as received from a caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationRequest {
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
    /// Caller source (peer IP).
    pub source: Option<String>,
    /// Requested tool name, unparsed.
    pub tool: String,
    /// Raw input payload; `Null` is treated as `{}`.
    pub input: Value,
    /// Caller-supplied request identifier.
    pub request_id: Option<String>,
    /// Caller-requested end-to-end timeout in milliseconds, covering the
    /// credential lookup and the executor.
    pub timeout_ms: Option<u64>,
}

/// Metadata attached to every result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionMetadata {
    /// Effective request identifier.
    pub request_id: RequestId,
    /// Time spent in the gateway.
    pub elapsed_ms: u64,
    /// Authenticated client, when authentication succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// Resolved tool, when lookup succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolName>,
}

/// Outcome of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    /// Executor produced output.
    Success {
        /// Executor output.
        output: Value,
        /// Execution metadata.
        metadata: ExecutionMetadata,
    },
    /// Pipeline stopped with an error.
    Failure {
        /// Terminal error.
        error: GatewayError,
        /// Execution metadata.
        metadata: ExecutionMetadata,
    },
}

impl InvocationResult {
    /// Returns true for [`InvocationResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the execution metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ExecutionMetadata {
        match self {
            Self::Success {
                metadata,
                ..
            }
            | Self::Failure {
                metadata,
                ..
            } => metadata,
        }
    }

    /// Returns the error for failures.
    #[must_use]
    pub const fn error(&self) -> Option<&GatewayError> {
        match self {
            Self::Success {
                ..
            } => None,
            Self::Failure {
                error,
                ..
            } => Some(error),
        }
    }

    /// Returns the HTTP-equivalent status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Success {
                ..
            } => 200,
            Self::Failure {
                error,
                ..
            } => error.status_code(),
        }
    }

    /// Converts the result into its wire body.
    #[must_use]
    pub fn into_response(self) -> InvocationResponse {
        match self {
            Self::Success {
                output,
                metadata,
            } => InvocationResponse {
                success: true,
                output: Some(output),
                error: None,
                metadata,
            },
            Self::Failure {
                error,
                metadata,
            } => InvocationResponse {
                success: false,
                output: None,
                error: Some(error.body()),
                metadata,
            },
        }
    }
}

/// Wire body of an invocation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationResponse {
    /// True when the executor produced output.
    pub success: bool,
    /// Executor output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error object on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Execution metadata.
    pub metadata: ExecutionMetadata,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Collaborators required to build a [`Dispatcher`].
pub struct DispatcherParts {
    /// Tool registry.
    pub registry: Arc<ToolRegistry>,
    /// Auth gate.
    pub auth: Arc<AuthGate>,
    /// Rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// Input validator.
    pub validator: SchemaValidator,
    /// Executor routes.
    pub executors: ExecutorRouter,
    /// Audit destination.
    pub audit: Arc<dyn AuditSink>,
    /// Metrics destination.
    pub metrics: Arc<dyn GatewayMetrics>,
    /// Time source for audit timestamps.
    pub clock: Arc<dyn Clock>,
    /// Dispatcher settings.
    pub config: DispatcherConfig,
}

/// Invocation pipeline.
pub struct Dispatcher {
    /// Tool registry.
    registry: Arc<ToolRegistry>,
    /// Auth gate.
    auth: Arc<AuthGate>,
    /// Rate limiter.
    limiter: Arc<RateLimiter>,
    /// Input validator.
    validator: SchemaValidator,
    /// Executor routes.
    executors: ExecutorRouter,
    /// Audit destination.
    audit: Arc<dyn AuditSink>,
    /// Metrics destination.
    metrics: Arc<dyn GatewayMetrics>,
    /// Time source for audit timestamps.
    clock: Arc<dyn Clock>,
    /// Dispatcher settings.
    config: DispatcherConfig,
}

/// Facts learned while a request moves through the pipeline.
#[derive(Default)]
struct InvocationTrace {
    /// Authenticated client.
    client_id: Option<ClientId>,
    /// Resolved tool.
    tool: Option<ToolName>,
}

impl Dispatcher {
    /// Builds a dispatcher from its collaborators.
    #[must_use]
    pub fn new(parts: DispatcherParts) -> Self {
        Self {
            registry: parts.registry,
            auth: parts.auth,
            limiter: parts.limiter,
            validator: parts.validator,
            executors: parts.executors,
            audit: parts.audit,
            metrics: parts.metrics,
            clock: parts.clock,
            config: parts.config,
        }
    }

    /// Returns the dispatcher settings.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Runs one invocation and returns its structured result.
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        let started = Instant::now();
        let (request_id, request_id_generated) = resolve_request_id(request.request_id.as_deref());
        let mut trace = InvocationTrace::default();
        let outcome = self.run(&request, &request_id, &mut trace).await;
        let elapsed = started.elapsed();

        let error_kind = outcome.as_ref().err().map(GatewayError::kind);
        self.audit.record_invocation(&InvocationAuditEvent::new(InvocationAuditParams {
            timestamp_ms: self.clock.now_ms(),
            request_id: request_id.as_str().to_string(),
            request_id_generated,
            client_id: trace.client_id.as_ref().map(|id| id.as_str().to_string()),
            tool: request.tool.clone(),
            error_kind,
            elapsed_ms: duration_ms(elapsed),
            source: request.source.clone(),
        }));
        self.metrics.record_invocation(&InvocationMetric {
            tool: trace.tool.as_ref().map_or(UNKNOWN_TOOL_LABEL, ToolName::as_str).to_string(),
            outcome: error_kind.map_or(InvocationOutcome::Success, InvocationOutcome::Error),
            latency: elapsed,
        });

        let metadata = ExecutionMetadata {
            request_id,
            elapsed_ms: duration_ms(elapsed),
            client_id: trace.client_id,
            tool: trace.tool,
        };
        match outcome {
            Ok(output) => InvocationResult::Success {
                output,
                metadata,
            },
            Err(error) => InvocationResult::Failure {
                error,
                metadata,
            },
        }
    }

    /// Runs the pipeline steps in order.
    async fn run(
        &self,
        request: &InvocationRequest,
        request_id: &RequestId,
        trace: &mut InvocationTrace,
    ) -> Result<Value, GatewayError> {
        let deadline = self.caller_deadline(request.timeout_ms);
        let identity = self
            .auth
            .authenticate(&AuthRequest {
                authorization: request.authorization.as_deref(),
                source: request.source.as_deref(),
                request_id,
                deadline,
            })
            .await?;
        trace.client_id = Some(identity.client_id.clone());

        let tool = self.resolve_tool(&request.tool, request_id)?;
        trace.tool = Some(tool.name().clone());
        if !identity.permits(tool.name()) {
            return Err(GatewayError::Forbidden);
        }
        if !tool.is_enabled() {
            return Err(GatewayError::ToolDisabled);
        }

        let input = match self.config.validation_order {
            ValidationOrder::ConsumeBeforeValidation => {
                self.charge(&identity, &tool, request_id)?;
                self.validator.validate(tool.spec(), &request.input)?
            }
            ValidationOrder::ValidateBeforeConsume => {
                let input = self.validator.validate(tool.spec(), &request.input)?;
                self.charge(&identity, &tool, request_id)?;
                input
            }
        };
        self.execute(&tool, &input, deadline, request_id).await
    }

    /// Looks up a tool by its raw requested name.
    fn resolve_tool(&self, raw: &str, request_id: &RequestId) -> Result<Arc<RegisteredTool>, GatewayError> {
        let name = ToolName::parse(raw).ok_or(GatewayError::ToolNotFound)?;
        match self.registry.get(&name) {
            Ok(tool) => Ok(tool),
            Err(RegistryError::NotFound(_)) => Err(GatewayError::ToolNotFound),
            Err(err) => Err(self.fault(request_id, "registry", err.to_string())),
        }
    }

    /// Charges the tool's cost against the client's budgets.
    fn charge(
        &self,
        identity: &ClientIdentity,
        tool: &RegisteredTool,
        request_id: &RequestId,
    ) -> Result<(), GatewayError> {
        let cost = u64::from(tool.spec().cost.get());
        match self.limiter.check_and_consume(identity, tool.spec(), cost) {
            Ok(RateDecision::Allowed) => Ok(()),
            Ok(RateDecision::Denied {
                retry_after,
                ..
            }) => Err(GatewayError::RateLimited {
                retry_after,
            }),
            Err(err) => Err(self.fault(request_id, "rate_limiter", err.to_string())),
        }
    }

    /// Runs the executor under the resolved deadline and checks its output.
    async fn execute(
        &self,
        tool: &RegisteredTool,
        input: &ValidatedInput,
        caller_deadline: Option<Deadline>,
        request_id: &RequestId,
    ) -> Result<Value, GatewayError> {
        let Some(executor) = self.executors.get(tool.name()) else {
            return Err(self.fault(request_id, "dispatcher", format!("no executor routed for {}", tool.name())));
        };
        let deadline = caller_deadline.unwrap_or_else(|| Deadline::after(self.resolve_timeout(tool)));
        let output = match tokio::time::timeout_at(deadline.instant(), executor.execute(tool.name(), input, deadline))
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(GatewayError::ExecutorFailure(err.to_string())),
            Err(_) => return Err(GatewayError::Timeout),
        };
        if !tool.spec().output.is_empty()
            && let Err(err) = SchemaValidator::validate_output(tool.spec(), &output)
        {
            return Err(GatewayError::ExecutorFailure(format!("output does not match declared fields: {err}")));
        }
        Ok(output)
    }

    /// Starts the caller's end-to-end deadline when the request sets one.
    ///
    /// The deadline covers the credential lookup and the executor alike.
    fn caller_deadline(&self, requested_timeout_ms: Option<u64>) -> Option<Deadline> {
        requested_timeout_ms
            .filter(|ms| *ms > 0)
            .map(|ms| Deadline::after(Duration::from_millis(ms).min(self.config.max_timeout)))
    }

    /// Resolves the executor timeout when the caller set none.
    fn resolve_timeout(&self, tool: &RegisteredTool) -> Duration {
        tool.spec().timeout_ms.map_or(self.config.default_timeout, Duration::from_millis).min(self.config.max_timeout)
    }

    /// Records an internal fault and returns the generic error.
    fn fault(&self, request_id: &RequestId, component: &'static str, detail: String) -> GatewayError {
        self.audit.record_fault(&InternalFaultEvent::new(
            self.clock.now_ms(),
            Some(request_id.as_str()),
            component,
            detail,
        ));
        GatewayError::Internal
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a caller-supplied request ID or generates one.
///
/// Returns the effective ID and whether it was generated.
#[must_use]
pub fn resolve_request_id(supplied: Option<&str>) -> (RequestId, bool) {
    supplied.and_then(RequestId::parse).map_or_else(|| (RequestId::generate(), true), |id| (id, false))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
