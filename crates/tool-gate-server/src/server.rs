// crates/tool-gate-server/src/server.rs
// ============================================================================
// Module: Gateway HTTP Server
// Description: axum transport for discovery, invocation, and admin routes.
// Purpose: Expose the Tool Gate pipeline over HTTP with bounded inputs.
// Dependencies: tool-gate-core, tool-gate-config, axum, tokio
// ============================================================================

//! ## Overview
//! [`GatewayServer`] assembles a [`Gateway`] from validated configuration and
//! serves it over HTTP:
//!
//! - `GET /healthz` answers `{"status": "ok"}`.
//! - `GET /v1/tools` lists the tools the caller may invoke.
//! - `POST /v1/invoke` runs one invocation.
//! - `POST /v1/admin/tools/{name}/enabled` toggles a tool for admin tokens.
//!
//! Every response carries an `x-request-id` header; rate-limited responses
//! add `Retry-After` in whole seconds. Security posture: bodies are bounded
//! and parsed here, and all authorization decisions stay in the core.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::RETRY_AFTER;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tool_gate_config::AuditConfig;
use tool_gate_config::ExecutorConfig;
use tool_gate_config::GatewayConfig;
use tool_gate_core::AdminTokens;
use tool_gate_core::AuditSink;
use tool_gate_core::CallerRequest;
use tool_gate_core::ExecutorRouter;
use tool_gate_core::FileAuditSink;
use tool_gate_core::Gateway;
use tool_gate_core::GatewayError;
use tool_gate_core::GatewayParts;
use tool_gate_core::InvocationRequest;
use tool_gate_core::InvocationResult;
use tool_gate_core::NoopAuditSink;
use tool_gate_core::NoopMetrics;
use tool_gate_core::RequestId;
use tool_gate_core::StderrAuditSink;
use tool_gate_core::SystemClock;
use tool_gate_core::ToolDescriptor;
use tool_gate_core::ToolExecutor;
use tool_gate_core::ValidationError;
use tool_gate_core::dispatcher::ExecutionMetadata;
use tool_gate_core::dispatcher::InvocationResponse;
use tool_gate_core::dispatcher::resolve_request_id;
use tool_gate_core::error::ErrorBody;
use tool_gate_core::error::duration_ms;
use tool_gate_core::executor::EchoExecutor;
use tool_gate_core::executor::StaticExecutor;
use tool_gate_core::validation::ViolationReason;

use crate::http_executor::HttpToolExecutor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the request identifier in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// SECTION: Gateway Server
// ============================================================================

/// HTTP server wrapping a configured gateway.
pub struct GatewayServer {
    /// Validated configuration.
    config: GatewayConfig,
    /// Assembled gateway.
    gateway: Arc<Gateway>,
}

impl GatewayServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or a collaborator
    /// cannot be built.
    pub fn from_config(config: GatewayConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let registry = config.build_registry().map_err(|err| ServerError::Config(err.to_string()))?;
        let credentials =
            config.build_credential_store().map_err(|err| ServerError::Config(err.to_string()))?;
        let executors = build_executors(&config)?;
        let audit = build_audit_sink(&config.audit)?;
        let gateway = Gateway::new(GatewayParts {
            registry: Arc::new(registry),
            credentials: Arc::new(credentials),
            counters: Arc::new(config.build_counter_store()),
            executors,
            audit,
            metrics: Arc::new(NoopMetrics),
            clock: Arc::new(SystemClock),
            settings: config.gateway_settings(),
        });
        emit_startup_warnings(&config);
        Ok(Self {
            config,
            gateway: Arc::new(gateway),
        })
    }

    /// Returns the assembled gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Returns the configuration the server was built from.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Builds the axum router for this server.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(ServerState {
            gateway: Arc::clone(&self.gateway),
            max_body_bytes: self.config.server.max_body_bytes,
            admin_tokens: Arc::new(AdminTokens::new(&self.config.server.admin_tokens)),
        })
    }

    /// Binds the configured address and serves until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when serving fails.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> Result<(), ServerError> {
        let sweeper = self.gateway.limiter().spawn_sweeper(self.config.rate_limit.sweep_interval());
        let app = self.router();
        let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()));
        sweeper.abort();
        result
    }
}

/// Builds executors for every configured tool.
fn build_executors(config: &GatewayConfig) -> Result<ExecutorRouter, ServerError> {
    let mut router = ExecutorRouter::new();
    for tool in &config.tools {
        let executor: Arc<dyn ToolExecutor> = match &tool.executor {
            ExecutorConfig::Http {
                url,
            } => Arc::new(HttpToolExecutor::new(url).map_err(|err| ServerError::Init(err.to_string()))?),
            ExecutorConfig::Echo => Arc::new(EchoExecutor),
            ExecutorConfig::Static {
                output,
            } => Arc::new(StaticExecutor::new(output.clone())),
        };
        router.insert(tool.spec.name.clone(), executor);
    }
    Ok(router)
}

/// Builds the configured audit sink.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path.trim()))
                .map_err(|err| ServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Warns about configurations that reject every request.
fn emit_startup_warnings(config: &GatewayConfig) {
    let mut stderr = std::io::stderr().lock();
    if config.auth.credentials.is_empty() {
        let _ = writeln!(stderr, "tool-gate: WARNING: no credentials configured; every request will be rejected");
    }
    if config.tools.is_empty() {
        let _ = writeln!(stderr, "tool-gate: WARNING: no tools configured");
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Shared state for HTTP handlers.
#[derive(Clone)]
struct ServerState {
    /// Gateway facade.
    gateway: Arc<Gateway>,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
    /// Admin bearer tokens.
    admin_tokens: Arc<AdminTokens>,
}

/// Builds the route table.
fn build_router(state: ServerState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(handle_health))
        .route("/v1/tools", get(handle_list_tools))
        .route("/v1/invoke", post(handle_invoke))
        .route("/v1/admin/tools/{name}/enabled", post(handle_set_enabled))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Invocation request body.
#[derive(Debug, Deserialize)]
struct InvokeBody {
    /// Tool name.
    tool: String,
    /// Tool input; absent means `{}`.
    #[serde(default)]
    input: Value,
    /// Caller-supplied request identifier.
    #[serde(default)]
    request_id: Option<String>,
    /// Caller-requested timeout in milliseconds.
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// Admin toggle request body.
#[derive(Debug, Deserialize)]
struct EnabledBody {
    /// Desired enabled state.
    enabled: bool,
}

/// Discovery response body.
#[derive(Debug, Serialize)]
struct ToolListResponse {
    /// Always true.
    success: bool,
    /// Visible tools.
    tools: Vec<ToolDescriptor>,
}

/// Admin toggle response body.
#[derive(Debug, Serialize)]
struct EnabledResponse {
    /// Always true.
    success: bool,
    /// Tool name.
    tool: String,
    /// Enabled state after the call.
    enabled: bool,
    /// Whether the call changed the state.
    changed: bool,
}

/// Error response body for non-invocation routes.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Always false.
    success: bool,
    /// Error detail.
    error: ErrorBody,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Answers liveness checks.
async fn handle_health() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Lists tools visible to the caller.
async fn handle_list_tools(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let (request_id, _) = resolve_request_id(header_value(&headers, REQUEST_ID_HEADER));
    let source = peer.ip().to_string();
    let request = CallerRequest {
        authorization: header_value(&headers, AUTHORIZATION.as_str()),
        source: Some(&source),
        request_id: &request_id,
    };
    match state.gateway.discover(&request).await {
        Ok(tools) => json_response(
            StatusCode::OK,
            &ToolListResponse {
                success: true,
                tools,
            },
            &request_id,
            None,
        ),
        Err(error) => error_response(&error, &request_id),
    }
}

/// Runs one invocation.
async fn handle_invoke(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let header_request_id = header_value(&headers, REQUEST_ID_HEADER);
    let parsed = read_body(body, state.max_body_bytes).and_then(|bytes| parse_json::<InvokeBody>(&bytes));
    let request = match parsed {
        Ok(request) => request,
        Err((status, error)) => {
            let (request_id, _) = resolve_request_id(header_request_id);
            return rejected_invocation(status, error, request_id);
        }
    };
    let result = state
        .gateway
        .invoke(InvocationRequest {
            authorization: header_value(&headers, AUTHORIZATION.as_str()).map(str::to_string),
            source: Some(peer.ip().to_string()),
            tool: request.tool,
            input: request.input,
            request_id: request.request_id.or_else(|| header_request_id.map(str::to_string)),
            timeout_ms: request.timeout_ms,
        })
        .await;
    invocation_response(result)
}

/// Enables or disables a tool.
async fn handle_set_enabled(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    axum::extract::Path(name): axum::extract::Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let (request_id, _) = resolve_request_id(header_value(&headers, REQUEST_ID_HEADER));
    let source = peer.ip().to_string();
    let caller = CallerRequest {
        authorization: header_value(&headers, AUTHORIZATION.as_str()),
        source: Some(&source),
        request_id: &request_id,
    };
    let actor = match state.gateway.authorize_admin(&state.admin_tokens, &caller) {
        Ok(actor) => actor,
        Err(error) => return error_response(&error, &request_id),
    };
    let request = match read_body(body, state.max_body_bytes).and_then(|bytes| parse_json::<EnabledBody>(&bytes)) {
        Ok(request) => request,
        Err((status, error)) => {
            return json_response(status, &error_body(&error), &request_id, None);
        }
    };
    match state.gateway.set_tool_enabled(&name, request.enabled, &actor) {
        Ok(changed) => json_response(
            StatusCode::OK,
            &EnabledResponse {
                success: true,
                tool: name,
                enabled: request.enabled,
                changed,
            },
            &request_id,
            None,
        ),
        Err(error) => error_response(&error, &request_id),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a header value when present and valid UTF-8.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Unwraps the body extractor and enforces the size limit.
fn read_body(body: Result<Bytes, BytesRejection>, max_bytes: usize) -> Result<Bytes, (StatusCode, GatewayError)> {
    let too_large = || {
        let reason = ViolationReason::PayloadTooLarge {
            max_bytes,
        };
        (StatusCode::PAYLOAD_TOO_LARGE, GatewayError::Validation(ValidationError::root(reason)))
    };
    match body {
        Ok(bytes) if bytes.len() > max_bytes => Err(too_large()),
        Ok(bytes) => Ok(bytes),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => Err(too_large()),
        Err(_) => Err(invalid_json()),
    }
}

/// Parses a JSON request body.
fn parse_json<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, (StatusCode, GatewayError)> {
    serde_json::from_slice(bytes).map_err(|_| invalid_json())
}

/// Builds the invalid JSON rejection.
fn invalid_json() -> (StatusCode, GatewayError) {
    (StatusCode::BAD_REQUEST, GatewayError::Validation(ValidationError::root(ViolationReason::InvalidJson)))
}

/// Builds an error body wrapper.
fn error_body(error: &GatewayError) -> ErrorResponse {
    ErrorResponse {
        success: false,
        error: error.body(),
    }
}

/// Builds an error response using the error's own status.
fn error_response(error: &GatewayError, request_id: &RequestId) -> Response {
    json_response(status_for(error.status_code()), &error_body(error), request_id, error.retry_after())
}

/// Builds the response for a body rejected before dispatch.
fn rejected_invocation(status: StatusCode, error: GatewayError, request_id: RequestId) -> Response {
    let body = InvocationResponse {
        success: false,
        output: None,
        error: Some(error.body()),
        metadata: ExecutionMetadata {
            request_id: request_id.clone(),
            elapsed_ms: 0,
            client_id: None,
            tool: None,
        },
    };
    json_response(status, &body, &request_id, None)
}

/// Converts an invocation result into an HTTP response.
fn invocation_response(result: InvocationResult) -> Response {
    let status = status_for(result.status_code());
    let retry_after = result.error().and_then(GatewayError::retry_after);
    let request_id = result.metadata().request_id.clone();
    json_response(status, &result.into_response(), &request_id, retry_after)
}

/// Serializes `body` with the request ID and optional retry headers.
fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
    request_id: &RequestId,
    retry_after: Option<Duration>,
) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    if let Some(retry_after) = retry_after {
        response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
    }
    response
}

/// Converts a retry hint to whole seconds, rounding up with a floor of one.
fn retry_after_secs(retry_after: Duration) -> u64 {
    duration_ms(retry_after).div_ceil(1_000).max(1)
}

/// Maps a numeric status to [`StatusCode`].
fn status_for(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
