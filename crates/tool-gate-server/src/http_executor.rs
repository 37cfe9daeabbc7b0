// crates/tool-gate-server/src/http_executor.rs
// ============================================================================
// Module: HTTP Tool Executor
// Description: Executor that forwards validated input to an HTTP endpoint.
// Purpose: Run remote tools with bounded requests and responses.
// Dependencies: tool-gate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`HttpToolExecutor`] POSTs the validated input as a JSON object to a fixed
//! URL and parses the response body as the tool output. Redirects are
//! disabled, the request is bounded by the invocation deadline, and the
//! response body is read under a byte limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Response;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde_json::Value;
use tool_gate_core::ToolExecutor;
use tool_gate_core::ToolName;
use tool_gate_core::ValidatedInput;
use tool_gate_core::executor::Deadline;
use tool_gate_core::executor::ExecutorError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the invoked tool name.
pub const TOOL_NAME_HEADER: &str = "x-tool-name";
/// Default connect timeout for executor requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default maximum response size in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;
/// Slack added to the transport timeout so the invocation deadline fires first.
const TRANSPORT_TIMEOUT_GRACE: Duration = Duration::from_millis(250);
/// User agent sent on executor requests.
const USER_AGENT: &str = concat!("tool-gate/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executor that calls a remote tool over HTTP.
pub struct HttpToolExecutor {
    /// Target endpoint.
    url: Url,
    /// Response size limit.
    max_response_bytes: usize,
    /// Shared HTTP client.
    client: Client,
}

impl HttpToolExecutor {
    /// Creates an executor for `url` with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Unavailable`] when the URL is invalid or the
    /// client cannot be built.
    pub fn new(url: &str) -> Result<Self, ExecutorError> {
        Self::with_limits(url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RESPONSE_BYTES)
    }

    /// Creates an executor with explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Unavailable`] when the URL is invalid or the
    /// client cannot be built.
    pub fn with_limits(
        url: &str,
        connect_timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self, ExecutorError> {
        let url = Url::parse(url).map_err(|err| ExecutorError::Unavailable(format!("invalid url: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ExecutorError::Unavailable("url must use http or https".to_string()));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(|_| ExecutorError::Unavailable("http client build failed".to_string()))?;
        Ok(Self {
            url,
            max_response_bytes,
            client,
        })
    }

    /// Returns the target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn execute(
        &self,
        tool: &ToolName,
        input: &ValidatedInput,
        deadline: Deadline,
    ) -> Result<Value, ExecutorError> {
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(ExecutorError::Unavailable("deadline already passed".to_string()));
        }
        let response = self
            .client
            .post(self.url.clone())
            .timeout(remaining.saturating_add(TRANSPORT_TIMEOUT_GRACE))
            .header(TOOL_NAME_HEADER, tool.as_str())
            .json(input)
            .send()
            .await
            .map_err(|_| ExecutorError::Unavailable("http request failed".to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Failed(format!("tool endpoint answered status {}", status.as_u16())));
        }
        let body = read_response_limited(response, self.max_response_bytes).await?;
        serde_json::from_slice(&body)
            .map_err(|_| ExecutorError::InvalidOutput("response body is not json".to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the response body while enforcing a byte limit.
async fn read_response_limited(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, ExecutorError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| ExecutorError::InvalidOutput("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(ExecutorError::InvalidOutput("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|_| ExecutorError::Unavailable("failed to read response".to_string()))?
    {
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(ExecutorError::InvalidOutput("response exceeds size limit".to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
