// crates/tool-gate-core/src/error.rs
// ============================================================================
// Module: Tool Gate Errors
// Description: Caller-facing error taxonomy and its wire projection.
// Purpose: Map every terminal failure to a stable kind, status, and body.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`GatewayError`] is the closed set of outcomes a caller can observe besides
//! success. Internal faults collapse to [`GatewayError::Internal`], which never
//! carries diagnostic detail; that detail goes to the audit sink instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::validation::FieldViolation;
use crate::validation::ValidationError;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Stable label for each caller-facing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential missing, malformed, unknown, expired, or revoked.
    Unauthorized,
    /// Tool outside the client's permission set.
    Forbidden,
    /// Tool name not registered.
    ToolNotFound,
    /// Tool registered but disabled.
    ToolDisabled,
    /// Input failed schema validation.
    ValidationError,
    /// Budget exhausted for the current window.
    RateLimited,
    /// Tool executor reported a failure.
    ExecutorFailure,
    /// Deadline expired.
    Timeout,
    /// Gateway-side fault.
    InternalError,
}

impl ErrorKind {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::ToolNotFound => "tool_not_found",
            Self::ToolDisabled => "tool_disabled",
            Self::ValidationError => "validation_error",
            Self::RateLimited => "rate_limited",
            Self::ExecutorFailure => "executor_failure",
            Self::Timeout => "timeout",
            Self::InternalError => "internal_error",
        }
    }

    /// Returns the HTTP-equivalent status code.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::ToolNotFound => 404,
            Self::ToolDisabled => 503,
            Self::ValidationError => 400,
            Self::RateLimited => 429,
            Self::ExecutorFailure => 502,
            Self::Timeout => 504,
            Self::InternalError => 500,
        }
    }
}

// ============================================================================
// SECTION: Gateway Error
// ============================================================================

/// Terminal failure of a discovery or invocation request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Authentication failed; the reason is never disclosed.
    #[error("authentication failed")]
    Unauthorized,
    /// Client lacks permission for the tool.
    #[error("client is not permitted to invoke this tool")]
    Forbidden,
    /// Tool name is not registered.
    #[error("tool not found")]
    ToolNotFound,
    /// Tool is registered but disabled.
    #[error("tool is disabled")]
    ToolDisabled,
    /// Input failed validation.
    #[error("input validation failed: {0}")]
    Validation(ValidationError),
    /// Budget exhausted until the window resets.
    #[error("rate limit exceeded")]
    RateLimited {
        /// Time until the exhausted scope resets.
        retry_after: Duration,
    },
    /// Executor failed; not retried by the gateway.
    #[error("executor failure: {0}")]
    ExecutorFailure(String),
    /// Deadline expired before a result was produced.
    #[error("deadline exceeded")]
    Timeout,
    /// Gateway-side fault with details withheld.
    #[error("internal error")]
    Internal,
}

impl GatewayError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::ToolNotFound => ErrorKind::ToolNotFound,
            Self::ToolDisabled => ErrorKind::ToolDisabled,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::RateLimited {
                ..
            } => ErrorKind::RateLimited,
            Self::ExecutorFailure(_) => ErrorKind::ExecutorFailure,
            Self::Timeout => ErrorKind::Timeout,
            Self::Internal => ErrorKind::InternalError,
        }
    }

    /// Returns the HTTP-equivalent status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Returns the retry hint for rate-limited failures.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after,
            } => Some(*retry_after),
            _ => None,
        }
    }

    /// Builds the caller-facing error body.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let (message, violations) = match self {
            Self::Validation(error) => {
                ("input validation failed".to_string(), Some(error.violations.clone()))
            }
            other => (other.to_string(), None),
        };
        ErrorBody {
            kind: self.kind(),
            message,
            retry_after_ms: self.retry_after().map(duration_ms),
            violations,
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error)
    }
}

/// Machine-parseable error object returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Stable error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Retry hint in milliseconds for rate-limited failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// Per-field detail for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<FieldViolation>>,
}

/// Converts a duration to whole milliseconds, rounding up and saturating.
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
