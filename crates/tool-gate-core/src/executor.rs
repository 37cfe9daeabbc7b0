// crates/tool-gate-core/src/executor.rs
// ============================================================================
// Module: Tool Gate Executors
// Description: Executor trait, built-in executors, and per-tool routing.
// Purpose: Run validated input against the implementation behind a tool.
// Dependencies: async-trait, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! Executors are opaque, time-bounded collaborators. The dispatcher hands
//! them validated input and a [`Deadline`]; the dispatcher also enforces the
//! deadline itself, so executors that ignore it are still bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use crate::identifiers::ToolName;
use crate::validation::ValidatedInput;

// ============================================================================
// SECTION: Deadline
// ============================================================================

/// Absolute point in time by which an invocation must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// Expiry instant.
    at: Instant,
}

impl Deadline {
    /// Creates a deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Returns the expiry instant.
    #[must_use]
    pub const fn instant(&self) -> Instant {
        self.at
    }

    /// Returns the time left, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

// ============================================================================
// SECTION: Executor Trait
// ============================================================================

/// Executor failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Backend rejected or failed the call.
    #[error("executor failed: {0}")]
    Failed(String),
    /// Backend could not be reached.
    #[error("executor unavailable: {0}")]
    Unavailable(String),
    /// Backend answered with something that is not a tool result.
    #[error("invalid executor output: {0}")]
    InvalidOutput(String),
}

/// Runs a tool's implementation.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Executes `tool` with validated input before `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the implementation fails.
    async fn execute(
        &self,
        tool: &ToolName,
        input: &ValidatedInput,
        deadline: Deadline,
    ) -> Result<Value, ExecutorError>;
}

// ============================================================================
// SECTION: Built-in Executors
// ============================================================================

/// Returns the validated input as the output.
pub struct EchoExecutor;

#[async_trait]
impl ToolExecutor for EchoExecutor {
    async fn execute(
        &self,
        _tool: &ToolName,
        input: &ValidatedInput,
        _deadline: Deadline,
    ) -> Result<Value, ExecutorError> {
        Ok(input.clone().into_value())
    }
}

/// Returns a fixed JSON value.
pub struct StaticExecutor {
    /// Value returned on every call.
    output: Value,
}

impl StaticExecutor {
    /// Creates an executor returning `output`.
    #[must_use]
    pub const fn new(output: Value) -> Self {
        Self {
            output,
        }
    }
}

#[async_trait]
impl ToolExecutor for StaticExecutor {
    async fn execute(
        &self,
        _tool: &ToolName,
        _input: &ValidatedInput,
        _deadline: Deadline,
    ) -> Result<Value, ExecutorError> {
        Ok(self.output.clone())
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Maps tool names to their executors.
#[derive(Default, Clone)]
pub struct ExecutorRouter {
    /// Executors keyed by tool.
    routes: BTreeMap<ToolName, Arc<dyn ToolExecutor>>,
}

impl ExecutorRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `tool` to `executor`, replacing any previous route.
    pub fn insert(&mut self, tool: ToolName, executor: Arc<dyn ToolExecutor>) {
        self.routes.insert(tool, executor);
    }

    /// Builder form of [`ExecutorRouter::insert`].
    #[must_use]
    pub fn with_route(mut self, tool: ToolName, executor: Arc<dyn ToolExecutor>) -> Self {
        self.insert(tool, executor);
        self
    }

    /// Returns the executor for `tool`.
    #[must_use]
    pub fn get(&self, tool: &ToolName) -> Option<Arc<dyn ToolExecutor>> {
        self.routes.get(tool).cloned()
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true when no routes exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
