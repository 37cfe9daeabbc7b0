// crates/tool-gate-core/src/telemetry.rs
// ============================================================================
// Module: Tool Gate Telemetry
// Description: Metrics hooks for invocation counts and latency.
// Purpose: Expose a backend-agnostic metrics seam with stable labels.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The gateway reports one [`InvocationMetric`] per completed invocation.
//! Deployments plug an exporter in through [`GatewayMetrics`]; the default
//! [`NoopMetrics`] discards everything. Labels are stable strings so exporters
//! can build low-cardinality series.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use crate::error::ErrorKind;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationOutcome {
    /// Executor produced a result.
    Success,
    /// Request ended with an error kind.
    Error(ErrorKind),
}

impl InvocationOutcome {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error(kind) => kind.as_str(),
        }
    }
}

/// Metrics sample for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationMetric {
    /// Tool label; `unknown` when the request never resolved a tool.
    pub tool: String,
    /// Outcome label.
    pub outcome: InvocationOutcome,
    /// Time spent in the gateway.
    pub latency: Duration,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gateway invocations.
pub trait GatewayMetrics: Send + Sync {
    /// Records one invocation.
    fn record_invocation(&self, metric: &InvocationMetric);
}

/// Metrics sink that discards samples.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_invocation(&self, _metric: &InvocationMetric) {}
}
