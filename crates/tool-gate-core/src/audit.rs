// crates/tool-gate-core/src/audit.rs
// ============================================================================
// Module: Tool Gate Audit Logging
// Description: Structured audit events for invocations, auth, and admin actions.
// Purpose: Emit JSON-line audit records without coupling to a log pipeline.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain serializable structs handed to an [`AuditSink`].
//! Delivery is fire-and-forget: sinks swallow their own write failures so a
//! broken audit destination never fails a caller's request.
//! Credential secrets never appear in events; bearer tokens are referenced by
//! their SHA-256 fingerprint only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;

use crate::error::ErrorKind;

// ============================================================================
// SECTION: Events
// ============================================================================

/// One record per completed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Effective request identifier.
    pub request_id: String,
    /// True when the gateway generated the request identifier.
    pub request_id_generated: bool,
    /// Authenticated client, when authentication succeeded.
    pub client_id: Option<String>,
    /// Tool name as requested by the caller.
    pub tool: String,
    /// Outcome label (`success` or an error kind).
    pub outcome: &'static str,
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Wall time spent in the gateway.
    pub elapsed_ms: u64,
    /// Peer source when known.
    pub source: Option<String>,
}

/// Inputs required to construct an invocation audit event.
pub struct InvocationAuditParams {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Effective request identifier.
    pub request_id: String,
    /// True when the gateway generated the request identifier.
    pub request_id_generated: bool,
    /// Authenticated client, when authentication succeeded.
    pub client_id: Option<String>,
    /// Tool name as requested by the caller.
    pub tool: String,
    /// Error kind, or `None` on success.
    pub error_kind: Option<ErrorKind>,
    /// Wall time spent in the gateway.
    pub elapsed_ms: u64,
    /// Peer source when known.
    pub source: Option<String>,
}

impl InvocationAuditEvent {
    /// Builds an invocation event.
    #[must_use]
    pub fn new(params: InvocationAuditParams) -> Self {
        let (outcome, status) =
            params.error_kind.map_or(("success", 200), |kind| (kind.as_str(), kind.status_code()));
        Self {
            event: "tool_invocation",
            timestamp_ms: params.timestamp_ms,
            request_id: params.request_id,
            request_id_generated: params.request_id_generated,
            client_id: params.client_id,
            tool: params.tool,
            outcome,
            status,
            elapsed_ms: params.elapsed_ms,
            source: params.source,
        }
    }
}

/// Authentication decision, including the internal failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Request identifier.
    pub request_id: String,
    /// Caller source used for the failure budget.
    pub source: String,
    /// `allow` or `deny`.
    pub decision: &'static str,
    /// Internal reason for deny decisions.
    pub reason: Option<&'static str>,
    /// Resolved client on allow.
    pub client_id: Option<String>,
    /// SHA-256 fingerprint of the presented token, when well-formed.
    pub token_fingerprint: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(
        timestamp_ms: u64,
        request_id: &str,
        source: &str,
        client_id: &str,
        token_fingerprint: String,
    ) -> Self {
        Self {
            event: "auth_decision",
            timestamp_ms,
            request_id: request_id.to_string(),
            source: source.to_string(),
            decision: "allow",
            reason: None,
            client_id: Some(client_id.to_string()),
            token_fingerprint: Some(token_fingerprint),
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(
        timestamp_ms: u64,
        request_id: &str,
        source: &str,
        reason: &'static str,
        token_fingerprint: Option<String>,
    ) -> Self {
        Self {
            event: "auth_decision",
            timestamp_ms,
            request_id: request_id.to_string(),
            source: source.to_string(),
            decision: "deny",
            reason: Some(reason),
            client_id: None,
            token_fingerprint,
        }
    }
}

/// Administrative registry mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Tool affected.
    pub tool: String,
    /// New enabled state.
    pub enabled: bool,
    /// Whether the state actually changed.
    pub changed: bool,
    /// Actor label (admin token fingerprint or `local`).
    pub actor: String,
}

impl RegistryAuditEvent {
    /// Builds an enable/disable event.
    #[must_use]
    pub fn toggled(timestamp_ms: u64, tool: &str, enabled: bool, changed: bool, actor: String) -> Self {
        Self {
            event: "registry_change",
            timestamp_ms,
            tool: tool.to_string(),
            enabled,
            changed,
            actor,
        }
    }
}

/// Internal fault with full diagnostic context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalFaultEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Request identifier when the fault occurred during a request.
    pub request_id: Option<String>,
    /// Component that raised the fault.
    pub component: &'static str,
    /// Diagnostic detail (never returned to callers).
    pub detail: String,
}

impl InternalFaultEvent {
    /// Builds a fault event.
    #[must_use]
    pub fn new(timestamp_ms: u64, request_id: Option<&str>, component: &'static str, detail: String) -> Self {
        Self {
            event: "internal_fault",
            timestamp_ms,
            request_id: request_id.map(str::to_string),
            component,
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Records a completed invocation.
    fn record_invocation(&self, event: &InvocationAuditEvent);

    /// Records an authentication decision.
    fn record_auth(&self, _event: &AuthAuditEvent) {}

    /// Records a registry mutation.
    fn record_registry(&self, _event: &RegistryAuditEvent) {}

    /// Records an internal fault.
    fn record_fault(&self, _event: &InternalFaultEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event line to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr().lock(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_invocation(&self, event: &InvocationAuditEvent) {
        Self::emit(event);
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        Self::emit(event);
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        Self::emit(event);
    }

    fn record_fault(&self, event: &InternalFaultEvent) {
        Self::emit(event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event line.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_invocation(&self, event: &InvocationAuditEvent) {
        self.emit(event);
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        self.emit(event);
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        self.emit(event);
    }

    fn record_fault(&self, event: &InternalFaultEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_invocation(&self, _event: &InvocationAuditEvent) {}
}

/// Audit event captured by [`MemoryAuditSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditRecord {
    /// Invocation event.
    Invocation(InvocationAuditEvent),
    /// Authentication event.
    Auth(AuthAuditEvent),
    /// Registry event.
    Registry(RegistryAuditEvent),
    /// Fault event.
    Fault(InternalFaultEvent),
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    /// Captured events in arrival order.
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Returns a copy of every captured event.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns captured invocation events.
    #[must_use]
    pub fn invocations(&self) -> Vec<InvocationAuditEvent> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                AuditRecord::Invocation(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Returns captured authentication events.
    #[must_use]
    pub fn auth_events(&self) -> Vec<AuthAuditEvent> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                AuditRecord::Auth(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Appends a record.
    fn push(&self, record: AuditRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_invocation(&self, event: &InvocationAuditEvent) {
        self.push(AuditRecord::Invocation(event.clone()));
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        self.push(AuditRecord::Auth(event.clone()));
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        self.push(AuditRecord::Registry(event.clone()));
    }

    fn record_fault(&self, event: &InternalFaultEvent) {
        self.push(AuditRecord::Fault(event.clone()));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use std::fs;

    use super::AuditSink;
    use super::FileAuditSink;
    use super::InvocationAuditEvent;
    use super::InvocationAuditParams;
    use crate::error::ErrorKind;

    fn event(error_kind: Option<ErrorKind>) -> InvocationAuditEvent {
        InvocationAuditEvent::new(InvocationAuditParams {
            timestamp_ms: 42,
            request_id: "req-1".to_string(),
            request_id_generated: false,
            client_id: Some("bot".to_string()),
            tool: "search".to_string(),
            error_kind,
            elapsed_ms: 3,
            source: None,
        })
    }

    #[test]
    fn invocation_event_maps_outcome_and_status() {
        let ok = event(None);
        assert_eq!((ok.outcome, ok.status), ("success", 200));
        let limited = event(Some(ErrorKind::RateLimited));
        assert_eq!((limited.outcome, limited.status), ("rate_limited", 429));
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record_invocation(&event(None));
        sink.record_invocation(&event(Some(ErrorKind::Timeout)));
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "tool_invocation");
        assert_eq!(lines[1]["outcome"], "timeout");
    }
}
