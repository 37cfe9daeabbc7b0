// crates/tool-gate-core/src/auth.rs
// ============================================================================
// Module: Tool Gate Auth Gate
// Description: Bearer credential checks and client identity resolution.
// Purpose: Authenticate every call before any accounting or execution.
// Dependencies: async-trait, sha2, subtle, tokio, thiserror
// ============================================================================

//! ## Overview
//! The auth gate turns an `Authorization` header into a [`ClientIdentity`].
//! Credentials pass through four internal states (malformed, unknown,
//! revoked, expired) that all surface as the same
//! [`GatewayError::Unauthorized`]; the internal state is written to the audit
//! sink only. Failed attempts consume a per-source budget that is checked
//! before any lookup, so credential guessing is throttled independently of
//! tool budgets. Admin tokens go through the same budget and audit path.
//!
//! ## Invariants
//! - Identities are resolved per request and never cached.
//! - Lookups are bounded by the configured timeout.
//! - Successful authentications never consume the failure budget.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use sha2::Digest;
use sha2::Sha256;
use subtle::Choice;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::audit::AuditSink;
use crate::audit::AuthAuditEvent;
use crate::audit::InternalFaultEvent;
use crate::error::GatewayError;
use crate::executor::Deadline;
use crate::identifiers::RequestId;
use crate::identity::ClientIdentity;
use crate::rate_limit::ANONYMOUS_SOURCE;
use crate::rate_limit::RateDecision;
use crate::rate_limit::RateLimiter;
use crate::time::Clock;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header size in bytes.
pub const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Minimum bearer token length.
pub const MIN_TOKEN_LENGTH: usize = 8;
/// Maximum bearer token length.
pub const MAX_TOKEN_LENGTH: usize = 512;
/// Default credential lookup timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
/// Length of a hex-encoded SHA-256 fingerprint.
pub const FINGERPRINT_HEX_LENGTH: usize = 64;
/// Fingerprint prefix length used to name admin actors in audit events.
pub const ADMIN_ACTOR_PREFIX: usize = 12;

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Structurally valid bearer token.
///
/// `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Parses a raw token value (without the `Bearer` scheme).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() < MIN_TOKEN_LENGTH || value.len() > MAX_TOKEN_LENGTH {
            return None;
        }
        let body = value.trim_end_matches('=');
        if body.is_empty()
            || !body
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'+' | b'/'))
        {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// Returns the token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the hex SHA-256 fingerprint of the token.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        token_fingerprint(&self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Extracts a bearer token from an `Authorization` header value.
#[must_use]
pub fn parse_bearer_token(header: Option<&str>) -> Option<BearerToken> {
    let header = header?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return None;
    }
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    BearerToken::parse(token.trim())
}

/// Returns the hex SHA-256 fingerprint of a token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut hex = String::with_capacity(FINGERPRINT_HEX_LENGTH);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Returns true when the value is a lowercase hex SHA-256 fingerprint.
#[must_use]
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_HEX_LENGTH && value.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}

// ============================================================================
// SECTION: Credential Store
// ============================================================================

/// Stored credential state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Identity the credential resolves to.
    pub identity: ClientIdentity,
    /// Expiry in unix milliseconds; `None` never expires.
    pub expires_at_ms: Option<u64>,
    /// Explicitly invalidated.
    pub revoked: bool,
}

impl CredentialRecord {
    /// Builds an active, non-expiring record.
    #[must_use]
    pub const fn active(identity: ClientIdentity) -> Self {
        Self {
            identity,
            expires_at_ms: None,
            revoked: false,
        }
    }

    /// Sets the expiry.
    #[must_use]
    pub const fn expiring_at(mut self, expires_at_ms: u64) -> Self {
        self.expires_at_ms = Some(expires_at_ms);
        self
    }
}

/// Credential lookup collaborator. The gateway never issues or rotates credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolves a token to its record, or `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStoreError`] when the store cannot answer.
    async fn lookup(&self, token: &BearerToken) -> Result<Option<CredentialRecord>, CredentialStoreError>;
}

/// Credential store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialStoreError {
    /// Store is unreachable or failed.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// In-process credential store keyed by token fingerprint.
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    /// Records keyed by hex SHA-256 token fingerprint.
    records: RwLock<BTreeMap<String, CredentialRecord>>,
}

impl StaticCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record for a plaintext token.
    pub fn insert_token(&self, token: &str, record: CredentialRecord) {
        self.insert_fingerprint(token_fingerprint(token), record);
    }

    /// Adds a record for a precomputed token fingerprint.
    pub fn insert_fingerprint(&self, fingerprint: String, record: CredentialRecord) {
        self.records.write().unwrap_or_else(PoisonError::into_inner).insert(fingerprint, record);
    }

    /// Marks the credential with this fingerprint as revoked.
    ///
    /// Returns false when no such credential exists.
    pub fn revoke(&self, fingerprint: &str) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.get_mut(fingerprint).is_some_and(|record| {
            record.revoked = true;
            true
        })
    }

    /// Returns the number of stored credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no credentials are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn lookup(&self, token: &BearerToken) -> Result<Option<CredentialRecord>, CredentialStoreError> {
        let fingerprint = token.fingerprint();
        Ok(self.records.read().unwrap_or_else(PoisonError::into_inner).get(&fingerprint).cloned())
    }
}

// ============================================================================
// SECTION: Admin Tokens
// ============================================================================

/// Admin bearer tokens held as SHA-256 digests.
///
/// Comparisons run over fixed-length digests in constant time, so neither the
/// matching token nor any token length is observable through timing.
#[derive(Clone, Default)]
pub struct AdminTokens {
    /// Digests of the configured tokens.
    digests: Vec<[u8; 32]>,
}

impl AdminTokens {
    /// Builds the set from plaintext tokens.
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            digests: tokens.into_iter().map(|token| token_digest(token.as_ref())).collect(),
        }
    }

    /// Returns the number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Returns true when no admin tokens are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Returns true when the token matches any configured token.
    fn matches(&self, token: &BearerToken) -> bool {
        let presented = token_digest(token.as_str());
        let mut matched = Choice::from(0);
        for digest in &self.digests {
            matched |= digest.as_slice().ct_eq(presented.as_slice());
        }
        bool::from(matched)
    }
}

impl fmt::Debug for AdminTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminTokens").field("count", &self.digests.len()).finish_non_exhaustive()
    }
}

/// Returns the raw SHA-256 digest of a token.
fn token_digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

// ============================================================================
// SECTION: Auth Gate
// ============================================================================

/// Internal credential outcome; only `Valid` reaches callers as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    /// Credential maps to an active client.
    Valid,
    /// Credential is past its validity window.
    Expired,
    /// Credential was explicitly invalidated.
    Revoked,
    /// Credential failed structural checks.
    Malformed,
    /// Credential is well-formed but unknown.
    Unknown,
}

impl CredentialStatus {
    /// Returns the stable audit label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Malformed => "malformed",
            Self::Unknown => "unknown",
        }
    }
}

/// Auth gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    /// Upper bound on a credential lookup.
    pub lookup_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// Per-request authentication input.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
    /// Caller source (peer IP) for the failure budget.
    pub source: Option<&'a str>,
    /// Request identifier for audit correlation.
    pub request_id: &'a RequestId,
    /// Caller deadline; the lookup never outlives it.
    pub deadline: Option<Deadline>,
}

/// Authenticates callers against a credential store.
pub struct AuthGate {
    /// Credential lookup collaborator.
    store: Arc<dyn CredentialStore>,
    /// Limiter holding the failure budget.
    limiter: Arc<RateLimiter>,
    /// Time source for expiry checks.
    clock: Arc<dyn Clock>,
    /// Audit destination.
    audit: Arc<dyn AuditSink>,
    /// Gate settings.
    settings: AuthSettings,
}

impl AuthGate {
    /// Creates an auth gate.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            limiter,
            clock,
            audit,
            settings,
        }
    }

    /// Resolves the request's credential to a client identity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] for every credential failure,
    /// [`GatewayError::RateLimited`] when the source exhausted its failure
    /// budget, [`GatewayError::Timeout`] when the lookup exceeds the lookup
    /// bound or the caller deadline, whichever ends first,
    /// and [`GatewayError::Internal`] when a collaborator fails.
    pub async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<ClientIdentity, GatewayError> {
        let source = request.source.unwrap_or(ANONYMOUS_SOURCE);
        let request_id = request.request_id.as_str();
        self.check_failure_budget(source, request_id)?;

        let Some(token) = parse_bearer_token(request.authorization) else {
            return Err(self.reject(request, source, CredentialStatus::Malformed, None));
        };
        let fingerprint = token.fingerprint();
        let bound = request.deadline.map_or(self.settings.lookup_timeout, |deadline| {
            self.settings.lookup_timeout.min(deadline.remaining())
        });
        let record = match tokio::time::timeout(bound, self.store.lookup(&token)).await {
            Ok(Ok(Some(record))) => record,
            Ok(Ok(None)) => {
                return Err(self.reject(request, source, CredentialStatus::Unknown, Some(fingerprint)));
            }
            Ok(Err(err)) => return Err(self.fault(request_id, err.to_string())),
            Err(_) => {
                self.audit.record_auth(&AuthAuditEvent::denied(
                    self.clock.now_ms(),
                    request_id,
                    source,
                    "lookup_timeout",
                    Some(fingerprint),
                ));
                return Err(GatewayError::Timeout);
            }
        };

        let status = self.classify(&record);
        if status != CredentialStatus::Valid {
            return Err(self.reject(request, source, status, Some(fingerprint)));
        }
        self.audit.record_auth(&AuthAuditEvent::allowed(
            self.clock.now_ms(),
            request_id,
            source,
            record.identity.client_id.as_str(),
            fingerprint,
        ));
        Ok(record.identity)
    }

    /// Checks an admin bearer token and returns the audit actor name.
    ///
    /// Failed attempts charge the same per-source budget as client
    /// credentials and are audited with the same reasons.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] when no admin tokens are
    /// configured, [`GatewayError::RateLimited`] when the source exhausted its
    /// failure budget, and [`GatewayError::Unauthorized`] otherwise.
    pub fn authorize_admin(&self, tokens: &AdminTokens, request: &AuthRequest<'_>) -> Result<String, GatewayError> {
        if tokens.is_empty() {
            return Err(GatewayError::Forbidden);
        }
        let source = request.source.unwrap_or(ANONYMOUS_SOURCE);
        let request_id = request.request_id.as_str();
        self.check_failure_budget(source, request_id)?;

        let Some(token) = parse_bearer_token(request.authorization) else {
            return Err(self.reject(request, source, CredentialStatus::Malformed, None));
        };
        let fingerprint = token.fingerprint();
        if !tokens.matches(&token) {
            return Err(self.reject(request, source, CredentialStatus::Unknown, Some(fingerprint)));
        }
        let prefix = fingerprint.get(..ADMIN_ACTOR_PREFIX).unwrap_or(&fingerprint);
        let actor = format!("admin:{prefix}");
        self.audit.record_auth(&AuthAuditEvent::allowed(self.clock.now_ms(), request_id, source, &actor, fingerprint));
        Ok(actor)
    }

    /// Refuses sources that exhausted their failed-authentication budget.
    fn check_failure_budget(&self, source: &str, request_id: &str) -> Result<(), GatewayError> {
        match self.limiter.check_auth_attempt(source) {
            Ok(RateDecision::Allowed) => Ok(()),
            Ok(RateDecision::Denied {
                retry_after,
                ..
            }) => {
                self.audit.record_auth(&AuthAuditEvent::denied(
                    self.clock.now_ms(),
                    request_id,
                    source,
                    "throttled",
                    None,
                ));
                Err(GatewayError::RateLimited {
                    retry_after,
                })
            }
            Err(err) => Err(self.fault(request_id, err.to_string())),
        }
    }

    /// Classifies a found record.
    fn classify(&self, record: &CredentialRecord) -> CredentialStatus {
        if record.revoked {
            CredentialStatus::Revoked
        } else if record.expires_at_ms.is_some_and(|expires| self.clock.now_ms() >= expires) {
            CredentialStatus::Expired
        } else {
            CredentialStatus::Valid
        }
    }

    /// Charges the failure budget, audits the reason, and returns the uniform error.
    fn reject(
        &self,
        request: &AuthRequest<'_>,
        source: &str,
        status: CredentialStatus,
        fingerprint: Option<String>,
    ) -> GatewayError {
        let request_id = request.request_id.as_str();
        if let Err(err) = self.limiter.record_auth_failure(source) {
            let _ = self.fault(request_id, err.to_string());
        }
        self.audit.record_auth(&AuthAuditEvent::denied(
            self.clock.now_ms(),
            request_id,
            source,
            status.as_str(),
            fingerprint,
        ));
        GatewayError::Unauthorized
    }

    /// Records an internal fault and returns the generic error.
    fn fault(&self, request_id: &str, detail: String) -> GatewayError {
        self.audit.record_fault(&InternalFaultEvent::new(self.clock.now_ms(), Some(request_id), "auth_gate", detail));
        GatewayError::Internal
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
