// crates/tool-gate-config/src/config.rs
// ============================================================================
// Module: Tool Gate Configuration
// Description: Configuration loading and validation for the tool gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: tool-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded once from a TOML file with strict size and path
//! limits and is immutable afterwards; picking up changes requires a restart.
//! Missing or invalid configuration fails closed. Validated configuration
//! converts directly into core component settings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tool_gate_core::AuthSettings;
use tool_gate_core::ClientId;
use tool_gate_core::ClientIdentity;
use tool_gate_core::CredentialRecord;
use tool_gate_core::DispatcherConfig;
use tool_gate_core::GatewaySettings;
use tool_gate_core::InMemoryCounterStore;
use tool_gate_core::PermissionSet;
use tool_gate_core::RateLimitPolicy;
use tool_gate_core::RegistrationPolicy;
use tool_gate_core::StaticCredentialStore;
use tool_gate_core::ToolName;
use tool_gate_core::ToolRegistry;
use tool_gate_core::ToolSpec;
use tool_gate_core::UnknownFieldPolicy;
use tool_gate_core::ValidationOrder;
use tool_gate_core::auth::BearerToken;
use tool_gate_core::auth::is_fingerprint;
use tool_gate_core::auth::token_fingerprint;
use tool_gate_core::identity::WILDCARD_PERMISSION;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "tool-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TOOL_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Default bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Maximum request body size accepted by configuration.
pub(crate) const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Maximum number of admin tokens.
pub(crate) const MAX_ADMIN_TOKENS: usize = 64;

/// Lower bound on credential lookup timeout.
pub(crate) const MIN_LOOKUP_TIMEOUT_MS: u64 = 1;
/// Upper bound on credential lookup timeout.
pub(crate) const MAX_LOOKUP_TIMEOUT_MS: u64 = 60_000;
/// Upper bound on failed authentications per window.
pub(crate) const MAX_AUTH_FAILURE_LIMIT: u64 = 100_000;
/// Maximum number of configured credentials.
pub(crate) const MAX_CREDENTIALS: usize = 4096;
/// Maximum number of permission entries per credential.
pub(crate) const MAX_PERMISSIONS_PER_CREDENTIAL: usize = 1024;

/// Lower bound on any rate window.
pub(crate) const MIN_WINDOW_MS: u64 = 100;
/// Upper bound on any rate window.
pub(crate) const MAX_WINDOW_MS: u64 = 86_400_000;
/// Upper bound on any request budget.
pub(crate) const MAX_BUDGET: u64 = 10_000_000;
/// Upper bound on tracked rate windows.
pub(crate) const MAX_RATE_LIMIT_ENTRIES: usize = 4_000_000;
/// Upper bound on counter store shards.
pub(crate) const MAX_SHARDS: usize = 1024;
/// Lower bound on the sweep interval.
pub(crate) const MIN_SWEEP_INTERVAL_MS: u64 = 100;

/// Lower bound on executor timeouts.
pub(crate) const MIN_TIMEOUT_MS: u64 = 1;
/// Upper bound on executor timeouts.
pub(crate) const MAX_TIMEOUT_MS: u64 = 600_000;
/// Maximum number of configured tools.
pub(crate) const MAX_TOOLS: usize = 1024;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Tool gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Rate limit configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Input validation configuration.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Dispatcher configuration.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Registered tools.
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

impl GatewayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.rate_limit.validate()?;
        self.dispatch.validate()?;
        self.audit.validate()?;
        let tool_names = self.validate_tools()?;
        self.auth.validate(&tool_names)?;
        Ok(())
    }

    /// Validates tool entries and returns the configured names.
    fn validate_tools(&self) -> Result<BTreeSet<ToolName>, ConfigError> {
        if self.tools.len() > MAX_TOOLS {
            return Err(ConfigError::Invalid("too many tools".to_string()));
        }
        let mut names = BTreeSet::new();
        for tool in &self.tools {
            tool.validate(&self.dispatch)?;
            let fresh = names.insert(tool.spec.name.clone());
            if !fresh && self.registry.on_duplicate == RegistrationPolicy::Reject {
                return Err(ConfigError::Invalid(format!("duplicate tool name: {}", tool.spec.name)));
            }
        }
        Ok(names)
    }

    /// Returns the combined core settings.
    #[must_use]
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            rate_limit: self.rate_limit.policy(&self.auth),
            auth: self.auth.settings(),
            dispatch: self.dispatch.dispatcher_config(self.validation.order),
            unknown_fields: self.validation.unknown_fields,
        }
    }

    /// Builds a registry populated with every configured tool.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a tool fails registration.
    pub fn build_registry(&self) -> Result<ToolRegistry, ConfigError> {
        let registry = ToolRegistry::new(self.registry.on_duplicate);
        for tool in &self.tools {
            registry
                .register(tool.spec.clone())
                .map_err(|err| ConfigError::Invalid(format!("tool registration failed: {err}")))?;
        }
        Ok(registry)
    }

    /// Builds the credential store from configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a credential entry is invalid.
    pub fn build_credential_store(&self) -> Result<StaticCredentialStore, ConfigError> {
        let store = StaticCredentialStore::new();
        for credential in &self.auth.credentials {
            store.insert_fingerprint(credential.fingerprint()?, credential.record()?);
        }
        Ok(store)
    }

    /// Builds the in-memory counter store.
    #[must_use]
    pub fn build_counter_store(&self) -> InMemoryCounterStore {
        InMemoryCounterStore::new(self.rate_limit.shards, self.rate_limit.max_entries)
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Bearer tokens accepted on admin routes.
    #[serde(default)]
    pub admin_tokens: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            admin_tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))
    }

    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be greater than zero".to_string()));
        }
        if self.max_body_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!("max_body_bytes must be at most {MAX_BODY_BYTES}")));
        }
        if self.admin_tokens.len() > MAX_ADMIN_TOKENS {
            return Err(ConfigError::Invalid("too many admin tokens".to_string()));
        }
        for token in &self.admin_tokens {
            if BearerToken::parse(token).is_none() {
                return Err(ConfigError::Invalid(
                    "admin token must be 8..=512 token68 characters".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Credential lookup timeout in milliseconds.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Failed authentications allowed per source per window.
    #[serde(default = "default_auth_failure_limit")]
    pub failure_limit: u64,
    /// Window for failed authentications in milliseconds.
    #[serde(default = "default_auth_failure_window_ms")]
    pub failure_window_ms: u64,
    /// Static credentials.
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: default_lookup_timeout_ms(),
            failure_limit: default_auth_failure_limit(),
            failure_window_ms: default_auth_failure_window_ms(),
            credentials: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Returns the auth gate settings.
    #[must_use]
    pub const fn settings(&self) -> AuthSettings {
        AuthSettings {
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
        }
    }

    /// Validates auth settings against the configured tool names.
    fn validate(&self, tools: &BTreeSet<ToolName>) -> Result<(), ConfigError> {
        if !(MIN_LOOKUP_TIMEOUT_MS..=MAX_LOOKUP_TIMEOUT_MS).contains(&self.lookup_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "auth lookup_timeout_ms must be between {MIN_LOOKUP_TIMEOUT_MS} and {MAX_LOOKUP_TIMEOUT_MS}"
            )));
        }
        if self.failure_limit == 0 || self.failure_limit > MAX_AUTH_FAILURE_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "auth failure_limit must be between 1 and {MAX_AUTH_FAILURE_LIMIT}"
            )));
        }
        validate_window("auth failure_window_ms", self.failure_window_ms)?;
        if self.credentials.len() > MAX_CREDENTIALS {
            return Err(ConfigError::Invalid("too many credentials".to_string()));
        }
        let mut client_ids = BTreeSet::new();
        let mut fingerprints = BTreeSet::new();
        for credential in &self.credentials {
            credential.validate(tools)?;
            if !client_ids.insert(credential.client_id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate client_id: {}", credential.client_id)));
            }
            if !fingerprints.insert(credential.fingerprint()?) {
                return Err(ConfigError::Invalid(format!(
                    "credential for {} reuses another client's token",
                    credential.client_id
                )));
            }
        }
        Ok(())
    }
}

/// One static credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Client identifier the credential resolves to.
    pub client_id: String,
    /// Plaintext bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Hex SHA-256 of the bearer token.
    #[serde(default)]
    pub token_sha256: Option<String>,
    /// Permitted tool names, or `*`.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Expiry in unix milliseconds.
    #[serde(default)]
    pub expires_at_ms: Option<u64>,
    /// Marks the credential as revoked.
    #[serde(default)]
    pub revoked: bool,
    /// Global budget override per window.
    #[serde(default)]
    pub global_limit: Option<u64>,
    /// Per-tool budget overrides per window.
    #[serde(default)]
    pub tool_limits: BTreeMap<String, u64>,
}

impl CredentialConfig {
    /// Returns the token fingerprint used as the store key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] unless exactly one token form is set.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        match (&self.token, &self.token_sha256) {
            (Some(token), None) => Ok(token_fingerprint(token)),
            (None, Some(digest)) => Ok(digest.to_ascii_lowercase()),
            _ => Err(ConfigError::Invalid(format!(
                "credential {} must set exactly one of token or token_sha256",
                self.client_id
            ))),
        }
    }

    /// Converts the entry into a credential record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when identifiers or permissions are invalid.
    pub fn record(&self) -> Result<CredentialRecord, ConfigError> {
        let client_id = ClientId::parse(&self.client_id)
            .ok_or_else(|| ConfigError::Invalid(format!("invalid client_id: {}", self.client_id)))?;
        let permissions = PermissionSet::from_entries(self.permissions.iter().map(String::as_str))
            .ok_or_else(|| ConfigError::Invalid(format!("invalid permissions for {}", self.client_id)))?;
        let mut identity = ClientIdentity::new(client_id, permissions);
        if let Some(limit) = self.global_limit {
            identity = identity.with_global_limit(limit);
        }
        for (tool, limit) in &self.tool_limits {
            let name = ToolName::parse(tool)
                .ok_or_else(|| ConfigError::Invalid(format!("invalid tool in tool_limits: {tool}")))?;
            identity = identity.with_tool_limit(name, *limit);
        }
        Ok(CredentialRecord {
            identity,
            expires_at_ms: self.expires_at_ms,
            revoked: self.revoked,
        })
    }

    /// Validates one credential against the configured tool names.
    fn validate(&self, tools: &BTreeSet<ToolName>) -> Result<(), ConfigError> {
        if let Some(token) = &self.token
            && BearerToken::parse(token).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "credential {} token must be 8..=512 token68 characters",
                self.client_id
            )));
        }
        if let Some(digest) = &self.token_sha256
            && !is_fingerprint(&digest.to_ascii_lowercase())
        {
            return Err(ConfigError::Invalid(format!(
                "credential {} token_sha256 must be 64 hex characters",
                self.client_id
            )));
        }
        self.fingerprint()?;
        if self.permissions.len() > MAX_PERMISSIONS_PER_CREDENTIAL {
            return Err(ConfigError::Invalid(format!("credential {} has too many permissions", self.client_id)));
        }
        for entry in &self.permissions {
            if entry == WILDCARD_PERMISSION {
                continue;
            }
            let known = ToolName::parse(entry).is_some_and(|name| tools.contains(&name));
            if !known {
                return Err(ConfigError::Invalid(format!(
                    "credential {} permits unknown tool: {entry}",
                    self.client_id
                )));
            }
        }
        if let Some(limit) = self.global_limit {
            validate_budget("global_limit", limit)?;
        }
        for (tool, limit) in &self.tool_limits {
            let known = ToolName::parse(tool).is_some_and(|name| tools.contains(&name));
            if !known {
                return Err(ConfigError::Invalid(format!(
                    "credential {} limits unknown tool: {tool}",
                    self.client_id
                )));
            }
            validate_budget("tool_limits", *limit)?;
        }
        self.record().map(|_| ())
    }
}

// ============================================================================
// SECTION: Rate Limit
// ============================================================================

/// Rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window size in milliseconds for global and per-tool scopes.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Global budget per client per window.
    #[serde(default = "default_client_limit")]
    pub default_client_limit: u64,
    /// Per-tool budget per client per window.
    #[serde(default = "default_tool_limit")]
    pub default_tool_limit: u64,
    /// Idle period before a window may be evicted.
    #[serde(default = "default_idle_evict_ms")]
    pub idle_evict_ms: u64,
    /// Interval between eviction sweeps.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Maximum number of tracked windows.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Counter store shard count.
    #[serde(default = "default_shards")]
    pub shards: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            default_client_limit: default_client_limit(),
            default_tool_limit: default_tool_limit(),
            idle_evict_ms: default_idle_evict_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            max_entries: default_max_entries(),
            shards: default_shards(),
        }
    }
}

impl RateLimitConfig {
    /// Returns the limiter policy, including the auth failure budget.
    #[must_use]
    pub const fn policy(&self, auth: &AuthConfig) -> RateLimitPolicy {
        RateLimitPolicy {
            window_ms: self.window_ms,
            default_client_limit: self.default_client_limit,
            default_tool_limit: self.default_tool_limit,
            auth_failure_limit: auth.failure_limit,
            auth_failure_window_ms: auth.failure_window_ms,
            idle_evict_ms: self.idle_evict_ms,
        }
    }

    /// Returns the sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Validates rate limit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_window("rate_limit window_ms", self.window_ms)?;
        validate_budget("rate_limit default_client_limit", self.default_client_limit)?;
        validate_budget("rate_limit default_tool_limit", self.default_tool_limit)?;
        if self.idle_evict_ms < self.window_ms {
            return Err(ConfigError::Invalid(
                "rate_limit idle_evict_ms must be at least window_ms".to_string(),
            ));
        }
        if self.idle_evict_ms > MAX_WINDOW_MS {
            return Err(ConfigError::Invalid(format!(
                "rate_limit idle_evict_ms must be at most {MAX_WINDOW_MS}"
            )));
        }
        if self.sweep_interval_ms < MIN_SWEEP_INTERVAL_MS || self.sweep_interval_ms > MAX_WINDOW_MS {
            return Err(ConfigError::Invalid(format!(
                "rate_limit sweep_interval_ms must be between {MIN_SWEEP_INTERVAL_MS} and {MAX_WINDOW_MS}"
            )));
        }
        if self.max_entries == 0 || self.max_entries > MAX_RATE_LIMIT_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "rate_limit max_entries must be between 1 and {MAX_RATE_LIMIT_ENTRIES}"
            )));
        }
        if self.shards == 0 || self.shards > MAX_SHARDS {
            return Err(ConfigError::Invalid(format!("rate_limit shards must be between 1 and {MAX_SHARDS}")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Validation and Dispatch
// ============================================================================

/// Input validation configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Unknown-field default for tools without an override.
    #[serde(default)]
    pub unknown_fields: UnknownFieldPolicy,
    /// Budget/validation ordering policy.
    #[serde(default)]
    pub order: ValidationOrder,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Executor timeout when neither request nor tool sets one.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Upper bound on any executor timeout.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    /// Returns the dispatcher settings.
    #[must_use]
    pub const fn dispatcher_config(&self, validation_order: ValidationOrder) -> DispatcherConfig {
        DispatcherConfig {
            validation_order,
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            max_timeout: Duration::from_millis(self.max_timeout_ms),
        }
    }

    /// Validates dispatcher timeouts.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("dispatch default_timeout_ms", self.default_timeout_ms)?;
        validate_timeout("dispatch max_timeout_ms", self.max_timeout_ms)?;
        if self.default_timeout_ms > self.max_timeout_ms {
            return Err(ConfigError::Invalid(
                "dispatch default_timeout_ms must not exceed max_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Policy for duplicate tool names.
    #[serde(default)]
    pub on_duplicate: RegistrationPolicy,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enables audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// JSON-lines file path; stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates the audit path.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            let trimmed = path.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::Invalid("audit path must be non-empty".to_string()));
            }
            validate_path(Path::new(trimmed))?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tools
// ============================================================================

/// Tool specification plus its executor binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Tool contract.
    #[serde(flatten)]
    pub spec: ToolSpec,
    /// Executor bound to the tool.
    pub executor: ExecutorConfig,
}

impl ToolConfig {
    /// Validates the tool contract and executor binding.
    fn validate(&self, dispatch: &DispatchConfig) -> Result<(), ConfigError> {
        self.spec.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(timeout) = self.spec.timeout_ms {
            validate_timeout("tool timeout_ms", timeout)?;
            if timeout > dispatch.max_timeout_ms {
                return Err(ConfigError::Invalid(format!(
                    "tool {} timeout_ms exceeds dispatch max_timeout_ms",
                    self.spec.name
                )));
            }
        }
        if let Some(limit) = self.spec.rate_limit {
            validate_budget("tool rate_limit", limit)?;
        }
        self.executor.validate(&self.spec.name)
    }
}

/// Executor binding for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorConfig {
    /// POST validated input as JSON to a URL.
    Http {
        /// Target URL (http or https).
        url: String,
    },
    /// Return the validated input.
    Echo,
    /// Return a fixed JSON value.
    Static {
        /// Value returned on every call.
        output: Value,
    },
}

impl ExecutorConfig {
    /// Returns the stable label of the executor kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Http {
                ..
            } => "http",
            Self::Echo => "echo",
            Self::Static {
                ..
            } => "static",
        }
    }

    /// Validates executor settings.
    fn validate(&self, tool: &ToolName) -> Result<(), ConfigError> {
        if let Self::Http {
            url,
        } = self
        {
            let parsed = Url::parse(url)
                .map_err(|err| ConfigError::Invalid(format!("tool {tool} executor url invalid: {err}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "tool {tool} executor url must use http or https"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a window length.
fn validate_window(field: &str, window_ms: u64) -> Result<(), ConfigError> {
    if (MIN_WINDOW_MS..=MAX_WINDOW_MS).contains(&window_ms) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be between {MIN_WINDOW_MS} and {MAX_WINDOW_MS}")))
    }
}

/// Validates a request budget.
fn validate_budget(field: &str, budget: u64) -> Result<(), ConfigError> {
    if (1..=MAX_BUDGET).contains(&budget) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be between 1 and {MAX_BUDGET}")))
    }
}

/// Validates an executor timeout.
fn validate_timeout(field: &str, timeout_ms: u64) -> Result<(), ConfigError> {
    if (MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}")))
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default credential lookup timeout.
pub(crate) const fn default_lookup_timeout_ms() -> u64 {
    2_000
}

/// Default failed authentications per window.
pub(crate) const fn default_auth_failure_limit() -> u64 {
    tool_gate_core::rate_limit::DEFAULT_AUTH_FAILURE_LIMIT
}

/// Default failed authentication window.
pub(crate) const fn default_auth_failure_window_ms() -> u64 {
    tool_gate_core::rate_limit::DEFAULT_AUTH_FAILURE_WINDOW_MS
}

/// Default rate window.
pub(crate) const fn default_window_ms() -> u64 {
    tool_gate_core::rate_limit::DEFAULT_WINDOW_MS
}

/// Default global budget.
pub(crate) const fn default_client_limit() -> u64 {
    tool_gate_core::rate_limit::DEFAULT_CLIENT_LIMIT
}

/// Default per-tool budget.
pub(crate) const fn default_tool_limit() -> u64 {
    tool_gate_core::rate_limit::DEFAULT_TOOL_LIMIT
}

/// Default idle eviction period.
pub(crate) const fn default_idle_evict_ms() -> u64 {
    tool_gate_core::rate_limit::DEFAULT_IDLE_EVICT_MS
}

/// Default sweep interval.
pub(crate) const fn default_sweep_interval_ms() -> u64 {
    30_000
}

/// Default maximum tracked windows.
pub(crate) const fn default_max_entries() -> usize {
    tool_gate_core::rate_limit::DEFAULT_MAX_ENTRIES
}

/// Default shard count.
pub(crate) const fn default_shards() -> usize {
    tool_gate_core::rate_limit::DEFAULT_SHARDS
}

/// Default executor timeout.
pub(crate) const fn default_timeout_ms() -> u64 {
    10_000
}

/// Default maximum executor timeout.
pub(crate) const fn default_max_timeout_ms() -> u64 {
    60_000
}

/// Audit logging is on by default.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}
