// crates/tool-gate-core/src/identifiers.rs
// ============================================================================
// Module: Tool Gate Identifiers
// Description: Validated identifiers for tools, clients, and requests.
// Purpose: Provide strongly typed identifiers with stable wire forms.
// Dependencies: rand, serde
// ============================================================================

//! ## Overview
//! Identifiers are validated at construction boundaries so the rest of the
//! gateway can treat them as trusted keys. All identifiers serialize as plain
//! strings and reject malformed input during deserialization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a tool name in bytes.
pub const MAX_TOOL_NAME_LENGTH: usize = 64;
/// Maximum length of a client identifier in bytes.
pub const MAX_CLIENT_ID_LENGTH: usize = 128;
/// Maximum length of a request identifier in bytes.
pub const MAX_REQUEST_ID_LENGTH: usize = 128;
/// Prefix applied to gateway-generated request identifiers.
const GENERATED_REQUEST_ID_PREFIX: &str = "req-";

// ============================================================================
// SECTION: Tool Name
// ============================================================================

/// Unique name of a registered tool.
///
/// # Invariants
/// - 1..=64 ASCII characters from `[A-Za-z0-9_.-]`.
/// - First character is alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolName(String);

impl ToolName {
    /// Parses a tool name, returning `None` when it is malformed.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() || value.len() > MAX_TOOL_NAME_LENGTH {
            return None;
        }
        let mut chars = value.chars();
        if !chars.next().is_some_and(|ch| ch.is_ascii_alphanumeric()) {
            return None;
        }
        if !chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')) {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ToolName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(IdentifierError::InvalidToolName)
    }
}

impl From<ToolName> for String {
    fn from(value: ToolName) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Client Identifier
// ============================================================================

/// Identifier of an authenticated client.
///
/// # Invariants
/// - 1..=128 ASCII characters from `[A-Za-z0-9_.:@-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Parses a client identifier, returning `None` when it is malformed.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() || value.len() > MAX_CLIENT_ID_LENGTH {
            return None;
        }
        if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':' | '@')) {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ClientId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(IdentifierError::InvalidClientId)
    }
}

impl From<ClientId> for String {
    fn from(value: ClientId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Request Identifier
// ============================================================================

/// Identifier correlating an invocation with its audit record.
///
/// # Invariants
/// - 1..=128 printable ASCII characters without whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Parses a caller-supplied request identifier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() || value.len() > MAX_REQUEST_ID_LENGTH {
            return None;
        }
        if !value.bytes().all(|byte| byte.is_ascii_graphic()) {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// Generates a fresh random request identifier.
    #[must_use]
    pub fn generate() -> Self {
        let value: u128 = rand::random();
        Self(format!("{GENERATED_REQUEST_ID_PREFIX}{value:032x}"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RequestId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(IdentifierError::InvalidRequestId)
    }
}

impl From<RequestId> for String {
    fn from(value: RequestId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parsing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// Tool name failed validation.
    #[error("invalid tool name")]
    InvalidToolName,
    /// Client identifier failed validation.
    #[error("invalid client id")]
    InvalidClientId,
    /// Request identifier failed validation.
    #[error("invalid request id")]
    InvalidRequestId,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
