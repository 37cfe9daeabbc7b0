// crates/tool-gate-core/src/identity.rs
// ============================================================================
// Module: Tool Gate Client Identity
// Description: Authenticated client identities, permissions, and budgets.
// Purpose: Carry the per-request authorization context resolved by the auth gate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`ClientIdentity`] is resolved per request from a credential and is never
//! cached by the gateway. Its [`PermissionSet`] is the single predicate used by
//! both discovery and invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ClientId;
use crate::identifiers::ToolName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Permission entry granting access to every tool.
pub const WILDCARD_PERMISSION: &str = "*";

// ============================================================================
// SECTION: Permissions
// ============================================================================

/// Tools a client may discover and invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tools", rename_all = "snake_case")]
pub enum PermissionSet {
    /// Every registered tool.
    All,
    /// Only the listed tools.
    Tools(BTreeSet<ToolName>),
}

impl PermissionSet {
    /// Builds a permission set from configured entries (`*` grants all).
    ///
    /// Returns `None` when any entry is neither `*` nor a valid tool name.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut tools = BTreeSet::new();
        let mut wildcard = false;
        for entry in entries {
            if entry == WILDCARD_PERMISSION {
                wildcard = true;
            } else {
                tools.insert(ToolName::parse(entry)?);
            }
        }
        Some(if wildcard { Self::All } else { Self::Tools(tools) })
    }

    /// Returns true when the set grants the tool.
    #[must_use]
    pub fn permits(&self, tool: &ToolName) -> bool {
        match self {
            Self::All => true,
            Self::Tools(tools) => tools.contains(tool),
        }
    }
}

// ============================================================================
// SECTION: Client Identity
// ============================================================================

/// Authenticated caller with its permissions and rate budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Client identifier.
    pub client_id: ClientId,
    /// Tools the client may see and call.
    pub permissions: PermissionSet,
    /// Global budget per window across all tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_limit: Option<u64>,
    /// Per-tool budget overrides per window.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_limits: BTreeMap<ToolName, u64>,
}

impl ClientIdentity {
    /// Builds an identity with no budget overrides.
    #[must_use]
    pub const fn new(client_id: ClientId, permissions: PermissionSet) -> Self {
        Self {
            client_id,
            permissions,
            global_limit: None,
            tool_limits: BTreeMap::new(),
        }
    }

    /// Sets the global budget override.
    #[must_use]
    pub const fn with_global_limit(mut self, limit: u64) -> Self {
        self.global_limit = Some(limit);
        self
    }

    /// Sets a per-tool budget override.
    #[must_use]
    pub fn with_tool_limit(mut self, tool: ToolName, limit: u64) -> Self {
        self.tool_limits.insert(tool, limit);
        self
    }

    /// Returns true when the client may discover and invoke the tool.
    #[must_use]
    pub fn permits(&self, tool: &ToolName) -> bool {
        self.permissions.permits(tool)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
