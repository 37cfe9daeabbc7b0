// crates/tool-gate-core/src/registry.rs
// ============================================================================
// Module: Tool Gate Registry
// Description: Copy-on-write registry of tool specifications.
// Purpose: Serve lock-free snapshot reads alongside rare serialized writes.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The registry publishes immutable [`RegistrySnapshot`] values behind an
//! `RwLock<Arc<_>>`. Readers clone the `Arc` and never wait on a writer for
//! longer than that swap. Writers serialize on a dedicated mutex, build the
//! next snapshot, and publish it atomically, so a mutation is visible to every
//! read that starts after it returns.
//!
//! ## Invariants
//! - Tool names are unique; registration order is stable and drives listing.
//! - A tool referenced by an in-flight request stays alive through its `Arc`.
//! - Replacement keeps the original registration position.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::ToolName;
use crate::identity::PermissionSet;
use crate::tool::ToolSpec;
use crate::tool::ToolSpecError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Behavior when a registration reuses an existing name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Fail with [`RegistryError::DuplicateName`].
    #[default]
    Reject,
    /// Swap in the new specification at the same position.
    Replace,
}

/// Result of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new tool was added.
    Registered,
    /// An existing tool was replaced.
    Replaced,
}

/// Registry entry: a specification plus its current enabled state.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTool {
    /// Registered specification.
    spec: ToolSpec,
    /// Current enabled state.
    enabled: bool,
}

impl RegisteredTool {
    /// Returns the tool specification.
    #[must_use]
    pub const fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Returns the tool name.
    #[must_use]
    pub const fn name(&self) -> &ToolName {
        &self.spec.name
    }

    /// Returns true when the tool accepts invocations.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    /// Tools in registration order.
    tools: Vec<Arc<RegisteredTool>>,
    /// Name to position index.
    index: BTreeMap<ToolName, usize>,
}

impl RegistrySnapshot {
    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the tool with the given name.
    #[must_use]
    pub fn get(&self, name: &ToolName) -> Option<&Arc<RegisteredTool>> {
        self.index.get(name).and_then(|position| self.tools.get(*position))
    }
}

/// Listing filter applied lazily by [`ToolIter`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Restricts results to permitted tools when set.
    pub permissions: Option<PermissionSet>,
    /// Includes disabled tools when true.
    pub include_disabled: bool,
}

impl ListFilter {
    /// Filter for enabled tools within a permission set.
    #[must_use]
    pub const fn permitted(permissions: PermissionSet) -> Self {
        Self {
            permissions: Some(permissions),
            include_disabled: false,
        }
    }

    /// Filter for every registered tool, enabled or not.
    #[must_use]
    pub const fn everything() -> Self {
        Self {
            permissions: None,
            include_disabled: true,
        }
    }

    /// Returns true when the tool passes the filter.
    fn accepts(&self, tool: &RegisteredTool) -> bool {
        if !self.include_disabled && !tool.enabled {
            return false;
        }
        self.permissions.as_ref().is_none_or(|permissions| permissions.permits(tool.name()))
    }
}

/// Lazy, restartable iterator over a registry snapshot.
///
/// Cloning yields an independent cursor over the same snapshot.
#[derive(Debug, Clone)]
pub struct ToolIter {
    /// Snapshot being iterated.
    snapshot: Arc<RegistrySnapshot>,
    /// Next position to inspect.
    position: usize,
    /// Filter applied to each entry.
    filter: ListFilter,
}

impl ToolIter {
    /// Rewinds the cursor to the first tool of the same snapshot.
    pub const fn restart(&mut self) {
        self.position = 0;
    }
}

impl Iterator for ToolIter {
    type Item = Arc<RegisteredTool>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(tool) = self.snapshot.tools.get(self.position) {
            self.position += 1;
            if self.filter.accepts(tool) {
                return Some(Arc::clone(tool));
            }
        }
        None
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Copy-on-write tool registry.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    /// Currently published snapshot.
    current: RwLock<Arc<RegistrySnapshot>>,
    /// Serializes writers.
    writer: Mutex<()>,
    /// Duplicate-name policy.
    policy: RegistrationPolicy,
}

impl ToolRegistry {
    /// Creates an empty registry with the given duplicate-name policy.
    #[must_use]
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
            writer: Mutex::new(()),
            policy,
        }
    }

    /// Returns the duplicate-name policy.
    #[must_use]
    pub const fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Returns the currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Registers a tool specification.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidTool`] when the specification is invalid
    /// and [`RegistryError::DuplicateName`] when the name exists under the
    /// reject policy.
    pub fn register(&self, spec: ToolSpec) -> Result<RegistrationOutcome, RegistryError> {
        spec.validate()?;
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let mut tools = current.tools.clone();
        let mut index = current.index.clone();
        let enabled = spec.enabled;
        let outcome = if let Some(position) = index.get(&spec.name).copied() {
            if self.policy == RegistrationPolicy::Reject {
                return Err(RegistryError::DuplicateName(spec.name));
            }
            tools[position] = Arc::new(RegisteredTool {
                spec,
                enabled,
            });
            RegistrationOutcome::Replaced
        } else {
            index.insert(spec.name.clone(), tools.len());
            tools.push(Arc::new(RegisteredTool {
                spec,
                enabled,
            }));
            RegistrationOutcome::Registered
        };
        self.publish(RegistrySnapshot {
            tools,
            index,
        });
        Ok(outcome)
    }

    /// Returns the registered tool with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the name is not registered.
    pub fn get(&self, name: &ToolName) -> Result<Arc<RegisteredTool>, RegistryError> {
        self.snapshot().get(name).cloned().ok_or_else(|| RegistryError::NotFound(name.clone()))
    }

    /// Returns a lazy iterator over tools in registration order.
    #[must_use]
    pub fn list(&self, filter: ListFilter) -> ToolIter {
        ToolIter {
            snapshot: self.snapshot(),
            position: 0,
            filter,
        }
    }

    /// Sets the enabled state of a tool and returns whether it changed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the name is not registered.
    pub fn set_enabled(&self, name: &ToolName, enabled: bool) -> Result<bool, RegistryError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let position =
            current.index.get(name).copied().ok_or_else(|| RegistryError::NotFound(name.clone()))?;
        let existing = &current.tools[position];
        if existing.enabled == enabled {
            return Ok(false);
        }
        let mut tools = current.tools.clone();
        tools[position] = Arc::new(RegisteredTool {
            spec: existing.spec.clone(),
            enabled,
        });
        self.publish(RegistrySnapshot {
            tools,
            index: current.index.clone(),
        });
        Ok(true)
    }

    /// Publishes a new snapshot.
    fn publish(&self, next: RegistrySnapshot) {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(next);
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("tool already registered: {0}")]
    DuplicateName(ToolName),
    /// No tool with this name is registered.
    #[error("tool not found: {0}")]
    NotFound(ToolName),
    /// Specification failed registration checks.
    #[error(transparent)]
    InvalidTool(#[from] ToolSpecError),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
