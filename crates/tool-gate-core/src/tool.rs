// crates/tool-gate-core/src/tool.rs
// ============================================================================
// Module: Tool Gate Tool Model
// Description: Tool specifications and input/output field declarations.
// Purpose: Describe callable tools with typed, constrained field contracts.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`ToolSpec`] is the registered contract of a callable tool: its name,
//! description, ordered input and output fields, rate-limit cost, and
//! per-tool overrides. Specs are checked once at registration so every
//! declared default already satisfies its own field constraints.
//!
//! ## Invariants
//! - Field names are unique within a direction and never start with `$`.
//! - Only optional fields carry defaults.
//! - Numeric constraints attach to numeric fields, length constraints to strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::identifiers::ToolName;
use crate::validation::check_field_value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum tool description length in bytes.
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;
/// Maximum field name length in bytes.
pub const MAX_FIELD_NAME_LENGTH: usize = 64;
/// Maximum number of declared fields per direction.
pub const MAX_FIELDS_PER_TOOL: usize = 128;
/// Maximum number of enum members per field.
pub const MAX_ENUM_MEMBERS: usize = 256;

// ============================================================================
// SECTION: Field Types
// ============================================================================

/// Primitive type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// Signed or unsigned integer without fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
}

impl FieldType {
    /// Returns the stable label used on the wire and in JSON Schema.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Returns true for integer and number fields.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for payload keys that no declared field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Unknown keys are reported as violations.
    #[default]
    Reject,
    /// Unknown keys pass through unchanged.
    Allow,
}

// ============================================================================
// SECTION: Field Specification
// ============================================================================

/// Declared input or output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Field key in the payload object.
    pub name: String,
    /// Primitive type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present.
    #[serde(default)]
    pub required: bool,
    /// Value applied when an optional field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allows explicit string/number/boolean coercion for this field.
    #[serde(default)]
    pub coerce: bool,
    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Minimum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Allowed values.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl FieldSpec {
    /// Builds an unconstrained field of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            coerce: false,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            allowed: None,
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Enables explicit coercion.
    #[must_use]
    pub const fn coercible(mut self) -> Self {
        self.coerce = true;
        self
    }

    /// Sets the inclusive numeric range.
    #[must_use]
    pub const fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Sets the string length bounds.
    #[must_use]
    pub const fn with_length(mut self, min_length: Option<usize>, max_length: Option<usize>) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    /// Restricts the field to the given values.
    #[must_use]
    pub fn with_enum(mut self, allowed: Vec<Value>) -> Self {
        self.allowed = Some(allowed);
        self
    }

    /// Checks the declaration for internal consistency.
    fn check(&self) -> Result<(), String> {
        if self.name.is_empty() || self.name.len() > MAX_FIELD_NAME_LENGTH {
            return Err(format!("field name must be 1..={MAX_FIELD_NAME_LENGTH} bytes"));
        }
        if self.name.starts_with('$') || self.name.chars().any(char::is_control) {
            return Err("field name contains reserved characters".to_string());
        }
        if !self.field_type.is_numeric() && (self.minimum.is_some() || self.maximum.is_some()) {
            return Err("minimum/maximum require a numeric field".to_string());
        }
        if self.field_type != FieldType::String
            && (self.min_length.is_some() || self.max_length.is_some())
        {
            return Err("min_length/max_length require a string field".to_string());
        }
        if self.minimum.is_some_and(|value| !value.is_finite())
            || self.maximum.is_some_and(|value| !value.is_finite())
        {
            return Err("numeric bounds must be finite".to_string());
        }
        if let (Some(minimum), Some(maximum)) = (self.minimum, self.maximum)
            && minimum > maximum
        {
            return Err("minimum exceeds maximum".to_string());
        }
        if let (Some(min_length), Some(max_length)) = (self.min_length, self.max_length)
            && min_length > max_length
        {
            return Err("min_length exceeds max_length".to_string());
        }
        if let Some(allowed) = &self.allowed {
            if allowed.is_empty() || allowed.len() > MAX_ENUM_MEMBERS {
                return Err(format!("enum must list 1..={MAX_ENUM_MEMBERS} values"));
            }
            let mut unconstrained = self.clone();
            unconstrained.allowed = None;
            for member in allowed {
                if !check_field_value(&unconstrained, member).is_empty() {
                    return Err("enum member does not match the field type".to_string());
                }
            }
        }
        if let Some(default) = &self.default {
            if self.required {
                return Err("required fields cannot declare a default".to_string());
            }
            if let Some(reason) = check_field_value(self, default).first() {
                return Err(format!("default is invalid: {reason}"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tool Specification
// ============================================================================

/// Registered contract of a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: ToolName,
    /// Human-readable description.
    pub description: String,
    /// Ordered input fields.
    #[serde(default)]
    pub input: Vec<FieldSpec>,
    /// Ordered output fields.
    #[serde(default)]
    pub output: Vec<FieldSpec>,
    /// Rate-limit cost charged per invocation.
    #[serde(default = "default_cost")]
    pub cost: NonZeroU32,
    /// Enabled state at registration.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-tool default budget per window for the tool scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u64>,
    /// Per-tool executor timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Unknown-field policy override for this tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_fields: Option<UnknownFieldPolicy>,
}

impl ToolSpec {
    /// Builds an enabled tool with no fields and cost 1.
    #[must_use]
    pub fn new(name: ToolName, description: impl Into<String>) -> Self {
        Self {
            name,
            description: description.into(),
            input: Vec::new(),
            output: Vec::new(),
            cost: default_cost(),
            enabled: true,
            rate_limit: None,
            timeout_ms: None,
            unknown_fields: None,
        }
    }

    /// Appends an input field.
    #[must_use]
    pub fn with_input(mut self, field: FieldSpec) -> Self {
        self.input.push(field);
        self
    }

    /// Appends an output field.
    #[must_use]
    pub fn with_output(mut self, field: FieldSpec) -> Self {
        self.output.push(field);
        self
    }

    /// Sets the rate-limit cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: NonZeroU32) -> Self {
        self.cost = cost;
        self
    }

    /// Sets the per-tool default budget.
    #[must_use]
    pub const fn with_rate_limit(mut self, limit: u64) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Sets the per-tool executor timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Sets the enabled state at registration.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the unknown-field policy override.
    #[must_use]
    pub const fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = Some(policy);
        self
    }

    /// Validates the specification for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ToolSpecError`] when a field declaration or tool attribute is invalid.
    pub fn validate(&self) -> Result<(), ToolSpecError> {
        if self.description.trim().is_empty() || self.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(self.invalid(format!(
                "description must be 1..={MAX_DESCRIPTION_LENGTH} bytes"
            )));
        }
        if self.rate_limit == Some(0) {
            return Err(self.invalid("rate_limit must be greater than zero".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(self.invalid("timeout_ms must be greater than zero".to_string()));
        }
        self.validate_fields("input", &self.input)?;
        self.validate_fields("output", &self.output)
    }

    /// Validates one direction of field declarations.
    fn validate_fields(&self, direction: &str, fields: &[FieldSpec]) -> Result<(), ToolSpecError> {
        if fields.len() > MAX_FIELDS_PER_TOOL {
            return Err(self.invalid(format!("too many {direction} fields")));
        }
        let mut seen = BTreeSet::new();
        for field in fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ToolSpecError::InvalidField {
                    tool: self.name.to_string(),
                    field: field.name.clone(),
                    message: format!("duplicate {direction} field"),
                });
            }
            field.check().map_err(|message| ToolSpecError::InvalidField {
                tool: self.name.to_string(),
                field: field.name.clone(),
                message,
            })?;
        }
        Ok(())
    }

    /// Builds a tool-level error.
    fn invalid(&self, message: String) -> ToolSpecError {
        ToolSpecError::InvalidTool {
            tool: self.name.to_string(),
            message,
        }
    }
}

/// Default rate-limit cost.
pub(crate) const fn default_cost() -> NonZeroU32 {
    NonZeroU32::MIN
}

/// Default enabled state.
pub(crate) const fn default_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool specification errors raised at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolSpecError {
    /// Tool-level attribute is invalid.
    #[error("tool {tool}: {message}")]
    InvalidTool {
        /// Tool name.
        tool: String,
        /// Failure detail.
        message: String,
    },
    /// Field declaration is invalid.
    #[error("tool {tool} field {field}: {message}")]
    InvalidField {
        /// Tool name.
        tool: String,
        /// Field name.
        field: String,
        /// Failure detail.
        message: String,
    },
}

// ============================================================================
// SECTION: Tests
// ============================================================================
