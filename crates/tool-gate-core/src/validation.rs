// crates/tool-gate-core/src/validation.rs
// ============================================================================
// Module: Tool Gate Schema Validator
// Description: Validates invocation payloads against declared tool fields.
// Purpose: Produce fully validated input or a complete list of violations.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Validation is pure: it reads a [`ToolSpec`] and a raw payload and returns
//! either [`ValidatedInput`] or every violation found in a single pass. The
//! order of operations per field is presence, default application, type
//! compatibility (with opt-in coercion), then constraints.
//!
//! ## Invariants
//! - A failed validation always carries at least one violation.
//! - Explicit `null` is treated as an absent value.
//! - Unknown keys are rejected unless the tool or validator allows them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

use crate::tool::FieldSpec;
use crate::tool::FieldType;
use crate::tool::ToolSpec;
use crate::tool::UnknownFieldPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Field label used for payload-level violations.
pub const ROOT_FIELD: &str = "$";

// ============================================================================
// SECTION: Violations
// ============================================================================

/// Reason a single field failed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ViolationReason {
    /// Required field is absent.
    Missing,
    /// Value has an incompatible JSON type.
    TypeMismatch {
        /// Declared type.
        expected: FieldType,
        /// Observed JSON type label.
        found: &'static str,
    },
    /// Numeric value is below the declared minimum.
    BelowMinimum {
        /// Inclusive minimum.
        minimum: f64,
    },
    /// Numeric value is above the declared maximum.
    AboveMaximum {
        /// Inclusive maximum.
        maximum: f64,
    },
    /// String is shorter than the declared minimum length.
    TooShort {
        /// Minimum length in characters.
        min_length: usize,
    },
    /// String is longer than the declared maximum length.
    TooLong {
        /// Maximum length in characters.
        max_length: usize,
    },
    /// Value is not one of the declared enum members.
    NotInEnum,
    /// Key is not declared by the tool.
    UnknownField,
    /// Payload is not a JSON object.
    NotAnObject,
    /// Request body is not valid JSON.
    InvalidJson,
    /// Request body exceeds the configured size limit.
    PayloadTooLarge {
        /// Maximum accepted size in bytes.
        max_bytes: usize,
    },
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("required field is missing"),
            Self::TypeMismatch {
                expected,
                found,
            } => write!(f, "expected {expected}, found {found}"),
            Self::BelowMinimum {
                minimum,
            } => write!(f, "value must be >= {minimum}"),
            Self::AboveMaximum {
                maximum,
            } => write!(f, "value must be <= {maximum}"),
            Self::TooShort {
                min_length,
            } => write!(f, "length must be >= {min_length}"),
            Self::TooLong {
                max_length,
            } => write!(f, "length must be <= {max_length}"),
            Self::NotInEnum => f.write_str("value is not an allowed member"),
            Self::UnknownField => f.write_str("field is not declared by the tool"),
            Self::NotAnObject => f.write_str("payload must be a JSON object"),
            Self::InvalidJson => f.write_str("body is not valid JSON"),
            Self::PayloadTooLarge {
                max_bytes,
            } => write!(f, "body exceeds {max_bytes} bytes"),
        }
    }
}

/// Violation attached to a named field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    /// Field name, or `$` for the payload itself.
    pub field: String,
    /// Machine-readable reason.
    #[serde(flatten)]
    pub reason: ViolationReason,
    /// Human-readable description of the reason.
    pub message: String,
}

impl FieldViolation {
    /// Builds a violation for the given field.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: ViolationReason) -> Self {
        let message = reason.to_string();
        Self {
            field: field.into(),
            reason,
            message,
        }
    }
}

/// Complete set of violations for one payload.
///
/// # Invariants
/// - `violations` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Every violation found, in field declaration order then payload order.
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Builds a single payload-level violation.
    #[must_use]
    pub fn root(reason: ViolationReason) -> Self {
        Self {
            violations: vec![FieldViolation::new(ROOT_FIELD, reason)],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid field(s)", self.violations.len())?;
        for (index, violation) in self.violations.iter().enumerate() {
            let separator = if index == 0 { ": " } else { "; " };
            write!(f, "{separator}{} {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// SECTION: Validated Input
// ============================================================================

/// Payload that passed validation, with defaults and coercions applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedInput(Map<String, Value>);

impl ValidatedInput {
    /// Returns the value for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the underlying object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts the input into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Payload validator with a configurable unknown-field default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator {
    /// Policy applied when a tool does not override it.
    unknown_fields: UnknownFieldPolicy,
}

impl SchemaValidator {
    /// Creates a validator with the given unknown-field default.
    #[must_use]
    pub const fn new(unknown_fields: UnknownFieldPolicy) -> Self {
        Self {
            unknown_fields,
        }
    }

    /// Validates a payload against the tool's input fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every violation found.
    pub fn validate(&self, tool: &ToolSpec, payload: &Value) -> Result<ValidatedInput, ValidationError> {
        let policy = tool.unknown_fields.unwrap_or(self.unknown_fields);
        validate_fields(&tool.input, payload, policy)
    }

    /// Validates executor output against the tool's output fields.
    ///
    /// Undeclared output keys are always allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every violation found.
    pub fn validate_output(tool: &ToolSpec, output: &Value) -> Result<ValidatedInput, ValidationError> {
        validate_fields(&tool.output, output, UnknownFieldPolicy::Allow)
    }
}

/// Validates an object payload against ordered field declarations.
fn validate_fields(
    fields: &[FieldSpec],
    payload: &Value,
    policy: UnknownFieldPolicy,
) -> Result<ValidatedInput, ValidationError> {
    let empty = Map::new();
    let object = match payload {
        Value::Object(object) => object,
        Value::Null => &empty,
        _ => return Err(ValidationError::root(ViolationReason::NotAnObject)),
    };

    let mut violations = Vec::new();
    let mut validated = Map::new();
    for field in fields {
        let value = match object.get(&field.name).filter(|value| !value.is_null()) {
            Some(value) => value,
            None => match &field.default {
                Some(default) => default,
                None => {
                    if field.required {
                        violations.push(FieldViolation::new(&field.name, ViolationReason::Missing));
                    }
                    continue;
                }
            },
        };
        match coerce_value(field, value) {
            Ok(coerced) => {
                let reasons = check_constraints(field, &coerced);
                if reasons.is_empty() {
                    validated.insert(field.name.clone(), coerced);
                } else {
                    violations
                        .extend(reasons.into_iter().map(|reason| FieldViolation::new(&field.name, reason)));
                }
            }
            Err(reason) => violations.push(FieldViolation::new(&field.name, reason)),
        }
    }

    for (key, value) in object {
        if fields.iter().any(|field| field.name == *key) {
            continue;
        }
        match policy {
            UnknownFieldPolicy::Reject => {
                violations.push(FieldViolation::new(key, ViolationReason::UnknownField));
            }
            UnknownFieldPolicy::Allow => {
                validated.insert(key.clone(), value.clone());
            }
        }
    }

    if violations.is_empty() {
        Ok(ValidatedInput(validated))
    } else {
        Err(ValidationError {
            violations,
        })
    }
}

/// Returns every reason a value fails the field's type or constraints.
pub(crate) fn check_field_value(field: &FieldSpec, value: &Value) -> Vec<ViolationReason> {
    match coerce_value(field, value) {
        Ok(coerced) => check_constraints(field, &coerced),
        Err(reason) => vec![reason],
    }
}

// ============================================================================
// SECTION: Type Checks
// ============================================================================

/// Checks type compatibility, applying coercion only when the field opts in.
fn coerce_value(field: &FieldSpec, value: &Value) -> Result<Value, ViolationReason> {
    if matches_type(field.field_type, value) {
        return Ok(value.clone());
    }
    if field.coerce
        && let Some(coerced) = coerce_loose(field.field_type, value)
    {
        return Ok(coerced);
    }
    Err(ViolationReason::TypeMismatch {
        expected: field.field_type,
        found: json_type_label(value),
    })
}

/// Returns true when the value already has the declared type.
fn matches_type(field_type: FieldType, value: &Value) -> bool {
    match (field_type, value) {
        (FieldType::String, Value::String(_))
        | (FieldType::Number, Value::Number(_))
        | (FieldType::Boolean, Value::Bool(_)) => true,
        (FieldType::Integer, Value::Number(number)) => number.is_i64() || number.is_u64(),
        _ => false,
    }
}

/// Applies the explicit coercion table.
fn coerce_loose(field_type: FieldType, value: &Value) -> Option<Value> {
    match (field_type, value) {
        (FieldType::Integer, Value::String(text)) => text.trim().parse::<i64>().ok().map(Value::from),
        (FieldType::Number, Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .and_then(Number::from_f64)
            .map(Value::Number),
        (FieldType::Boolean, Value::String(text)) => match text.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldType::String, Value::Number(number)) => Some(Value::String(number.to_string())),
        (FieldType::String, Value::Bool(flag)) => Some(Value::String(flag.to_string())),
        _ => None,
    }
}

/// Returns the JSON type label of a value.
const fn json_type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Constraint Checks
// ============================================================================

/// Returns every constraint the (already typed) value violates.
fn check_constraints(field: &FieldSpec, value: &Value) -> Vec<ViolationReason> {
    let mut reasons = Vec::new();
    if let Some(number) = value.as_f64() {
        if let Some(minimum) = field.minimum
            && number < minimum
        {
            reasons.push(ViolationReason::BelowMinimum {
                minimum,
            });
        }
        if let Some(maximum) = field.maximum
            && number > maximum
        {
            reasons.push(ViolationReason::AboveMaximum {
                maximum,
            });
        }
    }
    if let Value::String(text) = value {
        let length = text.chars().count();
        if let Some(min_length) = field.min_length
            && length < min_length
        {
            reasons.push(ViolationReason::TooShort {
                min_length,
            });
        }
        if let Some(max_length) = field.max_length
            && length > max_length
        {
            reasons.push(ViolationReason::TooLong {
                max_length,
            });
        }
    }
    if let Some(allowed) = &field.allowed
        && !allowed.iter().any(|member| enum_member_matches(member, value))
    {
        reasons.push(ViolationReason::NotInEnum);
    }
    reasons
}

/// Compares an enum member with a value; numbers compare by numeric value.
fn enum_member_matches(member: &Value, value: &Value) -> bool {
    match (member, value) {
        (Value::Number(left), Value::Number(right)) => {
            left == right
                || left
                    .as_f64()
                    .zip(right.as_f64())
                    .is_some_and(|(left, right)| left.partial_cmp(&right) == Some(Ordering::Equal))
        }
        _ => member == value,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
