// crates/tool-gate-core/src/discovery.rs
// ============================================================================
// Module: Tool Gate Discovery
// Description: Permission-filtered tool descriptors with JSON Schema projections.
// Purpose: Tell callers which tools they may invoke and how to call them.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Discovery is a read-only projection of the registry. It applies the same
//! permission predicate the dispatcher uses ([`ClientIdentity::permits`]) and
//! hides disabled tools, so a tool is listed exactly when an invocation would
//! get past the permission and enabled checks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::identifiers::ToolName;
use crate::identity::ClientIdentity;
use crate::registry::ListFilter;
use crate::registry::ToolRegistry;
use crate::tool::FieldSpec;
use crate::tool::FieldType;
use crate::tool::ToolSpec;
use crate::tool::UnknownFieldPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON Schema dialect declared by projected schemas.
pub const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Public projection of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: ToolName,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema of accepted input.
    pub input_schema: Value,
    /// JSON Schema of produced output.
    pub output_schema: Value,
}

/// Read-only discovery over a registry.
pub struct DiscoveryService {
    /// Registry to project.
    registry: Arc<ToolRegistry>,
    /// Unknown-field default applied when a tool has no override.
    unknown_fields: UnknownFieldPolicy,
}

impl DiscoveryService {
    /// Creates a discovery service.
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>, unknown_fields: UnknownFieldPolicy) -> Self {
        Self {
            registry,
            unknown_fields,
        }
    }

    /// Lists enabled tools the client may invoke, in registration order.
    #[must_use]
    pub fn discover(&self, client: &ClientIdentity) -> Vec<ToolDescriptor> {
        self.registry
            .list(ListFilter::permitted(client.permissions.clone()))
            .map(|tool| self.describe(tool.spec()))
            .collect()
    }

    /// Builds the descriptor for one tool.
    #[must_use]
    pub fn describe(&self, tool: &ToolSpec) -> ToolDescriptor {
        let policy = tool.unknown_fields.unwrap_or(self.unknown_fields);
        ToolDescriptor {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: object_schema(&tool.input, policy),
            output_schema: object_schema(&tool.output, UnknownFieldPolicy::Allow),
        }
    }
}

// ============================================================================
// SECTION: Schema Projection
// ============================================================================

/// Projects ordered field declarations into an object schema.
#[must_use]
pub fn object_schema(fields: &[FieldSpec], unknown_fields: UnknownFieldPolicy) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.clone(), field_schema(field));
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }
    let mut schema = Map::new();
    schema.insert("$schema".to_string(), Value::String(SCHEMA_DIALECT.to_string()));
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("required".to_string(), Value::Array(required));
    schema.insert(
        "additionalProperties".to_string(),
        Value::Bool(unknown_fields == UnknownFieldPolicy::Allow),
    );
    Value::Object(schema)
}

/// Projects one field declaration.
fn field_schema(field: &FieldSpec) -> Value {
    let mut schema = Map::new();
    let declared = field.field_type.as_str();
    let type_value = if field.coerce && field.field_type != FieldType::String {
        json!([declared, "string"])
    } else if field.coerce {
        json!(["string", "number", "boolean"])
    } else {
        Value::String(declared.to_string())
    };
    schema.insert("type".to_string(), type_value);
    if let Some(default) = &field.default {
        schema.insert("default".to_string(), default.clone());
    }
    if let Some(minimum) = field.minimum {
        schema.insert("minimum".to_string(), json!(minimum));
    }
    if let Some(maximum) = field.maximum {
        schema.insert("maximum".to_string(), json!(maximum));
    }
    if let Some(min_length) = field.min_length {
        schema.insert("minLength".to_string(), json!(min_length));
    }
    if let Some(max_length) = field.max_length {
        schema.insert("maxLength".to_string(), json!(max_length));
    }
    if let Some(allowed) = &field.allowed {
        schema.insert("enum".to_string(), Value::Array(allowed.clone()));
    }
    Value::Object(schema)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
