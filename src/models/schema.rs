//! Versioned JSON schema model bound to prompts for structured output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Id;
use crate::error::{PipelineError, Result};

/// `response_format` shape sent to LLM providers that support structured
/// output: `{type: "json_schema", json_schema: {name, schema, strict}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
    JsonSchema { json_schema: JsonSchemaSpec },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaSpec {
    pub name: String,
    pub schema: Value,
    pub strict: bool,
}

impl JsonSchemaSpec {
    /// Validates the invariants §3 places on `response_format.schema`:
    /// root type `object`, with `properties`, `required`, and
    /// `additionalProperties` present.
    pub fn validate(&self) -> Result<()> {
        let obj = self
            .schema
            .as_object()
            .ok_or_else(|| PipelineError::ValidationFailed("schema root must be an object".into()))?;

        if obj.get("type").and_then(Value::as_str) != Some("object") {
            return Err(PipelineError::ValidationFailed(
                "schema root type must be \"object\"".into(),
            ));
        }
        for required_key in ["properties", "required", "additionalProperties"] {
            if !obj.contains_key(required_key) {
                return Err(PipelineError::ValidationFailed(format!(
                    "schema missing required key \"{required_key}\""
                )));
            }
        }
        Ok(())
    }

    /// Top-level property names in declaration order, used to reorder LLM
    /// responses (§4.G step 9).
    pub fn property_order(&self) -> Vec<String> {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A single immutable revision of a versioned schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRevision {
    pub schema_id: Id,
    pub schema_revid: Id,
    pub schema_version: u32,
    pub name: String,
    pub response_format: ResponseFormat,
    pub organization_id: Id,
    pub created_at: DateTime<Utc>,
    pub created_by: Id,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_spec() -> JsonSchemaSpec {
        JsonSchemaSpec {
            name: "invoice".to_string(),
            schema: json!({
                "type": "object",
                "properties": {"a": {"type": "string"}, "b": {"type": "number"}, "c": {"type": "string"}},
                "required": ["a"],
                "additionalProperties": false,
            }),
            strict: true,
        }
    }

    #[test]
    fn valid_schema_passes() {
        assert!(valid_spec().validate().is_ok());
    }

    #[test]
    fn missing_required_key_fails() {
        let mut spec = valid_spec();
        spec.schema.as_object_mut().unwrap().remove("required");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn non_object_root_fails() {
        let mut spec = valid_spec();
        spec.schema = json!({"type": "array"});
        assert!(spec.validate().is_err());
    }

    #[test]
    fn property_order_matches_declaration_order() {
        let spec = valid_spec();
        assert_eq!(spec.property_order(), vec!["a", "b", "c"]);
    }
}
