//! Declarative tool input schemas, checked before every invocation.

use std::collections::HashMap;

use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    fields: HashMap<String, FieldSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                field_type,
                required,
                description: description.into(),
            },
        );
        self
    }

    /// Validate arguments: object shape, required fields present,
    /// declared types match, no undeclared fields.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let Some(object) = args.as_object() else {
            return Err("arguments must be a JSON object".into());
        };

        for (name, spec) in &self.fields {
            match object.get(name) {
                Some(value) => {
                    if !spec.field_type.matches(value) {
                        return Err(format!(
                            "field '{name}' must be a {}",
                            spec.field_type.name()
                        ));
                    }
                }
                None if spec.required => {
                    return Err(format!("missing required field '{name}'"));
                }
                None => {}
            }
        }

        for name in object.keys() {
            if !self.fields.contains_key(name) {
                return Err(format!("unknown field '{name}'"));
            }
        }

        Ok(())
    }

    pub fn fields(&self) -> &HashMap<String, FieldSpec> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ToolSchema {
        ToolSchema::new()
            .field("url", FieldType::String, true, "target URL")
            .field("timeout_secs", FieldType::Number, false, "override")
    }

    #[test]
    fn valid_args_pass() {
        assert!(schema().validate(&json!({"url": "https://example.com"})).is_ok());
        assert!(schema()
            .validate(&json!({"url": "https://example.com", "timeout_secs": 5}))
            .is_ok());
    }

    #[test]
    fn missing_required_field_fails() {
        let err = schema().validate(&json!({})).unwrap_err();
        assert!(err.contains("url"));
    }

    #[test]
    fn wrong_type_fails() {
        let err = schema().validate(&json!({"url": 42})).unwrap_err();
        assert!(err.contains("string"));
    }

    #[test]
    fn undeclared_field_fails() {
        let err = schema()
            .validate(&json!({"url": "x", "surprise": true}))
            .unwrap_err();
        assert!(err.contains("surprise"));
    }

    #[test]
    fn non_object_fails() {
        assert!(schema().validate(&json!("just a string")).is_err());
    }
}
