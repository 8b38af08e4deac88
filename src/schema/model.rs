//! Schema Documents
//!
//! A small JSON-Schema subset describing the shape of activity input and
//! executor output:
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": {
//!     "notes": { "type": "string", "minLength": 1 },
//!     "tier":  { "type": "string", "enum": ["gold", "silver"], "default": "silver" }
//!   },
//!   "required": ["notes"],
//!   "additionalProperties": true
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::SchemaError;

/// JSON type a field may be constrained to.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl FieldType {
    /// Checks whether a JSON value has this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

/// Constraints declared for a single property.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Expected JSON type (any type when absent)
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,

    /// Allowed values
    #[serde(default, rename = "enum")]
    pub allowed_values: Vec<Value>,

    #[serde(default)]
    pub min_length: Option<usize>,

    #[serde(default)]
    pub max_length: Option<usize>,

    #[serde(default)]
    pub minimum: Option<f64>,

    #[serde(default)]
    pub maximum: Option<f64>,

    /// Value used by resolution when the source lacks the field
    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub description: Option<String>,
}

impl FieldSchema {
    /// Checks a present value against every declared constraint.
    ///
    /// Returns a human readable description of the first violated constraint.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if let Some(expected) = self.field_type {
            if !expected.matches(value) {
                return Err(format!(
                    "must be of type {}, got {}",
                    expected.as_str(),
                    json_type_name(value)
                ));
            }
        }

        if !self.allowed_values.is_empty() && !self.allowed_values.contains(value) {
            return Err("is not in the allowed set".to_string());
        }

        if let Value::String(text) = value {
            let length = text.chars().count();
            if let Some(min) = self.min_length {
                if length < min {
                    return Err(format!("must be at least {} characters", min));
                }
            }
            if let Some(max) = self.max_length {
                if length > max {
                    return Err(format!("must be at most {} characters", max));
                }
            }
        }

        if let Some(number) = value.as_f64() {
            if let Some(min) = self.minimum {
                if number < min {
                    return Err(format!("must be at least {}", min));
                }
            }
            if let Some(max) = self.maximum {
                if number > max {
                    return Err(format!("must be at most {}", max));
                }
            }
        }

        Ok(())
    }
}

/// A parsed schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Declared properties in document order
    pub fields: Vec<(String, FieldSchema)>,

    /// Names of properties that must be present and non-null
    pub required: Vec<String>,

    /// Whether undeclared properties are accepted on input
    pub additional_properties: bool,
}

impl Schema {
    /// Parses a schema document.
    ///
    /// The document must be a JSON object whose `type`, when given, is
    /// `"object"`.
    pub fn from_value(document: &Value) -> Result<Self, SchemaError> {
        let map = document
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("schema must be an object".to_string()))?;

        match map.get("type") {
            None => {}
            Some(Value::String(kind)) if kind == "object" => {}
            Some(other) => {
                return Err(SchemaError::InvalidSchema(format!(
                    "top-level type must be \"object\", got {}",
                    other
                )))
            }
        }

        let mut fields = Vec::new();
        if let Some(properties) = map.get("properties") {
            let properties = properties.as_object().ok_or_else(|| {
                SchemaError::InvalidSchema("'properties' must be an object".to_string())
            })?;

            for (name, definition) in properties {
                let field: FieldSchema =
                    serde_json::from_value(definition.clone()).map_err(|e| {
                        SchemaError::InvalidSchema(format!("property '{}': {}", name, e))
                    })?;
                fields.push((name.clone(), field));
            }
        }

        let required = match map.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().map(str::to_string).ok_or_else(|| {
                        SchemaError::InvalidSchema(
                            "'required' must list property names".to_string(),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(SchemaError::InvalidSchema(
                    "'required' must be an array".to_string(),
                ))
            }
        };

        let additional_properties = map
            .get("additionalProperties")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Ok(Self {
            fields,
            required,
            additional_properties,
        })
    }

    /// Parses an optional schema document.
    pub fn parse_optional(document: Option<&Value>) -> Result<Option<Self>, SchemaError> {
        document.map(Self::from_value).transpose()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, field)| field)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|required| required == name)
    }

    /// Names of every field the schema calls for: declared properties first,
    /// then required names that have no property definition.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.iter().map(|(name, _)| name.as_str()).collect();
        for required in &self.required {
            if !names.contains(&required.as_str()) {
                names.push(required);
            }
        }
        names
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_schema() {
        let schema = Schema::from_value(&json!({
            "type": "object",
            "properties": {
                "notes": {"type": "string", "minLength": 1},
                "tier": {"type": "string", "enum": ["gold", "silver"], "default": "silver"}
            },
            "required": ["notes"],
            "additionalProperties": false
        }))
        .unwrap();

        assert_eq!(schema.field_names(), vec!["notes", "tier"]);
        assert!(schema.is_required("notes"));
        assert!(!schema.is_required("tier"));
        assert!(!schema.additional_properties);
        assert_eq!(schema.field("tier").unwrap().default, Some(json!("silver")));
    }

    #[test]
    fn test_required_without_property_is_a_field() {
        let schema = Schema::from_value(&json!({"required": ["customer_id"]})).unwrap();
        assert_eq!(schema.field_names(), vec!["customer_id"]);
        assert!(schema.additional_properties);
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let result = Schema::from_value(&json!({
            "properties": {"when": {"type": "date"}}
        }));
        assert!(matches!(result, Err(SchemaError::InvalidSchema(_))));
    }

    #[test]
    fn test_non_object_schema_rejected() {
        assert!(Schema::from_value(&json!(["notes"])).is_err());
        assert!(Schema::from_value(&json!({"type": "array"})).is_err());
    }

    #[test]
    fn test_integer_type_accepts_whole_floats() {
        assert!(FieldType::Integer.matches(&json!(3)));
        assert!(FieldType::Integer.matches(&json!(3.0)));
        assert!(!FieldType::Integer.matches(&json!(3.5)));
    }

    #[test]
    fn test_field_check_constraints() {
        let field = FieldSchema {
            field_type: Some(FieldType::Number),
            minimum: Some(0.0),
            maximum: Some(10.0),
            ..Default::default()
        };
        assert!(field.check(&json!(5)).is_ok());
        assert!(field.check(&json!(-1)).unwrap_err().contains("at least 0"));
        assert!(field.check(&json!("5")).unwrap_err().contains("type number"));
    }

    #[test]
    fn test_string_length_counts_characters() {
        let field = FieldSchema {
            max_length: Some(3),
            ..Default::default()
        };
        assert!(field.check(&json!("äöü")).is_ok());
        assert!(field.check(&json!("äöüß")).is_err());
    }
}
