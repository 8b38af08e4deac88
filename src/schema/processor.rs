//! Schema Processing
//!
//! Pure functions over context maps:
//! - [`validate_input`] turns a raw submitted payload into a validated map
//! - [`resolve`] projects a map onto the fields a schema calls for
//! - [`merge_into_context`] overlays new values onto the workflow context

use log::debug;
use serde_json::Value;

use super::model::{json_type_name, Schema};
use super::{SchemaError, Violation};
use crate::model::Context;

/// Parses and validates a raw payload.
///
/// Blank input is treated as an empty object. Without a schema the parsed
/// object is returned unchanged.
///
/// # Errors
///
/// * [`SchemaError::InvalidInput`] - payload is not a JSON object
/// * [`SchemaError::ValidationFailed`] - one or more constraints are violated
pub fn validate_input(raw: &str, schema: Option<&Schema>) -> Result<Context, SchemaError> {
    let input = parse_payload(raw)?;

    let Some(schema) = schema else {
        debug!("No input schema declared - accepting {} fields as-is", input.len());
        return Ok(input);
    };

    let mut violations = Vec::new();

    for name in &schema.required {
        match input.get(name) {
            None | Some(Value::Null) => violations.push(Violation::new(name, "is required")),
            Some(_) => {}
        }
    }

    for (name, value) in &input {
        match schema.field(name) {
            Some(field) => {
                if value.is_null() && !schema.is_required(name) {
                    continue;
                }
                if let Err(reason) = field.check(value) {
                    violations.push(Violation::new(name, reason));
                }
            }
            None if !schema.additional_properties => {
                violations.push(Violation::new(name, "is not an allowed property"));
            }
            None => {}
        }
    }

    if violations.is_empty() {
        Ok(input)
    } else {
        Err(SchemaError::ValidationFailed(violations))
    }
}

/// Builds a map containing exactly the fields `schema` calls for, pulled
/// from `source` by name.
///
/// Missing optional fields take their declared default or are omitted.
/// Without a schema the whole source is passed through.
///
/// # Errors
///
/// * [`SchemaError::ResolutionFailed`] - a required field is missing or a
///   value does not have the declared type
pub fn resolve(source: &Context, schema: Option<&Schema>) -> Result<Context, SchemaError> {
    let Some(schema) = schema else {
        return Ok(source.clone());
    };

    let mut resolved = Context::new();

    for name in schema.field_names() {
        let field = schema.field(name);

        match source.get(name).filter(|value| !value.is_null()) {
            Some(value) => {
                if let Some(expected) = field.and_then(|f| f.field_type) {
                    if !expected.matches(value) {
                        return Err(SchemaError::ResolutionFailed {
                            field: name.to_string(),
                            reason: format!(
                                "expected {}, found {}",
                                expected.as_str(),
                                json_type_name(value)
                            ),
                        });
                    }
                }
                resolved.insert(name.to_string(), value.clone());
            }
            None => {
                if let Some(default) = field.and_then(|f| f.default.clone()) {
                    resolved.insert(name.to_string(), default);
                } else if schema.is_required(name) {
                    return Err(SchemaError::ResolutionFailed {
                        field: name.to_string(),
                        reason: "required field is missing".to_string(),
                    });
                }
            }
        }
    }

    debug!(
        "Resolved {} of {} source fields",
        resolved.len(),
        source.len()
    );
    Ok(resolved)
}

/// Overlays `overlay` onto `context`; new values win, no key is removed.
pub fn merge_into_context(context: &mut Context, overlay: Context) {
    for (key, value) in overlay {
        context.insert(key, value);
    }
}

fn parse_payload(raw: &str) -> Result<Context, SchemaError> {
    if raw.trim().is_empty() {
        return Ok(Context::new());
    }

    let value: Value =
        serde_json::from_str(raw).map_err(|e| SchemaError::InvalidInput(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(SchemaError::InvalidInput(format!(
            "payload must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(document: Value) -> Schema {
        Schema::from_value(&document).unwrap()
    }

    fn context(value: Value) -> Context {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_validate_without_schema_passes_through() {
        let input = validate_input(r#"{"anything": [1, 2], "x": null}"#, None).unwrap();
        assert_eq!(input.len(), 2);
    }

    #[test]
    fn test_validate_blank_input_is_empty_map() {
        assert!(validate_input("   ", None).unwrap().is_empty());
    }

    #[test]
    fn test_validate_malformed_json() {
        let result = validate_input("{notes: ok", None);
        assert!(matches!(result, Err(SchemaError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_non_object_payload() {
        let result = validate_input("[1, 2, 3]", None);
        assert!(matches!(result, Err(SchemaError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_required_field() {
        let schema = schema(json!({
            "properties": {"notes": {"type": "string"}},
            "required": ["notes"]
        }));

        assert!(validate_input(r#"{"notes": "ok"}"#, Some(&schema)).is_ok());

        let err = validate_input("{}", Some(&schema)).unwrap_err();
        match err {
            SchemaError::ValidationFailed(violations) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "notes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_collects_every_violation() {
        let schema = schema(json!({
            "properties": {
                "amount": {"type": "number", "minimum": 0},
                "tier": {"enum": ["gold", "silver"]}
            },
            "required": ["amount", "owner"],
            "additionalProperties": false
        }));

        let err = validate_input(
            r#"{"amount": -5, "tier": "bronze", "extra": true}"#,
            Some(&schema),
        )
        .unwrap_err();

        let SchemaError::ValidationFailed(violations) = err else {
            panic!("expected validation failure");
        };
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"owner"));
        assert!(fields.contains(&"amount"));
        assert!(fields.contains(&"tier"));
        assert!(fields.contains(&"extra"));
    }

    #[test]
    fn test_validate_null_optional_field_is_allowed() {
        let schema = schema(json!({"properties": {"notes": {"type": "string"}}}));
        assert!(validate_input(r#"{"notes": null}"#, Some(&schema)).is_ok());
    }

    #[test]
    fn test_resolve_picks_declared_fields() {
        let source = context(json!({"a": 1, "b": "two", "c": true}));
        let schema = schema(json!({"properties": {"a": {}, "c": {"type": "boolean"}}}));

        let resolved = resolve(&source, Some(&schema)).unwrap();
        assert_eq!(resolved, context(json!({"a": 1, "c": true})));
    }

    #[test]
    fn test_resolve_applies_defaults_and_omits_optional() {
        let source = context(json!({}));
        let schema = schema(json!({
            "properties": {
                "tier": {"type": "string", "default": "silver"},
                "note": {"type": "string"}
            }
        }));

        let resolved = resolve(&source, Some(&schema)).unwrap();
        assert_eq!(resolved, context(json!({"tier": "silver"})));
    }

    #[test]
    fn test_resolve_missing_required_fails() {
        let source = context(json!({"other": 1}));
        let schema = schema(json!({"required": ["customer_id"]}));

        let err = resolve(&source, Some(&schema)).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::ResolutionFailed { ref field, .. } if field == "customer_id"
        ));
    }

    #[test]
    fn test_resolve_type_mismatch_fails() {
        let source = context(json!({"count": "three"}));
        let schema = schema(json!({"properties": {"count": {"type": "integer"}}}));
        assert!(resolve(&source, Some(&schema)).is_err());
    }

    #[test]
    fn test_resolve_without_schema_is_identity() {
        let source = context(json!({"a": 1}));
        assert_eq!(resolve(&source, None).unwrap(), source);
    }

    #[test]
    fn test_merge_never_removes_keys() {
        let mut ctx = context(json!({"a": 1, "b": 2}));
        merge_into_context(&mut ctx, context(json!({"b": 20, "c": 30})));
        assert_eq!(ctx, context(json!({"a": 1, "b": 20, "c": 30})));
    }

    #[test]
    fn test_resolve_then_merge_round_trip() {
        let mut ctx = context(json!({"price": 10, "qty": 3, "customer": "acme"}));
        let input_schema = schema(json!({
            "properties": {"price": {"type": "number"}, "qty": {"type": "integer"}},
            "required": ["price", "qty"]
        }));
        let output_schema = schema(json!({
            "properties": {"total": {"type": "number"}},
            "required": ["total"]
        }));

        let executor_input = resolve(&ctx, Some(&input_schema)).unwrap();
        assert_eq!(executor_input.len(), 2);

        let mut executor_output = Context::new();
        executor_output.insert("total".into(), json!(30));
        executor_output.insert("debug".into(), json!("ignored"));

        let resolved_output = resolve(&executor_output, Some(&output_schema)).unwrap();
        merge_into_context(&mut ctx, resolved_output);

        assert_eq!(ctx["total"], json!(30));
        assert_eq!(ctx["price"], json!(10));
        assert_eq!(ctx["qty"], json!(3));
        assert_eq!(ctx["customer"], json!("acme"));
        assert!(!ctx.contains_key("debug"));
    }
}
