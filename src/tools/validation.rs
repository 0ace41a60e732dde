//! Argument checks run before a descriptor's callback.

use serde_json::Value;

/// Check `args` against the top level of a JSON Schema.
///
/// Covers the object type, `required` names, per-property `type` and `enum`.
/// `null` arguments are read as an empty object, which is what MCP sends for
/// parameterless tools. Returns the first violation found.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    let empty = serde_json::Map::new();
    let object = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            if schema.get("type").and_then(Value::as_str) == Some("object") {
                return Err(format!("expected object arguments, got {}", json_type_name(other)));
            }
            return Ok(());
        }
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for name in required {
        if !object.contains_key(name) {
            return Err(format!("missing required field '{name}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in object {
        let Some(property) = properties.get(key) else {
            continue;
        };
        if let Some(expected) = property.get("type").and_then(Value::as_str) {
            if !value_matches_type(value, expected) {
                return Err(format!(
                    "field '{key}' expected type '{expected}', got {}",
                    json_type_name(value)
                ));
            }
        }
        if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(format!("field '{key}' must be one of {}", Value::Array(allowed.clone())));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
