//! Parameter schemas for tool descriptors.

use serde::{Deserialize, Serialize};

/// JSON Schema-based parameter definition for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    /// JSON Schema object describing the parameters.
    pub schema: serde_json::Value,
}

impl ToolParameters {
    /// Wrap a raw JSON Schema value, defaulting a missing `type` to `object`.
    pub fn from_schema(mut schema: serde_json::Value) -> Self {
        if let Some(map) = schema.as_object_mut() {
            map.entry("type")
                .or_insert_with(|| serde_json::Value::String("object".into()));
        }
        Self { schema }
    }

    /// An object schema without parameters.
    pub fn empty() -> Self {
        Self {
            schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }

    /// Names listed under `required`.
    pub fn required(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default()
    }

    /// Schema as a JSON object map, for handing to the MCP SDK.
    pub fn as_object(&self) -> serde_json::Map<String, serde_json::Value> {
        match &self.schema {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        }
    }
}

/// Builder for constructing tool parameter schemas.
pub struct ParameterBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(mut self, name: impl Into<String>, schema: serde_json::Value, required: bool) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "string", "description": description.into() });
        self.property(name, schema, required)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "integer", "description": description.into() });
        self.property(name, schema, required)
    }

    pub fn object(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "object", "description": description.into() });
        self.property(name, schema, required)
    }

    /// A property that accepts any JSON value.
    pub fn any(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add a string property restricted to `values`.
    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        let schema = serde_json::json!({
            "type": "string",
            "description": description.into(),
            "enum": values,
        });
        self.property(name, schema, required)
    }

    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: serde_json::json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn builder_collects_required_properties_in_order() {
        let params = ToolParameters::object()
            .string("server_name", "Server", true)
            .string_enum("transport", "Transport", &["sse", "stdio"], false)
            .any("arguments", "Arguments", true)
            .build();

        assert_eq!(params.required(), vec!["server_name", "arguments"]);
        assert_eq!(params.schema["properties"]["transport"]["enum"], json!(["sse", "stdio"]));
        assert!(params.schema["properties"]["arguments"].get("type").is_none());
    }

    #[test]
    fn from_schema_defaults_type_to_object() {
        let params = ToolParameters::from_schema(json!({ "properties": {} }));
        assert_eq!(params.schema["type"], "object");
        assert_eq!(params.as_object().len(), 2);
    }
}
