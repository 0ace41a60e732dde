//! Typed access to tool call arguments.

use crate::error::ToolkitError;

/// Wrapper around the JSON arguments of one tool call.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_raw(self) -> serde_json::Value {
        self.value
    }

    /// Get a required string argument.
    pub fn get_str(&self, key: &str) -> Result<&str, ToolkitError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolkitError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional port-like unsigned integer.
    pub fn get_u16_opt(&self, key: &str) -> Result<Option<u16>, ToolkitError> {
        match self.value.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| {
                    ToolkitError::InvalidArgument(format!("Argument {key} must be an integer in 0..=65535"))
                }),
        }
    }

    /// Any JSON value under `key`, or `Null`.
    pub fn get_value(&self, key: &str) -> serde_json::Value {
        self.value.get(key).cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Optional nested object; missing and `null` both read as `None`.
    pub fn get_object_opt(
        &self,
        key: &str,
    ) -> Result<Option<&serde_json::Map<String, serde_json::Value>>, ToolkitError> {
        match self.value.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(ToolkitError::InvalidArgument(format!(
                "Argument {key} must be an object"
            ))),
        }
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, ToolkitError> {
        let value = match &self.value {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str::<serde_json::Value>(trimmed).map_err(|e| {
                        ToolkitError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
                    })?
                }
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| {
            ToolkitError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct StartArgs {
        name: String,
        #[serde(default)]
        port: Option<u16>,
    }

    #[test]
    fn deserialize_accepts_json_encoded_string() {
        let args = ToolArguments::new(json!(r#"{"name":"local","port":9000}"#));
        let parsed: StartArgs = args.deserialize().expect("string payload should parse");
        assert_eq!(parsed, StartArgs { name: "local".into(), port: Some(9000) });
    }

    #[test]
    fn port_outside_range_is_rejected() {
        let args = ToolArguments::new(json!({ "port": 70000 }));
        let err = args.get_u16_opt("port").expect_err("70000 is not a port");
        assert!(matches!(err, ToolkitError::InvalidArgument(msg) if msg.contains("port")));
        assert_eq!(ToolArguments::new(json!({})).get_u16_opt("port").ok(), Some(None));
    }

    #[test]
    fn object_argument_must_be_object() {
        let args = ToolArguments::new(json!({ "variables": [1, 2] }));
        assert!(args.get_object_opt("variables").is_err());
        let args = ToolArguments::new(json!({ "variables": { "topic": "rust" } }));
        let map = args
            .get_object_opt("variables")
            .expect("object should be accepted")
            .expect("object should be present");
        assert_eq!(map["topic"], "rust");
    }
}
