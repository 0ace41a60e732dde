//! Plain data views of MCP capabilities, detached from the SDK types.

use serde::{Deserialize, Serialize};

/// Schema for a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// A resource listed by an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCPResourceSchema {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// One content block returned by `resources/read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCPResourceContent {
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Base64 payload of binary resources.
    #[serde(default)]
    pub blob: Option<String>,
}

impl MCPResourceContent {
    /// Text payload parsed as JSON when it looks structured, else the raw string.
    pub fn to_value(&self) -> serde_json::Value {
        match (&self.text, &self.blob) {
            (Some(text), _) => {
                let structured = self.mime_type.as_deref() == Some("application/json");
                if structured {
                    if let Ok(value) = serde_json::from_str(text) {
                        return value;
                    }
                }
                serde_json::Value::String(text.clone())
            }
            (None, Some(blob)) => serde_json::json!({ "blob": blob, "mimeType": self.mime_type }),
            (None, None) => serde_json::Value::Null,
        }
    }
}

/// A prompt listed by an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MCPPromptSchema {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<MCPPromptArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MCPPromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MCPPromptRole {
    User,
    Assistant,
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPPromptMessage {
    pub role: MCPPromptRole,
    /// Raw MCP content block (`text`, `image`, `resource`, ...).
    pub content: serde_json::Value,
}

impl MCPPromptMessage {
    /// Text of the content block; embedded text resources count as text.
    pub fn text(&self) -> Option<&str> {
        self.content
            .get("text")
            .and_then(|t| t.as_str())
            .or_else(|| {
                self.content
                    .get("resource")
                    .and_then(|r| r.get("text"))
                    .and_then(|t| t.as_str())
            })
    }
}

/// A prompt rendered by `prompts/get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPPromptResult {
    #[serde(default)]
    pub description: Option<String>,
    pub messages: Vec<MCPPromptMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_content_parses_json_payloads() {
        let content: MCPResourceContent = serde_json::from_value(json!({
            "uri": "resource://config",
            "mimeType": "application/json",
            "text": "{\"debug\":true}"
        }))
        .expect("content should deserialize");

        assert_eq!(content.to_value(), json!({ "debug": true }));
    }

    #[test]
    fn prompt_message_reads_embedded_resource_text() {
        let message: MCPPromptMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": {
                "type": "resource",
                "resource": { "uri": "resource://notes", "text": "remember this" }
            }
        }))
        .expect("message should deserialize");

        assert_eq!(message.role, MCPPromptRole::Assistant);
        assert_eq!(message.text(), Some("remember this"));
    }
}
