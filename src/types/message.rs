//! Chat messages produced from MCP prompts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mcp::schema::{MCPPromptMessage, MCPPromptRole};

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ModelMessage {
    fn with_text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
            name: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_text(Role::Assistant, text)
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Data { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

impl From<&MCPPromptMessage> for ModelMessage {
    fn from(message: &MCPPromptMessage) -> Self {
        let role = match message.role {
            MCPPromptRole::User => Role::User,
            MCPPromptRole::Assistant => Role::Assistant,
        };
        let part = match message.text() {
            Some(text) => ContentPart::Text { text: text.to_string() },
            None => ContentPart::Data {
                value: message.content.clone(),
            },
        };
        Self {
            role,
            content: vec![part],
            name: None,
            timestamp: Some(Utc::now()),
        }
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Non-text MCP content block (image, blob resource), kept verbatim.
    Data { value: serde_json::Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_roles_map_to_chat_roles() {
        let user = MCPPromptMessage {
            role: MCPPromptRole::User,
            content: json!({ "type": "text", "text": "Summarize Rust" }),
        };
        let assistant = MCPPromptMessage {
            role: MCPPromptRole::Assistant,
            content: json!({ "type": "text", "text": "Sure." }),
        };

        let converted: Vec<ModelMessage> = [&user, &assistant].into_iter().map(ModelMessage::from).collect();

        assert_eq!(converted[0].role, Role::User);
        assert_eq!(converted[0].text(), "Summarize Rust");
        assert_eq!(converted[1].role, Role::Assistant);
    }

    #[test]
    fn image_content_is_kept_as_data() {
        let image = MCPPromptMessage {
            role: MCPPromptRole::User,
            content: json!({ "type": "image", "data": "aGk=", "mimeType": "image/png" }),
        };
        let converted = ModelMessage::from(&image);
        assert_eq!(converted.text(), "");
        assert!(matches!(&converted.content[0], ContentPart::Data { value } if value["type"] == "image"));
    }
}
