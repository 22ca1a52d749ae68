//! UI-agnostic conversation records
//!
//! These types are shared by every front-end and are also the shape that gets
//! persisted under the `chatHistory` key and sent to the backend as `history`.

use serde::{Deserialize, Serialize};

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Descriptor of a document that was uploaded alongside a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_attachment_uses_type_key() {
        let mut msg = ChatMessage::user("see file");
        msg.attachments.push(Attachment {
            name: "notes.md".to_string(),
            mime_type: "text/markdown".to_string(),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["attachments"][0]["type"], "text/markdown");
        assert_eq!(value["attachments"][0]["name"], "notes.md");
    }

    #[test]
    fn test_missing_attachments_default_to_empty() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"q"}"#).unwrap();
        assert!(msg.attachments.is_empty());
        assert!(msg.is_user());
    }
}
