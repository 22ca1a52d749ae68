//! Chat threads and the ordered library that holds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::ChatMessage;

pub const NEW_CHAT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

/// Title for a chat: the first user message, cut to 30 characters
pub fn derive_title(messages: &[ChatMessage]) -> Option<String> {
    let first = messages.iter().find(|m| m.is_user())?;
    let text = first.content.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if text.chars().count() > TITLE_MAX_CHARS {
        let cut: String = text.chars().take(TITLE_MAX_CHARS).collect();
        Some(format!("{}…", cut.trim_end()))
    } else {
        Some(text)
    }
}

/// All chats, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatLibrary {
    chats: Vec<Chat>,
}

impl ChatLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> String {
        let chat = Chat::new();
        let id = chat.id.clone();
        self.chats.insert(0, chat);
        id
    }

    pub fn get(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.chats.iter().position(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Replace a chat's messages.
    ///
    /// An empty list removes the chat. Unknown ids are inserted at the front
    /// so a chat that was never listed is not lost. Returns whether anything
    /// changed.
    pub fn update_messages(&mut self, id: &str, messages: Vec<ChatMessage>) -> bool {
        if messages.is_empty() {
            return self.delete(id);
        }

        let idx = match self.position(id) {
            Some(idx) => idx,
            None => {
                let mut chat = Chat::new();
                chat.id = id.to_string();
                self.chats.insert(0, chat);
                0
            }
        };

        let chat = &mut self.chats[idx];
        if chat.messages == messages {
            return false;
        }
        if chat.title == NEW_CHAT_TITLE {
            if let Some(title) = derive_title(&messages) {
                chat.title = title;
            }
        }
        chat.messages = messages;
        chat.updated_at = Utc::now();
        true
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.chats.len();
        self.chats.retain(|c| c.id != id);
        self.chats.len() != before
    }
}
