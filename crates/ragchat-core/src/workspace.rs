//! Root application state: the chat library, which chat is open, and user
//! preferences, written through to a [`KeyValueStore`] as they change.

use crate::chat::{Chat, ChatLibrary};
use crate::personalization::Personalization;
use crate::preferences::{Preferences, Theme};
use crate::state::ChatMessage;
use crate::storage::{self, keys, KeyValueStore};

pub struct Workspace {
    store: Box<dyn KeyValueStore>,
    library: ChatLibrary,
    current_chat_id: Option<String>,
    prefs: Preferences,
}

impl Workspace {
    /// Load preferences, and the chat history when saving to memory is on
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let prefs = Preferences::load(store.as_ref());
        let library = if prefs.save_to_memory {
            storage::read(store.as_ref(), keys::CHAT_HISTORY).unwrap_or_default()
        } else {
            ChatLibrary::new()
        };
        tracing::info!(
            chats = library.len(),
            save_to_memory = prefs.save_to_memory,
            "workspace loaded"
        );

        Self {
            store,
            library,
            current_chat_id: None,
            prefs,
        }
    }

    pub fn library(&self) -> &ChatLibrary {
        &self.library
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn current_chat_id(&self) -> Option<&str> {
        self.current_chat_id.as_deref()
    }

    pub fn current_chat(&self) -> Option<&Chat> {
        self.current_chat_id
            .as_deref()
            .and_then(|id| self.library.get(id))
    }

    /// Messages of the open chat, empty when it has none stored
    pub fn current_messages(&self) -> Vec<ChatMessage> {
        self.current_chat()
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    fn persist_history(&mut self) {
        if !self.prefs.save_to_memory {
            return;
        }
        if let Err(e) = storage::write(self.store.as_mut(), keys::CHAT_HISTORY, &self.library) {
            tracing::error!(error = %e, "failed to save chat history");
        }
    }

    /// Start a fresh chat and make it current
    pub fn new_chat(&mut self) -> String {
        let id = self.library.create();
        self.current_chat_id = Some(id.clone());
        self.persist_history();
        id
    }

    /// Returns false for unknown ids
    pub fn select_chat(&mut self, id: &str) -> bool {
        if self.library.get(id).is_none() {
            return false;
        }
        self.current_chat_id = Some(id.to_string());
        true
    }

    /// Delete a chat. If it was open, the next chat in the list (or none)
    /// becomes current.
    pub fn delete_chat(&mut self, id: &str) -> bool {
        let Some(pos) = self.library.position(id) else {
            return false;
        };
        self.library.delete(id);

        if self.current_chat_id.as_deref() == Some(id) {
            self.current_chat_id = self
                .library
                .iter()
                .nth(pos.min(self.library.len().saturating_sub(1)))
                .map(|c| c.id.clone());
        }
        self.persist_history();
        true
    }

    /// Record a chat's messages. They are only written to the store while
    /// saving to memory is on; an empty list removes the chat.
    pub fn on_messages_update(&mut self, id: &str, messages: Vec<ChatMessage>) {
        if self.library.update_messages(id, messages) {
            self.persist_history();
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.prefs.theme = self.prefs.theme.toggle();
        if let Err(e) = self.prefs.save_theme(self.store.as_mut()) {
            tracing::error!(error = %e, "failed to save theme");
        }
        self.prefs.theme
    }

    /// Turning this off forgets the stored history; turning it on saves the
    /// chats currently held.
    pub fn set_save_to_memory(&mut self, enabled: bool) {
        self.prefs.save_to_memory = enabled;
        if let Err(e) = self.prefs.save_save_to_memory(self.store.as_mut()) {
            tracing::error!(error = %e, "failed to save memory preference");
        }
        if enabled {
            self.persist_history();
        } else if let Err(e) = self.store.remove(keys::CHAT_HISTORY) {
            tracing::error!(error = %e, "failed to remove chat history");
        }
    }

    pub fn set_personalization(&mut self, personalization: Personalization) {
        self.prefs.personalization = personalization;
        if let Err(e) = self.prefs.save_personalization(self.store.as_mut()) {
            tracing::error!(error = %e, "failed to save personalization");
        }
    }

    pub fn set_selected_model(&mut self, model: &str) {
        self.prefs.selected_model = model.to_string();
        if let Err(e) = self.prefs.save_selected_model(self.store.as_mut()) {
            tracing::error!(error = %e, "failed to save selected model");
        }
    }

    /// Pick the first available model when none has been chosen yet
    pub fn apply_default_model(&mut self, available: &[String]) -> bool {
        if !self.prefs.selected_model.is_empty() {
            return false;
        }
        match available.first() {
            Some(first) => {
                let first = first.clone();
                self.set_selected_model(&first);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn workspace() -> Workspace {
        Workspace::load(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_history_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let id = {
            let mut ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
            let id = ws.new_chat();
            ws.on_messages_update(&id, vec![ChatMessage::user("hello"), ChatMessage::assistant("hi")]);
            id
        };

        let ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
        let chat = ws.library().get(&id).unwrap();
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.title, "hello");
        assert!(ws.current_chat_id().is_none());
    }

    #[test]
    fn test_memory_off_skips_history() {
        let dir = TempDir::new().unwrap();
        {
            let mut ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
            let id = ws.new_chat();
            ws.on_messages_update(&id, vec![ChatMessage::user("saved")]);
            ws.set_save_to_memory(false);
            ws.on_messages_update(&id, vec![ChatMessage::user("not saved")]);
        }

        let ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
        assert!(!ws.preferences().save_to_memory);
        assert!(ws.library().is_empty());
    }

    #[test]
    fn test_reenabling_memory_saves_current_chats() {
        let dir = TempDir::new().unwrap();
        {
            let mut ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
            ws.set_save_to_memory(false);
            ws.new_chat();
            ws.set_save_to_memory(true);
        }
        let ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
        assert_eq!(ws.library().len(), 1);
    }

    #[test]
    fn test_delete_current_selects_neighbour() {
        let mut ws = workspace();
        let oldest = ws.new_chat();
        let middle = ws.new_chat();
        let newest = ws.new_chat();

        ws.select_chat(&middle);
        assert!(ws.delete_chat(&middle));
        assert_eq!(ws.current_chat_id(), Some(oldest.as_str()));

        ws.select_chat(&oldest);
        ws.delete_chat(&oldest);
        assert_eq!(ws.current_chat_id(), Some(newest.as_str()));

        ws.delete_chat(&newest);
        assert!(ws.current_chat_id().is_none());
        assert!(!ws.delete_chat(&newest));
    }

    #[test]
    fn test_clearing_messages_removes_chat() {
        let mut ws = workspace();
        let id = ws.new_chat();
        ws.on_messages_update(&id, vec![ChatMessage::user("q")]);
        ws.on_messages_update(&id, Vec::new());
        assert!(ws.library().get(&id).is_none());
        assert!(ws.current_messages().is_empty());
    }

    #[test]
    fn test_select_unknown_chat() {
        let mut ws = workspace();
        assert!(!ws.select_chat("missing"));
        assert!(ws.current_chat().is_none());
    }

    #[test]
    fn test_preferences_write_through() {
        let dir = TempDir::new().unwrap();
        {
            let mut ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
            assert_eq!(ws.toggle_theme(), Theme::Light);
            let mut p = ws.preferences().personalization;
            p.cycle_base_style();
            ws.set_personalization(p);
            assert!(ws.apply_default_model(&["gemma3".to_string(), "llama3".to_string()]));
            assert!(!ws.apply_default_model(&["llama3".to_string()]));
        }
        let ws = Workspace::load(Box::new(FileStore::new(dir.path()).unwrap()));
        assert_eq!(ws.preferences().theme, Theme::Light);
        assert!(!ws.preferences().personalization.is_default());
        assert_eq!(ws.preferences().selected_model, "gemma3");
    }
}
