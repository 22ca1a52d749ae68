use serde::{Deserialize, Serialize};

use crate::personalization::Personalization;
use crate::storage::{self, keys, KeyValueStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggle(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// User preferences, each persisted under its own key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub theme: Theme,
    pub save_to_memory: bool,
    pub personalization: Personalization,
    /// Empty until the user picks one or the model list supplies a default
    pub selected_model: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            save_to_memory: true,
            personalization: Personalization::default(),
            selected_model: String::new(),
        }
    }
}

impl Preferences {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            theme: storage::read(store, keys::THEME).unwrap_or(defaults.theme),
            save_to_memory: storage::read(store, keys::SAVE_TO_MEMORY)
                .unwrap_or(defaults.save_to_memory),
            personalization: storage::read(store, keys::PERSONALIZATION)
                .unwrap_or(defaults.personalization),
            selected_model: storage::read(store, keys::SELECTED_MODEL)
                .unwrap_or(defaults.selected_model),
        }
    }

    pub fn save_theme(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        storage::write(store, keys::THEME, &self.theme)
    }

    pub fn save_save_to_memory(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        storage::write(store, keys::SAVE_TO_MEMORY, &self.save_to_memory)
    }

    pub fn save_personalization(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        storage::write(store, keys::PERSONALIZATION, &self.personalization)
    }

    /// An empty model name is never written
    pub fn save_selected_model(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        if self.selected_model.is_empty() {
            return Ok(());
        }
        storage::write(store, keys::SELECTED_MODEL, &self.selected_model)
    }
}
