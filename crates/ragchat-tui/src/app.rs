use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

use ragchat_core::api::MessageResponse;
use ragchat_core::upload::validate_upload;
use ragchat_core::{
    ApiError, AskResponse, Conversation, DialKind, DocumentStats, KnowledgeBase, ModelInfo,
    PendingAsk, RagClient, UploadResponse, Workspace,
};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Documents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Messages,
    Input,
}

/// What the path prompt is collecting a path for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPurpose {
    /// Attach to the next chat message
    Attach,
    /// Add straight to the knowledge base
    Upload,
}

/// A row of the personalization popup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalizationRow {
    BaseStyle,
    Dial(DialKind),
    Reset,
}

pub fn personalization_rows() -> Vec<PersonalizationRow> {
    let mut rows = vec![PersonalizationRow::BaseStyle];
    rows.extend(DialKind::all().into_iter().map(PersonalizationRow::Dial));
    rows.push(PersonalizationRow::Reset);
    rows
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Data
    pub workspace: Workspace,
    pub conversation: Conversation,
    pub knowledge_base: KnowledgeBase,
    client: RagClient,
    events: UnboundedSender<AppEvent>,

    // Sidebar
    pub chat_list_state: ListState,

    // Composer
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars
    pub edit_cursor: usize,

    // Message pane
    pub selected_message: Option<usize>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for paging

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub models_error: Option<String>,
    pub model_picker_state: ListState,

    // Personalization popup state
    pub show_personalization: bool,
    pub personalization_state: ListState,

    // Path prompt state (attach / upload)
    pub path_prompt: Option<PathPurpose>,
    pub path_input: String,
    pub path_cursor: usize,

    pub show_help: bool,
    pub documents_loading: bool,
    /// One-line feedback shown in the status bar until the next key press
    pub notice: Option<String>,

    // Panel areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub messages_area: Option<Rect>,
}

impl App {
    pub fn new(workspace: Workspace, client: RagClient, events: UnboundedSender<AppEvent>) -> Self {
        let mut app = Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,
            focus: FocusPane::Sidebar,

            workspace,
            conversation: Conversation::new(),
            knowledge_base: KnowledgeBase::new(),
            client,
            events,

            chat_list_state: ListState::default(),

            input: String::new(),
            input_cursor: 0,
            edit_cursor: 0,

            selected_message: None,
            chat_scroll: 0,
            chat_height: 0,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            models_error: None,
            model_picker_state: ListState::default(),

            show_personalization: false,
            personalization_state: ListState::default(),

            path_prompt: None,
            path_input: String::new(),
            path_cursor: 0,

            show_help: false,
            documents_loading: false,
            notice: None,

            sidebar_area: None,
            messages_area: None,
        };

        // Reopen the most recent chat
        let first = app.workspace.library().iter().next().map(|c| c.id.clone());
        if let Some(id) = first {
            app.open_chat(&id);
        }
        app
    }

    pub fn client(&self) -> &RagClient {
        &self.client
    }

    // Sidebar

    pub fn chat_ids(&self) -> Vec<String> {
        self.workspace.library().iter().map(|c| c.id.clone()).collect()
    }

    fn sync_sidebar_selection(&mut self) {
        let pos = self
            .workspace
            .current_chat_id()
            .and_then(|id| self.workspace.library().position(id));
        self.chat_list_state.select(pos);
    }

    pub fn sidebar_nav_down(&mut self) {
        let len = self.workspace.library().len();
        if len > 0 {
            let i = self.chat_list_state.selected().map(|i| i + 1).unwrap_or(0);
            self.chat_list_state.select(Some(i.min(len - 1)));
        }
    }

    pub fn sidebar_nav_up(&mut self) {
        let i = self.chat_list_state.selected().unwrap_or(0);
        self.chat_list_state.select(Some(i.saturating_sub(1)));
    }

    /// Make `id` the current chat and load its messages into the panel
    pub fn open_chat(&mut self, id: &str) {
        if !self.workspace.select_chat(id) {
            return;
        }
        let messages = self.workspace.current_messages();
        if self
            .conversation
            .switch_chat(Some(id.to_string()), messages)
        {
            self.selected_message = None;
            self.scroll_chat_to_bottom();
        }
        self.sync_sidebar_selection();
    }

    pub fn open_selected_chat(&mut self) {
        let ids = self.chat_ids();
        if let Some(id) = self.chat_list_state.selected().and_then(|i| ids.get(i)) {
            self.open_chat(id);
            self.focus = FocusPane::Input;
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn new_chat(&mut self) {
        let id = self.workspace.new_chat();
        self.conversation.switch_chat(Some(id), Vec::new());
        self.selected_message = None;
        self.chat_scroll = 0;
        self.sync_sidebar_selection();
        self.focus = FocusPane::Input;
        self.input_mode = InputMode::Editing;
    }

    pub fn delete_selected_chat(&mut self) {
        let ids = self.chat_ids();
        let Some(id) = self.chat_list_state.selected().and_then(|i| ids.get(i)).cloned() else {
            return;
        };
        let was_current = self.workspace.current_chat_id() == Some(id.as_str());
        if !self.workspace.delete_chat(&id) {
            return;
        }
        tracing::info!(chat = %id, "chat deleted");

        if was_current {
            let next = self.workspace.current_chat_id().map(str::to_string);
            let messages = self.workspace.current_messages();
            self.conversation.switch_chat(next, messages);
            self.selected_message = None;
            self.scroll_chat_to_bottom();
        }

        let len = self.workspace.library().len();
        match self.chat_list_state.selected() {
            _ if len == 0 => self.chat_list_state.select(None),
            Some(i) => self.chat_list_state.select(Some(i.min(len - 1))),
            None => {}
        }
    }

    /// Write the panel's messages back to the library. An empty list is only
    /// written by an explicit clear, since it deletes the chat.
    fn persist_conversation(&mut self) {
        let Some(id) = self.conversation.chat_id().map(str::to_string) else {
            return;
        };
        if self.conversation.messages().is_empty() {
            return;
        }
        self.workspace
            .on_messages_update(&id, self.conversation.messages().to_vec());
    }

    // Requests

    fn personalization_prompt(&self) -> String {
        self.workspace.preferences().personalization.build_prompt()
    }

    fn selected_model(&self) -> String {
        self.workspace.preferences().selected_model.clone()
    }

    fn spawn_ask(&mut self, pending: PendingAsk) {
        tracing::info!(
            ticket = pending.ticket,
            kind = ?pending.kind,
            model = %pending.request.model,
            history = pending.request.history.len(),
            "sending question"
        );
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.ask(&pending.request, &pending.cancel).await;
            let _ = tx.send(AppEvent::AskFinished {
                ticket: pending.ticket,
                result,
            });
        });
        self.selected_message = None;
        self.animation_frame = 0;
        self.scroll_chat_to_bottom();
    }

    /// Send the composer contents. Starts a chat first when none is open.
    pub fn send_message(&mut self) {
        if self.conversation.is_loading() {
            return;
        }
        if self.input.trim().is_empty() && !self.conversation.has_uploaded_attachments() {
            return;
        }
        if self.conversation.chat_id().is_none() {
            let id = self.workspace.new_chat();
            self.conversation.switch_chat(Some(id), Vec::new());
            self.sync_sidebar_selection();
        }

        let personalization = self.personalization_prompt();
        let model = self.selected_model();
        if let Some(pending) = self
            .conversation
            .begin_send(&self.input, &personalization, &model)
        {
            self.input.clear();
            self.input_cursor = 0;
            self.persist_conversation();
            self.sync_sidebar_selection();
            self.spawn_ask(pending);
        }
    }

    pub fn on_ask_finished(&mut self, ticket: u64, result: Result<AskResponse, ApiError>) {
        if self.conversation.complete(ticket, result) {
            self.persist_conversation();
            self.scroll_chat_to_bottom();
        }
    }

    pub fn stop_generation(&mut self) {
        if self.conversation.stop() {
            tracing::info!("generation stopped by user");
            self.persist_conversation();
            self.scroll_chat_to_bottom();
        }
    }

    pub fn clear_chat(&mut self) {
        let Some(id) = self.conversation.chat_id().map(str::to_string) else {
            return;
        };
        self.conversation.clear();
        self.workspace.on_messages_update(&id, Vec::new());
        self.selected_message = None;
        self.chat_scroll = 0;
        self.sync_sidebar_selection();
    }

    pub fn start_edit_selected(&mut self) {
        let Some(index) = self.selected_message else {
            return;
        };
        if self.conversation.start_edit(index) {
            self.edit_cursor = self
                .conversation
                .editing()
                .map(|e| e.content.chars().count())
                .unwrap_or(0);
        } else {
            self.notice = Some("Only your own messages can be edited".to_string());
        }
    }

    pub fn commit_edit(&mut self) {
        let personalization = self.personalization_prompt();
        let model = self.selected_model();
        if let Some(pending) = self.conversation.commit_edit(&personalization, &model) {
            self.persist_conversation();
            self.spawn_ask(pending);
        }
    }

    pub fn regenerate_selected(&mut self) {
        let index = match self.selected_message {
            Some(i) => i,
            None => match self.conversation.messages().iter().rposition(|m| !m.is_user()) {
                Some(i) => i,
                None => return,
            },
        };
        let personalization = self.personalization_prompt();
        let model = self.selected_model();
        match self
            .conversation
            .begin_regenerate(index, &personalization, &model)
        {
            Some(pending) => {
                self.persist_conversation();
                self.spawn_ask(pending);
            }
            None => self.notice = Some("Select an answer to regenerate".to_string()),
        }
    }

    pub fn copy_selected_message(&mut self) {
        let Some(message) = self
            .selected_message
            .and_then(|i| self.conversation.messages().get(i))
        else {
            return;
        };
        if copy_to_clipboard(&message.content) {
            self.notice = Some("Copied to clipboard".to_string());
        } else {
            self.notice = Some("Clipboard unavailable".to_string());
        }
    }

    // Attachments and the knowledge base

    pub fn open_path_prompt(&mut self, purpose: PathPurpose) {
        self.path_prompt = Some(purpose);
        self.path_input.clear();
        self.path_cursor = 0;
    }

    pub fn close_path_prompt(&mut self) {
        self.path_prompt = None;
        self.path_input.clear();
        self.path_cursor = 0;
    }

    pub fn submit_path_prompt(&mut self) {
        let Some(purpose) = self.path_prompt else {
            return;
        };
        let path = expand_home(self.path_input.trim());
        self.close_path_prompt();
        if path.as_os_str().is_empty() {
            return;
        }
        match purpose {
            PathPurpose::Attach => self.attach_file(&path),
            PathPurpose::Upload => self.upload_document(&path),
        }
    }

    fn spawn_upload(&self, path: PathBuf, attachment: Option<u64>) {
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.upload(&path).await;
            let _ = tx.send(AppEvent::UploadFinished { attachment, result });
        });
    }

    /// Upload a file and attach it to the message being composed
    pub fn attach_file(&mut self, path: &Path) {
        match validate_upload(path) {
            Ok(file) => {
                let path = file.path.clone();
                let name = file.name.clone();
                let id = self.conversation.attach(file);
                tracing::info!(file = %name, attachment = id, "uploading attachment");
                self.spawn_upload(path, Some(id));
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn upload_document(&mut self, path: &Path) {
        if let Some(file) = self.knowledge_base.begin_upload(path) {
            tracing::info!(file = %file.name, "uploading document");
            self.spawn_upload(file.path, None);
        }
    }

    pub fn on_upload_finished(
        &mut self,
        attachment: Option<u64>,
        result: Result<UploadResponse, ApiError>,
    ) {
        match (attachment, result) {
            (Some(id), Ok(response)) => {
                tracing::info!(attachment = id, chunks = response.chunks, "attachment uploaded");
                self.conversation.mark_uploaded(id);
                self.refresh_documents();
            }
            (Some(id), Err(e)) => {
                tracing::error!(attachment = id, error = %e, "attachment upload failed");
                self.conversation.mark_failed(id);
            }
            (None, Ok(response)) => {
                tracing::info!(chunks = response.chunks, "document uploaded");
                self.knowledge_base
                    .upload_succeeded(&response.message, response.chunks);
                self.refresh_documents();
            }
            (None, Err(e)) => {
                tracing::error!(error = %e, "document upload failed");
                self.knowledge_base.upload_failed(&e.detail());
            }
        }
    }

    /// Drop the most recently attached file
    pub fn remove_last_attachment(&mut self) {
        if let Some(id) = self.conversation.attached_files().last().map(|f| f.id) {
            self.conversation.remove_attachment(id);
        }
    }

    pub fn refresh_documents(&mut self) {
        self.documents_loading = true;
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.list_documents().await;
            let _ = tx.send(AppEvent::DocumentsLoaded(result));
        });
    }

    pub fn on_documents_loaded(&mut self, result: Result<DocumentStats, ApiError>) {
        self.documents_loading = false;
        match result {
            Ok(stats) => self.knowledge_base.set_stats(stats),
            Err(e) => tracing::warn!(error = %e, "failed to fetch documents"),
        }
    }

    /// First call asks for confirmation, the second one clears
    pub fn request_clear_documents(&mut self) {
        if !self.knowledge_base.request_clear() {
            return;
        }
        tracing::info!("clearing knowledge base");
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.clear_documents().await;
            let _ = tx.send(AppEvent::DocumentsCleared(result));
        });
    }

    pub fn on_documents_cleared(&mut self, result: Result<MessageResponse, ApiError>) {
        match result {
            Ok(_) => {
                self.knowledge_base.cleared();
                self.refresh_documents();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to clear documents");
                self.knowledge_base.clear_failed(&e.to_string());
            }
        }
    }

    // Model picker

    pub fn refresh_models(&mut self) {
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.list_models().await;
            let _ = tx.send(AppEvent::ModelsLoaded(result));
        });
    }

    pub fn on_models_loaded(&mut self, result: Result<Vec<ModelInfo>, ApiError>) {
        match result {
            Ok(models) => {
                self.available_models = models.into_iter().map(|m| m.name).collect();
                self.models_error = None;
                if self.workspace.apply_default_model(&self.available_models) {
                    tracing::info!(model = %self.selected_model(), "defaulted to first model");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch models");
                self.models_error = Some(e.to_string());
            }
        }
    }

    pub fn open_model_picker(&mut self) {
        if self.conversation.is_loading() {
            return;
        }
        let current = self.selected_model();
        let pos = self.available_models.iter().position(|m| *m == current);
        self.model_picker_state.select(pos.or(Some(0)));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i).cloned() {
                tracing::info!(model = %model, "model selected");
                self.workspace.set_selected_model(&model);
                self.show_model_picker = false;
            }
        }
    }

    // Personalization popup

    pub fn open_personalization(&mut self) {
        self.personalization_state.select(Some(0));
        self.show_personalization = true;
    }

    pub fn personalization_nav_down(&mut self) {
        let len = personalization_rows().len();
        let i = self.personalization_state.selected().unwrap_or(0);
        self.personalization_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn personalization_nav_up(&mut self) {
        let i = self.personalization_state.selected().unwrap_or(0);
        self.personalization_state.select(Some(i.saturating_sub(1)));
    }

    /// Cycle the selected setting, or reset everything on the last row
    pub fn personalization_activate(&mut self) {
        let rows = personalization_rows();
        let Some(row) = self.personalization_state.selected().and_then(|i| rows.get(i)) else {
            return;
        };
        let mut p = self.workspace.preferences().personalization;
        match row {
            PersonalizationRow::BaseStyle => p.cycle_base_style(),
            PersonalizationRow::Dial(kind) => p.cycle_dial(*kind),
            PersonalizationRow::Reset => p.reset(),
        }
        self.workspace.set_personalization(p);
    }

    // Preferences

    pub fn toggle_theme(&mut self) {
        let theme = self.workspace.toggle_theme();
        self.notice = Some(format!("Theme: {}", theme.as_str()));
    }

    pub fn toggle_save_to_memory(&mut self) {
        let enabled = !self.workspace.preferences().save_to_memory;
        self.workspace.set_save_to_memory(enabled);
        self.notice = Some(if enabled {
            "Chat history will be saved".to_string()
        } else {
            "Chat history will not be saved".to_string()
        });
    }

    // Message selection and scrolling

    pub fn select_next_message(&mut self) {
        let len = self.conversation.messages().len();
        if len == 0 {
            return;
        }
        self.selected_message = Some(match self.selected_message {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        });
    }

    pub fn select_prev_message(&mut self) {
        let len = self.conversation.messages().len();
        if len == 0 {
            return;
        }
        self.selected_message = Some(match self.selected_message {
            Some(i) => i.saturating_sub(1),
            None => len - 1,
        });
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.is_loading() || self.knowledge_base.uploading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest message (or "Thinking...") is visible.
    /// The next render clamps this to the last page of wrapped rows.
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = u16::MAX;
    }

    /// Cancel outstanding work before the process exits
    pub fn shutdown(&mut self) {
        if self.conversation.cancel_in_flight() {
            tracing::info!("cancelled pending request on exit");
        }
    }
}

/// `~/notes.md` → `$HOME/notes.md`
pub fn expand_home(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

/// Pipe text to the platform clipboard tool. Returns false when none ran.
fn copy_to_clipboard(text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let candidates: &[(&str, &[&str])] = &[
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
    ];

    for (program, args) in candidates {
        if let Ok(mut child) = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(text.as_bytes());
            }
            let _ = child.wait();
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::{ChatMessage, MemoryStore};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let workspace = Workspace::load(Box::new(MemoryStore::new()));
        // Nothing listens here; requests fail fast with a connection error
        let client = RagClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        (App::new(workspace, client, tx), rx)
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/a.md"), PathBuf::from("/tmp/a.md"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/a.md"), home.join("a.md"));
        }
    }

    #[test]
    fn test_personalization_rows_cover_every_dial() {
        let rows = personalization_rows();
        assert_eq!(rows.len(), DialKind::all().len() + 2);
        assert_eq!(rows[0], PersonalizationRow::BaseStyle);
        assert_eq!(rows.last(), Some(&PersonalizationRow::Reset));
    }

    #[tokio::test]
    async fn test_send_without_chat_creates_one() {
        let (mut app, _rx) = app();
        assert!(app.conversation.chat_id().is_none());

        app.input = "What is in my documents?".to_string();
        app.send_message();

        assert!(app.conversation.is_loading());
        assert!(app.input.is_empty());
        let id = app.conversation.chat_id().unwrap().to_string();
        let chat = app.workspace.library().get(&id).unwrap();
        assert_eq!(chat.messages, vec![ChatMessage::user("What is in my documents?")]);
        assert_eq!(chat.title, "What is in my documents?");
        assert_eq!(app.chat_list_state.selected(), Some(0));
    }

    #[test]
    fn test_send_with_only_failed_attachment_is_ignored() {
        let (mut app, _rx) = app();
        let id = app.conversation.attach(ragchat_core::AttachedFile {
            id: 0,
            name: "broken.pdf".to_string(),
            size: 10,
            mime_type: "application/pdf".to_string(),
            status: ragchat_core::FileStatus::Uploading,
            path: PathBuf::from("broken.pdf"),
        });
        app.conversation.mark_failed(id);

        app.send_message();

        assert!(!app.conversation.is_loading());
        assert!(app.conversation.chat_id().is_none());
        assert!(app.workspace.library().is_empty());
    }

    #[tokio::test]
    async fn test_failed_ask_shows_inline_error() {
        let (mut app, mut rx) = app();
        app.input = "hello".to_string();
        app.send_message();

        let event = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(AppEvent::AskFinished { ticket, result }) = rx.recv().await {
                    return (ticket, result);
                }
            }
        })
        .await
        .unwrap();
        app.on_ask_finished(event.0, event.1);

        assert!(!app.conversation.is_loading());
        let messages = app.conversation.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.starts_with("❌ **Error**"));
    }

    #[tokio::test]
    async fn test_stop_discards_late_result() {
        let (mut app, _rx) = app();
        app.input = "hello".to_string();
        app.send_message();
        app.stop_generation();

        assert!(!app.conversation.is_loading());
        app.on_ask_finished(1, Err(ApiError::Cancelled));
        let messages = app.conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, ragchat_core::conversation::STOPPED_MESSAGE);
    }

    #[test]
    fn test_switching_chats_loads_their_messages() {
        let (mut app, _rx) = app();
        app.new_chat();
        let first = app.conversation.chat_id().unwrap().to_string();
        app.workspace
            .on_messages_update(&first, vec![ChatMessage::user("first chat")]);
        app.new_chat();
        let second = app.conversation.chat_id().unwrap().to_string();
        assert_ne!(first, second);
        assert!(app.conversation.messages().is_empty());

        app.open_chat(&first);
        assert_eq!(app.conversation.chat_id(), Some(first.as_str()));
        assert_eq!(app.conversation.messages()[0].content, "first chat");
    }

    #[tokio::test]
    async fn test_clear_chat_removes_it_from_history() {
        let (mut app, _rx) = app();
        app.input = "q".to_string();
        app.send_message();
        let id = app.conversation.chat_id().unwrap().to_string();
        assert!(app.workspace.library().get(&id).is_some());

        app.clear_chat();
        assert!(app.conversation.messages().is_empty());
        assert!(!app.conversation.is_loading());
        assert!(app.workspace.library().get(&id).is_none());
        assert_eq!(app.chat_list_state.selected(), None);
    }

    #[test]
    fn test_personalization_activate_cycles_and_resets() {
        let (mut app, _rx) = app();
        app.open_personalization();
        app.personalization_nav_down(); // first dial
        app.personalization_activate();
        assert!(!app.workspace.preferences().personalization.is_default());

        for _ in 0..personalization_rows().len() {
            app.personalization_nav_down();
        }
        app.personalization_activate();
        assert!(app.workspace.preferences().personalization.is_default());
    }

    #[test]
    fn test_models_loaded_defaults_selection() {
        let (mut app, _rx) = app();
        app.on_models_loaded(Ok(vec![
            ModelInfo { name: "gemma3".to_string() },
            ModelInfo { name: "llama3".to_string() },
        ]));
        assert_eq!(app.workspace.preferences().selected_model, "gemma3");

        app.open_model_picker();
        app.model_picker_nav_down();
        app.select_model();
        assert_eq!(app.workspace.preferences().selected_model, "llama3");
        assert!(!app.show_model_picker);
    }

    #[test]
    fn test_message_selection_bounds() {
        let (mut app, _rx) = app();
        app.select_next_message();
        assert_eq!(app.selected_message, None);

        app.new_chat();
        let id = app.conversation.chat_id().unwrap().to_string();
        app.workspace.on_messages_update(
            &id,
            vec![ChatMessage::user("q"), ChatMessage::assistant("a")],
        );
        // Reload the panel from the library
        app.conversation.switch_chat(None, Vec::new());
        app.open_chat(&id);

        app.select_prev_message();
        assert_eq!(app.selected_message, Some(1));
        app.select_next_message();
        assert_eq!(app.selected_message, Some(1));
        app.select_prev_message();
        app.select_prev_message();
        assert_eq!(app.selected_message, Some(0));
    }
}
