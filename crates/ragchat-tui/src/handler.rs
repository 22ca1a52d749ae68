use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode, PathPurpose, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply a line-editing key to `text`. Returns false for keys it ignores.
fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    let char_count = text.chars().count();
    *cursor = (*cursor).min(char_count);

    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = char_count;
        }
        // Alt+Enter starts a new line
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, '\n');
            *cursor += 1;
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::AskFinished { ticket, result } => app.on_ask_finished(ticket, result),
        AppEvent::UploadFinished { attachment, result } => {
            app.on_upload_finished(attachment, result)
        }
        AppEvent::DocumentsLoaded(result) => app.on_documents_loaded(result),
        AppEvent::DocumentsCleared(result) => app.on_documents_cleared(result),
        AppEvent::ModelsLoaded(result) => app.on_models_loaded(result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    app.notice = None;

    if app.show_help {
        app.show_help = false;
        return Ok(());
    }

    if app.path_prompt.is_some() {
        handle_path_prompt(app, key);
        return Ok(());
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
        return Ok(());
    }

    if app.show_personalization {
        handle_personalization(app, key);
        return Ok(());
    }

    if app.conversation.editing().is_some() {
        handle_message_edit(app, key);
        return Ok(());
    }

    match app.screen {
        Screen::Documents => handle_documents(app, key),
        Screen::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_chat_editing(app, key),
        },
    }

    Ok(())
}

fn handle_path_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_path_prompt(),
        KeyCode::Enter => app.submit_path_prompt(),
        _ => {
            edit_text(&mut app.path_input, &mut app.path_cursor, key);
        }
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.show_model_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.model_picker_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.model_picker_nav_up();
        }
        KeyCode::Char('r') => {
            app.refresh_models();
        }
        KeyCode::Enter => {
            app.select_model();
        }
        _ => {}
    }
}

fn handle_personalization(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('P') => {
            app.show_personalization = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.personalization_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.personalization_nav_up();
        }
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Right | KeyCode::Char('l') => {
            app.personalization_activate();
        }
        _ => {}
    }
}

fn handle_message_edit(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.conversation.cancel_edit(),
        KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => app.commit_edit(),
        _ => {
            let mut cursor = app.edit_cursor;
            if let Some(edit) = app.conversation.editing_mut() {
                edit_text(&mut edit.content, &mut cursor, key);
            }
            app.edit_cursor = cursor;
        }
    }
}

fn handle_documents(app: &mut App, key: KeyEvent) {
    // Pending "clear all documents?" confirmation
    if app.knowledge_base.confirm_clear {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('C') => {
                app.request_clear_documents()
            }
            _ => app.knowledge_base.cancel_clear(),
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc | KeyCode::Char('D') | KeyCode::Tab => app.screen = Screen::Chat,
        KeyCode::Char('u') | KeyCode::Char('a') => app.open_path_prompt(PathPurpose::Upload),
        KeyCode::Char('C') => app.request_clear_documents(),
        KeyCode::Char('r') => app.refresh_documents(),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('t') => app.toggle_theme(),
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,

        // Focus
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Sidebar => FocusPane::Messages,
                FocusPane::Messages => {
                    app.input_mode = InputMode::Editing;
                    FocusPane::Input
                }
                FocusPane::Input => FocusPane::Sidebar,
            };
        }
        KeyCode::BackTab => {
            app.focus = match app.focus {
                FocusPane::Sidebar => {
                    app.input_mode = InputMode::Editing;
                    FocusPane::Input
                }
                FocusPane::Messages => FocusPane::Sidebar,
                FocusPane::Input => FocusPane::Messages,
            };
        }
        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('h') | KeyCode::Left => app.focus = FocusPane::Sidebar,
        KeyCode::Char('l') | KeyCode::Right => app.focus = FocusPane::Messages,

        // Half-page scroll
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down((app.chat_height / 2).max(1));
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up((app.chat_height / 2).max(1));
        }
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_down(),
            _ => app.select_next_message(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_up(),
            _ => app.select_prev_message(),
        },
        KeyCode::Char('g') => {
            if app.focus == FocusPane::Messages {
                app.chat_scroll = 0;
                if !app.conversation.messages().is_empty() {
                    app.selected_message = Some(0);
                }
            }
        }
        KeyCode::Char('G') => {
            if app.focus == FocusPane::Messages {
                app.scroll_chat_to_bottom();
                app.selected_message = app.conversation.messages().len().checked_sub(1);
            }
        }
        KeyCode::Enter => match app.focus {
            FocusPane::Sidebar => app.open_selected_chat(),
            FocusPane::Messages => app.start_edit_selected(),
            FocusPane::Input => app.input_mode = InputMode::Editing,
        },
        KeyCode::Esc => {
            app.selected_message = None;
        }

        // Chats
        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('d') => {
            if app.focus == FocusPane::Sidebar {
                app.delete_selected_chat();
            }
        }
        KeyCode::Char('x') => app.clear_chat(),

        // Message actions
        KeyCode::Char('e') => app.start_edit_selected(),
        KeyCode::Char('r') => app.regenerate_selected(),
        KeyCode::Char('c') => app.copy_selected_message(),
        KeyCode::Char('s') => app.stop_generation(),

        // Attachments
        KeyCode::Char('a') => app.open_path_prompt(PathPurpose::Attach),
        KeyCode::Char('X') => app.remove_last_attachment(),

        // Settings
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('P') => app.open_personalization(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('m') => app.toggle_save_to_memory(),

        // Knowledge base
        KeyCode::Char('D') => {
            app.screen = Screen::Documents;
            app.refresh_documents();
        }
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Messages;
        }
        KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => {
            app.send_message();
        }
        // Attach without leaving the composer
        KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.open_path_prompt(PathPurpose::Attach);
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.stop_generation();
        }
        _ => {
            edit_text(&mut app.input, &mut app.input_cursor, key);
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }

    let x = mouse.column;
    let y = mouse.row;

    // Determine which area the mouse is in (position-based scrolling)
    let in_sidebar = app
        .sidebar_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);
    let in_messages = app
        .messages_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_messages {
                app.scroll_down(3);
            } else if in_sidebar {
                app.sidebar_nav_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_messages {
                app.scroll_up(3);
            } else if in_sidebar {
                app.sidebar_nav_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use ragchat_core::{MemoryStore, RagClient, Workspace};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let workspace = Workspace::load(Box::new(MemoryStore::new()));
        let client = RagClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        (App::new(workspace, client, tx), rx)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_key(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 0), 0);
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("héllo", 10), 6);
    }

    #[test]
    fn test_edit_text_multibyte() {
        let mut text = String::new();
        let mut cursor = 0;
        for c in "añb".chars() {
            edit_text(&mut text, &mut cursor, key(KeyCode::Char(c)));
        }
        assert_eq!(text, "añb");

        edit_text(&mut text, &mut cursor, key(KeyCode::Left));
        edit_text(&mut text, &mut cursor, key(KeyCode::Backspace));
        assert_eq!(text, "ab");
        assert_eq!(cursor, 1);

        edit_text(&mut text, &mut cursor, key(KeyCode::Home));
        edit_text(&mut text, &mut cursor, key(KeyCode::Delete));
        assert_eq!(text, "b");

        edit_text(&mut text, &mut cursor, key(KeyCode::End));
        let alt_enter = KeyEvent {
            modifiers: KeyModifiers::ALT,
            ..key(KeyCode::Enter)
        };
        edit_text(&mut text, &mut cursor, alt_enter);
        assert_eq!(text, "b\n");
    }

    #[test]
    fn test_edit_text_ignores_control_chars() {
        let mut text = "abc".to_string();
        let mut cursor = 3;
        assert!(!edit_text(&mut text, &mut cursor, ctrl('w')));
        assert_eq!(text, "abc");
    }

    #[test]
    fn test_ctrl_c_quits_from_any_mode() {
        let (mut app, _rx) = app();
        app.show_model_picker = true;
        handle_key(&mut app, ctrl('c')).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_new_chat_then_type_and_send() {
        let (mut app, _rx) = app();
        handle_key(&mut app, key(KeyCode::Char('n'))).unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(app.conversation.chat_id().is_some());

        type_text(&mut app, "hi there");
        assert_eq!(app.input, "hi there");
        handle_key(&mut app, key(KeyCode::Enter)).unwrap();

        assert!(app.input.is_empty());
        assert!(app.conversation.is_loading());
        assert_eq!(app.conversation.messages().len(), 1);

        // Escape then stop
        handle_key(&mut app, key(KeyCode::Esc)).unwrap();
        handle_key(&mut app, key(KeyCode::Char('s'))).unwrap();
        assert!(!app.conversation.is_loading());
    }

    #[test]
    fn test_path_prompt_swallows_keys() {
        let (mut app, _rx) = app();
        handle_key(&mut app, key(KeyCode::Char('a'))).unwrap();
        assert_eq!(app.path_prompt, Some(PathPurpose::Attach));

        type_text(&mut app, "q/notes.txt");
        assert!(!app.should_quit);
        assert_eq!(app.path_input, "q/notes.txt");

        handle_key(&mut app, key(KeyCode::Esc)).unwrap();
        assert!(app.path_prompt.is_none());
    }

    #[test]
    fn test_unsupported_attachment_sets_notice() {
        let (mut app, _rx) = app();
        handle_key(&mut app, key(KeyCode::Char('a'))).unwrap();
        type_text(&mut app, "/tmp/picture.png");
        handle_key(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(
            app.notice.as_deref(),
            Some("Please select a PDF, TXT, or MD file")
        );
        assert!(app.conversation.attached_files().is_empty());
    }

    #[test]
    fn test_documents_clear_needs_confirmation() {
        let (mut app, _rx) = app();
        app.screen = Screen::Documents;
        handle_key(&mut app, key(KeyCode::Char('C'))).unwrap();
        assert!(app.knowledge_base.confirm_clear);

        handle_key(&mut app, key(KeyCode::Char('n'))).unwrap();
        assert!(!app.knowledge_base.confirm_clear);
        assert_eq!(app.screen, Screen::Documents);
    }

    #[test]
    fn test_help_closes_on_any_key() {
        let (mut app, _rx) = app();
        handle_key(&mut app, key(KeyCode::Char('?'))).unwrap();
        assert!(app.show_help);
        handle_key(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }
}
