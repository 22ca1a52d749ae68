use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use ragchat_core::{
    parse_message_content, ChatMessage, ContentPart, FileStatus, StatusMessage, Theme,
};

use crate::app::{personalization_rows, App, FocusPane, InputMode, PathPurpose, PersonalizationRow, Screen};

/// Colours for the active theme
struct Palette {
    accent: Color,
    user: Color,
    assistant: Color,
    dim: Color,
    code: Color,
    error: Color,
    success: Color,
    bar_bg: Color,
    bar_fg: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                accent: Color::Cyan,
                user: Color::Cyan,
                assistant: Color::Yellow,
                dim: Color::DarkGray,
                code: Color::LightGreen,
                error: Color::LightRed,
                success: Color::LightGreen,
                bar_bg: Color::DarkGray,
                bar_fg: Color::White,
            },
            Theme::Light => Self {
                accent: Color::Blue,
                user: Color::Blue,
                assistant: Color::Magenta,
                dim: Color::Gray,
                code: Color::Green,
                error: Color::Red,
                success: Color::Green,
                bar_bg: Color::Gray,
                bar_fg: Color::Black,
            },
        }
    }
}

/// Parse a line of text and convert **bold** and `inline code` markdown to styled spans
fn parse_markdown_line(text: &str, code_style: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                // Consume the second *
                chars.next();

                // Push any accumulated plain text
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }

                // Find closing **
                let mut bold_text = String::new();
                let mut found_close = false;

                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next(); // consume second *
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                }
            }
            '`' => {
                let mut code_text = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    code_text.push(c);
                }

                if found_close && !code_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(code_text, code_style));
                } else {
                    current_text.push('`');
                    current_text.push_str(&code_text);
                    if found_close {
                        current_text.push('`');
                    }
                }
            }
            _ => current_text.push(c),
        }
    }

    // Push any remaining text
    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Lines for one message: role header, attachments, then prose and code blocks
fn message_lines(message: &ChatMessage, selected: bool, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, color) = if message.is_user() {
        ("You", palette.user)
    } else {
        ("Assistant", palette.assistant)
    };
    let mut header_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    if selected {
        header_style = header_style.add_modifier(Modifier::REVERSED);
    }
    let marker = if selected { "▶ " } else { "" };
    lines.push(Line::from(Span::styled(format!("{}{}:", marker, label), header_style)));

    for attachment in &message.attachments {
        lines.push(Line::from(Span::styled(
            format!("📎 {} ({})", attachment.name, attachment.mime_type),
            Style::default().fg(palette.dim),
        )));
    }

    let code_style = Style::default().fg(palette.code);
    let is_alert = message.content.starts_with('❌') || message.content.starts_with('⚠');

    for part in parse_message_content(&message.content) {
        match part {
            ContentPart::Markdown(text) => {
                for line in text.lines() {
                    let line = parse_markdown_line(line, code_style);
                    if is_alert {
                        lines.push(line.style(Style::default().fg(palette.error)));
                    } else {
                        lines.push(line);
                    }
                }
            }
            ContentPart::Code { language, content } => {
                lines.push(Line::from(Span::styled(
                    format!("┌─ {} ", language),
                    Style::default().fg(palette.dim),
                )));
                for line in content.lines() {
                    lines.push(Line::from(vec![
                        Span::styled("│ ", Style::default().fg(palette.dim)),
                        Span::styled(line.to_string(), code_style),
                    ]));
                }
                lines.push(Line::from(Span::styled("└─", Style::default().fg(palette.dim))));
            }
        }
    }

    lines.push(Line::default());
    lines
}

/// Centered popup area
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.workspace.preferences().theme);

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area, &palette);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area, &palette),
        Screen::Documents => render_documents_screen(app, frame, body_area, &palette),
    }

    render_footer(app, frame, footer_area, &palette);

    // Render popups (in order of priority)
    if app.show_help {
        render_help(frame, area, &palette);
    } else if app.path_prompt.is_some() {
        render_path_prompt(app, frame, area, &palette);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area, &palette);
    } else if app.show_personalization {
        render_personalization(app, frame, area, &palette);
    } else if app.conversation.editing().is_some() {
        render_message_editor(app, frame, area, &palette);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let prefs = app.workspace.preferences();
    let model = if prefs.selected_model.is_empty() {
        "no model".to_string()
    } else {
        prefs.selected_model.clone()
    };
    let memory = if prefs.save_to_memory { "memory on" } else { "memory off" };
    let style_indicator = if prefs.personalization.is_default() {
        String::new()
    } else {
        " [personalized]".to_string()
    };

    let title = Line::from(vec![
        Span::styled(" RAG Chat ", Style::default().fg(palette.accent).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.bar_fg),
        ),
        Span::raw("│ "),
        Span::styled(model, Style::default().fg(palette.bar_fg).bold()),
        Span::styled(style_indicator, Style::default().fg(palette.bar_fg)),
        Span::raw(" │ "),
        Span::styled(memory, Style::default().fg(palette.bar_fg)),
        Span::raw(" │ "),
        Span::styled(app.client().base_url().to_string(), Style::default().fg(palette.bar_fg)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(palette.bar_bg).fg(palette.bar_fg));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Chat => " CHAT ",
        Screen::Documents => " DOCS ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |k: &'static str, label: &'static str| {
        vec![
            Span::styled(format!(" {} ", k), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let hints: Vec<Span> = if let Some(notice) = &app.notice {
        vec![Span::styled(
            format!(" {} ", notice),
            Style::default().bg(Color::Black).fg(palette.accent),
        )]
    } else if app.conversation.editing().is_some() {
        [hint("Enter", "send"), hint("Alt+Enter", "newline"), hint("Esc", "cancel")].concat()
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Documents, _) => {
                if app.knowledge_base.confirm_clear {
                    [hint("y", "confirm clear"), hint("any", "cancel")].concat()
                } else if app.knowledge_base.has_documents() {
                    [
                        hint("u", "upload"),
                        hint("C", "clear all"),
                        hint("r", "refresh"),
                        hint("Esc", "chat"),
                        hint("q", "quit"),
                    ]
                    .concat()
                } else {
                    [hint("u", "upload"), hint("r", "refresh"), hint("Esc", "chat"), hint("q", "quit")]
                        .concat()
                }
            }
            (Screen::Chat, InputMode::Editing) => {
                let mut hints = vec![hint("Enter", "send"), hint("Ctrl+O", "attach")];
                if app.conversation.is_loading() {
                    hints.push(hint("Ctrl+S", "stop"));
                }
                hints.push(hint("Esc", "stop typing"));
                hints.concat()
            }
            (Screen::Chat, InputMode::Normal) => {
                let mut hints = vec![hint("Tab", "focus")];
                match app.focus {
                    FocusPane::Sidebar => {
                        hints.push(hint("Enter", "open"));
                        hints.push(hint("n", "new"));
                        hints.push(hint("d", "delete"));
                    }
                    FocusPane::Messages | FocusPane::Input => {
                        hints.push(hint("j/k", "select"));
                        hints.push(hint("e", "edit"));
                        hints.push(hint("r", "regenerate"));
                        hints.push(hint("c", "copy"));
                    }
                }
                if app.conversation.is_loading() {
                    hints.push(hint("s", "stop"));
                }
                hints.push(hint("M", "model"));
                hints.push(hint("P", "style"));
                hints.push(hint("D", "documents"));
                hints.push(hint("?", "help"));
                hints.concat()
            }
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Length(30.min(area.width / 3)),
        Constraint::Min(0),
    ])
    .areas(area);

    let attach_height = if app.conversation.attached_files().is_empty() {
        0
    } else {
        (app.conversation.attached_files().len().min(4) + 2) as u16
    };

    let [messages_area, attach_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(attach_height),
        Constraint::Length(3),
    ])
    .areas(main_area);

    // Store areas for mouse hit-testing
    app.sidebar_area = Some(sidebar_area);
    app.messages_area = Some(messages_area);

    // Inner height, minus borders
    app.chat_height = messages_area.height.saturating_sub(2);

    render_sidebar(app, frame, sidebar_area, palette);
    render_messages(app, frame, messages_area, palette);
    if attach_height > 0 {
        render_attachments(app, frame, attach_area, palette);
    }
    render_input(app, frame, input_area, palette);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { palette.accent } else { palette.dim };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chats ({}) ", app.workspace.library().len()));

    if app.workspace.library().is_empty() {
        let placeholder = Paragraph::new("No chats yet.\nPress 'n' to start one.")
            .style(Style::default().fg(palette.dim))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let current = app.workspace.current_chat_id().map(str::to_string);
    let items: Vec<ListItem> = app
        .workspace
        .library()
        .iter()
        .map(|chat| {
            let is_current = current.as_deref() == Some(chat.id.as_str());
            let style = if is_current {
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(Span::styled(chat.title.clone(), style)),
                Line::from(Span::styled(
                    chat.updated_at.format("%b %d %H:%M").to_string(),
                    Style::default().fg(palette.dim),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.chat_list_state);
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let focused = app.focus == FocusPane::Messages;
    let border_color = if focused { palette.accent } else { palette.dim };

    let title = app
        .workspace
        .current_chat()
        .map(|c| format!(" {} ", c.title))
        .unwrap_or_else(|| " Chat ".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let messages = app.conversation.messages();
    let loading = app.conversation.is_loading();

    let chat_text = if messages.is_empty() && !loading {
        let (headline, subline) = if app.conversation.chat_id().is_none() {
            ("Create a new chat to start", "Press 'n' or just start typing")
        } else {
            ("How can I help you today?", "Ask me anything about your documents")
        };
        Text::from(vec![
            Line::default(),
            Line::from(Span::styled(headline, Style::default().bold())),
            Line::from(Span::styled(subline, Style::default().fg(palette.dim))),
        ])
        .centered()
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for (i, msg) in messages.iter().enumerate() {
            lines.extend(message_lines(msg, app.selected_message == Some(i), palette));
        }

        if loading {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(palette.assistant).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(palette.dim).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chat = Paragraph::new(chat_text).wrap(Wrap { trim: false });
    app.chat_scroll = app.chat_scroll.min(max_scroll(&chat, inner));
    frame.render_widget(chat.scroll((app.chat_scroll, 0)), inner);
}

/// Highest scroll offset that still fills `area`, counted in wrapped rows
fn max_scroll(paragraph: &Paragraph, area: Rect) -> u16 {
    let rows = paragraph.line_count(area.width);
    u16::try_from(rows.saturating_sub(area.height as usize)).unwrap_or(u16::MAX)
}

fn render_attachments(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.dim))
        .title(" Attachments (X to remove last) ");

    let items: Vec<ListItem> = app
        .conversation
        .attached_files()
        .iter()
        .map(|file| {
            let (status, color) = match file.status {
                FileStatus::Uploading => ("uploading…", palette.dim),
                FileStatus::Uploaded => ("ready", palette.success),
                FileStatus::Error => ("failed", palette.error),
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("📎 {} ", file.name)),
                Span::styled(format!("{} ", file.size_kb()), Style::default().fg(palette.dim)),
                Span::styled(status, Style::default().fg(color)),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    // Highlight when focused or editing
    let input_focused = app.focus == FocusPane::Input;
    let border_color = if input_focused || app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        palette.dim
    };

    let title = if app.conversation.is_loading() {
        " Waiting for answer (s to stop) "
    } else {
        " Message (i to type) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Newlines shown as one glyph so the cursor column still lines up
    let visible_text: String = app
        .input
        .chars()
        .map(|c| if c == '\n' { '↵' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(palette.user))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing && app.screen == Screen::Chat {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_documents_screen(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let kb = &app.knowledge_base;

    let [summary_area, list_area, status_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Summary
    let summary_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Knowledge Base ");

    let summary = match &kb.stats {
        Some(stats) => vec![
            Line::from(vec![
                Span::raw("Documents: "),
                Span::styled(stats.total_documents.to_string(), Style::default().bold()),
                Span::raw("   Chunks: "),
                Span::styled(stats.total_chunks.to_string(), Style::default().bold()),
            ]),
            Line::from(Span::styled(
                "Supported: PDF, TXT, MD",
                Style::default().fg(palette.dim),
            )),
        ],
        None if app.documents_loading => vec![Line::from(Span::styled(
            "Loading...",
            Style::default().fg(palette.dim),
        ))],
        None => vec![Line::from(Span::styled(
            "Could not reach the backend. Press 'r' to retry.",
            Style::default().fg(palette.error),
        ))],
    };
    frame.render_widget(Paragraph::new(summary).block(summary_block), summary_area);

    // Document list
    let list_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.dim))
        .title(" Documents ");

    let documents: Vec<String> = kb
        .stats
        .as_ref()
        .map(|s| s.documents.clone())
        .unwrap_or_default();
    if documents.is_empty() {
        let placeholder = Paragraph::new("No documents uploaded yet.\nPress 'u' to upload one.")
            .style(Style::default().fg(palette.dim))
            .block(list_block);
        frame.render_widget(placeholder, list_area);
    } else {
        let items: Vec<ListItem> = documents
            .into_iter()
            .map(|name| ListItem::new(format!(" 📄 {}", name)))
            .collect();
        frame.render_widget(List::new(items).block(list_block), list_area);
    }

    // Status line
    let status_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.dim));

    let status = if kb.confirm_clear {
        Line::from(Span::styled(
            "Clear all documents from the knowledge base? Press 'y' to confirm.",
            Style::default().fg(palette.error).bold(),
        ))
    } else if kb.uploading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::from(Span::styled(
            format!("Uploading{}", dots),
            Style::default().fg(palette.dim).add_modifier(Modifier::ITALIC),
        ))
    } else {
        match &kb.message {
            Some(msg @ StatusMessage::Error(_)) => {
                Line::from(Span::styled(msg.text().to_string(), Style::default().fg(palette.error)))
            }
            Some(msg) => {
                Line::from(Span::styled(msg.text().to_string(), Style::default().fg(palette.success)))
            }
            None => Line::default(),
        }
    };
    frame.render_widget(
        Paragraph::new(status).block(status_block).wrap(Wrap { trim: true }),
        status_area,
    );
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let height = (app.available_models.len().max(1) as u16) + 2;
    let popup_area = popup_rect(area, 44, height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Select Model (Enter to select, r to refresh) ");

    if app.available_models.is_empty() {
        let text = match &app.models_error {
            Some(e) => format!("Could not load models: {}", e),
            None => "No models available".to_string(),
        };
        let placeholder = Paragraph::new(text)
            .style(Style::default().fg(palette.dim))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(placeholder, popup_area);
        return;
    }

    let selected = app.workspace.preferences().selected_model.clone();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if *model == selected {
                Style::default().fg(palette.success).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

fn render_personalization(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let rows = personalization_rows();
    let popup_area = popup_rect(area, 46, rows.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Personalization (Enter to change) ");

    let p = app.workspace.preferences().personalization;
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| match row {
            PersonalizationRow::BaseStyle => ListItem::new(Line::from(vec![
                Span::raw(format!(" {:<16}", "Base style")),
                Span::styled(p.base_style.as_str(), Style::default().fg(palette.accent)),
            ])),
            PersonalizationRow::Dial(kind) => ListItem::new(Line::from(vec![
                Span::raw(format!(" {:<16}", kind.display_name())),
                Span::styled(p.dial(*kind).as_str(), Style::default().fg(palette.accent)),
            ])),
            PersonalizationRow::Reset => ListItem::new(Span::styled(
                " Reset to defaults",
                Style::default().fg(palette.dim),
            )),
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.personalization_state);
}

fn render_path_prompt(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let popup_area = popup_rect(area, 64, 5);
    frame.render_widget(Clear, popup_area);

    let title = match app.path_prompt {
        Some(PathPurpose::Upload) => " Upload to knowledge base ",
        _ => " Attach file ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Path to a PDF, TXT, or MD file. Enter to upload, Esc to cancel.")
        .style(Style::default().fg(palette.dim));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let width = input_area.width as usize;
    let scroll_offset = (app.path_cursor + 1).saturating_sub(width);
    let visible: String = app.path_input.chars().skip(scroll_offset).take(width).collect();
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(palette.user)),
        input_area,
    );

    let cursor_x = app.path_cursor.saturating_sub(scroll_offset) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_message_editor(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let Some(edit) = app.conversation.editing() else {
        return;
    };

    let popup_area = popup_rect(area, 72, 12);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Edit message (Enter to send, Esc to cancel) ");

    // Show the cursor inline; the text wraps so a terminal cursor would drift
    let mut content: String = edit.content.chars().take(app.edit_cursor).collect();
    content.push('▏');
    content.extend(edit.content.chars().skip(app.edit_cursor));

    let text = Text::from(
        content
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect::<Vec<_>>(),
    );
    let editor = Paragraph::new(text)
        .style(Style::default().fg(palette.user))
        .wrap(Wrap { trim: false })
        .block(block);
    frame.render_widget(editor, popup_area);
}

fn render_help(frame: &mut Frame, area: Rect, palette: &Palette) {
    let entries: &[(&str, &str)] = &[
        ("n", "new chat"),
        ("Enter", "open chat / edit message"),
        ("d", "delete chat (sidebar)"),
        ("i / Tab", "type a message"),
        ("Alt+Enter", "newline while typing"),
        ("j / k", "move selection"),
        ("e", "edit selected message"),
        ("r", "regenerate answer"),
        ("c", "copy selected message"),
        ("s", "stop generating"),
        ("x", "clear chat"),
        ("a / X", "attach file / remove last"),
        ("M", "choose model"),
        ("P", "personalization"),
        ("t", "toggle theme"),
        ("m", "toggle saving chat history"),
        ("D", "documents"),
        ("q / Ctrl+C", "quit"),
    ];

    let popup_area = popup_rect(area, 50, entries.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Keys (any key to close) ");

    let lines: Vec<Line> = entries
        .iter()
        .map(|(k, label)| {
            Line::from(vec![
                Span::styled(format!(" {:<12}", k), Style::default().fg(palette.accent).bold()),
                Span::raw(*label),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::{MemoryStore, RagClient, Workspace};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn app_with(messages: Vec<ChatMessage>) -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let workspace = Workspace::load(Box::new(MemoryStore::new()));
        let client = RagClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let mut app = App::new(workspace, client, tx);
        app.conversation.switch_chat(Some("c1".to_string()), messages);
        app
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn long_answer() -> ChatMessage {
        ChatMessage::assistant(format!("{}ENDMARK", "lorem ".repeat(330)))
    }

    #[test]
    fn test_scroll_to_bottom_reaches_end_of_wrapped_answer() {
        let mut app = app_with(vec![ChatMessage::user("tell me everything"), long_answer()]);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert!(!screen_text(&terminal).contains("ENDMARK"));

        app.scroll_chat_to_bottom();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert!(screen_text(&terminal).contains("ENDMARK"));
        assert!(app.chat_scroll > 0);
        assert!(app.chat_scroll < u16::MAX);
    }

    #[test]
    fn test_scrolling_down_stops_at_last_wrapped_row() {
        let mut app = app_with(vec![ChatMessage::user("tell me everything"), long_answer()]);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        for _ in 0..50 {
            app.scroll_down(3);
            terminal.draw(|frame| render(&mut app, frame)).unwrap();
        }
        let bottom = app.chat_scroll;
        assert!(screen_text(&terminal).contains("ENDMARK"));

        app.scroll_down(3);
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert_eq!(app.chat_scroll, bottom);

        app.scroll_up(1);
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert_eq!(app.chat_scroll, bottom - 1);
    }

    #[test]
    fn test_history_taller_than_u16_rows_scrolls_without_overflow() {
        let history: Vec<ChatMessage> = (0..20_000)
            .flat_map(|i| {
                [
                    ChatMessage::user(format!("question {}", i)),
                    ChatMessage::assistant(format!("answer {}", i)),
                ]
            })
            .collect();
        let mut app = app_with(history);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        app.scroll_chat_to_bottom();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert_eq!(app.chat_scroll, u16::MAX);

        app.scroll_up(10);
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert_eq!(app.chat_scroll, u16::MAX - 10);
    }

    #[test]
    fn test_short_chat_never_scrolls() {
        let mut app = app_with(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        app.scroll_chat_to_bottom();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert_eq!(app.chat_scroll, 0);
        assert!(screen_text(&terminal).contains("hello"));
    }

    #[test]
    fn test_markdown_bold_and_inline_code() {
        let code = Style::default().fg(Color::Green);
        let line = parse_markdown_line("run **now** with `cargo`", code);
        assert_eq!(plain(&line), "run now with cargo");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[3].style, code);
    }

    #[test]
    fn test_markdown_unclosed_markers_are_literal() {
        let line = parse_markdown_line("a **b and `c", Style::default());
        assert_eq!(plain(&line), "a **b and `c");
    }

    #[test]
    fn test_message_lines_render_code_block() {
        let palette = Palette::for_theme(Theme::Dark);
        let msg = ChatMessage::assistant("Try:\n```rust\nfn main() {}\n```");
        let lines = message_lines(&msg, false, &palette);
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text[0], "Assistant:");
        assert_eq!(text[1], "Try:");
        assert_eq!(text[2], "┌─ rust ");
        assert_eq!(text[3], "│ fn main() {}");
        assert_eq!(text[4], "└─");
    }

    #[test]
    fn test_selected_message_is_marked() {
        let palette = Palette::for_theme(Theme::Light);
        let lines = message_lines(&ChatMessage::user("hi"), true, &palette);
        assert_eq!(plain(&lines[0]), "▶ You:");
    }

    #[test]
    fn test_popup_rect_is_centered_and_clamped() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = popup_rect(area, 40, 10);
        assert_eq!(popup, Rect::new(30, 15, 40, 10));

        let small = popup_rect(Rect::new(0, 0, 20, 8), 40, 10);
        assert_eq!(small.width, 16);
        assert_eq!(small.height, 4);
    }
}
