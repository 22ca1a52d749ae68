//! Splitting assistant replies into prose and fenced code segments.

use regex::Regex;
use std::sync::OnceLock;

/// A render-time segment of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Prose, rendered with inline markdown styling
    Markdown(String),
    /// A fenced code block
    Code { language: String, content: String },
}

fn code_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(\w+)?\n?(.*?)```").expect("code fence pattern is valid"))
}

/// Parse a message body into markdown and code parts.
///
/// Prose around fences is trimmed and dropped when empty. A fence without a
/// language is tagged `text`. When nothing is produced the whole content is
/// returned as a single markdown part, untouched.
pub fn parse_message_content(content: &str) -> Vec<ContentPart> {
    let mut parts = Vec::new();
    let mut last_index = 0;

    for caps in code_fence_regex().captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };

        if whole.start() > last_index {
            let text = content[last_index..whole.start()].trim();
            if !text.is_empty() {
                parts.push(ContentPart::Markdown(text.to_string()));
            }
        }

        let language = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "text".to_string());
        let code = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        parts.push(ContentPart::Code {
            language,
            content: code.to_string(),
        });

        last_index = whole.end();
    }

    if last_index < content.len() {
        let text = content[last_index..].trim();
        if !text.is_empty() {
            parts.push(ContentPart::Markdown(text.to_string()));
        }
    }

    if parts.is_empty() {
        vec![ContentPart::Markdown(content.to_string())]
    } else {
        parts
    }
}
