//! Conversation panel logic: composing, editing and regenerating turns, and
//! the lifecycle of the single `/ask` request a conversation may have in
//! flight.
//!
//! Requests are identified by a ticket. Stopping, switching chats, clearing,
//! or superseding a request cancels its token and forgets the ticket, so a
//! result that still arrives later is dropped by [`Conversation::complete`].

use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, AskRequest, AskResponse};
use crate::state::{Attachment, ChatMessage, ChatRole};
use crate::upload::{AttachedFile, FileStatus};

pub const ATTACHMENT_ONLY_PROMPT: &str = "Summarize or analyze the attached document";
pub const NO_RESPONSE: &str = "No response received.";
pub const STOPPED_MESSAGE: &str = "⚠️ Response generation stopped by user.";
pub const RETRY_ERROR: &str = "❌ **Error**: Failed to get response. Please try again.";
pub const SEND_ERROR: &str = "❌ **Error**: Failed to get response. This could be due to:\n\n\
- Ollama taking too long to respond (timeout)\n\
- Ollama service not running\n\
- Backend server connection issue\n\n\
**Try:**\n\
1. Make sure Ollama is running: `ollama serve`\n\
2. Check if the model is available: `ollama list`\n\
3. Try asking a simpler question\n\
4. Wait a moment and try again";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Send,
    Edit,
    Regenerate,
}

/// A request the caller must run and report back through `complete`
#[derive(Debug, Clone)]
pub struct PendingAsk {
    pub ticket: u64,
    pub kind: RequestKind,
    pub request: AskRequest,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    kind: RequestKind,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub index: usize,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct Conversation {
    chat_id: Option<String>,
    messages: Vec<ChatMessage>,
    attached_files: Vec<AttachedFile>,
    editing: Option<EditState>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    next_attachment_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn attached_files(&self) -> &[AttachedFile] {
        &self.attached_files
    }

    pub fn editing(&self) -> Option<&EditState> {
        self.editing.as_ref()
    }

    pub fn editing_mut(&mut self) -> Option<&mut EditState> {
        self.editing.as_mut()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Load another chat's messages. Any pending request is cancelled.
    ///
    /// Returns false (and changes nothing) when `chat_id` is already current.
    pub fn switch_chat(&mut self, chat_id: Option<String>, messages: Vec<ChatMessage>) -> bool {
        if self.chat_id == chat_id {
            return false;
        }
        tracing::debug!(from = ?self.chat_id, to = ?chat_id, "switching chat");
        if self.cancel_in_flight() {
            tracing::info!("cancelled pending request on chat switch");
        }
        self.chat_id = chat_id;
        self.messages = messages;
        self.editing = None;
        true
    }

    /// Cancel and forget the pending request, if any
    pub fn cancel_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(flight) => {
                flight.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn start(&mut self, kind: RequestKind, request: AskRequest) -> PendingAsk {
        if self.cancel_in_flight() {
            tracing::debug!("superseded pending request");
        }
        self.next_ticket += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            ticket: self.next_ticket,
            kind,
            cancel: cancel.clone(),
        });
        PendingAsk {
            ticket: self.next_ticket,
            kind,
            request,
            cancel,
        }
    }

    pub fn has_uploaded_attachments(&self) -> bool {
        self.attached_files
            .iter()
            .any(|f| f.status == FileStatus::Uploaded)
    }

    /// Append a user turn and build its request.
    ///
    /// Nothing happens while a reply is pending or when there is neither text
    /// nor an uploaded attachment. Uploaded attachments go with the message;
    /// failed ones are dropped and ones still uploading stay attached.
    pub fn begin_send(
        &mut self,
        input: &str,
        personalization: &str,
        model: &str,
    ) -> Option<PendingAsk> {
        let input = input.trim();
        if self.is_loading() || (input.is_empty() && !self.has_uploaded_attachments()) {
            return None;
        }

        let text = if input.is_empty() {
            ATTACHMENT_ONLY_PROMPT.to_string()
        } else {
            input.to_string()
        };

        let attachments: Vec<Attachment> = self
            .attached_files
            .iter()
            .filter(|f| f.status == FileStatus::Uploaded)
            .map(|f| Attachment {
                name: f.name.clone(),
                mime_type: f.mime_type.clone(),
            })
            .collect();
        self.attached_files.retain(|f| f.status == FileStatus::Uploading);

        let text_with_context = if attachments.is_empty() {
            text.clone()
        } else {
            let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
            format!(
                "I have uploaded the following document(s): {}. {}",
                names.join(", "),
                text
            )
        };

        let history = self.messages.clone();
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: text,
            attachments,
        });

        let request = AskRequest {
            text: text_with_context,
            stream: false,
            history,
            personalization: personalization.to_string(),
            model: model.to_string(),
        };
        Some(self.start(RequestKind::Send, request))
    }

    /// Open a user message for editing
    pub fn start_edit(&mut self, index: usize) -> bool {
        match self.messages.get(index) {
            Some(msg) if msg.is_user() => {
                self.editing = Some(EditState {
                    index,
                    content: msg.content.clone(),
                });
                true
            }
            _ => false,
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Replace the edited message, drop everything after it, and ask again.
    ///
    /// Blank edits are rejected and the edit stays open.
    pub fn commit_edit(&mut self, personalization: &str, model: &str) -> Option<PendingAsk> {
        let edit = self.editing.as_ref()?;
        let content = edit.content.trim().to_string();
        if content.is_empty() || edit.index > self.messages.len() {
            return None;
        }
        let index = edit.index;
        self.editing = None;

        self.messages.truncate(index);
        let history = self.messages.clone();
        self.messages.push(ChatMessage::user(content.clone()));

        let request = AskRequest {
            text: content,
            stream: false,
            history,
            personalization: personalization.to_string(),
            model: model.to_string(),
        };
        Some(self.start(RequestKind::Edit, request))
    }

    /// Drop the reply at `index` (and everything after it) and ask again with
    /// the user message that prompted it.
    pub fn begin_regenerate(
        &mut self,
        index: usize,
        personalization: &str,
        model: &str,
    ) -> Option<PendingAsk> {
        if index == 0 || index > self.messages.len() {
            return None;
        }
        let prompt = self.messages.get(index - 1).filter(|m| m.is_user())?.content.clone();

        self.messages.truncate(index);
        self.editing = None;
        let history = self.messages[..index - 1].to_vec();

        let request = AskRequest {
            text: prompt,
            stream: false,
            history,
            personalization: personalization.to_string(),
            model: model.to_string(),
        };
        Some(self.start(RequestKind::Regenerate, request))
    }

    /// Apply the outcome of a request.
    ///
    /// Returns false when the ticket is no longer pending; the result is then
    /// ignored.
    pub fn complete(&mut self, ticket: u64, result: Result<AskResponse, ApiError>) -> bool {
        let flight = match self.in_flight.take() {
            Some(flight) if flight.ticket == ticket => flight,
            other => {
                self.in_flight = other;
                tracing::debug!(ticket, "discarding stale response");
                return false;
            }
        };

        match result {
            Ok(response) => {
                let answer = response
                    .into_answer()
                    .unwrap_or_else(|| NO_RESPONSE.to_string());
                self.messages.push(ChatMessage::assistant(answer));
            }
            Err(ApiError::Cancelled) => {
                tracing::info!(ticket, "request aborted");
            }
            Err(e) => {
                tracing::error!(ticket, error = %e, "ask request failed");
                let text = match flight.kind {
                    RequestKind::Send => SEND_ERROR,
                    RequestKind::Edit | RequestKind::Regenerate => RETRY_ERROR,
                };
                self.messages.push(ChatMessage::assistant(text));
            }
        }
        true
    }

    /// Abort the pending reply and note it in the transcript
    pub fn stop(&mut self) -> bool {
        if !self.cancel_in_flight() {
            return false;
        }
        self.messages.push(ChatMessage::assistant(STOPPED_MESSAGE));
        true
    }

    pub fn clear(&mut self) {
        self.cancel_in_flight();
        self.messages.clear();
        self.editing = None;
    }

    /// Track a file being uploaded for the next message
    pub fn attach(&mut self, mut file: AttachedFile) -> u64 {
        self.next_attachment_id += 1;
        file.id = self.next_attachment_id;
        file.status = FileStatus::Uploading;
        self.attached_files.push(file);
        self.next_attachment_id
    }

    pub fn mark_uploaded(&mut self, id: u64) -> bool {
        self.set_attachment_status(id, FileStatus::Uploaded)
    }

    pub fn mark_failed(&mut self, id: u64) -> bool {
        self.set_attachment_status(id, FileStatus::Error)
    }

    fn set_attachment_status(&mut self, id: u64, status: FileStatus) -> bool {
        match self.attached_files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.status = status;
                true
            }
            None => false,
        }
    }

    pub fn remove_attachment(&mut self, id: u64) -> bool {
        let before = self.attached_files.len();
        self.attached_files.retain(|f| f.id != id);
        self.attached_files.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn answer(text: &str) -> Result<AskResponse, ApiError> {
        Ok(AskResponse {
            answer: Some(text.to_string()),
        })
    }

    fn network_error() -> Result<AskResponse, ApiError> {
        Err(ApiError::Status {
            status: 500,
            detail: None,
        })
    }

    fn file(name: &str) -> AttachedFile {
        AttachedFile {
            id: 0,
            name: name.to_string(),
            size: 10,
            mime_type: "application/pdf".to_string(),
            status: FileStatus::Uploading,
            path: PathBuf::from(name),
        }
    }

    /// Three completed turns: u0 a1 u2 a3 u4 a5
    fn three_turns() -> Conversation {
        let mut conv = Conversation::new();
        conv.switch_chat(Some("c1".to_string()), Vec::new());
        for i in 0..3 {
            let pending = conv.begin_send(&format!("q{}", i), "", "m").unwrap();
            conv.complete(pending.ticket, answer(&format!("a{}", i)));
        }
        conv
    }

    #[test]
    fn test_send_builds_request_with_prior_history() {
        let mut conv = Conversation::new();
        let first = conv.begin_send("  hello  ", "\nPersonalization preferences: x", "llama").unwrap();
        assert_eq!(first.kind, RequestKind::Send);
        assert_eq!(first.request.text, "hello");
        assert!(first.request.history.is_empty());
        assert!(!first.request.stream);
        assert_eq!(first.request.model, "llama");
        assert!(conv.is_loading());

        assert!(conv.complete(first.ticket, answer("hi there")));
        let second = conv.begin_send("next", "", "llama").unwrap();
        assert_eq!(
            second.request.history,
            vec![ChatMessage::user("hello"), ChatMessage::assistant("hi there")]
        );
    }

    #[test]
    fn test_send_ignored_while_loading_or_empty() {
        let mut conv = Conversation::new();
        assert!(conv.begin_send("   ", "", "m").is_none());
        conv.begin_send("one", "", "m").unwrap();
        assert!(conv.begin_send("two", "", "m").is_none());
        assert_eq!(conv.messages().len(), 1);
    }

    #[test]
    fn test_empty_answer_becomes_placeholder() {
        let mut conv = Conversation::new();
        let p = conv.begin_send("q", "", "m").unwrap();
        conv.complete(p.ticket, answer(""));
        assert_eq!(conv.messages()[1].content, NO_RESPONSE);
        assert!(!conv.is_loading());
    }

    #[test]
    fn test_null_answer_becomes_placeholder() {
        let mut conv = Conversation::new();
        let p = conv.begin_send("q", "", "m").unwrap();
        let response: AskResponse = serde_json::from_str(r#"{"answer":null}"#).unwrap();
        assert!(conv.complete(p.ticket, Ok(response)));
        assert_eq!(conv.messages()[1].content, NO_RESPONSE);
    }

    #[test]
    fn test_attachments_add_context_and_clear() {
        let mut conv = Conversation::new();
        let a = conv.attach(file("handbook.pdf"));
        let b = conv.attach(file("broken.pdf"));
        conv.mark_uploaded(a);
        conv.mark_failed(b);

        let p = conv.begin_send("", "", "m").unwrap();
        assert_eq!(
            p.request.text,
            "I have uploaded the following document(s): handbook.pdf. Summarize or analyze the attached document"
        );
        let sent = &conv.messages()[0];
        assert_eq!(sent.content, ATTACHMENT_ONLY_PROMPT);
        assert_eq!(sent.attachments.len(), 1);
        assert_eq!(sent.attachments[0].name, "handbook.pdf");
        assert!(conv.attached_files().is_empty());
    }

    #[test]
    fn test_failed_attachment_alone_sends_nothing() {
        let mut conv = Conversation::new();
        let id = conv.attach(file("broken.pdf"));
        conv.mark_failed(id);

        assert!(conv.begin_send("", "", "m").is_none());
        assert!(conv.messages().is_empty());
        assert!(!conv.is_loading());
        assert_eq!(conv.attached_files().len(), 1);
    }

    #[test]
    fn test_uploading_attachment_alone_sends_nothing() {
        let mut conv = Conversation::new();
        let id = conv.attach(file("big.pdf"));

        assert!(conv.begin_send("   ", "", "m").is_none());
        assert!(conv.messages().is_empty());
        assert!(conv.mark_uploaded(id));
    }

    #[test]
    fn test_send_keeps_attachment_still_uploading() {
        let mut conv = Conversation::new();
        let id = conv.attach(file("big.pdf"));

        let p = conv.begin_send("question", "", "m").unwrap();
        assert_eq!(p.request.text, "question");
        assert!(conv.messages()[0].attachments.is_empty());
        assert_eq!(conv.attached_files().len(), 1);
        assert!(conv.mark_uploaded(id));
    }

    #[test]
    fn test_remove_attachment() {
        let mut conv = Conversation::new();
        let id = conv.attach(file("a.txt"));
        assert!(conv.remove_attachment(id));
        assert!(!conv.remove_attachment(id));
        assert!(!conv.mark_uploaded(id));
    }

    #[test]
    fn test_switch_chat_cancels_pending_and_loads_messages() {
        let mut conv = Conversation::new();
        conv.switch_chat(Some("a".to_string()), Vec::new());
        let pending = conv.begin_send("slow question", "", "m").unwrap();

        let other = vec![ChatMessage::user("old q"), ChatMessage::assistant("old a")];
        assert!(conv.switch_chat(Some("b".to_string()), other.clone()));

        assert!(pending.cancel.is_cancelled());
        assert!(!conv.is_loading());
        assert_eq!(conv.chat_id(), Some("b"));
        assert_eq!(conv.messages(), other.as_slice());

        // the late reply for chat "a" must not land in chat "b"
        assert!(!conv.complete(pending.ticket, Err(ApiError::Cancelled)));
        assert!(!conv.complete(pending.ticket, answer("late")));
        assert_eq!(conv.messages(), other.as_slice());
    }

    #[test]
    fn test_switch_to_same_chat_is_noop() {
        let mut conv = Conversation::new();
        conv.switch_chat(Some("a".to_string()), vec![ChatMessage::user("keep")]);
        let pending = conv.begin_send("q", "", "m").unwrap();
        assert!(!conv.switch_chat(Some("a".to_string()), Vec::new()));
        assert!(!pending.cancel.is_cancelled());
        assert_eq!(conv.messages().len(), 2);
    }

    #[test]
    fn test_edit_truncates_following_history() {
        let mut conv = three_turns();
        assert!(conv.start_edit(2));
        conv.editing_mut().unwrap().content = "q1 revised".to_string();

        let p = conv.commit_edit("", "m").unwrap();
        assert_eq!(p.kind, RequestKind::Edit);
        assert_eq!(p.request.text, "q1 revised");
        assert_eq!(
            p.request.history,
            vec![ChatMessage::user("q0"), ChatMessage::assistant("a0")]
        );
        assert_eq!(
            conv.messages(),
            &[
                ChatMessage::user("q0"),
                ChatMessage::assistant("a0"),
                ChatMessage::user("q1 revised"),
            ]
        );
        assert!(conv.editing().is_none());

        conv.complete(p.ticket, answer("new a1"));
        assert_eq!(conv.messages().len(), 4);
        assert_eq!(conv.messages()[3].content, "new a1");
    }

    #[test]
    fn test_edit_rules() {
        let mut conv = three_turns();
        // assistant messages cannot be edited
        assert!(!conv.start_edit(1));
        assert!(conv.start_edit(0));
        conv.editing_mut().unwrap().content = "   ".to_string();
        assert!(conv.commit_edit("", "m").is_none());
        assert!(conv.editing().is_some());
        conv.cancel_edit();
        assert!(conv.editing().is_none());
        assert_eq!(conv.messages().len(), 6);
    }

    #[test]
    fn test_regenerate_resends_prompt_without_it_in_history() {
        let mut conv = three_turns();
        let p = conv.begin_regenerate(3, "", "m").unwrap();
        assert_eq!(p.kind, RequestKind::Regenerate);
        assert_eq!(p.request.text, "q1");
        assert_eq!(
            p.request.history,
            vec![ChatMessage::user("q0"), ChatMessage::assistant("a0")]
        );
        assert_eq!(conv.messages().len(), 3);
        assert_eq!(conv.messages()[2], ChatMessage::user("q1"));
    }

    #[test]
    fn test_regenerate_requires_preceding_user_message() {
        let mut conv = three_turns();
        assert!(conv.begin_regenerate(0, "", "m").is_none());
        assert!(conv.begin_regenerate(2, "", "m").is_none());
        assert!(conv.begin_regenerate(99, "", "m").is_none());
        assert_eq!(conv.messages().len(), 6);
    }

    #[test]
    fn test_regenerate_supersedes_pending_request() {
        let mut conv = three_turns();
        let pending = conv.begin_send("q3", "", "m").unwrap();
        let regen = conv.begin_regenerate(5, "", "m").unwrap();
        assert!(pending.cancel.is_cancelled());
        assert!(!conv.complete(pending.ticket, answer("stale")));
        assert!(conv.complete(regen.ticket, answer("fresh a2")));
        assert_eq!(conv.messages().last().unwrap().content, "fresh a2");
    }

    #[test]
    fn test_network_errors_become_inline_messages() {
        let mut conv = Conversation::new();
        let p = conv.begin_send("q", "", "m").unwrap();
        conv.complete(p.ticket, network_error());
        assert_eq!(conv.messages()[1], ChatMessage::assistant(SEND_ERROR));

        let p = conv.begin_regenerate(1, "", "m").unwrap();
        conv.complete(p.ticket, network_error());
        assert_eq!(conv.messages()[1], ChatMessage::assistant(RETRY_ERROR));
    }

    #[test]
    fn test_cancelled_result_ends_request_quietly() {
        let mut conv = three_turns();
        let p = conv.begin_send("q3", "", "m").unwrap();
        p.cancel.cancel();
        assert!(conv.complete(p.ticket, Err(ApiError::Cancelled)));
        assert!(!conv.is_loading());
        assert_eq!(conv.messages().len(), 7);
        assert_eq!(conv.messages().last().unwrap(), &ChatMessage::user("q3"));
    }

    #[test]
    fn test_stop_marks_transcript_and_discards_reply() {
        let mut conv = Conversation::new();
        let p = conv.begin_send("q", "", "m").unwrap();
        assert!(conv.stop());
        assert!(p.cancel.is_cancelled());
        assert!(!conv.complete(p.ticket, Err(ApiError::Cancelled)));
        assert_eq!(
            conv.messages(),
            &[ChatMessage::user("q"), ChatMessage::assistant(STOPPED_MESSAGE)]
        );
        assert!(!conv.stop());
    }

    #[test]
    fn test_clear_cancels_and_empties() {
        let mut conv = three_turns();
        let p = conv.begin_send("q3", "", "m").unwrap();
        conv.clear();
        assert!(p.cancel.is_cancelled());
        assert!(conv.messages().is_empty());
        assert!(!conv.complete(p.ticket, answer("late")));
        assert!(conv.messages().is_empty());
    }
}
