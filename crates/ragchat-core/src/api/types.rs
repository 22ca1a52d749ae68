use serde::{Deserialize, Serialize};

use crate::state::ChatMessage;

/// Body of `POST /ask`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub text: String,
    pub stream: bool,
    pub history: Vec<ChatMessage>,
    pub personalization: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub answer: Option<String>,
}

impl AskResponse {
    /// The answer text, or `None` when the backend sent nothing usable
    pub fn into_answer(self) -> Option<String> {
        self.answer.filter(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(default)]
    pub chunks: usize,
}

/// Knowledge-base summary from `GET /documents`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocumentStats {
    #[serde(default)]
    pub total_documents: usize,
    #[serde(default)]
    pub total_chunks: usize,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<String>,
}
