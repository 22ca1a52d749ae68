pub mod client;
pub mod types;

pub use client::{ApiError, RagClient};
pub use types::{AskRequest, AskResponse, DocumentStats, MessageResponse, ModelInfo, UploadResponse};
