pub mod api;
pub mod chat;
pub mod config;
pub mod content;
pub mod conversation;
pub mod personalization;
pub mod preferences;
pub mod state;
pub mod storage;
pub mod upload;
pub mod workspace;

// Re-export main types for convenience
pub use api::{ApiError, AskRequest, AskResponse, DocumentStats, ModelInfo, RagClient, UploadResponse};
pub use chat::{Chat, ChatLibrary};
pub use config::Config;
pub use content::{parse_message_content, ContentPart};
pub use conversation::{Conversation, PendingAsk, RequestKind};
pub use personalization::{BaseStyle, Dial, DialKind, Personalization};
pub use preferences::{Preferences, Theme};
pub use state::{Attachment, ChatMessage, ChatRole};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use upload::{AttachedFile, FileStatus, KnowledgeBase, StatusMessage};
pub use workspace::Workspace;
