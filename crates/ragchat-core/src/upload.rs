//! Document uploads: validation, in-progress attachment records, and the
//! knowledge-base panel.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::api::DocumentStats;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "md"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Please select a PDF, TXT, or MD file")]
    UnsupportedType,

    #[error("file not found: {0}")]
    NotFound(String),
}

pub fn mime_for_path(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("pdf") => "application/pdf",
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploading,
    Uploaded,
    Error,
}

/// A file attached to the message being composed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub id: u64,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub status: FileStatus,
    pub path: PathBuf,
}

impl AttachedFile {
    pub fn size_kb(&self) -> String {
        format!("{:.2} KB", self.size as f64 / 1024.0)
    }
}

/// Check extension and existence; the returned record has id 0 and
/// `Uploading` status until it is attached to a conversation.
pub fn validate_upload(path: &Path) -> Result<AttachedFile, UploadError> {
    match extension(path) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => return Err(UploadError::UnsupportedType),
    }

    let metadata = std::fs::metadata(path)
        .map_err(|_| UploadError::NotFound(path.display().to_string()))?;
    if !metadata.is_file() {
        return Err(UploadError::NotFound(path.display().to_string()));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(AttachedFile {
        id: 0,
        name,
        size: metadata.len(),
        mime_type: mime_for_path(path).to_string(),
        status: FileStatus::Uploading,
        path: path.to_path_buf(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Success(String),
    Error(String),
}

impl StatusMessage {
    pub fn text(&self) -> &str {
        match self {
            StatusMessage::Success(t) | StatusMessage::Error(t) => t,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StatusMessage::Error(_))
    }
}

/// State behind the upload / knowledge-base panel
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    /// `None` until the first listing arrives
    pub stats: Option<DocumentStats>,
    pub message: Option<StatusMessage>,
    pub uploading: bool,
    pub confirm_clear: bool,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stats(&mut self, stats: DocumentStats) {
        self.stats = Some(stats);
    }

    pub fn has_documents(&self) -> bool {
        self.stats
            .as_ref()
            .map(|s| s.total_documents > 0)
            .unwrap_or(false)
    }

    /// Validate a path before sending; sets the error message on failure
    pub fn begin_upload(&mut self, path: &Path) -> Option<AttachedFile> {
        if self.uploading {
            return None;
        }
        match validate_upload(path) {
            Ok(file) => {
                self.uploading = true;
                self.message = None;
                Some(file)
            }
            Err(e) => {
                self.message = Some(StatusMessage::Error(e.to_string()));
                None
            }
        }
    }

    pub fn upload_succeeded(&mut self, message: &str, chunks: usize) {
        self.uploading = false;
        self.message = Some(StatusMessage::Success(format!(
            "✅ {} ({} chunks created)",
            message, chunks
        )));
    }

    pub fn upload_failed(&mut self, error: &str) {
        self.uploading = false;
        self.message = Some(StatusMessage::Error(format!(
            "❌ Error: {}. Make sure the backend server is running.",
            error
        )));
    }

    /// First press asks for confirmation; returns true once confirmed
    pub fn request_clear(&mut self) -> bool {
        if self.confirm_clear {
            self.confirm_clear = false;
            true
        } else {
            self.confirm_clear = true;
            false
        }
    }

    pub fn cancel_clear(&mut self) {
        self.confirm_clear = false;
    }

    pub fn cleared(&mut self) {
        self.message = Some(StatusMessage::Success("✅ All documents cleared".to_string()));
    }

    pub fn clear_failed(&mut self, error: &str) {
        self.message = Some(StatusMessage::Error(format!(
            "❌ Error clearing documents: {}",
            error
        )));
    }
}
