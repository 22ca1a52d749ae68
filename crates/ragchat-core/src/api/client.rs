use reqwest::{multipart, Client, Response};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::types::{
    AskRequest, AskResponse, DocumentStats, ErrorBody, MessageResponse, ModelInfo, ModelsResponse,
    UploadResponse,
};
use crate::upload::mime_for_path;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was cancelled before a response arrived
    #[error("request cancelled")]
    Cancelled,

    #[error("HTTP error! status: {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("could not read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Server-provided detail if any, otherwise the display text
    pub fn detail(&self) -> String {
        match self {
            ApiError::Status { detail: Some(d), .. } => d.clone(),
            other => other.to_string(),
        }
    }
}

/// Client for the RAG backend's HTTP API
#[derive(Clone)]
pub struct RagClient {
    client: Client,
    base_url: String,
}

impl RagClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /ask`, abandoned as soon as `cancel` fires
    pub async fn ask(
        &self,
        request: &AskRequest,
        cancel: &CancellationToken,
    ) -> Result<AskResponse, ApiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = self.send_ask(request) => result,
        }
    }

    async fn send_ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError> {
        tracing::debug!(
            model = %request.model,
            history = request.history.len(),
            "sending /ask"
        );
        let response = self.client.post(self.url("/ask")).json(request).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// `POST /upload` with the file as multipart field `file`
    pub async fn upload(&self, path: &Path) -> Result<UploadResponse, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime_for_path(path))?;
        let form = multipart::Form::new().part("file", part);

        tracing::info!(file = %file_name, "uploading document");
        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail)
                .unwrap_or_else(|| "Upload failed".to_string());
            return Err(ApiError::Status {
                status,
                detail: Some(detail),
            });
        }

        Ok(response.json().await?)
    }

    /// `GET /documents`
    pub async fn list_documents(&self) -> Result<DocumentStats, ApiError> {
        let response = self.client.get(self.url("/documents")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// `DELETE /documents`
    pub async fn clear_documents(&self) -> Result<MessageResponse, ApiError> {
        let response = self.client.delete(self.url("/documents")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// `GET /models`
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let response = self.client.get(self.url("/models")).send().await?;
        let response = check_status(response).await?;
        let models: ModelsResponse = response.json().await?;
        Ok(models.models)
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail);
    tracing::warn!(status, detail = ?detail, "backend returned an error status");
    Err(ApiError::Status { status, detail })
}
