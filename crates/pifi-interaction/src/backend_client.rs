//! BackendClient - REST client for the PiFi analysis backend.
//!
//! Wraps `GET /status`, `POST /upload` and `POST /ask`. Configuration comes from the
//! `[backend]` section of `config.toml` (or `PIFI_BACKEND_URL`).

use std::time::Duration;

use async_trait::async_trait;
use pifi_core::chat::{AssistantResponder, ChatSession};
use pifi_core::document::{DocumentIndexer, PDF_MIME_TYPE};
use pifi_core::error::{PifiError, Result};
use pifi_infrastructure::config::BackendSettings;
use reqwest::{Client, StatusCode, multipart};
use serde::{Deserialize, Serialize};

/// Body of `POST /ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Reply of `POST /ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    /// Document passages the answer was drawn from.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Reply of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub detail: String,
}

/// Reply of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether a document has been uploaded and indexed.
    #[serde(default)]
    pub indexed: bool,
}

/// HTTP client for the PiFi backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a client for `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PifiError::config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url.into()),
        })
    }

    /// Creates a client from the `[backend]` config section.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self> {
        Self::new(
            settings.base_url.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Asks whether a document is indexed and ready for questions.
    pub async fn status(&self) -> Result<StatusResponse> {
        let url = self.endpoint("status");
        tracing::debug!(url = %url, "Checking backend status");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| PifiError::backend(None, format!("Status request failed: {err}")))?;

        parse_json(response).await
    }

    /// Uploads a PDF report as the `file` field of a multipart form.
    ///
    /// The backend indexes it before replying, so a success means later
    /// questions are answered against this report.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let url = self.endpoint("upload");
        tracing::debug!(url = %url, file_name = %file_name, bytes = bytes.len(), "Uploading document");

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(PDF_MIME_TYPE)
            .map_err(|err| PifiError::internal(format!("Invalid upload content type: {err}")))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PifiError::backend(None, format!("Upload request failed: {err}")))?;

        parse_json(response).await
    }

    /// Sends a question about the indexed document.
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let url = self.endpoint("ask");
        tracing::debug!(url = %url, chars = question.len(), "Asking backend");

        let body = AskRequest {
            question: question.to_string(),
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| PifiError::backend(None, format!("Ask request failed: {err}")))?;

        parse_json(response).await
    }
}

fn normalize_base_url(base_url: String) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read backend error body".to_string());
        return Err(map_http_error(status, body_text));
    }

    response
        .json()
        .await
        .map_err(|err| PifiError::backend(Some(status.as_u16()), format!("Failed to parse backend response: {err}")))
}

/// Maps a non-2xx reply to an error, preferring FastAPI's `detail` field.
fn map_http_error(status: StatusCode, body_text: String) -> PifiError {
    let message = serde_json::from_str::<serde_json::Value>(&body_text)
        .ok()
        .and_then(|value| value.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or(body_text);

    PifiError::backend(Some(status.as_u16()), message)
}

#[async_trait]
impl AssistantResponder for BackendClient {
    async fn respond(&self, _session: &ChatSession, question: &str) -> Result<String> {
        // The backend answers against its single indexed document
        Ok(self.ask(question).await?.answer)
    }
}

#[async_trait]
impl DocumentIndexer for BackendClient {
    async fn index_document(&self, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let reply = self.upload(file_name, bytes).await?;
        tracing::info!(file_name = %file_name, detail = %reply.detail, "Document indexed");
        Ok(())
    }
}
