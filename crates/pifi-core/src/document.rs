//! Document upload status and the indexing collaborator.

use async_trait::async_trait;

use crate::error::{PifiError, Result};

/// Largest report accepted for upload.
pub const MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

/// Content type sent with uploaded reports.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Sends a report to be indexed so later questions are answered against it.
#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    async fn index_document(&self, file_name: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Checks a report before upload: a `.pdf` name and a non-empty body no
/// larger than [`MAX_DOCUMENT_BYTES`].
pub fn validate_document(file_name: &str, size: usize) -> Result<()> {
    let name = file_name.trim();
    if name.is_empty() {
        return Err(PifiError::invalid_input("Document name must not be empty"));
    }
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(PifiError::invalid_input("Only PDF files allowed"));
    }
    if size == 0 {
        return Err(PifiError::invalid_input("Document is empty"));
    }
    if size > MAX_DOCUMENT_BYTES {
        return Err(PifiError::invalid_input(format!(
            "File too large. Maximum size is {}MB",
            MAX_DOCUMENT_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Tracks whether a document has been indexed by the backend in this process.
///
/// Never persisted; every launch starts with no document.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    is_document_uploaded: bool,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_document_uploaded(&self) -> bool {
        self.is_document_uploaded
    }

    pub fn set_document_uploaded(&mut self, status: bool) {
        self.is_document_uploaded = status;
    }
}
