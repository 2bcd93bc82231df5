//! Attachment storage boundary.
//!
//! Extension checks happen before any byte is written; a rejected upload
//! leaves no trace on disk. Stored files live outside the database unit of
//! work, so callers that fail their commit should remove the file again.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Extensions accepted for invoice and payment attachments.
pub const INVOICE_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Extensions accepted for order documents.
pub const ORDER_DOCUMENT_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv", "pdf"];

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persists `bytes` under a generated name with the given extension,
    /// returning the path relative to the store root. Fails before writing
    /// when the extension is not in `allowed`.
    async fn store(
        &self,
        bytes: &[u8],
        extension: &str,
        allowed: &[&str],
    ) -> Result<String, ServiceError>;

    /// Removes a previously stored file.
    async fn remove(&self, relative_path: &str) -> Result<(), ServiceError>;
}

/// Filesystem-backed store rooted at a configured directory.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn normalize_extension(extension: &str) -> String {
        extension.trim().trim_start_matches('.').to_lowercase()
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(
        &self,
        bytes: &[u8],
        extension: &str,
        allowed: &[&str],
    ) -> Result<String, ServiceError> {
        let ext = Self::normalize_extension(extension);
        if !allowed.contains(&ext.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "File type .{} is not allowed",
                ext
            )));
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.root.join(&file_name);

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            ServiceError::InternalError(format!("Failed to create upload directory: {}", e))
        })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ServiceError::InternalError(format!("Failed to store file: {}", e)))?;

        info!("Stored attachment {}", file_name);
        Ok(file_name)
    }

    async fn remove(&self, relative_path: &str) -> Result<(), ServiceError> {
        let path = self.root.join(relative_path);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove attachment {}: {}", relative_path, e);
            return Err(ServiceError::InternalError(format!(
                "Failed to remove file: {}",
                e
            )));
        }
        Ok(())
    }
}
