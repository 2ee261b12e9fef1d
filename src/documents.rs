//! Storage for uploaded registration documents.
//!
//! Files land under `<upload_dir>/<category>/<ulid>[.<ext>]` and are served
//! read-only by the HTTP layer at `/uploads`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use ulid::Ulid;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document category: {0}")]
    InvalidCategory(String),
    #[error("empty document upload")]
    Empty,
    #[error("failed to store document: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist `bytes` and return the public URL of the stored file.
    async fn upload(
        &self,
        bytes: &[u8],
        category: &str,
        original_name: Option<&str>,
    ) -> Result<String, DocumentError>;
}

#[derive(Clone, Debug)]
pub struct LocalDocumentStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn upload(
        &self,
        bytes: &[u8],
        category: &str,
        original_name: Option<&str>,
    ) -> Result<String, DocumentError> {
        if !valid_category(category) {
            return Err(DocumentError::InvalidCategory(category.to_string()));
        }
        if bytes.is_empty() {
            return Err(DocumentError::Empty);
        }

        let dir = self.root.join(category);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = match original_name.and_then(extension) {
            Some(ext) => format!("{}.{ext}", Ulid::new()),
            None => Ulid::new().to_string(),
        };
        tokio::fs::write(dir.join(&file_name), bytes).await?;
        debug!(category, file_name, size = bytes.len(), "document stored");

        Ok(format!(
            "{}/uploads/{category}/{file_name}",
            self.public_base_url
        ))
    }
}

fn valid_category(category: &str) -> bool {
    !category.is_empty()
        && category
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Lowercased alphanumeric extension of a client-supplied file name.
fn extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 8 || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn category_rules() {
        assert!(valid_category("users"));
        assert!(valid_category("police_docs-2"));
        assert!(!valid_category(""));
        assert!(!valid_category("../etc"));
        assert!(!valid_category("Users"));
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("evil.p/hp"), None);
        assert_eq!(extension("weird.ex e"), None);
    }

    #[tokio::test]
    async fn upload_writes_file_and_returns_public_url() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalDocumentStore::new(dir.path(), "http://localhost:8080/");

        let url = store.upload(b"%PDF-1.4", "documents", Some("bank.pdf")).await?;
        let file_name = url
            .strip_prefix("http://localhost:8080/uploads/documents/")
            .context("unexpected url prefix")?;
        assert!(file_name.ends_with(".pdf"));

        let stored = tokio::fs::read(dir.path().join("documents").join(file_name)).await?;
        assert_eq!(stored, b"%PDF-1.4");
        Ok(())
    }

    #[tokio::test]
    async fn upload_rejects_bad_category_and_empty_payload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalDocumentStore::new(dir.path(), "http://localhost:8080");

        assert!(matches!(
            store.upload(b"x", "../up", None).await,
            Err(DocumentError::InvalidCategory(_))
        ));
        assert!(matches!(
            store.upload(b"", "users", None).await,
            Err(DocumentError::Empty)
        ));
        Ok(())
    }
}
