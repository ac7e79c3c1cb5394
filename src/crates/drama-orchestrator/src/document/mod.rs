//! Source document readers
//!
//! The novel-parse pipeline reads its upload through [`DocumentParser`].
//! [`FileParser`] dispatches on the file extension.

pub mod docx;
pub mod pdf;
pub mod txt;

use crate::{OrchestratorError, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Extensions [`FileParser`] can read, lowercase, without the dot
pub const SUPPORTED_FORMATS: &[&str] = &["txt", "docx", "pdf"];

/// Reads a document into plain text
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse_file(&self, path: &Path) -> Result<String>;
}

/// Lowercased extension of `path`, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether `path` has an extension [`FileParser`] handles
pub fn is_supported(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| SUPPORTED_FORMATS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Extension-dispatching parser for plain text, Word and PDF documents
#[derive(Debug, Clone, Default)]
pub struct FileParser;

impl FileParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentParser for FileParser {
    async fn parse_file(&self, path: &Path) -> Result<String> {
        let ext = extension_of(path).unwrap_or_default();
        if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
            return Err(OrchestratorError::UnsupportedFormat(if ext.is_empty() {
                "file has no extension".to_string()
            } else {
                format!(".{}", ext)
            }));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            OrchestratorError::FileRead(format!("{}: {}", path.display(), e))
        })?;

        let text = match ext.as_str() {
            "docx" => tokio::task::spawn_blocking(move || docx::extract_text(&bytes))
                .await
                .map_err(|e| OrchestratorError::FileRead(format!("docx reader panicked: {}", e)))??,
            "pdf" => tokio::task::spawn_blocking(move || pdf::extract_text(&bytes))
                .await
                .map_err(|e| OrchestratorError::FileRead(format!("pdf reader panicked: {}", e)))??,
            _ => txt::decode(&bytes)?,
        };

        if text.trim().is_empty() {
            return Err(OrchestratorError::FileRead(format!(
                "{}: document is empty",
                path.display()
            )));
        }

        debug!(path = %path.display(), chars = text.chars().count(), "Document parsed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_formats() {
        assert!(is_supported(Path::new("novel.TXT")));
        assert!(is_supported(Path::new("dir/novel.docx")));
        assert!(is_supported(Path::new("novel.Pdf")));
        assert!(!is_supported(Path::new("novel.epub")));
        assert!(!is_supported(Path::new("novel")));
    }

    #[tokio::test]
    async fn test_parse_txt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");
        std::fs::write(&path, "\u{feff}Chapter one.\nThe river rose.").unwrap();

        let text = FileParser::new().parse_file(&path).await.unwrap();
        assert_eq!(text, "Chapter one.\nThe river rose.");
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.epub");
        std::fs::write(&path, "PK").unwrap();

        let err = FileParser::new().parse_file(&path).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_parse_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.pdf");
        std::fs::write(&path, pdf::one_page_pdf("Chapter one.")).unwrap();

        let text = FileParser::new().parse_file(&path).await.unwrap();
        assert!(text.contains("Chapter one."), "{:?}", text);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.pdf");
        std::fs::write(&path, "%PDF-1.4 truncated").unwrap();

        let err = FileParser::new().parse_file(&path).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::FileRead(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = FileParser::new()
            .parse_file(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::FileRead(_)));
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n ").unwrap();

        let err = FileParser::new().parse_file(&path).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::FileRead(_)));
    }
}
