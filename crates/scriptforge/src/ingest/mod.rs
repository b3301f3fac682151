//! Ingestion stage: normalizes the three input kinds into a plain-text
//! brief. Raw text is trimmed and length-validated; documents are routed to
//! a mime-matched extractor; video is handed to the transcription worker
//! untouched. Nothing here deletes source files.

pub mod docx;
pub mod pdf;
pub mod text;

use std::path::Path;

use crate::error::IngestError;
use crate::model::DocumentRef;

/// The extracted brief plus what produced it.
pub struct ExtractedBrief {
    pub text: String,
    pub mime: String,
}

pub trait BriefExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, IngestError>;
    fn supports(&self, mime: &str) -> bool;
}

pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn BriefExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(pdf::PdfExtractor::new()),
                Box::new(docx::DocxExtractor::new()),
                Box::new(text::PlainTextExtractor::new()),
            ],
        }
    }

    /// Extracts a brief from an uploaded document, dispatching on the
    /// declared mime type (falling back to a path-based guess).
    pub fn extract(&self, document: &DocumentRef) -> Result<ExtractedBrief, IngestError> {
        let path = Path::new(&document.path);
        let mime = if document.mime.is_empty() {
            mime_guess::from_path(path)
                .first()
                .map(|m| m.to_string())
                .unwrap_or_default()
        } else {
            document.mime.clone()
        };

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.supports(&mime))
            .ok_or_else(|| IngestError::UnsupportedType(mime.clone()))?;

        let text = extractor.extract(path)?;
        if text.trim().is_empty() {
            return Err(IngestError::EmptyText(path.to_path_buf()));
        }

        Ok(ExtractedBrief { text, mime })
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn doc_ref(path: &Path, mime: &str) -> DocumentRef {
        DocumentRef {
            path: path.to_string_lossy().to_string(),
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            mime: mime.to_string(),
        }
    }

    #[test]
    fn test_routes_plain_text() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "Launch plan for the spring campaign").unwrap();

        let registry = ExtractorRegistry::new();
        let brief = registry
            .extract(&doc_ref(file.path(), "text/plain"))
            .unwrap();
        assert!(brief.text.contains("spring campaign"));
        assert_eq!(brief.mime, "text/plain");
    }

    #[test]
    fn test_mime_guessed_from_path_when_missing() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "No declared mime on this upload").unwrap();

        let registry = ExtractorRegistry::new();
        let brief = registry.extract(&doc_ref(file.path(), "")).unwrap();
        assert!(brief.text.contains("No declared mime"));
    }

    #[test]
    fn test_unsupported_mime_rejected() {
        let file = NamedTempFile::with_suffix(".bin").unwrap();
        std::fs::write(file.path(), b"\x00\x01\x02").unwrap();

        let registry = ExtractorRegistry::new();
        let result = registry.extract(&doc_ref(file.path(), "application/octet-stream"));
        match result {
            Err(IngestError::UnsupportedType(mime)) => {
                assert_eq!(mime, "application/octet-stream");
            }
            _ => panic!("Expected UnsupportedType"),
        }
    }

    #[test]
    fn test_empty_extraction_rejected() {
        let file = NamedTempFile::with_suffix(".txt").unwrap();
        std::fs::write(file.path(), "   \n  ").unwrap();

        let registry = ExtractorRegistry::new();
        let result = registry.extract(&doc_ref(file.path(), "text/plain"));
        assert!(matches!(result, Err(IngestError::EmptyText(_))));
    }
}
