use std::path::Path;

use crate::error::IngestError;
use crate::ingest::BriefExtractor;

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BriefExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, IngestError> {
        let _span = tracing::info_span!("ingest.pdf").entered();

        let bytes = std::fs::read(path).map_err(|e| IngestError::ReadSource {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&bytes)
            .map_err(|e| IngestError::PdfExtraction(format!("Failed to load PDF: {}", e)))?;

        let mut text = String::new();
        for (page_num, _) in doc.get_pages() {
            if let Ok(page_text) = doc.extract_text(&[page_num]) {
                text.push_str(&page_text);
                text.push('\n');
            }
        }

        Ok(text)
    }

    fn supports(&self, mime: &str) -> bool {
        mime == "application/pdf"
    }
}
