use std::path::Path;

use crate::error::IngestError;
use crate::ingest::BriefExtractor;

pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BriefExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, IngestError> {
        let bytes = std::fs::read(path).map_err(|e| IngestError::ReadSource {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Uploads occasionally carry stray non-UTF8 bytes; a lossy decode
        // keeps the brief usable.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn supports(&self, mime: &str) -> bool {
        mime.starts_with("text/") || mime == "application/rtf"
    }
}
