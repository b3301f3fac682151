use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::IngestError;
use crate::ingest::BriefExtractor;

const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// Some upload clients declare legacy .doc mime for .docx payloads.
const LEGACY_DOC_MIME: &str = "application/msword";

pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BriefExtractor for DocxExtractor {
    fn extract(&self, path: &Path) -> Result<String, IngestError> {
        let _span = tracing::info_span!("ingest.docx").entered();

        let file = std::fs::File::open(path).map_err(|e| IngestError::ReadSource {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| IngestError::DocxExtraction(format!("Failed to open archive: {}", e)))?;

        let mut document_xml = archive.by_name("word/document.xml").map_err(|e| {
            IngestError::DocxExtraction(format!("Failed to find document.xml: {}", e))
        })?;

        let mut xml = String::new();
        document_xml
            .read_to_string(&mut xml)
            .map_err(|e| IngestError::DocxExtraction(format!("Failed to read document.xml: {}", e)))?;

        parse_document_xml(&xml)
    }

    fn supports(&self, mime: &str) -> bool {
        mime == DOCX_MIME || mime == LEGACY_DOC_MIME
    }
}

/// Walks the WordprocessingML body collecting `<w:t>` runs, with a newline
/// per closed paragraph.
fn parse_document_xml(xml: &str) -> Result<String, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut in_text_run = false;
    let mut in_paragraph = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = true,
                b"p" => in_paragraph = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if in_paragraph {
                        text.push('\n');
                        in_paragraph = false;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_run {
                    let decoded = e.decode().unwrap_or_default();
                    text.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::DocxExtraction(format!(
                    "XML parsing error: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(text)
}
