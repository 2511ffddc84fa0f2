//! Document text extraction.
//!
//! Extraction never fails: unsupported formats and unreadable files yield
//! an empty string, which the indexing pipeline reports as
//! "empty or unreadable".

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;

/// Extensions read as UTF-8 text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv"];

/// Zip entry holding a Word document's body.
const DOCX_BODY: &str = "word/document.xml";

/// Turns a document on disk into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract the document's text, or return an empty string.
    fn extract_text(&self, path: &Path) -> String;
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Extractor for plain-text formats.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Whether this extractor understands the file's extension.
    pub fn supports(path: &Path) -> bool {
        extension(path)
            .map(|e| TEXT_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false)
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, path: &Path) -> String {
        if !Self::supports(path) {
            tracing::warn!("Unsupported document format: {:?}", path);
            return String::new();
        }

        match std::fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Document is not valid UTF-8 {:?}: {}", path, e);
                    String::new()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read document {:?}: {}", path, e);
                String::new()
            }
        }
    }
}

/// PDF text layer extractor. Scanned pages without a text layer come back empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract_text(&self, path: &Path) -> String {
        let doc = match lopdf::Document::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Failed to open PDF {:?}: {}", path, e);
                return String::new();
            }
        };

        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        if pages.is_empty() {
            return String::new();
        }

        match doc.extract_text(&pages) {
            Ok(text) => {
                tracing::debug!("Extracted {} chars from {} PDF pages", text.len(), pages.len());
                text
            }
            Err(e) => {
                tracing::warn!("Failed to extract PDF text {:?}: {}", path, e);
                String::new()
            }
        }
    }
}

/// Word (`.docx`) extractor. Paragraphs become lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl DocxExtractor {
    fn read_body(path: &Path) -> Result<String, String> {
        let file = std::fs::File::open(path).map_err(|e| e.to_string())?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
        let mut entry = archive.by_name(DOCX_BODY).map_err(|e| e.to_string())?;

        let mut xml = String::new();
        entry.read_to_string(&mut xml).map_err(|e| e.to_string())?;
        Ok(xml)
    }

    fn body_text(xml: &str) -> Result<String, quick_xml::Error> {
        let mut reader = Reader::from_str(xml);
        let mut text = String::new();
        let mut in_run_text = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
                Event::End(e) => match e.name().as_ref() {
                    b"w:t" => in_run_text = false,
                    b"w:p" => text.push('\n'),
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:tab" => text.push('\t'),
                    b"w:br" | b"w:cr" => text.push('\n'),
                    _ => {}
                },
                Event::Text(t) if in_run_text => text.push_str(&t.unescape()?),
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(text)
    }
}

impl TextExtractor for DocxExtractor {
    fn extract_text(&self, path: &Path) -> String {
        let xml = match Self::read_body(path) {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!("Failed to open DOCX {:?}: {}", path, e);
                return String::new();
            }
        };

        match Self::body_text(&xml) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Malformed DOCX body {:?}: {}", path, e);
                String::new()
            }
        }
    }
}

/// Routes a document to the extractor for its extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    /// Whether any extractor understands the file's extension.
    pub fn supports(path: &Path) -> bool {
        PlainTextExtractor::supports(path)
            || matches!(extension(path).as_deref(), Some("pdf") | Some("docx"))
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract_text(&self, path: &Path) -> String {
        match extension(path).as_deref() {
            Some("pdf") => PdfExtractor.extract_text(path),
            Some("docx") => DocxExtractor.extract_text(path),
            _ => PlainTextExtractor.extract_text(path),
        }
    }
}
