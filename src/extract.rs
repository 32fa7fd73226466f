//! Multi-format text extraction for uploaded documents.
//!
//! The upload boundary supplies raw bytes plus a declared content-type and
//! filename; this module returns plain UTF-8 text. Dispatch goes through the
//! closed [`DocumentFormat`] enum: declared MIME type first, filename
//! extension as the fallback, anything else is rejected as unsupported.

use std::io::Read;

/// Supported MIME types.
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PDF: &str = "application/pdf";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// The set of formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Docx,
    Pdf,
}

impl DocumentFormat {
    /// Resolves the format from the declared content-type, falling back to
    /// the filename extension. `None` means unsupported.
    pub fn detect(content_type: &str, filename: &str) -> Option<Self> {
        match content_type {
            MIME_TEXT => return Some(Self::PlainText),
            MIME_DOCX => return Some(Self::Docx),
            MIME_PDF => return Some(Self::Pdf),
            _ => {}
        }

        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".txt") {
            Some(Self::PlainText)
        } else if lower.ends_with(".docx") {
            Some(Self::Docx)
        } else if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

/// Extraction error. `UnsupportedFormat` carries the rejected content-type;
/// the remaining variants are all "recognized format, malformed payload".
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedFormat(String),
    Utf8(String),
    Docx(String),
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFormat(ct) => {
                write!(f, "unsupported file type: {}", ct)
            }
            ExtractError::Utf8(e) => write!(f, "could not decode text file as UTF-8: {}", e),
            ExtractError::Docx(e) => write!(f, "Word document extraction failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts plain text from an uploaded blob.
pub fn extract_text(
    bytes: &[u8],
    content_type: &str,
    filename: &str,
) -> Result<String, ExtractError> {
    match DocumentFormat::detect(content_type, filename) {
        Some(DocumentFormat::PlainText) => extract_plain(bytes),
        Some(DocumentFormat::Docx) => extract_docx(bytes),
        Some(DocumentFormat::Pdf) => extract_pdf(bytes),
        None => Err(ExtractError::UnsupportedFormat(content_type.to_string())),
    }
}

/// Strict UTF-8 decode; invalid bytes are an extraction failure, not lossy.
fn extract_plain(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::Utf8(e.to_string()))
}

/// Page-by-page PDF extraction. Page texts are joined with newlines; a page
/// yielding no text contributes an empty line.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _object_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|e| ExtractError::Pdf(format!("page {}: {}", page_no, e)))?;
        pages.push(text);
    }

    Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Docx(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    extract_paragraphs(&doc_xml)
}

/// Walks `word/document.xml`, collecting `w:t` runs per `w:p` paragraph.
/// Paragraph texts are joined with newlines; empty paragraphs contribute an
/// empty line.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}
