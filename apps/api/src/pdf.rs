//! PDF validation, metadata and text extraction for uploaded resumes.

use std::io::Read;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File is not a PDF: {}", .0.display())]
    NotPdf(PathBuf),

    #[error("PDF file is empty: {}", .0.display())]
    Empty(PathBuf),

    #[error("PDF could not be parsed: {0}")]
    Malformed(String),

    #[error("PDF has no pages: {}", .0.display())]
    NoPages(PathBuf),

    #[error("Failed to extract text from PDF: {0}")]
    Extraction(String),

    #[error("No text could be extracted from the PDF")]
    NoText,

    #[error("PDF I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Page count, size and document-information metadata of a PDF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub file_size: u64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Validates and extracts the text of a PDF, trimmed. Both steps run on the
/// blocking pool; a panic inside the PDF parser is reported as an extraction error.
pub async fn extract_text_from_pdf(path: &Path) -> Result<String, PdfError> {
    let owned = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || {
        if let Err(e) = validate_pdf(&owned) {
            warn!("PDF validation failed: {e}");
            return Err(e);
        }
        pdf_extract::extract_text(&owned).map_err(|e| PdfError::Extraction(format!("{e:?}")))
    })
    .await
    .map_err(|e| PdfError::Extraction(format!("parser aborted: {e}")))??;

    let text = text.trim();
    if text.is_empty() {
        return Err(PdfError::NoText);
    }

    info!("Extracted {} characters from {}", text.chars().count(), path.display());
    Ok(text.to_string())
}

/// [`pdf_info`] on the blocking pool.
pub async fn read_pdf_info(path: &Path) -> Result<PdfInfo, PdfError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf_info(&owned))
        .await
        .map_err(|e| PdfError::Malformed(format!("parser aborted: {e}")))?
}

/// Checks that `path` is a readable PDF with at least one page.
pub fn validate_pdf(path: &Path) -> Result<(), PdfError> {
    load_document(path).map(|_| ())
}

pub fn pdf_info(path: &Path) -> Result<PdfInfo, PdfError> {
    let document = load_document(path)?;
    let file_size = std::fs::metadata(path)?.len();

    let info = info_dictionary(&document);
    let field = |key: &[u8]| {
        info.and_then(|dict| dict.get(key).ok())
            .and_then(|value| text_value(&document, value))
    };

    Ok(PdfInfo {
        page_count: document.get_pages().len(),
        file_size,
        title: field(b"Title"),
        author: field(b"Author"),
        creator: field(b"Creator"),
        creation_date: field(b"CreationDate"),
        modification_date: field(b"ModDate"),
    })
}

fn load_document(path: &Path) -> Result<Document, PdfError> {
    check_file(path)?;
    let document = Document::load(path).map_err(|e| PdfError::Malformed(e.to_string()))?;
    if document.get_pages().is_empty() {
        return Err(PdfError::NoPages(path.to_path_buf()));
    }
    Ok(document)
}

/// Existence, `.pdf` extension, non-empty, `%PDF-` header.
fn check_file(path: &Path) -> Result<(), PdfError> {
    if !path.exists() {
        return Err(PdfError::NotFound(path.to_path_buf()));
    }
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(PdfError::NotPdf(path.to_path_buf()));
    }
    if std::fs::metadata(path)?.len() == 0 {
        return Err(PdfError::Empty(path.to_path_buf()));
    }

    let mut header = [0u8; 5];
    let mut file = std::fs::File::open(path)?;
    let read = file.read(&mut header)?;
    if &header[..read] != PDF_MAGIC {
        return Err(PdfError::NotPdf(path.to_path_buf()));
    }
    Ok(())
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    let info = document.trailer.get(b"Info").ok()?;
    resolve(document, info).as_dict().ok()
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        other => other,
    }
}

fn text_value(document: &Document, object: &Object) -> Option<String> {
    match resolve(document, object) {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// UTF-16BE when the string carries a byte order mark, otherwise single-byte text.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
