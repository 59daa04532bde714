//! Document text extraction, the collaborator that feeds the Ingest stage.

use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Error, Debug)]
pub enum TextExtractionError {
    #[error("Document is empty")]
    Empty,

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF parser crashed on a malformed document")]
    PdfPanicked,

    #[error("Document is not valid UTF-8 text: {0}")]
    NotText(#[from] std::string::FromUtf8Error),
}

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, TextExtractionError>;
}

/// Digital PDFs with an embedded text layer, via pdf-extract.
/// Pages are joined with a newline.
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, TextExtractionError> {
        if bytes.is_empty() {
            return Err(TextExtractionError::Empty);
        }
        // pdf-extract can panic on malformed input
        let result =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));
        let pages = match result {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => return Err(TextExtractionError::PdfParsing(e.to_string())),
            Err(_) => return Err(TextExtractionError::PdfPanicked),
        };
        tracing::debug!(pages = pages.len(), "PDF text extracted");
        Ok(pages.join("\n"))
    }
}

/// UTF-8 text uploads (`.txt`, `.md`).
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, TextExtractionError> {
        if bytes.is_empty() {
            return Err(TextExtractionError::Empty);
        }
        let text = String::from_utf8(bytes.to_vec())?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

/// Picks the PDF or plain-text extractor from the document's leading bytes.
pub struct DocumentTextExtractor;

impl TextExtractor for DocumentTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, TextExtractionError> {
        if is_pdf(bytes) {
            PdfTextExtractor.extract_text(bytes)
        } else {
            PlainTextExtractor.extract_text(bytes)
        }
    }
}

/// PDF magic may follow a few bytes of junk; readers accept it within the first 1 KiB.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}
