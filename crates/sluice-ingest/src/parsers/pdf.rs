//! PDF document parser.

use super::{ensure_exists, file_title, DocumentParser};
use crate::converter::Converted;
use crate::error::{IngestError, IngestResult};
use std::path::Path;
use tracing::debug;

/// Parser for PDF files with a text layer.
#[derive(Debug, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> IngestResult<Converted> {
        ensure_exists(path)?;

        debug!("Parsing PDF: {:?}", path);

        let raw = pdf_extract::extract_text(path).map_err(|e| IngestError::ParseError {
            path: path.to_path_buf(),
            message: format!("Failed to extract text from PDF: {}", e),
        })?;

        // Form feeds separate pages in the extracted text
        let pages = raw.matches('\x0C').count().max(1);
        let content = clean_pdf_text(&raw);

        let metadata = serde_json::json!({
            "format": "pdf",
            "length": content.len(),
            "pages": pages,
        });

        debug!("Extracted {} characters from PDF", content.len());

        Ok(Converted::new(content)
            .with_title(file_title(path))
            .with_metadata(metadata))
    }
}

/// Trim lines, collapse blank runs and turn page breaks into paragraph breaks.
fn clean_pdf_text(text: &str) -> String {
    text.replace('\x0C', "\n\n")
        .lines()
        .map(|line| line.trim())
        .fold(Vec::new(), |mut acc: Vec<String>, line| {
            let last_was_empty = acc.last().map(|s| s.is_empty()).unwrap_or(false);
            if !(line.is_empty() && last_was_empty) {
                acc.push(line.to_string());
            }
            acc
        })
        .join("\n")
        .trim()
        .to_string()
}
