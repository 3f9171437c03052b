//! Format-specific parsers behind [`crate::FileConverter`].

mod image;
mod markdown;
mod media;
mod ooxml;
mod pdf;
mod rtf;
mod text;

pub use image::ImageParser;
pub use markdown::MarkdownParser;
pub use media::MediaParser;
pub use ooxml::OoxmlParser;
pub use pdf::PdfParser;
pub use rtf::RtfParser;
pub use text::TextParser;

use crate::converter::Converted;
use crate::error::{IngestError, IngestResult};
use std::path::Path;

/// Turns one file into text.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, path: &Path) -> IngestResult<Converted>;
}

/// File stem, used when a format carries no title of its own.
pub(crate) fn file_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

pub(crate) fn ensure_exists(path: &Path) -> IngestResult<()> {
    if !path.exists() {
        return Err(IngestError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}
