//! File-to-text conversion.

use crate::error::{IngestError, IngestResult};
use crate::parsers::{
    file_title, DocumentParser, ImageParser, MarkdownParser, MediaParser, OoxmlParser, PdfParser,
    RtfParser, TextParser,
};
use sluice_config::IngestConfig;
use sluice_core::FileFormat;
use sluice_process::TranscriptSegment;
use std::path::Path;

/// Structure a format exposes beyond plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredDoc {
    /// Timestamped speech, in recording order.
    Transcript(Vec<TranscriptSegment>),
}

/// Output of a converter.
#[derive(Debug, Clone)]
pub struct Converted {
    pub markdown: String,
    pub structured: Option<StructuredDoc>,
    pub title: String,
    pub metadata: serde_json::Value,
}

impl Converted {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            structured: None,
            title: String::new(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_structured(mut self, structured: StructuredDoc) -> Self {
        self.structured = Some(structured);
        self
    }
}

/// Converts a file into text plus optional structure.
///
/// Implementations are synchronous and may block; callers run them on a
/// blocking pool.
pub trait Converter: Send + Sync {
    fn convert(&self, path: &Path) -> IngestResult<Converted>;
}

/// Knobs for the bundled parsers.
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub whisper_model: String,
    pub audio_segment_seconds: u64,
    pub audio_max_single_call_mb: f64,
    pub audio_workers: usize,
    pub ocr_enabled: bool,
}

impl ConverterSettings {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            whisper_model: config.whisper_model.clone(),
            audio_segment_seconds: config.audio_segment_seconds,
            audio_max_single_call_mb: config.audio_max_single_call_mb,
            audio_workers: config.audio_workers,
            ocr_enabled: config.ocr_enabled,
        }
    }
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// Dispatches to a parser by detected format.
pub struct FileConverter {
    text: TextParser,
    markdown: MarkdownParser,
    pdf: PdfParser,
    rtf: RtfParser,
    ooxml: OoxmlParser,
    image: ImageParser,
    media: MediaParser,
}

impl FileConverter {
    pub fn new(settings: ConverterSettings) -> Self {
        Self {
            text: TextParser::new(),
            markdown: MarkdownParser::new(),
            pdf: PdfParser::new(),
            rtf: RtfParser::new(),
            ooxml: OoxmlParser::new(),
            image: ImageParser::new(settings.ocr_enabled),
            media: MediaParser::new(
                settings.whisper_model,
                settings.audio_segment_seconds,
                settings.audio_max_single_call_mb,
                settings.audio_workers,
            ),
        }
    }

    fn parser_for(&self, path: &Path, format: FileFormat) -> &dyn DocumentParser {
        match format {
            FileFormat::Text | FileFormat::Code => &self.text,
            FileFormat::Markdown => &self.markdown,
            FileFormat::Pdf => &self.pdf,
            FileFormat::Office => {
                let is_rtf = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("rtf"));
                if is_rtf {
                    &self.rtf
                } else {
                    &self.ooxml
                }
            }
            FileFormat::Image => &self.image,
            FileFormat::Audio | FileFormat::Video => &self.media,
        }
    }
}

impl Default for FileConverter {
    fn default() -> Self {
        Self::new(ConverterSettings::default())
    }
}

impl Converter for FileConverter {
    fn convert(&self, path: &Path) -> IngestResult<Converted> {
        let format = FileFormat::from_path(path)
            .ok_or_else(|| IngestError::UnsupportedFileType(path.display().to_string()))?;

        let mut converted = self.parser_for(path, format).parse(path)?;
        if converted.title.trim().is_empty() {
            converted.title = file_title(path);
        }
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_format() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("notes.md");
        std::fs::write(&md, "# Notes\n\nSome text.").unwrap();
        let txt = dir.path().join("plain.txt");
        std::fs::write(&txt, "plain words").unwrap();

        let converter = FileConverter::default();
        let doc = converter.convert(&md).unwrap();
        assert_eq!(doc.title, "Notes");
        assert_eq!(doc.metadata["format"], "markdown");

        let doc = converter.convert(&txt).unwrap();
        assert_eq!(doc.markdown, "plain words");
        assert!(doc.structured.is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.xyz");
        std::fs::write(&path, "data").unwrap();

        let err = FileConverter::default().convert(&path).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType(_)));
    }
}
