//! Image parser using OCR.

use super::{ensure_exists, file_title, DocumentParser};
use crate::converter::Converted;
use crate::error::IngestResult;
use sluice_process::ocr_image;
use std::path::Path;
use tracing::debug;

/// Parser for images; produces empty text when OCR is disabled.
#[derive(Debug)]
pub struct ImageParser {
    ocr_enabled: bool,
}

impl ImageParser {
    pub fn new(ocr_enabled: bool) -> Self {
        Self { ocr_enabled }
    }
}

impl DocumentParser for ImageParser {
    fn parse(&self, path: &Path) -> IngestResult<Converted> {
        ensure_exists(path)?;

        if !self.ocr_enabled {
            debug!("OCR disabled, no text for {:?}", path);
            return Ok(Converted::new(String::new())
                .with_title(file_title(path))
                .with_metadata(serde_json::json!({ "format": "image", "ocr": false })));
        }

        let ocr = ocr_image(path)?;
        let metadata = serde_json::json!({
            "format": "image",
            "ocr": true,
            "lines": ocr.lines,
        });

        Ok(Converted::new(ocr.text)
            .with_title(file_title(path))
            .with_metadata(metadata))
    }
}
