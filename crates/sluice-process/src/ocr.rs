//! OCR processing using Tesseract.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// The extracted text.
    pub text: String,
    /// Number of non-empty lines recognised.
    pub lines: usize,
}

/// Perform OCR on an image file.
pub fn ocr_image(image_path: &Path) -> ProcessResult<OcrResult> {
    if !image_path.exists() {
        return Err(ProcessError::FileNotFound(image_path.to_path_buf()));
    }
    require_tool("tesseract")?;

    debug!("Running OCR on {:?}", image_path);

    let output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .args(["--oem", "3"]) // LSTM + legacy engine
        .args(["--psm", "1"]) // Automatic page segmentation with OSD
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Tesseract sometimes outputs warnings to stderr but still works
        if !output.stdout.is_empty() {
            debug!("Tesseract warning: {}", stderr);
        } else {
            return Err(ProcessError::OcrError(stderr.to_string()));
        }
    }

    Ok(clean_ocr_output(&String::from_utf8_lossy(&output.stdout)))
}

fn clean_ocr_output(raw: &str) -> OcrResult {
    let lines: Vec<&str> = raw
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect();

    OcrResult {
        text: lines.join("\n"),
        lines: lines.len(),
    }
}
