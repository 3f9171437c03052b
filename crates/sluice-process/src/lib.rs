//! Sluice Process - External media tools for audio, video and images.
//!
//! This crate provides:
//! - Media probing, audio extraction and segment splitting (via FFmpeg CLI)
//! - Audio transcription (via Whisper CLI), including bounded parallel
//!   transcription of long recordings split into segments
//! - OCR for images (via Tesseract CLI)
//!
//! These rely on external tools being installed on the system.

mod error;
mod ffmpeg;
mod ocr;
mod parallel;
mod transcribe;

pub use error::{ProcessError, ProcessResult};
pub use ffmpeg::{extract_audio, probe_media, split_audio, AudioSegment, MediaInfo};
pub use ocr::{ocr_image, OcrResult};
pub use parallel::transcribe_segments;
pub use transcribe::{segments_to_text, transcribe_audio, TranscriptSegment};

/// External tools the converters shell out to.
pub const TOOLS: [&str; 4] = ["ffmpeg", "ffprobe", "whisper", "tesseract"];

/// Check if required external tools are available.
pub fn check_dependencies() -> Vec<(&'static str, bool)> {
    TOOLS
        .iter()
        .map(|tool| (*tool, which::which(tool).is_ok()))
        .collect()
}

pub(crate) fn require_tool(tool: &str) -> ProcessResult<()> {
    if which::which(tool).is_err() {
        return Err(ProcessError::ToolNotFound {
            tool: tool.to_string(),
        });
    }
    Ok(())
}
