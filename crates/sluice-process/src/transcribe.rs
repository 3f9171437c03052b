//! Audio transcription using Whisper.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// A segment of transcribed audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// The transcribed text.
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

impl TranscriptSegment {
    /// Shift the segment by `offset` seconds.
    pub fn shifted(mut self, offset: f64) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }
}

#[derive(Debug, Deserialize)]
struct WhisperJsonOutput {
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    text: String,
    start: f64,
    end: f64,
}

/// Transcribe an audio file using Whisper.
///
/// Requires the `whisper` CLI to be installed (pip install openai-whisper).
pub fn transcribe_audio(
    audio_path: &Path,
    model: &str,
    output_dir: &Path,
) -> ProcessResult<Vec<TranscriptSegment>> {
    if !audio_path.exists() {
        return Err(ProcessError::FileNotFound(audio_path.to_path_buf()));
    }
    require_tool("whisper")?;

    info!("Transcribing {:?} with model '{}'", audio_path, model);

    let output = Command::new("whisper")
        .arg(audio_path)
        .args(["--model", model])
        .args(["--output_format", "json"])
        .arg("--output_dir")
        .arg(output_dir)
        .args(["--language", "en"])
        .output()?;

    if !output.status.success() {
        return Err(ProcessError::TranscriptionError(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let stem = audio_path.file_stem().and_then(|s| s.to_str()).unwrap_or("audio");
    let json_path = output_dir.join(format!("{}.json", stem));

    if !json_path.exists() {
        return Err(ProcessError::TranscriptionError(
            "Whisper output file not found".to_string(),
        ));
    }

    let segments = parse_whisper_json(&std::fs::read_to_string(&json_path)?)?;
    debug!("Transcribed {} segments", segments.len());
    Ok(segments)
}

fn parse_whisper_json(json: &str) -> ProcessResult<Vec<TranscriptSegment>> {
    let whisper_output: WhisperJsonOutput = serde_json::from_str(json)
        .map_err(|e| ProcessError::ParseError(format!("Failed to parse Whisper output: {}", e)))?;

    Ok(whisper_output
        .segments
        .into_iter()
        .map(|s| TranscriptSegment {
            text: s.text.trim().to_string(),
            start: s.start,
            end: s.end,
        })
        .filter(|s| !s.text.is_empty())
        .collect())
}

/// Get the full transcript text from segments.
pub fn segments_to_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_segments_to_text() {
        let segments = vec![seg("Hello", 0.0, 1.0), seg("world", 1.0, 2.0)];
        assert_eq!(segments_to_text(&segments), "Hello world");
    }

    #[test]
    fn test_parse_whisper_json() {
        let json = r#"{"text": "hi there", "segments": [
            {"text": " hi ", "start": 0.0, "end": 1.2},
            {"text": "   ", "start": 1.2, "end": 1.4},
            {"text": "there", "start": 1.4, "end": 2.0}
        ]}"#;
        let segments = parse_whisper_json(json).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hi");
    }

    #[test]
    fn test_shifted() {
        let s = seg("x", 1.0, 2.5).shifted(600.0);
        assert_eq!(s.start, 601.0);
        assert_eq!(s.end, 602.5);
    }
}
