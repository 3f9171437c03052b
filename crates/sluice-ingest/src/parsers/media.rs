//! Audio and video parser with transcription support.

use super::{ensure_exists, file_title, DocumentParser};
use crate::converter::{Converted, StructuredDoc};
use crate::error::{IngestError, IngestResult};
use sluice_core::FileFormat;
use sluice_process::{
    extract_audio, probe_media, segments_to_text, split_audio, transcribe_audio,
    transcribe_segments, MediaInfo, TranscriptSegment,
};
use std::path::Path;
use tempfile::tempdir;
use tracing::{debug, info};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Transcribes recordings with Whisper.
///
/// Video is reduced to its audio track first. Audio larger than
/// `max_single_call_mb` is split into `segment_seconds` pieces that are
/// transcribed on `workers` threads and reassembled in recording order,
/// unless ffprobe reports the recording fits in a single piece.
#[derive(Debug, Clone)]
pub struct MediaParser {
    whisper_model: String,
    segment_seconds: u64,
    max_single_call_mb: f64,
    workers: usize,
}

impl MediaParser {
    pub fn new(
        whisper_model: impl Into<String>,
        segment_seconds: u64,
        max_single_call_mb: f64,
        workers: usize,
    ) -> Self {
        Self {
            whisper_model: whisper_model.into(),
            segment_seconds,
            max_single_call_mb,
            workers,
        }
    }

    /// Whether audio of `size_bytes` lasting `duration_secs` is split before
    /// transcription. An unknown duration splits on size alone.
    pub fn needs_split(&self, size_bytes: u64, duration_secs: Option<f64>) -> bool {
        let oversized = size_bytes as f64 > self.max_single_call_mb * BYTES_PER_MB;
        let multi_piece = duration_secs.map_or(true, |d| d > self.segment_seconds as f64);
        oversized && multi_piece
    }

    fn transcribe(
        &self,
        audio_path: &Path,
        work_dir: &Path,
        duration_secs: Option<f64>,
    ) -> IngestResult<(Vec<TranscriptSegment>, usize)> {
        let size = std::fs::metadata(audio_path)?.len();
        if !self.needs_split(size, duration_secs) {
            let segments = transcribe_audio(audio_path, &self.whisper_model, work_dir)?;
            return Ok((segments, 1));
        }

        let parts = split_audio(audio_path, work_dir, self.segment_seconds)?;
        info!(
            "Transcribing {} segments of {:?} on {} workers",
            parts.len(),
            audio_path,
            self.workers
        );
        let segments = transcribe_segments(&parts, self.workers, |part| {
            transcribe_audio(&part.path, &self.whisper_model, work_dir)
        })?;
        Ok((segments, parts.len()))
    }
}

/// Best-effort ffprobe; transcription still works without it.
fn probe(path: &Path) -> Option<MediaInfo> {
    match probe_media(path) {
        Ok(info) => Some(info),
        Err(e) => {
            debug!("Skipping media probe for {:?}: {}", path, e);
            None
        }
    }
}

/// Probed duration when ffprobe found one.
fn known_duration(info: Option<&MediaInfo>) -> Option<f64> {
    info.map(|i| i.duration).filter(|d| *d > 0.0)
}

impl DocumentParser for MediaParser {
    fn parse(&self, path: &Path) -> IngestResult<Converted> {
        ensure_exists(path)?;

        let format = FileFormat::from_path(path)
            .ok_or_else(|| IngestError::UnsupportedFileType(path.display().to_string()))?;

        info!("Processing {}: {:?}", format, path);
        let media = probe(path);
        if let Some(ref info) = media {
            if !info.has_audio {
                return Err(IngestError::ParseError {
                    path: path.to_path_buf(),
                    message: "recording has no audio track".to_string(),
                });
            }
        }
        let probed_duration = known_duration(media.as_ref());
        let work_dir = tempdir()?;

        let audio_path = match format {
            FileFormat::Video => extract_audio(path, work_dir.path())?,
            _ => path.to_path_buf(),
        };

        info!("Transcribing with Whisper ({})...", self.whisper_model);
        let (segments, pieces) = self.transcribe(&audio_path, work_dir.path(), probed_duration)?;
        info!("Transcribed {} segments", segments.len());

        let duration = probed_duration
            .or_else(|| segments.last().map(|s| s.end))
            .unwrap_or(0.0);
        let metadata = serde_json::json!({
            "format": format.as_str(),
            "duration": duration,
            "segment_count": segments.len(),
            "audio_pieces": pieces,
            "whisper_model": self.whisper_model,
        });

        Ok(Converted::new(segments_to_text(&segments))
            .with_title(file_title(path))
            .with_metadata(metadata)
            .with_structured(StructuredDoc::Transcript(segments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_threshold() {
        let parser = MediaParser::new("base", 600, 25.0, 2);
        assert!(!parser.needs_split(10 * 1024 * 1024, None));
        assert!(!parser.needs_split(25 * 1024 * 1024, None));
        assert!(parser.needs_split(25 * 1024 * 1024 + 1, None));
    }

    #[test]
    fn test_short_recording_not_split() {
        let parser = MediaParser::new("base", 600, 25.0, 2);
        let big = 200 * 1024 * 1024;
        // High-bitrate but shorter than one segment
        assert!(!parser.needs_split(big, Some(540.0)));
        assert!(parser.needs_split(big, Some(3600.0)));
        assert!(!parser.needs_split(1024, Some(3600.0)));
    }

    #[test]
    fn test_known_duration() {
        let info = |duration: f64| MediaInfo {
            duration,
            has_video: false,
            has_audio: true,
            audio_codec: Some("mp3".to_string()),
        };
        assert_eq!(known_duration(Some(&info(61.5))), Some(61.5));
        assert_eq!(known_duration(Some(&info(0.0))), None);
        assert_eq!(known_duration(None), None);
    }

    #[test]
    fn test_missing_recording() {
        let parser = MediaParser::new("base", 600, 25.0, 2);
        let err = parser.parse(Path::new("/no/such/talk.mp3")).unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }
}
