//! FFmpeg integration for audio/video processing.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Information about a media file.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
    pub audio_codec: Option<String>,
}

/// One piece of a split recording.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub path: PathBuf,
    /// Position of the segment start within the original recording, in seconds.
    pub start_offset: f64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
}

/// Probe duration and streams of a media file.
pub fn probe_media(path: &Path) -> ProcessResult<MediaInfo> {
    if !path.exists() {
        return Err(ProcessError::FileNotFound(path.to_path_buf()));
    }
    require_tool("ffprobe")?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()?;

    if !output.status.success() {
        return Err(ProcessError::FfmpegError(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    parse_probe(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe(json: &str) -> ProcessResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ProcessError::ParseError(format!("Failed to parse ffprobe output: {}", e)))?;

    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    Ok(MediaInfo {
        duration: probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0),
        has_video: probe.streams.iter().any(|s| s.codec_type == "video"),
        has_audio: audio_stream.is_some(),
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
    })
}

/// Extract the audio track to 16 kHz mono WAV.
///
/// Returns the path to the extracted audio file.
pub fn extract_audio(input: &Path, output_dir: &Path) -> ProcessResult<PathBuf> {
    if !input.exists() {
        return Err(ProcessError::FileNotFound(input.to_path_buf()));
    }
    require_tool("ffmpeg")?;

    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("audio");
    let audio_path = output_dir.join(format!("{}.wav", stem));

    info!("Extracting audio from {:?} to {:?}", input, audio_path);

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args([
            "-vn",                   // No video
            "-acodec", "pcm_s16le",  // PCM audio
            "-ar", "16000",          // 16kHz sample rate (good for Whisper)
            "-ac", "1",              // Mono
            "-y",                    // Overwrite output
        ])
        .arg(&audio_path)
        .output()?;

    if !output.status.success() {
        return Err(ProcessError::FfmpegError(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    debug!("Audio extracted successfully");
    Ok(audio_path)
}

/// Split an audio file into consecutive 16 kHz mono WAV segments of
/// roughly `segment_seconds`.
///
/// Segments are re-encoded so cuts are sample-accurate, and their start
/// offsets come from the segment list ffmpeg writes, not from the nominal
/// segment length.
pub fn split_audio(
    audio_path: &Path,
    output_dir: &Path,
    segment_seconds: u64,
) -> ProcessResult<Vec<AudioSegment>> {
    if !audio_path.exists() {
        return Err(ProcessError::FileNotFound(audio_path.to_path_buf()));
    }
    if segment_seconds == 0 {
        return Err(ProcessError::FfmpegError("segment length must be positive".to_string()));
    }
    require_tool("ffmpeg")?;

    let stem = audio_path.file_stem().and_then(|s| s.to_str()).unwrap_or("audio");
    let pattern = output_dir.join(format!("{}_seg_%04d.wav", stem));
    let list_path = output_dir.join(format!("{}_segments.csv", stem));

    info!("Splitting {:?} into {}s segments", audio_path, segment_seconds);

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(audio_path)
        .args([
            "-vn",
            "-acodec", "pcm_s16le",
            "-ar", "16000",
            "-ac", "1",
            "-f", "segment",
            "-segment_time", &segment_seconds.to_string(),
            "-segment_list_type", "csv",
            "-reset_timestamps", "1",
            "-y",
            "-segment_list",
        ])
        .arg(&list_path)
        .arg(&pattern)
        .output()?;

    if !output.status.success() {
        return Err(ProcessError::FfmpegError(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let list = std::fs::read_to_string(&list_path)?;
    let segments = parse_segment_list(output_dir, &list)?;
    debug!("Split into {} segments", segments.len());
    Ok(segments)
}

/// Parse ffmpeg's CSV segment list (`name,start,end` per line).
fn parse_segment_list(dir: &Path, list: &str) -> ProcessResult<Vec<AudioSegment>> {
    let mut segments = Vec::new();
    for line in list.lines().map(str::trim).filter(|l| !l.is_empty()) {
        // Names may contain commas, so split the two numbers off the right.
        let mut fields = line.rsplitn(3, ',');
        let (_end, start, name) = match (fields.next(), fields.next(), fields.next()) {
            (Some(end), Some(start), Some(name)) => (end, start, name),
            _ => {
                return Err(ProcessError::ParseError(format!("Malformed segment list line: {}", line)));
            }
        };
        let start_offset = start
            .trim()
            .parse::<f64>()
            .map_err(|e| ProcessError::ParseError(format!("Bad segment start '{}': {}", start, e)))?;
        let name = name.trim().trim_matches('"').replace("\"\"", "\"");

        segments.push(AudioSegment {
            path: dir.join(name),
            start_offset,
        });
    }

    segments.sort_by(|a, b| a.start_offset.total_cmp(&b.start_offset));
    Ok(segments)
}
