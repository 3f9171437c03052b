//! Content chunking for embedding and retrieval.
//!
//! Plain text is split on paragraph, then sentence, then character
//! boundaries. Transcripts are packed segment by segment so each chunk keeps
//! the time span it covers.

use crate::converter::StructuredDoc;
use sluice_config::IngestConfig;
use sluice_core::Chunk;
use sluice_process::TranscriptSegment;

/// Splits converted text into chunks for one document.
///
/// An empty result is meaningful: the file is classified `no_chunks`.
pub trait TextChunker: Send + Sync {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        structured: Option<&StructuredDoc>,
        metadata: &serde_json::Value,
    ) -> Vec<Chunk>;
}

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Target size of each chunk in characters.
    pub chunk_size: usize,
    /// Number of characters to overlap between chunks.
    pub chunk_overlap: usize,
    /// Minimum chunk size (won't create chunks smaller than this).
    pub min_chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            min_chunk_size: 100,
        }
    }
}

impl ChunkConfig {
    /// Create config from ingestion settings.
    pub fn from_ingest_config(config: &IngestConfig) -> Self {
        Self {
            // Token-based settings, roughly 4 characters per token
            chunk_size: (config.chunk_size * 4).max(1),
            chunk_overlap: config.chunk_overlap * 4,
            min_chunk_size: 100.min(config.chunk_size * 4),
        }
    }
}

/// Content chunker for splitting text.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkConfig,
}

impl TextChunker for Chunker {
    fn chunk(
        &self,
        document_id: &str,
        text: &str,
        structured: Option<&StructuredDoc>,
        _metadata: &serde_json::Value,
    ) -> Vec<Chunk> {
        match structured {
            Some(StructuredDoc::Transcript(segments)) if !segments.is_empty() => {
                self.chunk_transcript(document_id, segments)
            }
            _ => self.chunk_text(document_id, text),
        }
    }
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split text into chunks on paragraph/sentence boundaries where possible.
    pub fn chunk_text(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return vec![];
        }

        if trimmed.chars().count() <= self.config.chunk_size {
            return vec![Chunk::new(document_id.to_string(), 0, trimmed)];
        }

        let mut builder = ChunkBuilder::new(document_id, &self.config);

        for para in trimmed.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }

            let para_len = para.chars().count();
            builder.flush_if_full(para_len + 2, true);
            builder.separate("\n\n");

            if para_len <= self.config.chunk_size {
                builder.push(para);
                continue;
            }

            let sentences = split_sentences(para);
            if sentences.len() <= 1 {
                // No sentence breaks (minified JSON, long tokens)
                for piece in self.force_split_by_chars(para) {
                    builder.flush_if_full(piece.chars().count() + 1, false);
                    builder.separate(" ");
                    builder.push(&piece);
                }
            } else {
                for sentence in sentences {
                    builder.flush_if_full(sentence.chars().count() + 1, true);
                    builder.separate(" ");
                    builder.push(sentence);
                }
            }
        }

        builder.finish()
    }

    /// Force split text by character limit.
    fn force_split_by_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut result = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = std::cmp::min(start + self.config.chunk_size, chars.len());
            result.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start = end.saturating_sub(self.config.chunk_overlap).max(start + 1);
        }

        result
    }

    /// Pack transcript segments into chunks carrying their time span.
    pub fn chunk_transcript(&self, document_id: &str, segments: &[TranscriptSegment]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current_text = String::new();
        let mut current_start: Option<f64> = None;
        let mut current_end: f64 = 0.0;
        let mut chunk_index = 0;

        for segment in segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            let current_len = current_text.chars().count();

            if !current_text.is_empty() && current_len + text.chars().count() + 1 > self.config.chunk_size {
                if current_len >= self.config.min_chunk_size {
                    chunks.push(
                        Chunk::new(document_id.to_string(), chunk_index, current_text.trim())
                            .with_timestamps(current_start.unwrap_or(0.0), current_end),
                    );
                    chunk_index += 1;

                    let skip = current_len.saturating_sub(self.config.chunk_overlap);
                    current_text = current_text.chars().skip(skip).collect();
                    current_start = Some(segment.start);
                }
            }

            if current_start.is_none() {
                current_start = Some(segment.start);
            }
            if !current_text.is_empty() {
                current_text.push(' ');
            }
            current_text.push_str(text);
            current_end = segment.end;
        }

        if !current_text.trim().is_empty() {
            chunks.push(
                Chunk::new(document_id.to_string(), chunk_index, current_text.trim())
                    .with_timestamps(current_start.unwrap_or(0.0), current_end),
            );
        }

        chunks
    }
}

/// Accumulates text and emits numbered chunks.
struct ChunkBuilder<'a> {
    document_id: &'a str,
    config: &'a ChunkConfig,
    current: String,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkBuilder<'a> {
    fn new(document_id: &'a str, config: &'a ChunkConfig) -> Self {
        Self {
            document_id,
            config,
            current: String::new(),
            chunks: Vec::new(),
        }
    }

    /// Emit the current chunk if `incoming` more characters would overflow it.
    fn flush_if_full(&mut self, incoming: usize, keep_overlap: bool) {
        let current_len = self.current.chars().count();
        if current_len == 0 || current_len + incoming <= self.config.chunk_size {
            return;
        }

        let text = self.current.trim();
        if text.chars().count() >= self.config.min_chunk_size || self.chunks.is_empty() {
            let index = self.chunks.len() as i32;
            self.chunks.push(Chunk::new(self.document_id.to_string(), index, text));
        }

        if keep_overlap && self.config.chunk_overlap > 0 {
            let skip = current_len.saturating_sub(self.config.chunk_overlap);
            self.current = self.current.chars().skip(skip).collect();
        } else {
            self.current.clear();
        }
    }

    fn separate(&mut self, separator: &str) {
        if !self.current.is_empty() {
            self.current.push_str(separator);
        }
    }

    fn push(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn finish(mut self) -> Vec<Chunk> {
        let text = self.current.trim();
        if !text.is_empty() {
            let index = self.chunks.len() as i32;
            self.chunks.push(Chunk::new(self.document_id.to_string(), index, text));
        }
        self.chunks
    }
}

/// Split text into sentences ending in `.`, `!` or `?`.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if c == '.' || c == '!' || c == '?' {
            let next_idx = i + c.len_utf8();
            if next_idx >= text.len() || text[next_idx..].starts_with(' ') || text[next_idx..].starts_with('\n') {
                sentences.push(&text[start..next_idx]);
                start = next_idx;
                if text[start..].starts_with(' ') {
                    start += 1;
                }
            }
        }
    }

    if start < text.len() {
        let remaining = text[start..].trim();
        if !remaining.is_empty() {
            sentences.push(remaining);
        }
    }

    sentences
}
