//! Core domain types for Sluice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for documents.
pub type DocumentId = String;

/// Unique identifier for chunks.
pub type ChunkId = String;

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Source format of a file, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Text,
    Markdown,
    Code,
    Pdf,
    Office,
    Image,
    Audio,
    Video,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Text => "text",
            FileFormat::Markdown => "markdown",
            FileFormat::Code => "code",
            FileFormat::Pdf => "pdf",
            FileFormat::Office => "office",
            FileFormat::Image => "image",
            FileFormat::Audio => "audio",
            FileFormat::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(FileFormat::Text),
            "markdown" => Some(FileFormat::Markdown),
            "code" => Some(FileFormat::Code),
            "pdf" => Some(FileFormat::Pdf),
            "office" => Some(FileFormat::Office),
            "image" => Some(FileFormat::Image),
            "audio" => Some(FileFormat::Audio),
            "video" => Some(FileFormat::Video),
            _ => None,
        }
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" | "log" | "org" | "rst" | "csv" => Some(FileFormat::Text),
            "md" | "markdown" | "mdown" | "mkd" => Some(FileFormat::Markdown),
            "rs" | "py" | "js" | "ts" | "go" | "c" | "cpp" | "h" | "java" | "rb" | "sh" | "zsh"
            | "bash" | "json" | "yaml" | "yml" | "toml" | "html" | "css" | "sql" => {
                Some(FileFormat::Code)
            }
            "pdf" => Some(FileFormat::Pdf),
            "rtf" | "docx" | "pptx" => Some(FileFormat::Office),
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tif" | "tiff" => {
                Some(FileFormat::Image)
            }
            "mp3" | "wav" | "m4a" | "flac" | "ogg" | "aac" => Some(FileFormat::Audio),
            "mp4" | "mov" | "mkv" | "webm" | "avi" | "m4v" => Some(FileFormat::Video),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Relative processing cost, used to schedule cheap files first.
    pub fn cost_rank(&self) -> u8 {
        match self {
            FileFormat::Text => 0,
            FileFormat::Markdown => 1,
            FileFormat::Code => 2,
            FileFormat::Office => 3,
            FileFormat::Pdf => 4,
            FileFormat::Image => 5,
            FileFormat::Audio => 6,
            FileFormat::Video => 7,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted document in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub source_path: String,
    pub content_hash: String,
    pub format: FileFormat,
    pub file_size: u64,
    pub profile_key: String,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl Document {
    pub fn new(
        id: DocumentId,
        title: impl Into<String>,
        source_path: impl Into<String>,
        content_hash: impl Into<String>,
        format: FileFormat,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            source_path: source_path.into(),
            content_hash: content_hash.into(),
            format,
            file_size: 0,
            profile_key: String::new(),
            created_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    pub fn with_profile_key(mut self, profile_key: impl Into<String>) -> Self {
        self.profile_key = profile_key.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A chunk of document text, optionally carrying its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: i32,
    pub content: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
}

impl Chunk {
    pub fn new(document_id: DocumentId, chunk_index: i32, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            document_id,
            chunk_index,
            content: content.into(),
            start_time: None,
            end_time: None,
            embedding: None,
            embedding_model: None,
        }
    }

    pub fn with_timestamps(mut self, start: f64, end: f64) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    pub fn with_embedding(mut self, vector: Vec<f32>, model: impl Into<String>) -> Self {
        self.embedding = Some(vector);
        self.embedding_model = Some(model.into());
        self
    }
}
