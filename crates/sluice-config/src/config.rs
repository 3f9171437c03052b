//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub timeout: TimeoutConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub resilience: EmbeddingResilienceConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load and validate configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        debug!(
            "Loaded config from {:?} (profile {}, {} watch directories)",
            path,
            config.general.profile_key,
            config.watch.directories.len()
        );
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&paths.config_file)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        let default_config = Self::default_config_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, default_config)?;
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        self.timeout.validate()?;
        self.resilience.validate()?;
        self.ingest.validate()?;

        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Set a single value by dotted key (e.g. `timeout.max_retries`).
    ///
    /// List values are comma separated. The result is validated before it is kept.
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let mut next = self.clone();
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["general", "data_dir"] => next.general.data_dir = optional_string(value),
            ["general", "profile_key"] => next.general.profile_key = value.to_string(),

            ["ingest", "max_concurrent_files"] => next.ingest.max_concurrent_files = parse(key, value)?,
            ["ingest", "cpu_workers"] => next.ingest.cpu_workers = parse(key, value)?,
            ["ingest", "chunk_size"] => next.ingest.chunk_size = parse(key, value)?,
            ["ingest", "chunk_overlap"] => next.ingest.chunk_overlap = parse(key, value)?,
            ["ingest", "embed_batch_size"] => next.ingest.embed_batch_size = parse(key, value)?,
            ["ingest", "pdf_probe_pages"] => next.ingest.pdf_probe_pages = parse(key, value)?,
            ["ingest", "pdf_min_text_chars"] => next.ingest.pdf_min_text_chars = parse(key, value)?,
            ["ingest", "audio_segment_seconds"] => next.ingest.audio_segment_seconds = parse(key, value)?,
            ["ingest", "audio_max_single_call_mb"] => {
                next.ingest.audio_max_single_call_mb = parse(key, value)?
            }
            ["ingest", "audio_workers"] => next.ingest.audio_workers = parse(key, value)?,
            ["ingest", "whisper_model"] => next.ingest.whisper_model = value.to_string(),
            ["ingest", "ocr_enabled"] => next.ingest.ocr_enabled = parse(key, value)?,
            ["ingest", "ignore_patterns"] => next.ingest.ignore_patterns = list(value),

            ["timeout", "base_timeout_secs"] => next.timeout.base_timeout_secs = parse(key, value)?,
            ["timeout", "seconds_per_mb"] => next.timeout.seconds_per_mb = parse(key, value)?,
            ["timeout", "max_timeout_secs"] => next.timeout.max_timeout_secs = parse(key, value)?,
            ["timeout", "pdf_multiplier"] => next.timeout.pdf_multiplier = parse(key, value)?,
            ["timeout", "complex_pdf_threshold_mb"] => {
                next.timeout.complex_pdf_threshold_mb = parse(key, value)?
            }
            ["timeout", "complex_pdf_multiplier"] => {
                next.timeout.complex_pdf_multiplier = parse(key, value)?
            }
            ["timeout", "max_retries"] => next.timeout.max_retries = parse(key, value)?,
            ["timeout", "retry_timeout_multiplier"] => {
                next.timeout.retry_timeout_multiplier = parse(key, value)?
            }

            ["embedding", "provider"] => next.embedding.provider = value.to_string(),
            ["embedding", "url"] => next.embedding.url = value.to_string(),
            ["embedding", "model"] => next.embedding.model = value.to_string(),
            ["embedding", "dimensions"] => next.embedding.dimensions = parse(key, value)?,
            ["embedding", "max_tokens"] => next.embedding.max_tokens = parse(key, value)?,
            ["embedding", "api_key_env"] => next.embedding.api_key_env = value.to_string(),
            ["embedding", "request_timeout_secs"] => {
                next.embedding.request_timeout_secs = parse(key, value)?
            }

            ["resilience", "max_retries"] => next.resilience.max_retries = parse(key, value)?,
            ["resilience", "initial_retry_delay_secs"] => {
                next.resilience.initial_retry_delay_secs = parse(key, value)?
            }
            ["resilience", "max_retry_delay_secs"] => {
                next.resilience.max_retry_delay_secs = parse(key, value)?
            }
            ["resilience", "retry_multiplier"] => next.resilience.retry_multiplier = parse(key, value)?,
            ["resilience", "enable_fallback"] => next.resilience.enable_fallback = parse(key, value)?,
            ["resilience", "fallback_provider"] => next.resilience.fallback_provider = value.to_string(),
            ["resilience", "fallback_model"] => next.resilience.fallback_model = value.to_string(),
            ["resilience", "fallback_url"] => next.resilience.fallback_url = value.to_string(),

            ["watch", "directories"] => next.watch.directories = list(value),
            ["watch", "poll_interval_seconds"] => next.watch.poll_interval_seconds = parse(key, value)?,

            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Sluice Configuration
# Concurrent document ingestion into a chunk + embedding store

[general]
# Data directory for the database
# data_dir = "~/.local/share/sluice"

# Tag recorded on every document and stats row
profile_key = "default"

[ingest]
# Files processed end to end at once
max_concurrent_files = 2

# Threads for hashing, conversion and chunking
cpu_workers = 2

# Chunking (approximate tokens)
chunk_size = 512
chunk_overlap = 50

# Texts sent per embedding request
embed_batch_size = 32

# Image-only PDF detection
pdf_probe_pages = 3
pdf_min_text_chars = 50

# Long audio is split into segments transcribed in parallel
audio_segment_seconds = 600
audio_max_single_call_mb = 25
audio_workers = 2

# Whisper model size: tiny, base, small, medium, large
whisper_model = "base"

# OCR for images
ocr_enabled = true

# File patterns to skip during discovery
ignore_patterns = [
    "*.tmp",
    "*.temp",
    ".DS_Store",
    "._*",
    "*.part",
]

[timeout]
# deadline = base + size_mb * seconds_per_mb, scaled for PDFs and retries
base_timeout_secs = 120.0
seconds_per_mb = 30.0
max_timeout_secs = 1800.0
pdf_multiplier = 1.5
complex_pdf_threshold_mb = 10.0
complex_pdf_multiplier = 2.0

# Retry rounds for files that hit their deadline
max_retries = 2
retry_timeout_multiplier = 1.5

[embedding]
# Primary provider: "openai" (any OpenAI-compatible endpoint) or "ollama"
provider = "openai"
url = "https://api.openai.com/v1"
model = "text-embedding-3-small"
dimensions = 768
max_tokens = 8191

# Environment variable holding the API key
api_key_env = "OPENAI_API_KEY"
request_timeout_secs = 60

[resilience]
# Primary is tried once plus up to max_retries retries
max_retries = 4
initial_retry_delay_secs = 1.0
max_retry_delay_secs = 30.0
retry_multiplier = 2.0

# Local fallback used when the primary is exhausted or rejects the request
enable_fallback = true
fallback_provider = "ollama"
fallback_model = "nomic-embed-text"
fallback_url = "http://localhost:11434"

[watch]
# Directories to watch for new files
directories = [
    # "~/Documents/Inbox",
]

# Debounce window (seconds)
poll_interval_seconds = 5
"#
        .to_string()
    }

    /// Add a directory to the watch list.
    pub fn add_watch_directory(&mut self, path: String) {
        if !self.watch.directories.contains(&path) {
            self.watch.directories.push(path);
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn optional_string(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
    pub profile_key: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            profile_key: "default".to_string(),
        }
    }
}

/// Ingestion pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_concurrent_files: usize,
    pub cpu_workers: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
    pub pdf_probe_pages: usize,
    pub pdf_min_text_chars: usize,
    pub audio_segment_seconds: u64,
    pub audio_max_single_call_mb: f64,
    pub audio_workers: usize,
    pub whisper_model: String,
    pub ocr_enabled: bool,
    pub ignore_patterns: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: 2,
            cpu_workers: 2,
            chunk_size: 512,
            chunk_overlap: 50,
            embed_batch_size: 32,
            pdf_probe_pages: 3,
            pdf_min_text_chars: 50,
            audio_segment_seconds: 600,
            audio_max_single_call_mb: 25.0,
            audio_workers: 2,
            whisper_model: "base".to_string(),
            ocr_enabled: true,
            ignore_patterns: vec![
                "*.tmp".to_string(),
                "*.temp".to_string(),
                ".DS_Store".to_string(),
                "._*".to_string(),
                "*.part".to_string(),
            ],
        }
    }
}

impl IngestConfig {
    fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("ingest.max_concurrent_files", self.max_concurrent_files),
            ("ingest.cpu_workers", self.cpu_workers),
            ("ingest.chunk_size", self.chunk_size),
            ("ingest.embed_batch_size", self.embed_batch_size),
            ("ingest.pdf_probe_pages", self.pdf_probe_pages),
            ("ingest.audio_workers", self.audio_workers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(
                "ingest.chunk_overlap must be smaller than ingest.chunk_size".to_string(),
            ));
        }
        if self.audio_segment_seconds == 0 {
            return Err(ConfigError::Invalid(
                "ingest.audio_segment_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Adaptive per-file deadline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub base_timeout_secs: f64,
    pub seconds_per_mb: f64,
    pub max_timeout_secs: f64,
    pub pdf_multiplier: f64,
    pub complex_pdf_threshold_mb: f64,
    pub complex_pdf_multiplier: f64,
    pub max_retries: u32,
    pub retry_timeout_multiplier: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            base_timeout_secs: 120.0,
            seconds_per_mb: 30.0,
            max_timeout_secs: 1800.0,
            pdf_multiplier: 1.5,
            complex_pdf_threshold_mb: 10.0,
            complex_pdf_multiplier: 2.0,
            max_retries: 2,
            retry_timeout_multiplier: 1.5,
        }
    }
}

impl TimeoutConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let multipliers = [
            ("timeout.pdf_multiplier", self.pdf_multiplier),
            ("timeout.complex_pdf_multiplier", self.complex_pdf_multiplier),
            ("timeout.retry_timeout_multiplier", self.retry_timeout_multiplier),
        ];
        for (name, value) in multipliers {
            if !(value.is_finite() && value >= 1.0) {
                return Err(ConfigError::Invalid(format!("{} must be >= 1.0", name)));
            }
        }
        let finite = [
            self.base_timeout_secs,
            self.seconds_per_mb,
            self.max_timeout_secs,
            self.complex_pdf_threshold_mb,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid("timeout values must be finite numbers".to_string()));
        }
        if self.base_timeout_secs <= 0.0 || self.seconds_per_mb < 0.0 {
            return Err(ConfigError::Invalid(
                "timeout.base_timeout_secs must be positive and seconds_per_mb non-negative"
                    .to_string(),
            ));
        }
        if self.max_timeout_secs < self.base_timeout_secs {
            return Err(ConfigError::Invalid(
                "timeout.max_timeout_secs must be >= timeout.base_timeout_secs".to_string(),
            ));
        }
        Ok(())
    }
}

/// Primary embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub url: String,
    pub model: String,
    pub dimensions: usize,
    pub max_tokens: usize,
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 768,
            max_tokens: 8191,
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    /// Character budget per text before truncation.
    pub fn max_chars(&self) -> usize {
        self.max_tokens.saturating_mul(4)
    }
}

/// Retry, backoff and fallback settings for embedding calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingResilienceConfig {
    pub max_retries: u32,
    pub initial_retry_delay_secs: f64,
    pub max_retry_delay_secs: f64,
    pub retry_multiplier: f64,
    pub enable_fallback: bool,
    pub fallback_provider: String,
    pub fallback_model: String,
    pub fallback_url: String,
}

impl Default for EmbeddingResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_retry_delay_secs: 1.0,
            max_retry_delay_secs: 30.0,
            retry_multiplier: 2.0,
            enable_fallback: true,
            fallback_provider: "ollama".to_string(),
            fallback_model: "nomic-embed-text".to_string(),
            fallback_url: "http://localhost:11434".to_string(),
        }
    }
}

impl EmbeddingResilienceConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "resilience.retry_multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.initial_retry_delay_secs < 0.0
            || self.max_retry_delay_secs < self.initial_retry_delay_secs
        {
            return Err(ConfigError::Invalid(
                "resilience.max_retry_delay_secs must be >= initial_retry_delay_secs >= 0"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// File watching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub directories: Vec<String>,
    pub poll_interval_seconds: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directories: vec![],
            poll_interval_seconds: 5,
        }
    }
}
