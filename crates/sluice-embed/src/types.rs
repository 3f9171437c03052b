//! Request/response types for embedding APIs.

use serde::{Deserialize, Serialize};

/// Information about an available Ollama model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Response from the Ollama /api/tags endpoint (list models).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// Request body for the Ollama /api/embeddings endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaEmbeddingRequest {
    pub model: String,
    pub prompt: String,
}

/// Response from the Ollama /api/embeddings endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaEmbeddingResponse {
    pub embedding: Vec<f32>,
}

/// Request body for an OpenAI-compatible /embeddings endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiEmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

/// Response from an OpenAI-compatible /embeddings endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiEmbeddingResponse {
    pub data: Vec<OpenAiEmbedding>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiEmbedding {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// Vectors for one batch plus where they came from.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    /// One vector per input text, in input order.
    pub vectors: Vec<Vec<f32>>,
    /// Provider name that produced the vectors.
    pub provider: String,
    /// Model that produced the vectors.
    pub model: String,
    /// Caller-visible degradations (currently dimension mismatches).
    pub warnings: Vec<String>,
}

impl EmbedOutcome {
    pub fn used_fallback(&self, primary: &str) -> bool {
        self.provider != primary
    }
}
