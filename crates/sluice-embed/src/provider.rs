//! The embedding provider seam.

use crate::error::{EmbedError, EmbedResult};
use crate::ollama::OllamaClient;
use crate::openai::OpenAiProvider;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A backend that turns texts into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name (e.g. `"openai"`, `"ollama"`).
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Whether one request may carry many texts.
    fn supports_batching(&self) -> bool;

    /// Check the server is reachable and the model is present.
    async fn probe(&self) -> EmbedResult<()>;

    /// Embed `texts`, returning one vector per text in input order.
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;
}

/// Build a provider by name.
pub fn create_provider(
    name: &str,
    url: &str,
    model: &str,
    dimensions: Option<usize>,
    api_key: Option<String>,
    timeout: Duration,
) -> EmbedResult<Arc<dyn EmbeddingProvider>> {
    match name {
        "openai" => Ok(Arc::new(OpenAiProvider::new(url, model, dimensions, api_key, timeout)?)),
        "ollama" => Ok(Arc::new(OllamaClient::new(url, model, timeout)?)),
        other => Err(EmbedError::InvalidConfig(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}
