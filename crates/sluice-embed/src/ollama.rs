//! Ollama HTTP client.

use crate::error::{EmbedError, EmbedResult};
use crate::provider::EmbeddingProvider;
use crate::types::*;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for Ollama's embedding API.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a new client.
    pub fn new(host: impl Into<String>, model: impl Into<String>, timeout: Duration) -> EmbedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EmbedError::Http)?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> EmbedError {
        if e.is_connect() {
            EmbedError::ServerNotRunning {
                host: self.host.clone(),
            }
        } else {
            EmbedError::from_transport(e, self.timeout.as_secs())
        }
    }

    /// Check if Ollama server is available.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List all available models.
    pub async fn list_models(&self) -> EmbedResult<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.host);
        debug!("Listing models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(EmbedError::from_status(status, text));
        }

        let list: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Parse(e.to_string()))?;
        Ok(list.models)
    }

    /// Check if a specific model is available.
    pub async fn has_model(&self, model: &str) -> EmbedResult<bool> {
        let models = self.list_models().await?;
        Ok(model_listed(&models, model))
    }

    /// Generate the embedding for one text.
    pub async fn embed_one(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.host);
        debug!(
            "Generating embedding with model {} for text length {}",
            self.model,
            text.len()
        );

        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 || text.contains("not found") {
                return Err(EmbedError::ModelNotFound {
                    model: self.model.clone(),
                });
            }

            return Err(EmbedError::from_status(status.as_u16(), text));
        }

        let body: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Parse(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(EmbedError::Parse("empty embedding".to_string()));
        }
        Ok(body.embedding)
    }
}

fn model_listed(models: &[ModelInfo], model: &str) -> bool {
    // Exact match, or the untagged name of a tagged model
    models
        .iter()
        .any(|m| m.name == model || m.name.starts_with(&format!("{}:", model)))
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_batching(&self) -> bool {
        false
    }

    async fn probe(&self) -> EmbedResult<()> {
        if !self.is_available().await {
            return Err(EmbedError::ServerNotRunning {
                host: self.host.clone(),
            });
        }
        if !self.has_model(&self.model).await? {
            return Err(EmbedError::ModelNotFound {
                model: self.model.clone(),
            });
        }
        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }
        Ok(embeddings)
    }
}
