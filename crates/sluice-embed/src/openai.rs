//! OpenAI-compatible embeddings client.

use crate::error::{EmbedError, EmbedResult};
use crate::provider::EmbeddingProvider;
use crate::types::*;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Batch embedding client for any `/embeddings` endpoint speaking the OpenAI format.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: Option<usize>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> EmbedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EmbedError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
            api_key,
            timeout,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Order vectors by their `index` and check the count.
fn collect_vectors(response: OpenAiEmbeddingResponse, expected: usize) -> EmbedResult<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: data.len(),
        });
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_batching(&self) -> bool {
        true
    }

    async fn probe(&self) -> EmbedResult<()> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| EmbedError::from_transport(e, self.timeout.as_secs()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(EmbedError::from_status(status, text));
        }
        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if self.api_key.is_none() && self.base_url.contains("api.openai.com") {
            return Err(EmbedError::InvalidConfig(
                "API key required for api.openai.com".to_string(),
            ));
        }

        let url = format!("{}/embeddings", self.base_url);
        debug!("Embedding {} texts with {}", texts.len(), self.model);

        let body = OpenAiEmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let response = self
            .request(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::from_transport(e, self.timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbedError::from_status(status.as_u16(), text));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Parse(e.to_string()))?;

        collect_vectors(parsed, texts.len())
    }
}
