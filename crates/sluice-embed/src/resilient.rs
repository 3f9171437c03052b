//! Retry, backoff and fallback around embedding providers.

use crate::error::{EmbedError, EmbedResult};
use crate::provider::{create_provider, EmbeddingProvider};
use crate::types::EmbedOutcome;
use sluice_config::{EmbeddingConfig, EmbeddingResilienceConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Exponential backoff schedule for the primary provider.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_secs_f64(config.initial_retry_delay_secs.max(0.0)),
            max_delay: Duration::from_secs_f64(config.max_retry_delay_secs.max(0.0)),
            multiplier: config.retry_multiplier,
        }
    }

    /// `min(initial * multiplier^attempt, max)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EmbeddingResilienceConfig::default())
    }
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Primary provider with retries, plus an optional fallback.
pub struct ResilientEmbedder {
    primary: Arc<dyn EmbeddingProvider>,
    fallback: Option<Arc<dyn EmbeddingProvider>>,
    policy: RetryPolicy,
    dimensions: usize,
    max_chars: usize,
}

impl ResilientEmbedder {
    pub fn new(
        primary: Arc<dyn EmbeddingProvider>,
        fallback: Option<Arc<dyn EmbeddingProvider>>,
        policy: RetryPolicy,
        dimensions: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            policy,
            dimensions,
            max_chars,
        }
    }

    /// Build both providers from configuration.
    pub fn from_config(
        embedding: &EmbeddingConfig,
        resilience: &EmbeddingResilienceConfig,
    ) -> EmbedResult<Self> {
        let timeout = Duration::from_secs(embedding.request_timeout_secs.max(1));
        let api_key = if embedding.api_key_env.is_empty() {
            None
        } else {
            std::env::var(&embedding.api_key_env).ok()
        };

        let primary = create_provider(
            &embedding.provider,
            &embedding.url,
            &embedding.model,
            Some(embedding.dimensions),
            api_key,
            timeout,
        )?;

        let fallback = if resilience.enable_fallback {
            Some(create_provider(
                &resilience.fallback_provider,
                &resilience.fallback_url,
                &resilience.fallback_model,
                None,
                None,
                timeout,
            )?)
        } else {
            None
        };

        Ok(Self::new(
            primary,
            fallback,
            RetryPolicy::from_config(resilience),
            embedding.dimensions,
            embedding.max_chars(),
        ))
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a batch, retrying the primary and falling back when it gives up.
    ///
    /// Returns one vector per text or an error; never a partial batch.
    pub async fn embed_batch(&self, texts: &[String]) -> EmbedResult<EmbedOutcome> {
        let inputs: Vec<String> = texts
            .iter()
            .map(|t| {
                let truncated = truncate_chars(t, self.max_chars);
                if truncated.len() < t.len() {
                    debug!("Truncated text from {} to {} bytes", t.len(), truncated.len());
                }
                truncated.to_string()
            })
            .collect();

        if inputs.is_empty() {
            return Ok(EmbedOutcome {
                vectors: Vec::new(),
                provider: self.primary.name().to_string(),
                model: self.primary.model().to_string(),
                warnings: Vec::new(),
            });
        }

        let primary_err = match self.embed_primary(&inputs).await {
            Ok(vectors) => {
                return Ok(EmbedOutcome {
                    vectors,
                    provider: self.primary.name().to_string(),
                    model: self.primary.model().to_string(),
                    warnings: Vec::new(),
                })
            }
            Err(e) => e,
        };

        let fallback = match self.fallback {
            Some(ref fallback) => fallback,
            None => {
                warn!("Primary embedding provider failed and fallback is disabled: {}", primary_err);
                return Err(EmbedError::Exhausted {
                    primary: primary_err.to_string(),
                    fallback: "fallback disabled".to_string(),
                });
            }
        };

        warn!(
            "Primary embedding provider {} failed ({}), trying fallback {}",
            self.primary.name(),
            primary_err,
            fallback.name()
        );

        match self.embed_fallback(fallback.as_ref(), &inputs).await {
            Ok(outcome) => Ok(outcome),
            Err(fallback_err) => {
                warn!("Fallback embedding provider failed: {}", fallback_err);
                Err(EmbedError::Exhausted {
                    primary: primary_err.to_string(),
                    fallback: fallback_err.to_string(),
                })
            }
        }
    }

    async fn embed_primary(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            let result = self
                .primary
                .embed(texts)
                .await
                .and_then(|vectors| check_count(vectors, texts.len()));

            match result {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        "Embedding attempt {} failed ({}), retrying in {:.2}s",
                        attempt + 1,
                        e,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn embed_fallback(
        &self,
        fallback: &dyn EmbeddingProvider,
        texts: &[String],
    ) -> EmbedResult<EmbedOutcome> {
        fallback.probe().await?;

        let vectors = if fallback.supports_batching() {
            fallback.embed(texts).await?
        } else {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                let mut one = fallback.embed(std::slice::from_ref(text)).await?;
                match one.pop() {
                    Some(v) if one.is_empty() => vectors.push(v),
                    _ => {
                        return Err(EmbedError::CountMismatch {
                            expected: 1,
                            actual: one.len() + 1,
                        })
                    }
                }
                tokio::task::yield_now().await;
            }
            vectors
        };
        let vectors = check_count(vectors, texts.len())?;

        let mut warnings = Vec::new();
        if let Some(actual) = vectors.iter().map(|v| v.len()).find(|len| *len != self.dimensions) {
            let message = format!(
                "Fallback model {} returned {}-dimensional vectors, expected {}",
                fallback.model(),
                actual,
                self.dimensions
            );
            warn!("{}", message);
            warnings.push(message);
        }

        info!("Embedded {} texts with fallback {}", texts.len(), fallback.name());
        Ok(EmbedOutcome {
            vectors,
            provider: fallback.name().to_string(),
            model: fallback.model().to_string(),
            warnings,
        })
    }
}

fn check_count(vectors: Vec<Vec<f32>>, expected: usize) -> EmbedResult<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider that replays scripted failures, then succeeds.
    struct ScriptedProvider {
        name: &'static str,
        dims: usize,
        batching: bool,
        available: bool,
        failures: Mutex<VecDeque<EmbedError>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, dims: usize) -> Self {
            Self {
                name,
                dims,
                batching: true,
                available: true,
                failures: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_with(self, failures: Vec<EmbedError>) -> Self {
            *self.failures.lock().unwrap() = failures.into();
            self
        }

        fn per_text(mut self) -> Self {
            self.batching = false;
            self
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn model(&self) -> &str {
            "test-model"
        }

        fn supports_batching(&self) -> bool {
            self.batching
        }

        async fn probe(&self) -> EmbedResult<()> {
            if self.available {
                Ok(())
            } else {
                Err(EmbedError::ServerNotRunning {
                    host: "localhost".to_string(),
                })
            }
        }

        async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(texts.iter().map(|_| vec![0.5; self.dims]).collect())
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn rate_limited() -> EmbedError {
        EmbedError::RateLimited("slow down".to_string())
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(5), Duration::from_secs(30));
        assert_eq!(policy.delay(50), Duration::from_secs(30));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }

    #[tokio::test]
    async fn test_rate_limits_then_primary_success() {
        let primary = Arc::new(ScriptedProvider::new("primary", 8).failing_with(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
        ]));
        let fallback = Arc::new(ScriptedProvider::new("fallback", 8));
        let embedder = ResilientEmbedder::new(
            primary.clone(),
            Some(fallback.clone()),
            fast_policy(4),
            8,
            1000,
        );

        let outcome = embedder.embed_batch(&texts(3)).await.unwrap();

        assert_eq!(outcome.provider, "primary");
        assert_eq!(outcome.vectors.len(), 3);
        assert_eq!(primary.calls(), 4);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_exhausted_uses_fallback_without_warnings() {
        let failures = (0..5).map(|_| EmbedError::Connection("refused".into())).collect();
        let primary = Arc::new(ScriptedProvider::new("primary", 8).failing_with(failures));
        let fallback = Arc::new(ScriptedProvider::new("ollama", 8).per_text());
        let embedder = ResilientEmbedder::new(
            primary.clone(),
            Some(fallback.clone()),
            fast_policy(4),
            8,
            1000,
        );

        let outcome = embedder.embed_batch(&texts(3)).await.unwrap();

        assert_eq!(outcome.provider, "ollama");
        assert!(outcome.used_fallback("primary"));
        assert_eq!(outcome.vectors.len(), 3);
        assert!(outcome.warnings.is_empty());
        assert_eq!(primary.calls(), 5);
        // One request per text when the fallback does not batch
        assert_eq!(fallback.calls(), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_skips_retries() {
        let primary = Arc::new(ScriptedProvider::new("primary", 8).failing_with(vec![
            EmbedError::from_status(400, "bad request".into()),
        ]));
        let fallback = Arc::new(ScriptedProvider::new("fallback", 8));
        let embedder = ResilientEmbedder::new(
            primary.clone(),
            Some(fallback.clone()),
            fast_policy(4),
            8,
            1000,
        );

        let outcome = embedder.embed_batch(&texts(2)).await.unwrap();

        assert_eq!(primary.calls(), 1);
        assert_eq!(outcome.provider, "fallback");
    }

    #[tokio::test]
    async fn test_fallback_disabled_returns_aggregate_error() {
        let primary = Arc::new(ScriptedProvider::new("primary", 8).failing_with(vec![
            EmbedError::from_status(401, "no key".into()),
        ]));
        let embedder = ResilientEmbedder::new(primary, None, fast_policy(4), 8, 1000);

        let err = embedder.embed_batch(&texts(2)).await.unwrap_err();
        match err {
            EmbedError::Exhausted { primary, fallback } => {
                assert!(primary.contains("401"));
                assert_eq!(fallback, "fallback disabled");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_both_providers_fail() {
        let primary = Arc::new(ScriptedProvider::new("primary", 8).failing_with(vec![
            EmbedError::from_status(403, "forbidden".into()),
        ]));
        let fallback = Arc::new(ScriptedProvider::new("ollama", 8).unavailable());
        let embedder = ResilientEmbedder::new(primary, Some(fallback.clone()), fast_policy(2), 8, 1000);

        let err = embedder.embed_batch(&texts(1)).await.unwrap_err();
        assert!(matches!(err, EmbedError::Exhausted { .. }));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_a_warning() {
        let primary = Arc::new(
            ScriptedProvider::new("primary", 1536)
                .failing_with(vec![EmbedError::from_status(404, "no model".into())]),
        );
        let fallback = Arc::new(ScriptedProvider::new("ollama", 768));
        let embedder = ResilientEmbedder::new(primary, Some(fallback), fast_policy(1), 1536, 1000);

        let outcome = embedder.embed_batch(&texts(2)).await.unwrap();

        assert_eq!(outcome.vectors[0].len(), 768);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("768"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let primary = Arc::new(ScriptedProvider::new("primary", 8));
        let embedder = ResilientEmbedder::new(primary.clone(), None, fast_policy(1), 8, 10);

        let outcome = embedder.embed_batch(&[]).await.unwrap();
        assert!(outcome.vectors.is_empty());
        assert_eq!(primary.calls(), 0);
    }

    #[test]
    fn test_from_config_without_fallback() {
        let resilience = EmbeddingResilienceConfig {
            enable_fallback: false,
            ..Default::default()
        };
        let embedder = ResilientEmbedder::from_config(&EmbeddingConfig::default(), &resilience).unwrap();
        assert_eq!(embedder.primary_name(), "openai");
        assert!(embedder.fallback.is_none());
        assert_eq!(embedder.dimensions(), 768);
    }
}
