//! Sluice Embed - Embedding generation with provider fallback.
//!
//! This crate provides async clients for OpenAI-compatible and Ollama
//! embedding endpoints behind the [`EmbeddingProvider`] trait, and a
//! [`ResilientEmbedder`] that retries the primary provider with exponential
//! backoff before falling back to a local provider.

mod error;
mod ollama;
mod openai;
mod provider;
mod resilient;
mod types;

pub use error::{EmbedError, EmbedResult};
pub use ollama::OllamaClient;
pub use openai::OpenAiProvider;
pub use provider::{create_provider, EmbeddingProvider};
pub use resilient::{truncate_chars, ResilientEmbedder, RetryPolicy};
pub use types::*;
