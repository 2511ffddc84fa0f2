//! Embedding provider trait and factory.

use policy_core::{AppError, AppResult};
use std::sync::Arc;

/// What the embedded text will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    /// Segments stored in the vector index
    RetrievalDocument,
    /// Questions searched against the index
    RetrievalQuery,
}

impl EmbeddingTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            EmbeddingTask::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

/// Embeddings exactly as a provider returned them.
///
/// Providers are not consistent about shape: some wrap the batch in an
/// extra dimension, some return a bare vector for a single input.
/// [`crate::embeddings::EmbeddingClient`] turns every variant into an
/// `(n, dim)` matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEmbeddings {
    /// A single vector
    Flat(Vec<f32>),
    /// One row per input
    Matrix(Vec<Vec<f32>>),
    /// A batch of matrices
    Nested(Vec<Vec<Vec<f32>>>),
}

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "gemini", "mock")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Embed a batch of texts. Failures surface as `AppError::Embedding`.
    async fn embed_batch(&self, texts: &[String], task: EmbeddingTask) -> AppResult<RawEmbeddings>;
}

/// Create an embedding provider by name.
///
/// Supported providers: `gemini` (alias `google`) and `mock`.
pub fn create_provider(
    provider: &str,
    model: &str,
    endpoint: Option<&str>,
    api_key: &str,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider.to_lowercase().as_str() {
        "gemini" | "google" => {
            if api_key.trim().is_empty() {
                return Err(AppError::Config(
                    "Gemini embedding provider requires an API key".to_string(),
                ));
            }
            let base_url = endpoint.unwrap_or(policy_llm::DEFAULT_GEMINI_URL);
            Ok(Arc::new(super::providers::gemini::GeminiEmbeddingProvider::new(
                base_url, model, api_key,
            )))
        }

        "mock" => Ok(Arc::new(super::providers::mock::MockProvider::new(
            super::providers::mock::DEFAULT_MOCK_DIMENSIONS,
        ))),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: gemini, mock",
            provider
        ))),
    }
}
