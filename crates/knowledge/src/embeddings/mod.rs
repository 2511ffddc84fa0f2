//! Embedding client.
//!
//! Wraps an injected [`EmbeddingProvider`] and guarantees that every result
//! is an `(n, dim)` matrix of L2-normalized rows, so inner product equals
//! cosine similarity.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider, EmbeddingTask, RawEmbeddings};

use policy_core::{AppError, AppResult};
use std::sync::Arc;

/// Provider-agnostic embedding client.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Embed `texts` in one provider call.
    ///
    /// Empty input returns an empty matrix without calling the provider.
    /// Provider failures propagate unchanged.
    pub async fn embed(&self, texts: &[String], task: EmbeddingTask) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let raw = self.provider.embed_batch(texts, task).await?;
        let mut matrix = to_matrix(raw, texts.len())?;

        for row in &mut matrix {
            l2_normalize(row);
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            matrix.len(),
            matrix.first().map(|r| r.len()).unwrap_or(0)
        );

        Ok(matrix)
    }

    /// Embed document segments for storage.
    pub async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.embed(texts, EmbeddingTask::RetrievalDocument).await
    }

    /// Embed a single question as a one-row batch.
    pub async fn embed_query(&self, question: &str) -> AppResult<Vec<f32>> {
        self.embed(&[question.to_string()], EmbeddingTask::RetrievalQuery)
            .await?
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned for query".to_string()))
    }
}

/// Reshape a provider response into `expected` rows of equal width.
///
/// Nested batches are flattened into rows; a bare vector is one row.
fn to_matrix(raw: RawEmbeddings, expected: usize) -> AppResult<Vec<Vec<f32>>> {
    let rows = match raw {
        RawEmbeddings::Flat(vector) if vector.is_empty() => Vec::new(),
        RawEmbeddings::Flat(vector) => vec![vector],
        RawEmbeddings::Matrix(rows) => rows,
        RawEmbeddings::Nested(batches) => batches.into_iter().flatten().collect(),
    };

    if rows.is_empty() {
        return Ok(rows);
    }

    if rows.len() != expected {
        return Err(AppError::Embedding(format!(
            "Provider returned {} embeddings for {} inputs",
            rows.len(),
            expected
        )));
    }

    let dim = rows[0].len();
    if dim == 0 || rows.iter().any(|r| r.len() != dim) {
        return Err(AppError::Embedding(
            "Provider returned embeddings of inconsistent dimension".to_string(),
        ));
    }

    Ok(rows)
}

/// Scale `vector` to unit length. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
