//! Gemini embedding provider.
//!
//! Calls `models/{model}:batchEmbedContents`, at most [`MAX_BATCH_SIZE`]
//! texts per request.
//! API: https://ai.google.dev/api/embeddings

use crate::embeddings::provider::{EmbeddingProvider, EmbeddingTask, RawEmbeddings};
use policy_core::{AppError, AppResult};
use policy_llm::API_KEY_HEADER;
use serde::{Deserialize, Serialize};

/// Request limit of `batchEmbedContents`.
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

/// Gemini `text-embedding-*` client.
#[derive(Debug)]
pub struct GeminiEmbeddingProvider {
    base_url: String,
    /// Model name without the `models/` prefix
    model: String,
    /// Model resource name, `models/{model}`
    resource: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiEmbeddingProvider {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        let model = model.trim_start_matches("models/").to_string();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            resource: format!("models/{}", model),
            model,
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn embed_chunk(&self, texts: &[String], task: EmbeddingTask) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/{}:batchEmbedContents", self.base_url, self.resource);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.resource,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                    task_type: task.as_str(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to Gemini: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Embedding(format!(
                "Gemini embedding error ({}): {}",
                status, error_text
            )));
        }

        let parsed: BatchEmbedResponse = response.json().await.map_err(|e| {
            AppError::Embedding(format!("Failed to parse Gemini embedding response: {}", e))
        })?;

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String], task: EmbeddingTask) -> AppResult<RawEmbeddings> {
        tracing::debug!(
            count = texts.len(),
            task = task.as_str(),
            model = %self.model,
            "Requesting Gemini embeddings"
        );

        let mut rows = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            rows.extend(self.embed_chunk(batch, task).await?);
        }

        Ok(RawEmbeddings::Matrix(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_batch_embed_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:batchEmbedContents"))
            .and(header(API_KEY_HEADER, "key"))
            .and(body_partial_json(serde_json::json!({
                "requests": [
                    {
                        "model": "models/text-embedding-004",
                        "content": {"parts": [{"text": "annual leave"}]},
                        "taskType": "RETRIEVAL_DOCUMENT"
                    },
                    {
                        "model": "models/text-embedding-004",
                        "content": {"parts": [{"text": "sick leave"}]},
                        "taskType": "RETRIEVAL_DOCUMENT"
                    }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [{"values": [1.0, 0.0]}, {"values": [0.0, 2.0]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiEmbeddingProvider::new(&server.uri(), "models/text-embedding-004", "key");
        let raw = provider
            .embed_batch(
                &["annual leave".to_string(), "sick leave".to_string()],
                EmbeddingTask::RetrievalDocument,
            )
            .await
            .unwrap();

        assert_eq!(raw, RawEmbeddings::Matrix(vec![vec![1.0, 0.0], vec![0.0, 2.0]]));
    }

    #[tokio::test]
    async fn test_large_input_is_split() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": vec![serde_json::json!({"values": [1.0]}); MAX_BATCH_SIZE]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider = GeminiEmbeddingProvider::new(&server.uri(), "text-embedding-004", "key");
        let texts: Vec<String> = (0..MAX_BATCH_SIZE + 1).map(|i| format!("t{}", i)).collect();
        let raw = provider
            .embed_batch(&texts, EmbeddingTask::RetrievalDocument)
            .await
            .unwrap();

        match raw {
            RawEmbeddings::Matrix(rows) => assert_eq!(rows.len(), MAX_BATCH_SIZE * 2),
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let provider = GeminiEmbeddingProvider::new(&server.uri(), "text-embedding-004", "bad");
        let err = provider
            .embed_batch(&["q".to_string()], EmbeddingTask::RetrievalQuery)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Embedding(_)));
        assert!(err.to_string().contains("API key not valid"));
    }
}
