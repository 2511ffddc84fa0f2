//! Chat engine: retrieve tenant context, render the prompt, generate once.

use crate::embeddings::EmbeddingClient;
use crate::rag::types::{ChatResponse, RetrievedContext};
use crate::store::MetadataStore;
use crate::tenant::validate_tenant;
use crate::types::SegmentRecord;
use crate::vector_index::VectorIndexStore;
use policy_core::{AppError, AppResult};
use policy_llm::{LlmClient, LlmRequest};
use policy_prompt::{build_chat_prompt, default_chat_prompt, PromptDefinition};
use std::sync::Arc;

/// Number of segments retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// Answers questions from a tenant's indexed policy documents.
pub struct ChatEngine {
    llm: Arc<dyn LlmClient>,
    model: String,
    embeddings: EmbeddingClient,
    vectors: Arc<VectorIndexStore>,
    store: Arc<MetadataStore>,
    prompt: PromptDefinition,
    top_k: usize,
}

impl ChatEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        embeddings: EmbeddingClient,
        vectors: Arc<VectorIndexStore>,
        store: Arc<MetadataStore>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            embeddings,
            vectors,
            store,
            prompt: default_chat_prompt(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Answer `question` for `tenant_id`.
    ///
    /// A tenant with nothing indexed gets an answer generated without
    /// context and a confidence of 0. Provider failures propagate.
    pub async fn answer(&self, tenant_id: &str, question: &str) -> AppResult<ChatResponse> {
        validate_tenant(tenant_id)?;
        if question.trim().is_empty() {
            return Err(AppError::Other("Question cannot be empty".to_string()));
        }

        tracing::info!("Answering question for tenant '{}'", tenant_id);

        let retrieved = self.retrieve(tenant_id, question).await?;
        let built = build_chat_prompt(&self.prompt, &retrieved.context, question)?;

        tracing::debug!(
            "Prompt '{}' rendered ({} chars, context included: {})",
            built.source_prompt_id,
            built.text.len(),
            built.context_included
        );

        let response = self
            .llm
            .complete(&LlmRequest::new(built.text, &self.model))
            .await?;

        Ok(ChatResponse {
            answer: response.content,
            sources: retrieved.sources,
            confidence_score: retrieved.confidence,
        })
    }

    /// Retrieve the top segments for `question` from the tenant's stores.
    pub async fn retrieve(&self, tenant_id: &str, question: &str) -> AppResult<RetrievedContext> {
        if !self.vectors.exists(tenant_id) {
            tracing::info!("Tenant '{}' has no index, answering without context", tenant_id);
            return Ok(RetrievedContext::default());
        }

        let query = self.embeddings.embed_query(question).await?;

        // Tenants whose ids sanitize alike share an index file, so hits
        // without a record for this tenant are skipped and the search widened.
        let indexed = self.vectors.current_size(tenant_id)?;
        let mut fetch = self.top_k;
        let mut resolved = loop {
            let Some(hits) = self.vectors.search(tenant_id, &query, fetch)? else {
                return Ok(RetrievedContext::default());
            };
            let resolved = self.resolve(tenant_id, hits.matches())?;
            if resolved.len() >= self.top_k || fetch >= indexed {
                break resolved;
            }
            fetch = (fetch * 2).min(indexed);
            tracing::debug!("Widening search for tenant '{}' to {} hits", tenant_id, fetch);
        };
        resolved.truncate(self.top_k);

        let confidence = resolved.first().map(|(score, _)| *score).unwrap_or(0.0);

        let mut texts = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        for (score, record) in resolved {
            tracing::debug!(
                "Retrieved vector {} from '{}' (score: {:.3})",
                record.vector_id,
                record.filename,
                score
            );
            if !sources.contains(&record.filename) {
                sources.push(record.filename);
            }
            texts.push(record.text);
        }

        tracing::info!(
            "Retrieved {} segments from {} sources (top score: {:.3})",
            texts.len(),
            sources.len(),
            confidence
        );

        Ok(RetrievedContext {
            context: texts.join("\n\n"),
            segments: texts.len(),
            sources,
            confidence,
        })
    }

    /// Look up the tenant's record for each hit, in rank order.
    fn resolve(
        &self,
        tenant_id: &str,
        hits: impl Iterator<Item = (i64, f32)>,
    ) -> AppResult<Vec<(f32, SegmentRecord)>> {
        let mut resolved = Vec::new();
        for (vector_id, score) in hits {
            match self.store.find_one(vector_id, tenant_id)? {
                Some(record) => resolved.push((score, record)),
                None => {
                    tracing::warn!(
                        "Vector {} for tenant '{}' has no metadata record",
                        vector_id,
                        tenant_id
                    );
                }
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::MockProvider;
    use policy_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Generator that records prompts and returns a fixed answer.
    #[derive(Default)]
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingLlm {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(LlmResponse {
                content: "answer".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    struct FailingLlm;

    #[async_trait::async_trait]
    impl LlmClient for FailingLlm {
        fn provider_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            Err(AppError::Llm("service unavailable".to_string()))
        }
    }

    fn engine(temp: &TempDir, llm: Arc<dyn LlmClient>) -> ChatEngine {
        ChatEngine::new(
            llm,
            "gemini-2.0-flash",
            EmbeddingClient::new(Arc::new(MockProvider::new(64))),
            Arc::new(VectorIndexStore::new(temp.path())),
            Arc::new(MetadataStore::open_in_memory("policy_chunks").unwrap()),
        )
    }

    async fn seed(engine: &ChatEngine, tenant: &str, segments: &[(&str, &str)]) {
        let texts: Vec<String> = segments.iter().map(|(_, t)| t.to_string()).collect();
        let vectors = engine.embeddings.embed_documents(&texts).await.unwrap();
        let start = engine.vectors.current_size(tenant).unwrap() as i64;
        let ids: Vec<i64> = (start..start + texts.len() as i64).collect();

        let records: Vec<SegmentRecord> = ids
            .iter()
            .zip(segments)
            .map(|(id, (filename, text))| SegmentRecord {
                vector_id: *id,
                tenant_id: tenant.to_string(),
                filename: filename.to_string(),
                text: text.to_string(),
            })
            .collect();
        engine.store.insert_many(&records).unwrap();
        engine.vectors.add(tenant, &vectors, &ids).unwrap();
    }

    #[tokio::test]
    async fn test_unindexed_tenant_has_no_context() {
        let temp = TempDir::new().unwrap();
        let llm = Arc::new(RecordingLlm::default());
        let engine = engine(&temp, llm.clone());

        let response = engine.answer("initech", "How many leave days?").await.unwrap();

        assert_eq!(response.answer, "answer");
        assert!(response.sources.is_empty());
        assert_eq!(response.confidence_score, 0.0);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("How many leave days?"));
        assert!(prompts[0].contains("I cannot find that information in the policy."));
    }

    #[tokio::test]
    async fn test_context_in_rank_order() {
        let temp = TempDir::new().unwrap();
        let llm = Arc::new(RecordingLlm::default());
        let engine = engine(&temp, llm.clone());
        seed(
            &engine,
            "acme",
            &[
                ("expenses.txt", "Expense claims require itemised receipts within thirty days."),
                ("leave.txt", "Employees receive twenty annual leave days per calendar year."),
                ("leave.txt", "Unused annual leave days carry over up to five days."),
            ],
        )
        .await;

        let retrieved = engine
            .retrieve("acme", "Employees receive twenty annual leave days per calendar year.")
            .await
            .unwrap();

        assert_eq!(retrieved.segments, 3);
        assert!(retrieved
            .context
            .starts_with("Employees receive twenty annual leave days per calendar year.\n\n"));
        assert_eq!(retrieved.sources[0], "leave.txt");
        assert_eq!(retrieved.sources.len(), 2);
        assert!((retrieved.confidence - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_top_k_limits_segments() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, Arc::new(RecordingLlm::default())).with_top_k(1);
        seed(
            &engine,
            "acme",
            &[("a.txt", "Parking permits renew yearly"), ("b.txt", "Laptops are refreshed every three years")],
        )
        .await;

        let retrieved = engine.retrieve("acme", "laptops refreshed").await.unwrap();

        assert_eq!(retrieved.segments, 1);
        assert_eq!(retrieved.sources, vec!["b.txt"]);
    }

    #[tokio::test]
    async fn test_tenants_do_not_leak() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, Arc::new(RecordingLlm::default()));
        seed(&engine, "acme", &[("acme.txt", "Acme staff get unlimited sabbatical leave")]).await;
        seed(&engine, "globex", &[("globex.txt", "Globex staff get ten vacation days")]).await;

        let response = engine
            .answer("globex", "Acme staff get unlimited sabbatical leave")
            .await
            .unwrap();

        assert_eq!(response.sources, vec!["globex.txt"]);
    }

    #[tokio::test]
    async fn test_shared_index_file_skips_other_tenant() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, Arc::new(RecordingLlm::default()));
        seed(
            &engine,
            "acme-1",
            &[
                ("sabbatical.txt", "Acme staff get unlimited sabbatical leave"),
                ("sabbatical.txt", "Sabbatical leave requires director approval"),
                ("sabbatical.txt", "Unlimited sabbatical leave starts after five years"),
            ],
        )
        .await;
        seed(&engine, "acme_1", &[("parking.txt", "Parking permits renew yearly")]).await;
        assert_eq!(engine.vectors.current_size("acme_1").unwrap(), 4);

        let retrieved = engine
            .retrieve("acme_1", "Acme staff get unlimited sabbatical leave")
            .await
            .unwrap();

        assert_eq!(retrieved.sources, vec!["parking.txt"]);
        assert_eq!(retrieved.context, "Parking permits renew yearly");
        assert!(retrieved.confidence < 0.5);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let temp = TempDir::new().unwrap();
        let llm = Arc::new(RecordingLlm::default());
        let engine = engine(&temp, llm.clone());

        assert!(engine.answer("acme", "  ").await.is_err());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp, Arc::new(FailingLlm));

        let err = engine.answer("acme", "Anything?").await.unwrap_err();

        assert!(matches!(err, AppError::Llm(_)));
    }
}
