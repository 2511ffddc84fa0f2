//! Multi-tenant policy knowledge base.
//!
//! Documents are chunked, embedded and stored per tenant: vectors in a flat
//! inner-product index file, segment text in a SQLite collection. Questions
//! are answered by retrieving the closest segments and handing them to a
//! generative model.

pub mod chunker;
pub mod embeddings;
pub mod extract;
pub mod pipeline;
pub mod rag;
pub mod reconcile;
pub mod store;
pub mod tenant;
pub mod types;
pub mod vector_index;


// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingClient, EmbeddingProvider, EmbeddingTask};
pub use extract::{
    DocumentExtractor, DocxExtractor, PdfExtractor, PlainTextExtractor, TextExtractor,
};
pub use pipeline::{IndexOutcome, IndexingPipeline, TenantLocks};
pub use rag::{ChatEngine, ChatResponse};
pub use reconcile::ReconcileReport;
pub use store::MetadataStore;
pub use types::{PendingOperation, SegmentRecord, TenantStats};
pub use vector_index::{SearchHits, VectorIndexStore, NO_MATCH};

use policy_core::{AppConfig, AppResult};
use policy_llm::LlmClient;
use std::path::Path;
use std::sync::Arc;

/// Indexing pipeline, chat engine and the stores they share.
pub struct KnowledgeBase {
    vectors: Arc<VectorIndexStore>,
    store: Arc<MetadataStore>,
    pipeline: IndexingPipeline,
    chat: ChatEngine,
    locks: Arc<TenantLocks>,
}

impl KnowledgeBase {
    /// Open the stores named by `config` and wire the injected providers.
    pub fn open(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let prompt = policy_prompt::resolve_prompt(config.prompt_file.as_deref())?;

        let vectors = Arc::new(VectorIndexStore::new(&config.index_dir));
        let store = Arc::new(MetadataStore::from_config(config)?);
        let embeddings = EmbeddingClient::new(embedder);

        tracing::debug!(
            "Opened knowledge base (index dir: {:?}, database: {:?}, collection: {})",
            config.index_dir,
            config.database_path(),
            config.collection
        );

        let kb = Self::from_parts(
            vectors,
            store,
            embeddings,
            llm,
            &config.models.generation,
            config.retrieval,
        );
        Ok(kb.with_prompt(prompt))
    }

    /// Assemble from already-open stores.
    pub fn from_parts(
        vectors: Arc<VectorIndexStore>,
        store: Arc<MetadataStore>,
        embeddings: EmbeddingClient,
        llm: Arc<dyn LlmClient>,
        model: &str,
        settings: policy_core::RetrievalSettings,
    ) -> Self {
        let locks = Arc::new(TenantLocks::new());
        let pipeline = IndexingPipeline::new(
            embeddings.clone(),
            Arc::clone(&vectors),
            Arc::clone(&store),
            settings,
        )
        .with_locks(Arc::clone(&locks));
        let chat = ChatEngine::new(
            llm,
            model,
            embeddings,
            Arc::clone(&vectors),
            Arc::clone(&store),
        )
        .with_top_k(settings.top_k);

        Self {
            vectors,
            store,
            pipeline,
            chat,
            locks,
        }
    }

    fn with_prompt(mut self, prompt: policy_prompt::PromptDefinition) -> Self {
        self.chat = self.chat.with_prompt(prompt);
        self
    }

    /// Index a document from disk for `tenant_id`.
    pub async fn index_document(&self, path: &Path, tenant_id: &str) -> AppResult<IndexOutcome> {
        self.pipeline.index_document(path, tenant_id).await
    }

    /// Index already-extracted text for `tenant_id`.
    pub async fn index_text(
        &self,
        filename: &str,
        text: &str,
        tenant_id: &str,
    ) -> AppResult<IndexOutcome> {
        self.pipeline.index_text(filename, text, tenant_id).await
    }

    /// Answer a question from the tenant's documents.
    pub async fn answer(&self, tenant_id: &str, question: &str) -> AppResult<ChatResponse> {
        self.chat.answer(tenant_id, question).await
    }

    /// Vector and record counts for a tenant.
    pub fn stats(&self, tenant_id: &str) -> AppResult<TenantStats> {
        tenant::validate_tenant(tenant_id)?;

        Ok(TenantStats {
            tenant_id: tenant_id.to_string(),
            vector_count: self.vectors.current_size(tenant_id)?,
            record_count: self.store.count(tenant_id)?,
            filenames: self.store.filenames(tenant_id)?,
        })
    }

    /// Repair the tenant's stores under its write lock.
    pub async fn reconcile(&self, tenant_id: &str) -> AppResult<ReconcileReport> {
        tenant::validate_tenant(tenant_id)?;

        let _guard = self.locks.acquire(tenant_id).await?;
        let report = reconcile::reconcile(&self.vectors, &self.store, tenant_id)?;

        tracing::info!(
            "Reconciled tenant '{}': {} rolled back, {} completed, {} purged, {} missing metadata",
            tenant_id,
            report.rolled_back_operations,
            report.completed_operations,
            report.purged_records,
            report.missing_metadata.len()
        );

        Ok(report)
    }
}
