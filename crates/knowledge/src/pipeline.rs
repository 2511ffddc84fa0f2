//! Indexing pipeline: document → chunks → embeddings → both stores.

use crate::chunker::chunk_text;
use crate::embeddings::EmbeddingClient;
use crate::extract::{DocumentExtractor, TextExtractor};
use crate::reconcile::reconcile;
use crate::store::MetadataStore;
use crate::tenant::{sanitize_tenant, validate_tenant};
use crate::types::SegmentRecord;
use crate::vector_index::VectorIndexStore;
use policy_core::{AppError, AppResult, RetrievalSettings};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Result of indexing one document.
///
/// Input problems are outcomes rather than errors; `Display` gives the
/// status message shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Segments were written to both stores
    Indexed {
        filename: String,
        chunks: usize,
        start_id: i64,
    },
    /// The path does not name a readable file
    FileNotFound,
    /// Extraction produced no text, or chunking produced no segments
    EmptyOrUnreadable,
    /// The provider returned no embeddings
    EmbeddingFailed,
}

impl IndexOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, IndexOutcome::Indexed { .. })
    }
}

impl fmt::Display for IndexOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOutcome::Indexed {
                filename, chunks, ..
            } => write!(f, "Indexed {} chunks from {}", chunks, filename),
            IndexOutcome::FileNotFound => write!(f, "Error: file not found"),
            IndexOutcome::EmptyOrUnreadable => write!(f, "Error: file is empty or unreadable"),
            IndexOutcome::EmbeddingFailed => write!(f, "Error: embedding failed"),
        }
    }
}

/// Per-tenant write locks.
///
/// Keyed by sanitized tenant id, since that is what names the shared index
/// file.
#[derive(Debug, Default)]
pub struct TenantLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to the tenant's stores.
    pub async fn acquire(&self, tenant_id: &str) -> AppResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| AppError::Other("Tenant lock table poisoned".to_string()))?;
            locks
                .entry(sanitize_tenant(tenant_id))
                .or_default()
                .clone()
        };

        Ok(lock.lock_owned().await)
    }
}

/// Indexes documents for tenants.
pub struct IndexingPipeline {
    embeddings: EmbeddingClient,
    vectors: Arc<VectorIndexStore>,
    store: Arc<MetadataStore>,
    extractor: Arc<dyn TextExtractor>,
    settings: RetrievalSettings,
    locks: Arc<TenantLocks>,
}

impl IndexingPipeline {
    pub fn new(
        embeddings: EmbeddingClient,
        vectors: Arc<VectorIndexStore>,
        store: Arc<MetadataStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embeddings,
            vectors,
            store,
            extractor: Arc::new(DocumentExtractor),
            settings,
            locks: Arc::new(TenantLocks::new()),
        }
    }

    /// Replace the text extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Share a lock table with other components writing the same stores.
    pub fn with_locks(mut self, locks: Arc<TenantLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> Arc<TenantLocks> {
        Arc::clone(&self.locks)
    }

    /// Index a document from disk.
    pub async fn index_document(&self, path: &Path, tenant_id: &str) -> AppResult<IndexOutcome> {
        validate_tenant(tenant_id)?;

        if !path.is_file() {
            tracing::warn!("File not found: {:?}", path);
            return Ok(IndexOutcome::FileNotFound);
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let text = self.extractor.extract_text(path);
        self.index_text(&filename, &text, tenant_id).await
    }

    /// Index already-extracted text under `filename`.
    ///
    /// Re-indexing a filename appends new segments; earlier ones are kept.
    pub async fn index_text(
        &self,
        filename: &str,
        text: &str,
        tenant_id: &str,
    ) -> AppResult<IndexOutcome> {
        validate_tenant(tenant_id)?;

        if text.is_empty() {
            tracing::warn!("No text extracted from '{}'", filename);
            return Ok(IndexOutcome::EmptyOrUnreadable);
        }

        let chunks: Vec<String> =
            chunk_text(text, self.settings.chunk_size, self.settings.chunk_overlap)?
                .into_iter()
                .map(str::to_string)
                .collect();
        if chunks.is_empty() {
            return Ok(IndexOutcome::EmptyOrUnreadable);
        }

        let vectors = self.embeddings.embed_documents(&chunks).await?;
        if vectors.is_empty() {
            tracing::warn!("Embedding provider returned nothing for '{}'", filename);
            return Ok(IndexOutcome::EmbeddingFailed);
        }

        let _guard = self.locks.acquire(tenant_id).await?;

        let report = reconcile(&self.vectors, &self.store, tenant_id)?;
        if !report.is_clean() {
            tracing::info!("Repaired tenant '{}' before indexing: {:?}", tenant_id, report);
        }

        // Ids come from the index size before either write
        let start_id = self.vectors.current_size(tenant_id)? as i64;
        let ids: Vec<i64> = (start_id..start_id + chunks.len() as i64).collect();

        let op = self
            .store
            .begin_operation(tenant_id, filename, start_id, chunks.len() as i64)?;

        let records: Vec<SegmentRecord> = ids
            .iter()
            .zip(chunks)
            .map(|(&vector_id, text)| SegmentRecord {
                vector_id,
                tenant_id: tenant_id.to_string(),
                filename: filename.to_string(),
                text,
            })
            .collect();
        let count = self.store.insert_many(&records)?;

        self.vectors.add(tenant_id, &vectors, &ids)?;
        self.store.complete_operation(&op.op_id)?;

        tracing::info!(
            "Indexed {} chunks from '{}' for tenant '{}' (ids {}..{})",
            count,
            filename,
            tenant_id,
            start_id,
            start_id + count as i64
        );

        Ok(IndexOutcome::Indexed {
            filename: filename.to_string(),
            chunks: count,
            start_id,
        })
    }
}
