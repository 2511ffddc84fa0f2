//! Consistency repair between the vector index and the metadata store.
//!
//! The two writes of an indexing operation are not transactional. The
//! journal brackets them; this pass cleans up after operations that
//! stopped in between:
//!
//! - Journal entries whose vectors never reached the index are rolled back.
//! - Records whose vector id is at or beyond the index size are purged,
//!   since the next indexing operation would allocate those ids again.
//! - Index ids with no metadata record are reported, not repaired.

use crate::store::MetadataStore;
use crate::vector_index::VectorIndexStore;
use policy_core::AppResult;
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of a reconciliation pass for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tenant_id: String,

    /// Vectors in the index when the pass ran
    pub vector_count: usize,

    /// Journal entries closed because their vectors never landed
    pub rolled_back_operations: usize,

    /// Journal entries closed because both writes had landed
    pub completed_operations: usize,

    /// Metadata records deleted for pointing past the end of the index
    pub purged_records: usize,

    /// Index ids with no metadata record
    pub missing_metadata: Vec<i64>,
}

impl ReconcileReport {
    /// Whether the pass found nothing to repair or report.
    pub fn is_clean(&self) -> bool {
        self.rolled_back_operations == 0
            && self.completed_operations == 0
            && self.purged_records == 0
            && self.missing_metadata.is_empty()
    }
}

/// Reconcile one tenant's stores.
///
/// Callers must hold the tenant's write lock.
pub fn reconcile(
    vectors: &VectorIndexStore,
    store: &MetadataStore,
    tenant_id: &str,
) -> AppResult<ReconcileReport> {
    let index = vectors.load(tenant_id)?;
    let vector_count = index.as_ref().map(|i| i.len()).unwrap_or(0);
    let size = vector_count as i64;

    let mut rolled_back_operations = 0;
    let mut completed_operations = 0;
    for op in store.pending_operations(tenant_id)? {
        if op.end_id() <= size {
            completed_operations += 1;
        } else {
            tracing::warn!(
                "Rolling back interrupted indexing of '{}' for tenant '{}' (ids {}..{})",
                op.filename,
                tenant_id,
                op.start_id,
                op.end_id()
            );
            rolled_back_operations += 1;
        }
        store.complete_operation(&op.op_id)?;
    }

    let purged_records = store.delete_from(tenant_id, size)?;
    if purged_records > 0 {
        tracing::warn!(
            "Purged {} metadata records beyond index size {} for tenant '{}'",
            purged_records,
            size,
            tenant_id
        );
    }

    let missing_metadata = match &index {
        Some(index) => {
            let known: HashSet<i64> = store.vector_ids(tenant_id)?.into_iter().collect();
            index
                .ids()
                .iter()
                .copied()
                .filter(|id| !known.contains(id))
                .collect()
        }
        None => Vec::new(),
    };
    if !missing_metadata.is_empty() {
        tracing::warn!(
            "{} vectors for tenant '{}' have no metadata record",
            missing_metadata.len(),
            tenant_id
        );
    }

    Ok(ReconcileReport {
        tenant_id: tenant_id.to_string(),
        vector_count,
        rolled_back_operations,
        completed_operations,
        purged_records,
        missing_metadata,
    })
}
