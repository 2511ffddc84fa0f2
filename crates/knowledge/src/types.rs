//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human-readable side of one indexed segment, joined to its vector by
/// `(vector_id, tenant_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Position of the segment's vector in the tenant's index
    pub vector_id: i64,

    /// Owning tenant (company id)
    pub tenant_id: String,

    /// Name of the source document
    pub filename: String,

    /// Raw segment text
    pub text: String,
}

/// Journal entry for an indexing operation whose two writes have not both
/// completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub op_id: String,
    pub tenant_id: String,
    pub filename: String,

    /// First vector id of the operation's block
    pub start_id: i64,

    /// Number of segments in the block
    pub count: i64,

    pub started_at: DateTime<Utc>,
}

impl PendingOperation {
    /// One past the last vector id of the block.
    pub fn end_id(&self) -> i64 {
        self.start_id + self.count
    }
}

/// Per-tenant statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantStats {
    pub tenant_id: String,

    /// Vectors in the tenant's index
    pub vector_count: usize,

    /// Segment records in the metadata store
    pub record_count: usize,

    /// Distinct source filenames, in first-indexed order
    pub filenames: Vec<String>,
}
