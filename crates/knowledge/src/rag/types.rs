//! Chat response types.

use serde::{Deserialize, Serialize};

/// Answer to a tenant's question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated answer, verbatim from the model
    pub answer: String,

    /// Distinct filenames that contributed context, in rank order
    pub sources: Vec<String>,

    /// Top-1 similarity score of the retrieval; 0 when nothing was retrieved
    pub confidence_score: f32,
}

/// Context retrieved for a question, before generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrievedContext {
    /// Segment texts in rank order, joined by blank lines
    pub context: String,

    /// Distinct filenames in rank order
    pub sources: Vec<String>,

    /// Top-1 similarity score, 0 with no matches
    pub confidence: f32,

    /// Number of segments joined into `context`
    pub segments: usize,
}
