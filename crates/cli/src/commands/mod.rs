//! Command handlers for the Policy Assistant CLI.

pub mod chat;
pub mod index;
pub mod reconcile;
pub mod stats;

// Re-export command types for convenience
pub use chat::ChatCommand;
pub use index::IndexCommand;
pub use reconcile::ReconcileCommand;
pub use stats::StatsCommand;

use policy_core::{config::AppConfig, AppResult};
use policy_knowledge::KnowledgeBase;

const PROVIDER: &str = "gemini";

/// Build the providers from configuration and open the stores.
pub fn open_knowledge_base(config: &AppConfig) -> AppResult<KnowledgeBase> {
    let endpoint = config.provider_url.as_deref();

    let llm = policy_llm::create_client(PROVIDER, endpoint, &config.api_key)?;
    let embedder = policy_knowledge::create_provider(
        PROVIDER,
        &config.models.embedding,
        endpoint,
        &config.api_key,
    )?;

    KnowledgeBase::open(config, llm, embedder)
}
