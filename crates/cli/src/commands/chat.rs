//! Chat command handler.

use clap::Args;
use policy_core::{config::AppConfig, AppResult};

/// Ask a question against a tenant's policies
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// The question to ask
    pub question: String,

    /// Tenant (company) id
    #[arg(short, long)]
    pub tenant: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command for tenant '{}'", self.tenant);

        let kb = super::open_knowledge_base(config)?;
        let response = kb.answer(&self.tenant, &self.question).await?;

        tracing::debug!(
            "Chat response: confidence={:.3}, sources={}",
            response.confidence_score,
            response.sources.len()
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            println!("{}", response.answer);
            println!();

            if response.sources.is_empty() {
                println!("Sources: (none)");
            } else {
                println!("Sources:");
                for source in &response.sources {
                    println!("- {}", source);
                }
            }
            println!("Confidence: {:.3}", response.confidence_score);
        }

        Ok(())
    }
}
