//! Stats command handler.

use clap::Args;
use policy_core::{config::AppConfig, AppResult};

/// Show a tenant's index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Tenant (company) id
    #[arg(short, long)]
    pub tenant: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for tenant '{}'", self.tenant);

        let kb = super::open_knowledge_base(config)?;
        let stats = kb.stats(&self.tenant)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Tenant: {}", stats.tenant_id);
            println!("Vectors: {}", stats.vector_count);
            println!("Segments: {}", stats.record_count);
            if stats.filenames.is_empty() {
                println!("Documents: (none)");
            } else {
                println!("Documents:");
                for filename in &stats.filenames {
                    println!("- {}", filename);
                }
            }
        }

        Ok(())
    }
}
