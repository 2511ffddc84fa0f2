//! Reconcile command handler.

use clap::Args;
use policy_core::{config::AppConfig, AppResult};

/// Repair a tenant's stores after an interrupted indexing run
#[derive(Args, Debug)]
pub struct ReconcileCommand {
    /// Tenant (company) id
    #[arg(short, long)]
    pub tenant: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReconcileCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing reconcile command for tenant '{}'", self.tenant);

        let kb = super::open_knowledge_base(config)?;
        let report = kb.reconcile(&self.tenant).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if report.is_clean() {
            println!(
                "Tenant '{}' is consistent ({} vectors)",
                report.tenant_id, report.vector_count
            );
        } else {
            println!("Tenant '{}' ({} vectors):", report.tenant_id, report.vector_count);
            println!("  Rolled back operations: {}", report.rolled_back_operations);
            println!("  Completed operations:   {}", report.completed_operations);
            println!("  Purged records:         {}", report.purged_records);
            println!("  Vectors without text:   {}", report.missing_metadata.len());
        }

        Ok(())
    }
}
