//! Index command handler.
//!
//! Indexes a file, or every supported file under a directory, for a tenant.

use clap::Args;
use policy_core::{config::AppConfig, AppResult};
use policy_knowledge::{DocumentExtractor, IndexOutcome};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Index documents for a tenant
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Files or directories to index
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Tenant (company) id
    #[arg(short, long)]
    pub tenant: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command for tenant '{}'", self.tenant);

        let kb = super::open_knowledge_base(config)?;

        let mut results = Vec::new();
        for path in self.paths.iter().flat_map(|p| collect_files(p)) {
            let outcome = kb.index_document(&path, &self.tenant).await?;
            if !self.json {
                println!("{}: {}", path.display(), outcome);
            }
            results.push((path, outcome));
        }

        let indexed = results.iter().filter(|(_, o)| o.is_indexed()).count();

        if self.json {
            let output: Vec<serde_json::Value> = results
                .iter()
                .map(|(path, outcome)| {
                    let (chunks, start_id) = match outcome {
                        IndexOutcome::Indexed {
                            chunks, start_id, ..
                        } => (Some(*chunks), Some(*start_id)),
                        _ => (None, None),
                    };
                    serde_json::json!({
                        "file": path.display().to_string(),
                        "status": outcome.to_string(),
                        "indexed": outcome.is_indexed(),
                        "chunks": chunks,
                        "startId": start_id,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Indexed {} of {} files for tenant '{}'",
                indexed,
                results.len(),
                self.tenant
            );
        }

        Ok(())
    }
}

/// Expand a path argument into the files to index.
///
/// Explicit files are always returned, so unsupported ones get a status.
/// Directories contribute only files the extractor supports, in name order.
fn collect_files(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && DocumentExtractor::supports(e.path()))
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_from_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("hr")).unwrap();
        fs::write(temp.path().join("b.md"), "b").unwrap();
        fs::write(temp.path().join("hr/a.txt"), "a").unwrap();
        fs::write(temp.path().join("handbook.docx"), "PK").unwrap();
        fs::write(temp.path().join("hr/leave.pdf"), "%PDF").unwrap();
        fs::write(temp.path().join("logo.png"), [0u8; 4]).unwrap();

        let files = collect_files(temp.path());

        assert_eq!(
            files,
            vec![
                temp.path().join("b.md"),
                temp.path().join("handbook.docx"),
                temp.path().join("hr/a.txt"),
                temp.path().join("hr/leave.pdf"),
            ]
        );
    }

    #[test]
    fn test_explicit_file_kept() {
        let path = Path::new("missing/handbook.pdf");
        assert_eq!(collect_files(path), vec![path.to_path_buf()]);
    }
}
