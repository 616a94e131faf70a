use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{FetchOutcome, FetchRequest, SyncEngine};

/// Stage remote changes in the inbox without touching the directory
#[derive(Args)]
pub struct FetchCommand {
    /// Local directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Remote project id (when the directory is not linked)
    #[arg(long)]
    project_id: Option<String>,

    /// Discard the batch when nothing changed
    #[arg(long)]
    skip_empty: bool,

    /// Print the manifest as JSON
    #[arg(long)]
    pub json: bool,
}

impl FetchCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let outcome = engine
            .fetch(FetchRequest {
                dir: self.dir.clone(),
                project_id: self.project_id.clone(),
                skip_empty: self.skip_empty,
            })
            .await?;

        if self.json {
            println!("{}", serde_json::to_string(&outcome.manifest)?);
            return Ok(());
        }

        for line in summary_lines(&outcome) {
            println!("{}", line);
        }
        Ok(())
    }
}

fn summary_lines(outcome: &FetchOutcome) -> Vec<String> {
    let changes = &outcome.manifest.changes;
    let counts = format!(
        "added={} modified={} deleted={}",
        changes.added.len(),
        changes.modified.len(),
        changes.deleted.len()
    );
    match &outcome.manifest_path {
        Some(path) => vec![
            format!(
                "Fetched remote snapshot into {}",
                outcome.manifest.inbox_dir
            ),
            counts,
            format!("Manifest: {}", path.display()),
        ],
        None => vec!["No remote changes; batch discarded.".to_string(), counts],
    }
}
