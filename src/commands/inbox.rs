use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{BatchState, BatchSummary, InboxRequest, SyncEngine, DEFAULT_KEEP_LAST};

/// List or prune staged inbox batches
#[derive(Args)]
pub struct InboxCommand {
    /// Local directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Remote project id (when the directory is not linked)
    #[arg(long)]
    project_id: Option<String>,

    /// Delete old batches, keeping the newest ones and any pinned with .keep
    #[arg(long)]
    prune: bool,

    /// Batches kept by --prune
    #[arg(long, default_value_t = DEFAULT_KEEP_LAST, requires = "prune")]
    keep_last: usize,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

impl InboxCommand {
    pub fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let request = InboxRequest {
            dir: self.dir.clone(),
            project_id: self.project_id.clone(),
        };

        if self.prune {
            let removed = engine.prune_inbox(&request, self.keep_last)?;
            if self.json {
                println!("{}", serde_json::to_string(&removed)?);
            } else {
                for batch_id in &removed {
                    println!("removed {}", batch_id);
                }
                println!("Pruned {} batch(es).", removed.len());
            }
            return Ok(());
        }

        let batches = engine.inbox(&request)?;
        if self.json {
            println!("{}", serde_json::to_string(&batches)?);
            return Ok(());
        }
        if batches.is_empty() {
            println!("No inbox batches.");
        }
        for batch in &batches {
            println!("{}", format_batch_line(batch));
        }
        Ok(())
    }
}

fn format_batch_line(batch: &BatchSummary) -> String {
    let state = match batch.state {
        BatchState::Pending => "pending",
        BatchState::Applied => "applied",
    };
    let mut line = format!(
        "{}\t{}\tadded={} modified={} deleted={}",
        batch.batch_id, state, batch.added, batch.modified, batch.deleted
    );
    if batch.pinned {
        line.push_str("\t(kept)");
    }
    line
}
