use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{ApplyOutcome, ApplyRequest, SyncEngine};

/// Copy a staged inbox batch into the directory
#[derive(Args)]
pub struct ApplyCommand {
    /// Local directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Remote project id (when the directory is not linked)
    #[arg(long)]
    project_id: Option<String>,

    /// Batch id to apply (defaults to the newest)
    #[arg(long)]
    batch: Option<String>,
}

impl ApplyCommand {
    pub fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let outcome = engine.apply(ApplyRequest {
            dir: self.dir.clone(),
            project_id: self.project_id.clone(),
            batch: self.batch.clone(),
        })?;
        for line in summary_lines(&outcome) {
            println!("{}", line);
        }
        Ok(())
    }
}

fn summary_lines(outcome: &ApplyOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "Applied {} file(s) (last-write-wins).",
        outcome.applied
    )];
    if let Some(backup) = &outcome.backup_dir {
        lines.push(format!("Backup: {}", backup.display()));
    }
    if outcome.not_deleted > 0 {
        lines.push(format!(
            "Note: {} file(s) missing on remote were NOT deleted locally.",
            outcome.not_deleted
        ));
    }
    lines
}
