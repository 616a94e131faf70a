use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{PushRequest, SyncEngine};

/// Upload every local file
#[derive(Args)]
pub struct PushCommand {
    /// Local directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Remote project id (when the directory is not linked)
    #[arg(long)]
    project_id: Option<String>,

    /// Parallel uploads
    #[arg(long)]
    concurrency: Option<usize>,

    /// List what would be uploaded
    #[arg(long)]
    dry_run: bool,
}

impl PushCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let report = engine
            .push(PushRequest {
                dir: self.dir.clone(),
                project_id: self.project_id.clone(),
                dry_run: self.dry_run,
                concurrency: self.concurrency,
            })
            .await?;
        println!("Done. uploaded={} failed={}", report.uploaded, report.failed);
        Ok(())
    }
}
