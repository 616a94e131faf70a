use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{PullRequest, SyncEngine};

/// Download a project into an empty directory
#[derive(Args)]
pub struct PullCommand {
    /// Remote project id
    #[arg(long)]
    project_id: String,

    /// Target directory; must be empty or missing
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

impl PullCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let outcome = engine
            .pull(PullRequest {
                dir: self.dir.clone(),
                project_id: self.project_id.clone(),
            })
            .await?;
        println!("Pulled {} -> {}", outcome.project_id, outcome.dir.display());
        println!("Wrote {}", outcome.config_path.display());
        Ok(())
    }
}
