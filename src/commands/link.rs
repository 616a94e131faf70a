use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{LinkRequest, SyncEngine};

/// Bind a directory to an existing project
#[derive(Args)]
pub struct LinkCommand {
    /// Remote project id
    #[arg(long)]
    project_id: String,

    /// Local directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Replace an existing .ol-sync.json
    #[arg(long, short)]
    force: bool,
}

impl LinkCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let outcome = engine
            .link(LinkRequest {
                dir: self.dir.clone(),
                project_id: self.project_id.clone(),
                force: self.force,
            })
            .await?;
        println!("Wrote {}", outcome.config_path.display());
        Ok(())
    }
}
