use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{CreateRequest, SyncEngine};

/// Create a remote project and bind a directory to it
#[derive(Args)]
pub struct CreateCommand {
    /// Local directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Project name (defaults to the directory name)
    #[arg(long)]
    name: Option<String>,

    /// Replace an existing .ol-sync.json
    #[arg(long, short)]
    force: bool,
}

impl CreateCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let outcome = engine
            .create(CreateRequest {
                dir: self.dir.clone(),
                name: self.name.clone(),
                force: self.force,
            })
            .await?;
        println!("Created {}", outcome.project_id);
        println!("Wrote {}", outcome.config_path.display());
        Ok(())
    }
}
