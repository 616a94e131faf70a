use clap::Args;
use std::path::PathBuf;

use ol_sync_core::{SyncEngine, WatchRequest};

/// Upload files as they change
#[derive(Args)]
pub struct WatchCommand {
    /// Local directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Remote project id (when the directory is not linked)
    #[arg(long)]
    project_id: Option<String>,

    /// Report changes without uploading
    #[arg(long)]
    dry_run: bool,
}

impl WatchCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let request = WatchRequest {
            dir: self.dir.clone(),
            project_id: self.project_id.clone(),
            dry_run: self.dry_run,
        };
        engine
            .watch(request, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        Ok(())
    }
}
