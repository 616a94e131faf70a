use clap::Args;

use ol_sync_core::{Project, SyncEngine};

/// List projects visible to the account
#[derive(Args)]
pub struct ProjectsCommand {
    /// Hide archived and trashed projects
    #[arg(long)]
    active_only: bool,

    /// Print a single JSON array
    #[arg(long)]
    pub json: bool,
}

impl ProjectsCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let projects = engine.projects(self.active_only).await?;

        if self.json {
            println!("{}", serde_json::to_string(&projects)?);
            return Ok(());
        }

        for project in &projects {
            println!("{}", format_project_line(project));
        }
        Ok(())
    }
}

fn format_project_line(project: &Project) -> String {
    format!(
        "{}\t{}\t({})",
        project.id,
        project.name.as_deref().unwrap_or(""),
        project.flags_label()
    )
}
