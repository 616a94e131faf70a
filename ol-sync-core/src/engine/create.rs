use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::project_config::ProjectConfig;
use crate::projects::ProjectDirectory;

use super::link::ensure_dir;
use super::{absolute, now_iso, SyncEngine};

/// Attempts at resolving the root folder of a project that was just created.
const ROOT_FOLDER_ATTEMPTS: u32 = 10;
const ROOT_FOLDER_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub dir: PathBuf,
    /// Defaults to the directory's name.
    pub name: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub project_id: String,
    pub config_path: PathBuf,
}

impl SyncEngine {
    /// Creates a remote project and links `dir` to it.
    pub async fn create(&self, request: CreateRequest) -> Result<CreateOutcome> {
        let dir = absolute(&request.dir)?;
        Self::check_overwrite(&dir, request.force)?;

        let name = request
            .name
            .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "Untitled".to_string());
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::Config("Project name cannot be empty.".to_string()));
        }

        let client = self.client(&self.config.base_url);
        let auth = self.authenticate(&client, true).await?;
        let project_id = ProjectDirectory::new(&client, &auth.session)
            .create(name)
            .await?;
        tracing::debug!("created project {} ({})", project_id, name);

        // The new project may not be queryable straight away.
        let user_id = auth.identity.as_ref().map(|i| i.id.as_str());
        let mut attempt = 1;
        let root_folder_id = loop {
            match self
                .resolve_root_folder(
                    &client,
                    &project_id,
                    &self.config.mongo_container,
                    &self.config.container,
                    user_id,
                )
                .await
            {
                Ok(id) => break id,
                Err(e) if attempt < ROOT_FOLDER_ATTEMPTS => {
                    tracing::debug!("root folder attempt {}/{} failed: {}", attempt, ROOT_FOLDER_ATTEMPTS, e);
                    tokio::time::sleep(ROOT_FOLDER_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let now = now_iso();
        let config = ProjectConfig {
            base_url: client.base_url().to_string(),
            project_id: project_id.clone(),
            root_folder_id: Some(root_folder_id),
            mongo_container: Some(self.config.mongo_container.clone()),
            container: Some(self.config.container.clone()),
            linked_at: Some(now.clone()),
            created_at: Some(now),
            pulled_at: None,
        };
        ensure_dir(&dir)?;
        let config_path = config.save(&dir)?;
        Ok(CreateOutcome {
            project_id,
            config_path,
        })
    }
}
