use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::project_config::ProjectConfig;

use super::{absolute, now_iso, SyncEngine};

#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub dir: PathBuf,
    pub project_id: String,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub config_path: PathBuf,
    pub config: ProjectConfig,
}

impl SyncEngine {
    /// Binds `dir` to an existing remote project.
    pub async fn link(&self, request: LinkRequest) -> Result<LinkOutcome> {
        let dir = absolute(&request.dir)?;
        Self::check_overwrite(&dir, request.force)?;

        let client = self.client(&self.config.base_url);
        let auth = self.authenticate(&client, true).await?;
        let user_id = auth.identity.as_ref().map(|i| i.id.as_str());
        let root_folder_id = self
            .resolve_root_folder(
                &client,
                &request.project_id,
                &self.config.mongo_container,
                &self.config.container,
                user_id,
            )
            .await?;

        let config = ProjectConfig {
            base_url: client.base_url().to_string(),
            project_id: request.project_id,
            root_folder_id: Some(root_folder_id),
            mongo_container: Some(self.config.mongo_container.clone()),
            container: Some(self.config.container.clone()),
            linked_at: Some(now_iso()),
            created_at: None,
            pulled_at: None,
        };
        ensure_dir(&dir)?;
        let config_path = config.save(&dir)?;
        Ok(LinkOutcome { config_path, config })
    }
}

pub(super) fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))
}
