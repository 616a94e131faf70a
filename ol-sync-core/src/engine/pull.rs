use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{self, PULL_ZIP_NAME};
use crate::error::{Result, SyncError};
use crate::project_config::ProjectConfig;

use super::{absolute, blocking, now_iso, SyncEngine};

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub dir: PathBuf,
    pub project_id: String,
}

#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub project_id: String,
    pub dir: PathBuf,
    pub config_path: PathBuf,
}

impl SyncEngine {
    /// Downloads a project into a new or empty directory and links it.
    pub async fn pull(&self, request: PullRequest) -> Result<PullOutcome> {
        let dir = absolute(&request.dir)?;
        ensure_empty_directory(&dir)?;

        let client = self.client(&self.config.base_url);
        let auth = self.authenticate(&client, true).await?;

        let zip_path = dir.join(PULL_ZIP_NAME);
        archive::download_zip(&client, &auth.session, &request.project_id, &zip_path).await?;
        archive::extract(self.runner.as_ref(), &zip_path, &dir).await?;
        tokio::fs::remove_file(&zip_path)
            .await
            .map_err(|e| SyncError::io(&zip_path, e))?;
        let unpacked = dir.clone();
        blocking(&dir, move || archive::flatten_single_root(&unpacked, PULL_ZIP_NAME)).await?;

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

        let now = now_iso();
        let config = ProjectConfig {
            base_url: client.base_url().to_string(),
            project_id: request.project_id.clone(),
            root_folder_id: Some(root_folder_id),
            mongo_container: Some(self.config.mongo_container.clone()),
            container: Some(self.config.container.clone()),
            linked_at: Some(now.clone()),
            created_at: None,
            pulled_at: Some(now),
        };
        let config_path = config.save(&dir)?;
        Ok(PullOutcome {
            project_id: request.project_id,
            dir,
            config_path,
        })
    }
}

/// Creates `dir` when missing; fails when it exists and has any entry.
fn ensure_empty_directory(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => Err(SyncError::Config(format!(
            "Target path exists and is not a directory: {}",
            dir.display()
        ))),
        Ok(_) => {
            let mut entries = fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))?;
            if entries.next().is_some() {
                return Err(SyncError::Config(format!(
                    "Refusing to pull into a non-empty directory (would overwrite local files): {}",
                    dir.display()
                )));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))
        }
        Err(e) => Err(SyncError::io(dir, e)),
    }
}
