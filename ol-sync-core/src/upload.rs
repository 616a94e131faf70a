//! Single-file upload into a project folder.

use std::path::Path;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::client::OverleafClient;
use crate::error::{Result, SyncError};
use crate::session::Session;

/// What [`Uploader::upload`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Dry run: nothing was read or sent.
    Skipped,
    Uploaded,
}

/// Uploads files into one project folder. Cheap to clone into worker tasks.
#[derive(Debug, Clone)]
pub struct Uploader {
    client: OverleafClient,
    session: Arc<Session>,
    project_id: String,
    root_folder_id: String,
    dry_run: bool,
}

impl Uploader {
    pub fn new(
        client: OverleafClient,
        session: Arc<Session>,
        project_id: impl Into<String>,
        root_folder_id: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            session,
            project_id: project_id.into(),
            root_folder_id: root_folder_id.into(),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Uploads `abs_path` as `rel_path` (POSIX, relative to the project root).
    ///
    /// The server answers `{"success": true}` on success; anything else is an
    /// error carrying the response body.
    pub async fn upload(&self, abs_path: &Path, rel_path: &str) -> Result<UploadOutcome> {
        if self.dry_run {
            return Ok(UploadOutcome::Skipped);
        }

        let name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        let bytes = tokio::fs::read(abs_path)
            .await
            .map_err(|e| SyncError::io(abs_path, e))?;

        let form = Form::new()
            .text("name", name.clone())
            .text("relativePath", rel_path.to_string())
            .part("qqfile", Part::bytes(bytes).file_name(name));

        let path = format!(
            "/project/{}/upload?folder_id={}",
            self.project_id,
            urlencoding::encode(&self.root_folder_id)
        );
        let response = self.client.post_multipart(&path, &self.session, form).await?;

        let accepted = response
            .body
            .as_ref()
            .and_then(|b| b.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !response.is_success() || !accepted {
            return Err(SyncError::Network(
                format!(
                    "Upload failed ({}): HTTP {} {}",
                    rel_path,
                    response.status.as_u16(),
                    response.text
                )
                .trim()
                .to_string(),
            ));
        }
        tracing::debug!("uploaded {}", rel_path);
        Ok(UploadOutcome::Uploaded)
    }
}
