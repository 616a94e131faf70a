use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::archive::{self, FETCH_ZIP_NAME};
use crate::client::OverleafClient;
use crate::diff::{diff, ChangeSet};
use crate::error::{Result, SyncError};
use crate::inbox::{create_batch_dir, InboxManifest, MANIFEST_FILENAME, MANIFEST_VERSION};
use crate::index::build_index;
use crate::session::Session;

use super::{absolute, blocking, now_iso, SyncEngine};

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub dir: PathBuf,
    pub project_id: Option<String>,
    /// Discard the batch when nothing changed remotely.
    pub skip_empty: bool,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub manifest: InboxManifest,
    /// `None` when an empty batch was discarded.
    pub manifest_path: Option<PathBuf>,
}

impl SyncEngine {
    /// Stages the current remote snapshot as a new inbox batch and diffs it
    /// against the local tree. Nothing local is modified.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome> {
        let dir = absolute(&request.dir)?;
        let target = self.target(&dir, request.project_id.as_deref())?;

        let client = self.client(&target.base_url);
        let auth = self.authenticate(&client, false).await?;

        let project_inbox = self
            .layout
            .inbox_project_dir(&target.base_url, &target.project_id);
        let (batch_id, batch_dir) = create_batch_dir(&project_inbox, Utc::now())?;

        let changes = self
            .stage_batch(&client, &auth.session, &target.project_id, &dir, &batch_dir)
            .await
            .inspect_err(|_| discard_batch(&batch_dir))?;

        let mut manifest = InboxManifest {
            version: MANIFEST_VERSION,
            base_url: target.base_url.clone(),
            project_id: target.project_id.clone(),
            batch_id,
            local_dir: dir.to_string_lossy().into_owned(),
            inbox_dir: batch_dir.to_string_lossy().into_owned(),
            created_at: now_iso(),
            changes,
            saved: None,
        };

        if request.skip_empty && manifest.changes.is_empty() {
            fs::remove_dir_all(&batch_dir).map_err(|e| SyncError::io(&batch_dir, e))?;
            tracing::debug!("no remote changes, discarded batch {}", manifest.batch_id);
            manifest.saved = Some(false);
            return Ok(FetchOutcome {
                manifest,
                manifest_path: None,
            });
        }

        let manifest_path = batch_dir.join(MANIFEST_FILENAME);
        manifest
            .save(&manifest_path)
            .inspect_err(|_| discard_batch(&batch_dir))?;
        Ok(FetchOutcome {
            manifest,
            manifest_path: Some(manifest_path),
        })
    }

    /// Downloads and unpacks the snapshot into `batch_dir`, then diffs it
    /// against `dir`.
    async fn stage_batch(
        &self,
        client: &OverleafClient,
        session: &Session,
        project_id: &str,
        dir: &Path,
        batch_dir: &Path,
    ) -> Result<ChangeSet> {
        let zip_path = batch_dir.join(FETCH_ZIP_NAME);
        archive::download_zip(client, session, project_id, &zip_path).await?;
        archive::extract(self.runner.as_ref(), &zip_path, batch_dir).await?;

        let (remote_root, local_root) = (batch_dir.to_path_buf(), dir.to_path_buf());
        blocking(batch_dir, move || {
            archive::flatten_single_root(&remote_root, FETCH_ZIP_NAME)?;
            let remote = build_index(&remote_root)?;
            let local = build_index(&local_root)?;
            Ok(diff(&local, &remote))
        })
        .await
    }
}

/// Drops a batch that never got its manifest.
fn discard_batch(batch_dir: &Path) {
    if let Err(e) = fs::remove_dir_all(batch_dir) {
        tracing::warn!("could not remove incomplete batch {}: {}", batch_dir.display(), e);
    }
}
