use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::inbox::{
    latest_fetched_batch, list_batch_ids, mark_applied, InboxManifest, MANIFEST_FILENAME,
};

use super::{absolute, SyncEngine};

#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub dir: PathBuf,
    pub project_id: Option<String>,
    /// Defaults to the newest fetched batch.
    pub batch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub batch_id: String,
    pub applied: usize,
    /// Set only when at least one existing file was backed up.
    pub backup_dir: Option<PathBuf>,
    /// Remote deletions that were left alone locally.
    pub not_deleted: usize,
}

impl SyncEngine {
    /// Copies a batch's added and modified files over the local tree.
    ///
    /// Existing local files are backed up first. Files deleted on the remote
    /// are reported but never removed.
    pub fn apply(&self, request: ApplyRequest) -> Result<ApplyOutcome> {
        let dir = absolute(&request.dir)?;
        let target = self.target(&dir, request.project_id.as_deref())?;

        let project_inbox = self
            .layout
            .inbox_project_dir(&target.base_url, &target.project_id);
        let batch_id = match request.batch {
            Some(batch_id) => {
                if !list_batch_ids(&project_inbox)?.contains(&batch_id) {
                    return Err(SyncError::Config(format!(
                        "Inbox batch {} not found for project {}.",
                        batch_id, target.project_id
                    )));
                }
                batch_id
            }
            None => latest_fetched_batch(&project_inbox)?.ok_or_else(|| {
                SyncError::Config(format!(
                    "No inbox batches found for project {}. Run 'fetch' first.",
                    target.project_id
                ))
            })?,
        };

        let batch_dir = project_inbox.join(&batch_id);
        let manifest = InboxManifest::load(&batch_dir.join(MANIFEST_FILENAME))?;
        let paths: Vec<&str> = manifest.changes.paths_to_apply().collect();
        for path in &paths {
            check_relative(path)?;
        }

        let backup_root = self
            .layout
            .backup_project_dir(&target.base_url, &target.project_id)
            .join(&batch_id);
        let mut backed_up = false;

        for path in &paths {
            let src = batch_dir.join(path);
            let dst = dir.join(path);

            if dst.is_file() {
                let backup = backup_root.join(path);
                copy_creating_parents(&dst, &backup)?;
                backed_up = true;
            }
            copy_creating_parents(&src, &dst)?;
        }
        mark_applied(&batch_dir)?;

        tracing::debug!("applied batch {} ({} file(s))", batch_id, paths.len());
        Ok(ApplyOutcome {
            batch_id,
            applied: paths.len(),
            backup_dir: backed_up.then_some(backup_root),
            not_deleted: manifest.changes.deleted.len(),
        })
    }
}

/// Rejects manifest paths that could escape the project directory.
fn check_relative(path: &str) -> Result<()> {
    let safe = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(SyncError::Config(format!(
            "Refusing to apply unsafe path from inbox manifest: {}",
            path
        )))
    }
}

fn copy_creating_parents(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    fs::copy(src, dst).map_err(|e| SyncError::io(src, e))?;
    Ok(())
}
