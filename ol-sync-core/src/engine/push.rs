use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, SyncError};
use crate::index::walk_files;
use crate::progress::Progress;
use crate::upload::{UploadOutcome, Uploader};

use super::{absolute, blocking, SyncEngine};

#[derive(Debug, Clone)]
pub struct PushRequest {
    pub dir: PathBuf,
    pub project_id: Option<String>,
    pub dry_run: bool,
    /// Overrides the engine's worker count.
    pub concurrency: Option<usize>,
}

/// Aggregate result of a push; per-file failures do not fail the command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub uploaded: usize,
    pub failed: usize,
}

impl SyncEngine {
    /// Uploads every non-ignored local file with a bounded worker pool.
    pub async fn push(&self, request: PushRequest) -> Result<PushReport> {
        let dir = absolute(&request.dir)?;
        let target = self.target(&dir, request.project_id.as_deref())?;

        let client = self.client(&target.base_url);
        let auth = self
            .authenticate(&client, target.root_folder_id.is_none())
            .await?;
        let root_folder_id = match target.root_folder_id.clone() {
            Some(id) => id,
            None => {
                let user_id = auth.identity.as_ref().map(|i| i.id.as_str());
                self.resolve_root_folder(
                    &client,
                    &target.project_id,
                    &target.mongo_container,
                    &target.container,
                    user_id,
                )
                .await?
            }
        };

        let root = dir.clone();
        let files = Arc::new(blocking(&dir, move || walk_files(&root)).await?);
        let uploader = Uploader::new(
            client,
            Arc::new(auth.session),
            target.project_id,
            root_folder_id,
            request.dry_run,
        );

        let pool_size = request
            .concurrency
            .unwrap_or(self.config.concurrency)
            .max(1)
            .min(files.len().max(1));
        let next = Arc::new(AtomicUsize::new(0));
        let uploaded = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..pool_size)
            .map(|_| {
                let files = Arc::clone(&files);
                let uploader = uploader.clone();
                let progress = Arc::clone(&self.progress);
                let next = Arc::clone(&next);
                let uploaded = Arc::clone(&uploaded);
                let failed = Arc::clone(&failed);
                tokio::spawn(async move {
                    loop {
                        let idx = next.fetch_add(1, Ordering::SeqCst);
                        let Some(file) = files.get(idx) else { break };
                        match uploader.upload(&file.abs_path, &file.rel_path).await {
                            Ok(outcome) => {
                                uploaded.fetch_add(1, Ordering::SeqCst);
                                progress.report(match outcome {
                                    UploadOutcome::Skipped => Progress::DryRun(file.rel_path.clone()),
                                    UploadOutcome::Uploaded => Progress::Uploaded(file.rel_path.clone()),
                                });
                            }
                            Err(e) => {
                                failed.fetch_add(1, Ordering::SeqCst);
                                progress.report(Progress::Failed {
                                    path: file.rel_path.clone(),
                                    message: e.to_string(),
                                });
                            }
                        }
                    }
                })
            })
            .collect();

        for result in futures::future::join_all(workers).await {
            result.map_err(|e| SyncError::Network(format!("upload worker stopped: {}", e)))?;
        }

        Ok(PushReport {
            uploaded: uploaded.load(Ordering::SeqCst),
            failed: failed.load(Ordering::SeqCst),
        })
    }
}
