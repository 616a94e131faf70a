use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Result, SyncError};
use crate::ignore::{should_ignore, to_posix};
use crate::progress::Progress;
use crate::upload::{UploadOutcome, Uploader};

use super::debounce::DebounceQueue;
use super::{absolute, SyncEngine};

/// Quiet period after the last event on a path before it is uploaded.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub dir: PathBuf,
    pub project_id: Option<String>,
    pub dry_run: bool,
}

impl SyncEngine {
    /// Uploads files as they change until `shutdown` resolves.
    ///
    /// Uploads run one at a time in deadline order. Removed files are skipped;
    /// nothing is ever deleted remotely.
    pub async fn watch<F>(&self, request: WatchRequest, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
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

        // Events arrive with resolved paths, so the root must be resolved too.
        let root = dir.canonicalize().map_err(|e| SyncError::io(&dir, e))?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let _ = tx.send(event);
        })
        .map_err(|e| watch_error(&root, e))?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| watch_error(&root, e))?;

        self.progress.report(Progress::Watching {
            dir: dir.clone(),
            base_url: target.base_url.clone(),
            project_id: target.project_id.clone(),
        });

        let uploader = Uploader::new(
            client,
            std::sync::Arc::new(auth.session),
            target.project_id,
            root_folder_id,
            request.dry_run,
        );
        let mut queue = DebounceQueue::new(DEBOUNCE_DELAY);
        tokio::pin!(shutdown);

        loop {
            let deadline = queue.next_deadline();
            tokio::select! {
                _ = &mut shutdown => break,
                event = rx.recv() => match event {
                    Some(Ok(event)) => {
                        if matches!(event.kind, EventKind::Access(_)) {
                            continue;
                        }
                        let now = Instant::now();
                        for path in &event.paths {
                            if let Some(rel) = relative_path(&root, path) {
                                queue.push(rel, now);
                            }
                        }
                    }
                    Some(Err(e)) => self.progress.report(Progress::WatchError(e.to_string())),
                    None => break,
                },
                _ = sleep_until(deadline) => {
                    for rel in queue.pop_due(Instant::now()) {
                        self.sync_path(&uploader, &root, &rel).await;
                    }
                }
            }
        }
        drop(watcher);
        Ok(())
    }

    async fn sync_path(&self, uploader: &Uploader, root: &Path, rel: &str) {
        let abs = root.join(rel);
        match tokio::fs::metadata(&abs).await {
            Ok(meta) if meta.is_file() => {}
            _ => return,
        }
        match uploader.upload(&abs, rel).await {
            Ok(UploadOutcome::Skipped) => self.progress.report(Progress::DryRun(rel.to_string())),
            Ok(UploadOutcome::Uploaded) => self.progress.report(Progress::Synced(rel.to_string())),
            Err(e) => self.progress.report(Progress::Failed {
                path: rel.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn watch_error(root: &Path, e: notify::Error) -> SyncError {
    SyncError::Config(format!("Cannot watch {}: {}", root.display(), e))
}

/// POSIX path of `path` below `root`, or `None` when it is outside or ignored.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = to_posix(path.strip_prefix(root).ok()?);
    (!should_ignore(&rel, false)).then_some(rel)
}
