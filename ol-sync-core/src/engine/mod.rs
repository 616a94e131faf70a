//! The user-facing operations.
//!
//! Each operation is a method on [`SyncEngine`] living in its own module.
//! Operations share nothing in memory: every call authenticates (reusing the
//! cached session when possible), works, and returns an outcome value that
//! the caller renders. The only state carried between calls is on disk
//! (session store, sidecar config, inbox and backups).

mod apply;
mod create;
mod debounce;
mod fetch;
mod inbox;
mod link;
mod projects;
mod pull;
mod push;
mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::client::{normalize_base_url, OverleafClient};
use crate::error::{Result, SyncError};
use crate::ignore::CONFIG_FILENAME;
use crate::inbox::DataLayout;
use crate::progress::{NoProgress, Progress, ProgressSink};
use crate::project_config::{EffectiveTarget, ProjectConfig};
use crate::root_folder::{RootFolderResolver, DEFAULT_CONTAINER, DEFAULT_MONGO_CONTAINER};
use crate::runner::{CommandRunner, SystemCommandRunner};
use crate::session::{AuthOptions, AuthOutcome, CredentialPrompter, NonInteractive, SessionManager};

pub use apply::{ApplyOutcome, ApplyRequest};
pub use create::{CreateOutcome, CreateRequest};
pub use debounce::DebounceQueue;
pub use fetch::{FetchOutcome, FetchRequest};
pub use inbox::InboxRequest;
pub use link::{LinkOutcome, LinkRequest};
pub use pull::{PullOutcome, PullRequest};
pub use push::{PushReport, PushRequest};
pub use watch::{WatchRequest, DEBOUNCE_DELAY};

pub const DEFAULT_BASE_URL: &str = "http://localhost";
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings shared by every operation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    pub mongo_container: String,
    pub container: String,
    /// Upload workers used by `push`.
    pub concurrency: usize,
    /// Holds `inbox/` and `backups/`.
    pub data_dir: PathBuf,
    pub auth: AuthOptions,
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>, auth: AuthOptions) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mongo_container: DEFAULT_MONGO_CONTAINER.to_string(),
            container: DEFAULT_CONTAINER.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            data_dir: data_dir.into(),
            auth,
        }
    }
}

pub struct SyncEngine {
    http: reqwest::Client,
    config: EngineConfig,
    layout: DataLayout,
    prompter: Arc<dyn CredentialPrompter>,
    runner: Arc<dyn CommandRunner>,
    progress: Arc<dyn ProgressSink>,
}

impl SyncEngine {
    /// Engine that never prompts, shells out for real and reports nothing.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            layout: DataLayout::new(config.data_dir.clone()),
            config,
            prompter: Arc::new(NonInteractive),
            runner: Arc::new(SystemCommandRunner),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn CredentialPrompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    fn client(&self, base_url: &str) -> OverleafClient {
        OverleafClient::new(self.http.clone(), base_url)
    }

    async fn authenticate(&self, client: &OverleafClient, require_user_info: bool) -> Result<AuthOutcome> {
        let manager = SessionManager::new(client, &self.config.auth, self.prompter.as_ref());
        let outcome = manager.ensure_authenticated(require_user_info).await?;
        tracing::debug!(
            "auth: baseUrl={} reusedSession={} sessionPath={}",
            client.base_url(),
            if outcome.reused_session { "yes" } else { "no" },
            outcome.session_path.display()
        );
        if outcome.newly_cached {
            self.progress
                .report(Progress::SessionCached(outcome.session_path.clone()));
        }
        Ok(outcome)
    }

    async fn resolve_root_folder(
        &self,
        client: &OverleafClient,
        project_id: &str,
        mongo_container: &str,
        container: &str,
        user_id: Option<&str>,
    ) -> Result<String> {
        RootFolderResolver::new(client, self.runner.as_ref(), mongo_container, container, user_id)
            .resolve(project_id)
            .await
    }

    /// Merges the sidecar in `dir` (if any) with the engine settings.
    fn target(&self, dir: &Path, project_id: Option<&str>) -> Result<EffectiveTarget> {
        let sidecar = ProjectConfig::load(dir);
        let project_id = sidecar
            .as_ref()
            .map(|c| c.project_id.clone())
            .filter(|id| !id.is_empty())
            .or_else(|| project_id.map(str::to_string).filter(|id| !id.is_empty()))
            .ok_or_else(|| {
                SyncError::Config(format!(
                    "Missing project id. Provide --project-id or run 'link'/'pull' to create {}.",
                    CONFIG_FILENAME
                ))
            })?;

        let base_url = sidecar
            .as_ref()
            .map(|c| c.base_url.as_str())
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.config.base_url);

        Ok(EffectiveTarget {
            base_url: normalize_base_url(base_url),
            project_id,
            root_folder_id: sidecar.as_ref().and_then(|c| c.root_folder_id.clone()),
            mongo_container: sidecar
                .as_ref()
                .and_then(|c| c.mongo_container.clone())
                .unwrap_or_else(|| self.config.mongo_container.clone()),
            container: sidecar
                .as_ref()
                .and_then(|c| c.container.clone())
                .unwrap_or_else(|| self.config.container.clone()),
        })
    }

    /// Fails unless `dir` has no sidecar yet or `force` is set.
    fn check_overwrite(dir: &Path, force: bool) -> Result<()> {
        if ProjectConfig::exists_in(dir) && !force {
            return Err(SyncError::Config(format!(
                "Refusing to overwrite existing {}. Re-run with --force if you really want to replace it.",
                ProjectConfig::path_in(dir).display()
            )));
        }
        Ok(())
    }
}

pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn absolute(dir: &Path) -> Result<PathBuf> {
    std::path::absolute(dir).map_err(|e| SyncError::io(dir, e))
}

/// Runs tree walks, hashing and renames on the blocking pool.
///
/// `path` names the tree in the error if the task panics.
pub(crate) async fn blocking<T, F>(path: &Path, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SyncError::io(path, std::io::Error::other(e)))?
}
