//! ol-sync core library
//!
//! Keeps a local directory and a project on an Overleaf-compatible server in
//! step: content-addressed diffs, staged inbox batches, bulk and continuous
//! uploads.

pub mod archive;
pub mod client;
pub mod cookie;
pub mod diff;
pub mod engine;
pub mod error;
pub mod ignore;
pub mod inbox;
pub mod index;
pub mod progress;
pub mod project_config;
pub mod projects;
pub mod root_folder;
pub mod runner;
pub mod session;
pub mod upload;

pub use client::{basic_auth_header, extract_csrf_token, normalize_base_url, OverleafClient};
pub use cookie::CookieJar;
pub use diff::{diff, ChangeSet, ModifiedEntry};
pub use engine::{
    ApplyOutcome, ApplyRequest, CreateOutcome, CreateRequest, EngineConfig, FetchOutcome,
    FetchRequest, InboxRequest, LinkOutcome, LinkRequest, PullOutcome, PullRequest, PushReport,
    PushRequest, SyncEngine, WatchRequest,
};
pub use error::{Result, SyncError};
pub use ignore::{should_ignore, CONFIG_FILENAME};
pub use inbox::{BatchState, BatchSummary, InboxManifest, DEFAULT_KEEP_LAST};
pub use index::{build_index, FileEntry, FileIndex};
pub use progress::{NoProgress, Progress, ProgressSink, RecordingProgress};
pub use project_config::ProjectConfig;
pub use projects::Project;
pub use runner::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use session::{AuthOptions, CredentialPrompter, NonInteractive, Session, SessionStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
