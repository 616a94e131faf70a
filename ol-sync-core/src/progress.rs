//! Per-file events emitted by long-running operations.

use std::path::PathBuf;
use std::sync::Mutex;

/// Something worth telling the user while an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// A fresh login was written to the session store.
    SessionCached(PathBuf),
    /// `watch` is set up and listening.
    Watching {
        dir: PathBuf,
        base_url: String,
        project_id: String,
    },
    /// Dry run: this file would be uploaded.
    DryRun(String),
    /// Pushed successfully.
    Uploaded(String),
    /// Uploaded by `watch`.
    Synced(String),
    /// One file failed; the operation carries on.
    Failed { path: String, message: String },
    /// The filesystem watcher reported an error.
    WatchError(String),
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: Progress);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: Progress) {}
}

/// Keeps events in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<Progress>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<Progress> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: Progress) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}
