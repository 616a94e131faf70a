use std::path::PathBuf;

use crate::error::Result;
use crate::inbox::{prune, summarize_batches, BatchSummary};

use super::{absolute, SyncEngine};

#[derive(Debug, Clone)]
pub struct InboxRequest {
    pub dir: PathBuf,
    pub project_id: Option<String>,
}

impl SyncEngine {
    /// The project's inbox batches, newest first.
    pub fn inbox(&self, request: &InboxRequest) -> Result<Vec<BatchSummary>> {
        let dir = absolute(&request.dir)?;
        let target = self.target(&dir, request.project_id.as_deref())?;
        summarize_batches(
            &self
                .layout
                .inbox_project_dir(&target.base_url, &target.project_id),
        )
    }

    /// Deletes all but the newest `keep_last` batches (pinned ones survive).
    pub fn prune_inbox(&self, request: &InboxRequest, keep_last: usize) -> Result<Vec<String>> {
        let dir = absolute(&request.dir)?;
        let target = self.target(&dir, request.project_id.as_deref())?;
        prune(
            &self
                .layout
                .inbox_project_dir(&target.base_url, &target.project_id),
            keep_last,
        )
    }
}
