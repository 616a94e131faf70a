//! Inbox batches and backups on disk.
//!
//! Layout under the data directory:
//!
//! ```text
//! inbox/<host>/<projectId>/<batchId>/      extracted snapshot + .ol-sync.inbox.json
//! backups/<host>/<projectId>/<batchId>/    files overwritten by `apply`
//! ```
//!
//! Batch ids are UTC timestamps, so lexicographic order is chronological.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diff::ChangeSet;
use crate::error::{Result, SyncError};

pub const MANIFEST_FILENAME: &str = ".ol-sync.inbox.json";
pub const APPLIED_MARKER: &str = ".ol-sync.applied";
/// A batch containing this file is never pruned.
pub const PIN_MARKER: &str = ".keep";
pub const DEFAULT_KEEP_LAST: usize = 20;
pub const MANIFEST_VERSION: u32 = 1;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").expect("valid regex"));

/// Turns a host (or arbitrary string) into a single safe path component.
pub fn safe_path_component(value: &str) -> String {
    let lower = value.to_ascii_lowercase();
    let stripped = if lower.starts_with("http://") {
        &value[7..]
    } else if lower.starts_with("https://") {
        &value[8..]
    } else {
        value
    };
    let replaced = UNSAFE_CHARS.replace_all(stripped, "_");
    let trimmed: String = replaced.trim_matches('_').chars().take(120).collect();
    if trimmed.is_empty() {
        "overleaf".to_string()
    } else {
        trimmed
    }
}

/// `host[:port]` of a base URL, or the raw string when it does not parse.
fn host_of(base_url: &str) -> String {
    match reqwest::Url::parse(base_url) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => base_url.to_string(),
        },
        Err(_) => base_url.to_string(),
    }
}

/// Sortable batch id: `2024-05-01T12-30-45-123Z`.
pub fn batch_id_for(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Per-user storage for inbox batches and apply backups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox_project_dir(&self, base_url: &str, project_id: &str) -> PathBuf {
        self.root
            .join("inbox")
            .join(safe_path_component(&host_of(base_url)))
            .join(project_id)
    }

    pub fn backup_project_dir(&self, base_url: &str, project_id: &str) -> PathBuf {
        self.root
            .join("backups")
            .join(safe_path_component(&host_of(base_url)))
            .join(project_id)
    }
}

/// Creates a fresh batch directory, suffixing `-N` when the id is taken.
pub fn create_batch_dir(project_inbox: &Path, now: DateTime<Utc>) -> Result<(String, PathBuf)> {
    fs::create_dir_all(project_inbox).map_err(|e| SyncError::io(project_inbox, e))?;
    let base = batch_id_for(now);
    let mut attempt = 0u32;
    loop {
        let batch_id = if attempt == 0 {
            base.clone()
        } else {
            format!("{}-{}", base, attempt)
        };
        let dir = project_inbox.join(&batch_id);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((batch_id, dir)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(SyncError::io(&dir, e)),
        }
    }
}

/// Manifest written next to each fetched snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxManifest {
    pub version: u32,
    pub base_url: String,
    pub project_id: String,
    pub batch_id: String,
    pub local_dir: String,
    pub inbox_dir: String,
    pub created_at: String,
    #[serde(default)]
    pub changes: ChangeSet,
    /// `Some(false)` when an empty batch was discarded; absent means saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
}

impl InboxManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| SyncError::json(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self).map_err(|e| SyncError::json(path, e))?;
        json.push('\n');
        fs::write(path, json).map_err(|e| SyncError::io(path, e))
    }
}

/// Batch ids under `project_inbox`, oldest first. A missing inbox is empty.
pub fn list_batch_ids(project_inbox: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(project_inbox) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::io(project_inbox, e)),
    };
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(project_inbox, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            ids.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Newest batch that carries a manifest. Folders left by an interrupted
/// fetch are skipped.
pub fn latest_fetched_batch(project_inbox: &Path) -> Result<Option<String>> {
    Ok(list_batch_ids(project_inbox)?
        .into_iter()
        .rev()
        .find(|id| project_inbox.join(id).join(MANIFEST_FILENAME).is_file()))
}

pub fn mark_applied(batch_dir: &Path) -> Result<()> {
    let path = batch_dir.join(APPLIED_MARKER);
    let stamp = format!("{}\n", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    fs::write(&path, stamp).map_err(|e| SyncError::io(&path, e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Pending,
    Applied,
}

/// One row of the inbox listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: String,
    pub created_at: Option<String>,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub state: BatchState,
    pub pinned: bool,
    pub dir: PathBuf,
}

/// Summaries of every batch, newest first. Unreadable manifests count as empty.
pub fn summarize_batches(project_inbox: &Path) -> Result<Vec<BatchSummary>> {
    let mut out = Vec::new();
    for batch_id in list_batch_ids(project_inbox)?.into_iter().rev() {
        let dir = project_inbox.join(&batch_id);
        let manifest = InboxManifest::load(&dir.join(MANIFEST_FILENAME));
        if let Err(e) = &manifest {
            tracing::warn!("batch {}: {}", batch_id, e);
        }
        let manifest = manifest.ok();
        let changes = manifest.as_ref().map(|m| &m.changes);
        out.push(BatchSummary {
            created_at: manifest.as_ref().map(|m| m.created_at.clone()),
            added: changes.map_or(0, |c| c.added.len()),
            modified: changes.map_or(0, |c| c.modified.len()),
            deleted: changes.map_or(0, |c| c.deleted.len()),
            state: if dir.join(APPLIED_MARKER).exists() {
                BatchState::Applied
            } else {
                BatchState::Pending
            },
            pinned: dir.join(PIN_MARKER).exists(),
            batch_id,
            dir,
        });
    }
    Ok(out)
}

/// Deletes batches older than the newest `keep_last`, sparing pinned ones.
/// Returns the removed batch ids.
pub fn prune(project_inbox: &Path, keep_last: usize) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for batch_id in list_batch_ids(project_inbox)?.into_iter().rev().skip(keep_last) {
        let dir = project_inbox.join(&batch_id);
        if dir.join(PIN_MARKER).exists() {
            continue;
        }
        fs::remove_dir_all(&dir).map_err(|e| SyncError::io(&dir, e))?;
        tracing::debug!("pruned inbox batch {}", batch_id);
        removed.push(batch_id);
    }
    removed.reverse();
    Ok(removed)
}
