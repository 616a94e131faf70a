//! Diff between a local and a remote [`FileIndex`].
//!
//! The remote side is treated as the desired state: paths only on the remote
//! are `added`, paths only on the local side are `deleted`.

use serde::{Deserialize, Serialize};

use crate::index::FileIndex;

/// A path present on both sides with different content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedEntry {
    pub path: String,
    pub local_hash: String,
    pub remote_hash: String,
}

/// Result of [`diff`]. All lists are sorted by path and mutually disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<ModifiedEntry>,
    #[serde(default)]
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Paths that `apply` writes: added first, then modified.
    pub fn paths_to_apply(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .map(String::as_str)
            .chain(self.modified.iter().map(|m| m.path.as_str()))
    }
}

pub fn diff(local: &FileIndex, remote: &FileIndex) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (path, remote_entry) in remote {
        match local.get(path) {
            None => changes.added.push(path.clone()),
            Some(local_entry) if local_entry.hash != remote_entry.hash => {
                changes.modified.push(ModifiedEntry {
                    path: path.clone(),
                    local_hash: local_entry.hash.clone(),
                    remote_hash: remote_entry.hash.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for path in local.keys() {
        if !remote.contains_key(path) {
            changes.deleted.push(path.clone());
        }
    }

    changes.added.sort();
    changes.modified.sort_by(|a, b| a.path.cmp(&b.path));
    changes.deleted.sort();
    changes
}
