//! Content-addressed index of a directory tree.
//!
//! Each regular file that survives the ignore policy is hashed with SHA-256
//! and keyed by its POSIX relative path. Any read failure aborts the whole
//! build: a diff against a partial index would report phantom deletions.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SyncError};
use crate::ignore::{should_ignore, to_posix};

/// Index entry for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Lowercase hex SHA-256 of the file contents.
    pub hash: String,
}

/// Relative POSIX path -> entry. Ordered, so iteration is deterministic.
pub type FileIndex = BTreeMap<String, FileEntry>;

/// A file found while walking a project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
}

/// Recursively lists the regular files under `root`, honouring the ignore policy.
///
/// Symlinks and other special files are skipped.
pub fn walk_files(root: &Path) -> Result<Vec<LocalFile>> {
    let mut out = Vec::new();
    walk_into(root, root, &mut out)?;
    out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(out)
}

fn walk_into(root: &Path, dir: &Path, out: &mut Vec<LocalFile>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(dir, e))?;
        let abs_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| SyncError::io(&abs_path, e))?;
        let rel = abs_path.strip_prefix(root).unwrap_or(&abs_path);
        let rel_path = to_posix(rel);

        if should_ignore(&rel_path, file_type.is_dir()) {
            continue;
        }
        if file_type.is_dir() {
            walk_into(root, &abs_path, out)?;
        } else if file_type.is_file() {
            out.push(LocalFile { abs_path, rel_path });
        }
    }
    Ok(())
}

/// SHA-256 of a file's contents as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| SyncError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| SyncError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Builds the index of `root`.
pub fn build_index(root: &Path) -> Result<FileIndex> {
    let mut index = FileIndex::new();
    for file in walk_files(root)? {
        let hash = hash_file(&file.abs_path)?;
        index.insert(file.rel_path, FileEntry { hash });
    }
    tracing::debug!("indexed {} file(s) under {}", index.len(), root.display());
    Ok(index)
}
