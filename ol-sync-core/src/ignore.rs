//! Ignore policy shared by indexing, push and watch.

use std::path::{Component, Path};

/// Sidecar config written into every linked project directory.
pub const CONFIG_FILENAME: &str = ".ol-sync.json";

/// Any file name with this prefix belongs to the tool itself.
pub const SIDECAR_PREFIX: &str = ".ol-sync.";

/// Directory names skipped together with their whole subtree.
pub const IGNORE_DIRS: &[&str] = &[
    ".git",
    ".vscode",
    ".idea",
    "node_modules",
    "__pycache__",
    "__MACOSX",
];

/// Bare file names that are never indexed or uploaded.
pub const IGNORE_FILES: &[&str] = &[".DS_Store", CONFIG_FILENAME];

/// Converts a relative path to forward-slash form.
pub fn to_posix(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Returns true when `rel_path` (relative to the project root) must be skipped.
///
/// Accepts both `/` and the platform separator.
pub fn should_ignore(rel_path: &str, is_dir: bool) -> bool {
    let parts: Vec<&str> = rel_path
        .split(['/', std::path::MAIN_SEPARATOR])
        .filter(|p| !p.is_empty())
        .collect();

    let Some(last) = parts.last() else {
        return true;
    };
    if last.starts_with(SIDECAR_PREFIX) {
        return true;
    }
    if !is_dir && IGNORE_FILES.contains(last) {
        return true;
    }
    parts.iter().any(|part| IGNORE_DIRS.contains(part))
}
