//! The `.ol-sync.json` sidecar binding a local directory to a remote project.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::ignore::CONFIG_FILENAME;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub base_url: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongo_container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulled_at: Option<String>,
}

impl ProjectConfig {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILENAME)
    }

    /// Reads the sidecar in `dir`. Missing or unparsable files yield `None`.
    pub fn load(dir: &Path) -> Option<Self> {
        let path = Self::path_in(dir);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("ignoring unreadable {}: {}", path.display(), e);
                None
            }
        }
    }

    /// True when a sidecar file exists in `dir`, parsable or not.
    pub fn exists_in(dir: &Path) -> bool {
        Self::path_in(dir).exists()
    }

    /// Writes the sidecar atomically and returns its path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(dir);
        let mut json = serde_json::to_string_pretty(self).map_err(|e| SyncError::json(&path, e))?;
        json.push('\n');

        let temp_path = temp_path_in(dir);
        let mut file = fs::File::create(&temp_path).map_err(|e| SyncError::io(&temp_path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| SyncError::io(&temp_path, e))?;
        file.sync_all().map_err(|e| SyncError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| SyncError::io(&path, e))?;
        Ok(path)
    }
}

/// Where an operation should point, after merging the sidecar with CLI input.
///
/// Sidecar values win over the caller's defaults, as the sidecar records
/// where the directory was actually linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveTarget {
    pub base_url: String,
    pub project_id: String,
    pub root_folder_id: Option<String>,
    pub mongo_container: String,
    pub container: String,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp sibling of the sidecar, unique per process and per call.
fn temp_path_in(dir: &Path) -> PathBuf {
    dir.join(format!(
        "{}.tmp-{}-{}",
        CONFIG_FILENAME,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ProjectConfig {
        ProjectConfig {
            base_url: "http://localhost".to_string(),
            project_id: "64b7f0c2a1b2c3d4e5f60718".to_string(),
            root_folder_id: Some("64b7f0c2a1b2c3d4e5f60719".to_string()),
            mongo_container: Some("mongo".to_string()),
            container: None,
            linked_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            created_at: None,
            pulled_at: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = sample().save(temp.path()).unwrap();
        assert_eq!(path, temp.path().join(".ol-sync.json"));
        assert_eq!(ProjectConfig::load(temp.path()), Some(sample()));
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["projectId"], "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(json["rootFolderId"], "64b7f0c2a1b2c3d4e5f60719");
        assert!(json.get("container").is_none());
        assert!(json.get("pulledAt").is_none());
    }

    #[test]
    fn test_missing_or_corrupt_is_none() {
        let temp = TempDir::new().unwrap();
        assert_eq!(ProjectConfig::load(temp.path()), None);
        assert!(!ProjectConfig::exists_in(temp.path()));

        fs::write(temp.path().join(CONFIG_FILENAME), "{oops").unwrap();
        assert_eq!(ProjectConfig::load(temp.path()), None);
        assert!(ProjectConfig::exists_in(temp.path()));
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let temp = TempDir::new().unwrap();
        sample().save(temp.path()).unwrap();
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".ol-sync.json".to_string()]);
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let temp = TempDir::new().unwrap();
        assert_ne!(temp_path_in(temp.path()), temp_path_in(temp.path()));
    }

    #[test]
    fn test_concurrent_saves_to_one_directory() {
        let temp = TempDir::new().unwrap();
        std::thread::scope(|scope| {
            for n in 0..8 {
                let dir = temp.path();
                scope.spawn(move || {
                    let mut config = sample();
                    config.project_id = format!("p{}", n);
                    config.save(dir).unwrap();
                });
            }
        });

        let loaded = ProjectConfig::load(temp.path()).unwrap();
        assert!(loaded.project_id.starts_with('p'));
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".ol-sync.json".to_string()]);
    }
}
