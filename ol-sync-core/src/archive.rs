//! Project snapshots as zip archives: download, extract, flatten.

use std::fs;
use std::path::Path;

use futures::StreamExt;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::client::OverleafClient;
use crate::error::{Result, SyncError};
use crate::ignore::{CONFIG_FILENAME, SIDECAR_PREFIX};
use crate::runner::CommandRunner;
use crate::session::Session;

/// Zip name used when pulling into a fresh directory.
pub const PULL_ZIP_NAME: &str = ".ol-sync.download.zip";
/// Zip name kept inside each inbox batch.
pub const FETCH_ZIP_NAME: &str = ".ol-sync.remote.zip";

const MACOS_METADATA_DIR: &str = "__MACOSX";

fn download_candidates(project_id: &str) -> [String; 2] {
    [
        format!("/project/{}/download/zip", project_id),
        format!("/project/{}/download", project_id),
    ]
}

/// Streams the project's zip to `zip_path` and returns the URL that served it.
///
/// Candidate endpoints are tried in order; only a 404 moves on to the next.
pub async fn download_zip(
    client: &OverleafClient,
    session: &Session,
    project_id: &str,
    zip_path: &Path,
) -> Result<String> {
    let mut last_not_found = None;

    for path in download_candidates(project_id) {
        let url = client.url(&path);
        let response = client.get_binary(&path, session).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("download endpoint {} returned 404", url);
            last_not_found = Some((url, status));
            continue;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(
                format!("Download failed: HTTP {} {} {}", status.as_u16(), url, body)
                    .trim()
                    .to_string(),
            ));
        }

        let mut file = tokio::fs::File::create(zip_path)
            .await
            .map_err(|e| SyncError::io(zip_path, e))?;
        let mut written = 0usize;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len();
            file.write_all(&chunk)
                .await
                .map_err(|e| SyncError::io(zip_path, e))?;
        }
        file.flush().await.map_err(|e| SyncError::io(zip_path, e))?;

        if written == 0 {
            let _ = tokio::fs::remove_file(zip_path).await;
            return Err(SyncError::Network(format!(
                "Download failed: empty response body ({})",
                url
            )));
        }
        tracing::debug!("downloaded {} bytes via {}", written, url);
        return Ok(url);
    }

    Err(SyncError::Network(match last_not_found {
        Some((url, status)) => format!(
            "Download failed: no working endpoint (last tried: {} HTTP {})",
            url,
            status.as_u16()
        ),
        None => "Download failed: no working endpoint.".to_string(),
    }))
}

/// Unpacks `zip_path` into `dest_dir` with the external `unzip` tool.
pub async fn extract(runner: &dyn CommandRunner, zip_path: &Path, dest_dir: &Path) -> Result<()> {
    let args = vec![
        "-q".to_string(),
        zip_path.to_string_lossy().into_owned(),
        "-d".to_string(),
        dest_dir.to_string_lossy().into_owned(),
    ];
    match runner.run("unzip", &args).await {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(SyncError::Extraction(format!(
            "unzip failed: {}",
            output.failure_detail()
        ))),
        Err(e) => Err(SyncError::Extraction(format!("unzip failed: {}", e))),
    }
}

/// Lifts the children of a lone wrapper directory into `dest_dir`.
///
/// Entries named `keep_zip_name`, the sidecar config and `__MACOSX` do not
/// count. Returns the wrapper's name when something was flattened.
pub fn flatten_single_root(dest_dir: &Path, keep_zip_name: &str) -> Result<Option<String>> {
    let keep = [CONFIG_FILENAME, keep_zip_name, MACOS_METADATA_DIR];

    let mut visible = Vec::new();
    for entry in fs::read_dir(dest_dir).map_err(|e| SyncError::io(dest_dir, e))? {
        let entry = entry.map_err(|e| SyncError::io(dest_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !keep.contains(&name.as_str()) {
            visible.push(entry);
        }
    }
    if visible.len() != 1 {
        return Ok(None);
    }
    let only = &visible[0];
    let is_dir = only
        .file_type()
        .map_err(|e| SyncError::io(only.path(), e))?
        .is_dir();
    if !is_dir {
        return Ok(None);
    }

    let wrapper_name = only.file_name().to_string_lossy().into_owned();
    // Moved aside first so a child with the wrapper's own name can land in place.
    let staging = dest_dir.join(format!("{}flatten-{}", SIDECAR_PREFIX, wrapper_name));
    fs::rename(only.path(), &staging).map_err(|e| SyncError::io(&staging, e))?;

    for child in fs::read_dir(&staging).map_err(|e| SyncError::io(&staging, e))? {
        let child = child.map_err(|e| SyncError::io(&staging, e))?;
        let target = dest_dir.join(child.file_name());
        fs::rename(child.path(), &target).map_err(|e| SyncError::io(&target, e))?;
    }
    fs::remove_dir(&staging).map_err(|e| SyncError::io(&staging, e))?;

    tracing::debug!("flattened wrapper folder: {}", wrapper_name);
    Ok(Some(wrapper_name))
}
