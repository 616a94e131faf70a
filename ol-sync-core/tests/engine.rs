mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use ol_sync_core::{
    ApplyRequest, AuthOptions, BatchState, CreateRequest, EngineConfig, FetchRequest, InboxManifest,
    InboxRequest, LinkRequest, Progress, ProjectConfig, PullRequest, PushRequest, SessionStore,
    SyncError, WatchRequest,
};
use tempfile::TempDir;

fn linked_dir(base_url: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    ProjectConfig {
        base_url: base_url.to_string(),
        project_id: PROJECT_ID.to_string(),
        root_folder_id: Some(MONGO_ROOT.to_string()),
        mongo_container: Some("mongo".to_string()),
        container: Some("sharelatex".to_string()),
        linked_at: Some("2024-05-01T00:00:00.000Z".to_string()),
        created_at: None,
        pulled_at: None,
    }
    .save(dir.path())
    .unwrap();
    dir
}

fn fetch_request(dir: &TempDir) -> FetchRequest {
    FetchRequest {
        dir: dir.path().to_path_buf(),
        project_id: None,
        skip_empty: false,
    }
}

#[tokio::test]
async fn test_projects_merge_filter_dimensions() {
    let h = Harness::new().await;

    let projects = h.engine.projects(false).await.unwrap();
    let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);

    let p2 = &projects[1];
    assert!(p2.archived);
    assert_eq!(p2.name.as_deref(), Some("Old notes"));
    assert_eq!(projects[0].last_updated_by.as_deref(), Some(EMAIL));

    let active = h.engine.projects(true).await.unwrap();
    let ids: Vec<&str> = active.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p3"]);
}

#[tokio::test]
async fn test_projects_fall_back_to_legacy_endpoint() {
    let h = Harness::new().await;
    h.server.state.legacy_only.store(true, Ordering::SeqCst);

    let projects = h.engine.projects(false).await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, "p1");
}

#[tokio::test]
async fn test_cached_session_is_reused() {
    let h = Harness::new().await;

    h.engine.projects(true).await.unwrap();
    h.engine.projects(true).await.unwrap();
    assert_eq!(h.server.state.logins.load(Ordering::SeqCst), 1);

    let store = SessionStore::load(&h.session_path());
    let session = store.get(&h.server.base_url()).unwrap();
    assert_eq!(session.csrf_token(), CSRF);
    assert!(session.cookie_header().contains("overleaf.sid=authed"));

    let cached: Vec<_> = h
        .progress
        .events()
        .into_iter()
        .filter(|e| matches!(e, Progress::SessionCached(_)))
        .collect();
    assert_eq!(cached, vec![Progress::SessionCached(h.session_path())]);
}

#[tokio::test]
async fn test_stale_session_falls_back_to_login() {
    let h = Harness::new().await;
    let mut jar = ol_sync_core::CookieJar::new();
    jar.set("overleaf.sid", "expired");
    let mut store = SessionStore::default();
    store.insert(&h.server.base_url(), &ol_sync_core::Session::new(jar, "old"));
    store.save(&h.session_path()).unwrap();

    h.engine.projects(false).await.unwrap();
    assert_eq!(h.server.state.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_session_survives_unwritable_store() {
    let server = MockServer::start().await;
    let data = TempDir::new().unwrap();
    // Long enough that the store's temp sibling exceeds the file name limit
    let session_path = data.path().join(format!("{}.json", "s".repeat(240)));

    let mut jar = ol_sync_core::CookieJar::new();
    jar.set("overleaf.sid", "authed");
    let mut store = SessionStore::default();
    store.insert(&server.base_url(), &ol_sync_core::Session::new(jar, CSRF));
    fs::write(&session_path, serde_json::to_string(&store).unwrap()).unwrap();
    assert!(store.save(&session_path).is_err());

    let auth = AuthOptions {
        email: Some(EMAIL.to_string()),
        password: Some(PASSWORD.to_string()),
        no_session_cache: false,
        session_path: session_path.clone(),
    };
    let mut config = EngineConfig::new(data.path(), auth);
    config.base_url = server.base_url();
    let engine = ol_sync_core::SyncEngine::new(config);

    let projects = engine.projects(false).await.unwrap();
    assert_eq!(projects.len(), 3);
    assert_eq!(server.state.logins.load(Ordering::SeqCst), 0);
    assert!(SessionStore::load(&session_path).get(&server.base_url()).is_some());
}

#[tokio::test]
async fn test_non_interactive_without_email_fails() {
    let runner = FakeRunner::new();
    let h = Harness::build(runner, None, None).await;
    if std::env::var("OVERLEAF_SYNC_EMAIL").is_ok() || std::env::var("OVERLEAF_EMAIL").is_ok() {
        return;
    }
    let err = h.engine.projects(false).await.unwrap_err();
    assert!(matches!(err, SyncError::Auth(_)));
    assert_eq!(
        err.to_string(),
        "Cannot prompt for Overleaf email (non-interactive). Provide --email or set OVERLEAF_SYNC_EMAIL."
    );
}

#[tokio::test]
async fn test_rejected_login_reports_server_message() {
    let h = Harness::build(FakeRunner::new(), Some(EMAIL), Some("wrong")).await;
    let err = h.engine.projects(false).await.unwrap_err();
    assert_eq!(err.to_string(), "Login failed: Your email or password is incorrect.");
    assert!(!h.session_path().exists());
}

#[tokio::test]
async fn test_link_writes_sidecar_via_mongo() {
    let h = Harness::new().await;
    let dir = TempDir::new().unwrap();

    let outcome = h
        .engine
        .link(LinkRequest {
            dir: dir.path().to_path_buf(),
            project_id: PROJECT_ID.to_string(),
            force: false,
        })
        .await
        .unwrap();

    assert_eq!(outcome.config_path, dir.path().join(".ol-sync.json"));
    let config = ProjectConfig::load(dir.path()).unwrap();
    assert_eq!(config.base_url, h.server.base_url());
    assert_eq!(config.root_folder_id.as_deref(), Some(MONGO_ROOT));
    assert!(config.linked_at.is_some());
    assert_eq!(h.server.state.joins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_link_falls_back_to_private_join() {
    let h = Harness::with_runner(FakeRunner::new().without_mongo()).await;
    let dir = TempDir::new().unwrap();

    h.engine
        .link(LinkRequest {
            dir: dir.path().to_path_buf(),
            project_id: PROJECT_ID.to_string(),
            force: false,
        })
        .await
        .unwrap();

    let config = ProjectConfig::load(dir.path()).unwrap();
    assert_eq!(config.root_folder_id.as_deref(), Some(JOIN_ROOT));
    assert_eq!(h.server.state.joins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_resolution_surfaces_last_strategy_error() {
    let runner = FakeRunner::new().without_mongo().without_web_api_creds();
    let h = Harness::with_runner(runner).await;
    let dir = TempDir::new().unwrap();

    let err = h
        .engine
        .link(LinkRequest {
            dir: dir.path().to_path_buf(),
            project_id: PROJECT_ID.to_string(),
            force: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Resolution(_)));
    assert!(err
        .to_string()
        .starts_with("Could not auto-detect WEB_API credentials via docker exec (sharelatex):"));
    assert!(!dir.path().join(".ol-sync.json").exists());
}

#[tokio::test]
async fn test_link_refuses_to_overwrite() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());

    let request = LinkRequest {
        dir: dir.path().to_path_buf(),
        project_id: PROJECT_ID.to_string(),
        force: false,
    };
    let err = h.engine.link(request.clone()).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert_eq!(h.server.state.logins.load(Ordering::SeqCst), 0);

    h.engine
        .link(LinkRequest {
            force: true,
            ..request
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_links_new_project() {
    let h = Harness::new().await;
    let parent = TempDir::new().unwrap();
    let dir = parent.path().join("My Paper");

    let outcome = h
        .engine
        .create(CreateRequest {
            dir: dir.clone(),
            name: None,
            force: false,
        })
        .await
        .unwrap();

    assert_eq!(outcome.project_id, NEW_PROJECT_ID);
    let config = ProjectConfig::load(&dir).unwrap();
    assert_eq!(config.project_id, NEW_PROJECT_ID);
    assert!(config.created_at.is_some());
    assert_eq!(config.root_folder_id.as_deref(), Some(MONGO_ROOT));
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let h = Harness::new().await;
    let dir = TempDir::new().unwrap();
    let err = h
        .engine
        .create(CreateRequest {
            dir: dir.path().to_path_buf(),
            name: Some("   ".to_string()),
            force: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Project name cannot be empty.");
}

#[tokio::test]
async fn test_pull_extracts_and_flattens() {
    let h = Harness::new().await;
    h.runner
        .set_snapshot(&[("Thesis/main.tex", "\\documentclass{article}"), ("Thesis/img/a.png", "png")]);
    let parent = TempDir::new().unwrap();
    let dir = parent.path().join("thesis");

    let outcome = h
        .engine
        .pull(PullRequest {
            dir: dir.clone(),
            project_id: PROJECT_ID.to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.dir, dir);
    assert!(dir.join("main.tex").is_file());
    assert!(dir.join("img/a.png").is_file());
    assert!(!dir.join("Thesis").exists());
    assert!(!dir.join(".ol-sync.download.zip").exists());
    let config = ProjectConfig::load(&dir).unwrap();
    assert!(config.pulled_at.is_some());
    assert_eq!(config.root_folder_id.as_deref(), Some(MONGO_ROOT));
}

#[tokio::test]
async fn test_pull_refuses_non_empty_directory() {
    let h = Harness::new().await;
    let dir = TempDir::new().unwrap();
    write(dir.path(), "notes.txt", "mine");

    let err = h
        .engine
        .pull(PullRequest {
            dir: dir.path().to_path_buf(),
            project_id: PROJECT_ID.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert_eq!(h.server.state.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pull_stops_on_non_404_download_status() {
    let h = Harness::new().await;
    h.server.state.zip_status.store(500, Ordering::SeqCst);
    let parent = TempDir::new().unwrap();

    let err = h
        .engine
        .pull(PullRequest {
            dir: parent.path().join("thesis"),
            project_id: PROJECT_ID.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
    assert_eq!(
        err.to_string(),
        format!(
            "Download failed: HTTP 500 {}/project/{}/download/zip zip endpoint says no",
            h.server.base_url(),
            PROJECT_ID
        )
    );
    assert_eq!(h.server.state.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pull_reports_when_every_download_endpoint_is_missing() {
    let h = Harness::new().await;
    h.server.state.download_missing.store(true, Ordering::SeqCst);
    let parent = TempDir::new().unwrap();

    let err = h
        .engine
        .pull(PullRequest {
            dir: parent.path().join("thesis"),
            project_id: PROJECT_ID.to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "Download failed: no working endpoint (last tried: {}/project/{}/download HTTP 404)",
            h.server.base_url(),
            PROJECT_ID
        )
    );
    assert!(h.runner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_without_project_id_fails() {
    let h = Harness::new().await;
    let dir = TempDir::new().unwrap();
    let err = h.engine.fetch(fetch_request(&dir)).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing project id. Provide --project-id or run 'link'/'pull' to create .ol-sync.json."
    );
}

#[tokio::test]
async fn test_two_fetches_of_unchanged_remote_make_two_empty_batches() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    write(dir.path(), "main.tex", "same");
    h.runner.set_snapshot(&[("main.tex", "same")]);

    let first = h.engine.fetch(fetch_request(&dir)).await.unwrap();
    let second = h.engine.fetch(fetch_request(&dir)).await.unwrap();

    assert_ne!(first.manifest.batch_id, second.manifest.batch_id);
    for outcome in [&first, &second] {
        assert!(outcome.manifest.changes.is_empty());
        let path = outcome.manifest_path.as_ref().unwrap();
        let on_disk = InboxManifest::load(path).unwrap();
        assert_eq!(on_disk, outcome.manifest);
        assert_eq!(on_disk.saved, None);
    }
    let batches = h
        .engine
        .inbox(&InboxRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
        })
        .unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].batch_id, second.manifest.batch_id);
}

#[tokio::test]
async fn test_fetch_skip_empty_discards_batch() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    write(dir.path(), "main.tex", "same");
    h.runner.set_snapshot(&[("main.tex", "same")]);

    let outcome = h
        .engine
        .fetch(FetchRequest {
            skip_empty: true,
            ..fetch_request(&dir)
        })
        .await
        .unwrap();

    assert_eq!(outcome.manifest.saved, Some(false));
    assert!(outcome.manifest_path.is_none());
    assert!(!std::path::Path::new(&outcome.manifest.inbox_dir).exists());
}

#[tokio::test]
async fn test_apply_adds_without_deleting() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    write(dir.path(), "old.tex", "local only");
    h.runner.set_snapshot(&[("a.tex", "from remote")]);

    let fetched = h.engine.fetch(fetch_request(&dir)).await.unwrap();
    assert_eq!(fetched.manifest.changes.added, vec!["a.tex"]);
    assert_eq!(fetched.manifest.changes.deleted, vec!["old.tex"]);

    let outcome = h
        .engine
        .apply(ApplyRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
            batch: None,
        })
        .unwrap();

    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.not_deleted, 1);
    assert_eq!(outcome.backup_dir, None);
    assert_eq!(fs::read_to_string(dir.path().join("a.tex")).unwrap(), "from remote");
    assert_eq!(fs::read_to_string(dir.path().join("old.tex")).unwrap(), "local only");

    let backup_root = h
        .engine
        .layout()
        .backup_project_dir(&h.server.base_url(), PROJECT_ID)
        .join(&outcome.batch_id);
    assert!(!backup_root.join("a.tex").exists());
    assert!(std::path::Path::new(&fetched.manifest.inbox_dir)
        .join(".ol-sync.applied")
        .is_file());
}

#[tokio::test]
async fn test_apply_backs_up_modified_files() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    write(dir.path(), "sec/intro.tex", "mine");
    h.runner.set_snapshot(&[("sec/intro.tex", "theirs")]);

    h.engine.fetch(fetch_request(&dir)).await.unwrap();
    let outcome = h
        .engine
        .apply(ApplyRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
            batch: None,
        })
        .unwrap();

    let backup = outcome.backup_dir.expect("backup made");
    assert_eq!(fs::read_to_string(backup.join("sec/intro.tex")).unwrap(), "mine");
    assert_eq!(fs::read_to_string(dir.path().join("sec/intro.tex")).unwrap(), "theirs");
}

#[tokio::test]
async fn test_apply_without_batches_fails() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    let err = h
        .engine
        .apply(ApplyRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
            batch: None,
        })
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("No inbox batches found for project {}. Run 'fetch' first.", PROJECT_ID)
    );
}

#[tokio::test]
async fn test_failed_fetch_leaves_no_batch_behind() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    h.runner.set_snapshot(&[("a.tex", "good")]);
    let good = h.engine.fetch(fetch_request(&dir)).await.unwrap();

    // A file and a directory under the same name cannot both be unpacked
    h.runner.set_snapshot(&[("x", "1"), ("x/y", "2")]);
    let err = h.engine.fetch(fetch_request(&dir)).await.unwrap_err();
    assert!(matches!(err, SyncError::Extraction(_)));

    let inbox = InboxRequest {
        dir: dir.path().to_path_buf(),
        project_id: None,
    };
    let batches = h.engine.inbox(&inbox).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].batch_id, good.manifest.batch_id);

    // A stray folder without a manifest is not a candidate either
    let project_inbox = h
        .engine
        .layout()
        .inbox_project_dir(&h.server.base_url(), PROJECT_ID);
    fs::create_dir(project_inbox.join("9999-12-31T23-59-59-999Z")).unwrap();

    let outcome = h
        .engine
        .apply(ApplyRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
            batch: None,
        })
        .unwrap();
    assert_eq!(outcome.batch_id, good.manifest.batch_id);
    assert_eq!(fs::read_to_string(dir.path().join("a.tex")).unwrap(), "good");
}

#[tokio::test]
async fn test_failed_download_leaves_no_batch_behind() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    h.server.state.zip_status.store(500, Ordering::SeqCst);

    let err = h.engine.fetch(fetch_request(&dir)).await.unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));

    let project_inbox = h
        .engine
        .layout()
        .inbox_project_dir(&h.server.base_url(), PROJECT_ID);
    assert_eq!(fs::read_dir(&project_inbox).unwrap().count(), 0);
}

#[tokio::test]
async fn test_inbox_tracks_applied_state_and_prunes() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    h.runner.set_snapshot(&[("a.tex", "v1")]);
    let older = h.engine.fetch(fetch_request(&dir)).await.unwrap();
    h.runner.set_snapshot(&[("a.tex", "v2")]);
    let newer = h.engine.fetch(fetch_request(&dir)).await.unwrap();

    h.engine
        .apply(ApplyRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
            batch: Some(older.manifest.batch_id.clone()),
        })
        .unwrap();

    let request = InboxRequest {
        dir: dir.path().to_path_buf(),
        project_id: None,
    };
    let batches = h.engine.inbox(&request).unwrap();
    let states: Vec<_> = batches.iter().map(|b| (b.batch_id.clone(), b.state)).collect();
    assert_eq!(
        states,
        vec![
            (newer.manifest.batch_id.clone(), BatchState::Pending),
            (older.manifest.batch_id.clone(), BatchState::Applied),
        ]
    );

    let removed = h.engine.prune_inbox(&request, 1).unwrap();
    assert_eq!(removed, vec![older.manifest.batch_id.clone()]);
    let remaining = h.engine.inbox(&request).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].batch_id, newer.manifest.batch_id);
}

#[tokio::test]
async fn test_push_counts_successes_and_failures() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    write(dir.path(), "main.tex", "body");
    write(dir.path(), "figs/plot.png", "png");
    write(dir.path(), "reject.tex", "nope");
    write(dir.path(), ".git/HEAD", "ref");

    let report = h
        .engine
        .push(PushRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
            dry_run: false,
            concurrency: Some(2),
        })
        .await
        .unwrap();

    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(h.server.state.uploaded_paths(), vec!["figs/plot.png", "main.tex"]);

    let uploads = h.server.state.uploads.lock().unwrap().clone();
    let plot = uploads.iter().find(|u| u.relative_path == "figs/plot.png").unwrap();
    assert_eq!(plot.name, "plot.png");
    assert_eq!(plot.folder_id, MONGO_ROOT);
    assert_eq!(plot.project_id, PROJECT_ID);
    assert_eq!(plot.bytes, b"png");

    let failures: Vec<_> = h
        .progress
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Progress::Failed { path, message } => Some((path, message)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "reject.tex");
    assert!(failures[0].1.starts_with("Upload failed (reject.tex): HTTP 422"));
}

#[tokio::test]
async fn test_push_dry_run_uploads_nothing() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    write(dir.path(), "main.tex", "body");
    write(dir.path(), "refs.bib", "@book{}");

    let report = h
        .engine
        .push(PushRequest {
            dir: dir.path().to_path_buf(),
            project_id: None,
            dry_run: true,
            concurrency: None,
        })
        .await
        .unwrap();

    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed, 0);
    assert!(h.server.state.uploaded_paths().is_empty());
    let mut dry: Vec<String> = h
        .progress
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Progress::DryRun(path) => Some(path),
            _ => None,
        })
        .collect();
    dry.sort();
    assert_eq!(dry, vec!["main.tex", "refs.bib"]);
}

#[tokio::test]
async fn test_push_resolves_missing_root_folder() {
    let h = Harness::new().await;
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.tex", "body");

    let report = h
        .engine
        .push(PushRequest {
            dir: dir.path().to_path_buf(),
            project_id: Some(PROJECT_ID.to_string()),
            dry_run: false,
            concurrency: None,
        })
        .await
        .unwrap();
    assert_eq!(report.uploaded, 1);
    let uploads = h.server.state.uploads.lock().unwrap().clone();
    assert_eq!(uploads[0].folder_id, MONGO_ROOT);
}

#[tokio::test]
async fn test_watch_uploads_changed_file() {
    let h = Harness::new().await;
    let dir = linked_dir(&h.server.base_url());
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let request = WatchRequest {
        dir: dir.path().to_path_buf(),
        project_id: None,
        dry_run: false,
    };
    let shutdown = async {
        let _ = stop_rx.await;
    };
    let driver = async {
        // Wait until the watcher is registered.
        for _ in 0..100 {
            if h.progress.events().iter().any(|e| matches!(e, Progress::Watching { .. })) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        write(dir.path(), "chapter.tex", "draft");
        write(dir.path(), ".ol-sync.scratch", "ignored");
        for _ in 0..250 {
            if !h.server.state.uploaded_paths().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = stop_tx.send(());
    };

    let (result, ()) = tokio::join!(h.engine.watch(request, shutdown), driver);
    result.unwrap();

    let uploaded = h.server.state.uploaded_paths();
    assert!(!uploaded.is_empty());
    assert!(uploaded.iter().all(|p| p == "chapter.tex"));
    assert!(h
        .progress
        .events()
        .contains(&Progress::Synced("chapter.tex".to_string())));
}
