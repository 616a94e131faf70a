//! In-process stand-ins for the web app and the external tools.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use ol_sync_core::{
    basic_auth_header, AuthOptions, CommandOutput, CommandRunner, EngineConfig, RecordingProgress,
    SyncEngine,
};

pub const EMAIL: &str = "author@example.com";
pub const PASSWORD: &str = "correct horse";
pub const CSRF: &str = "csrf-token-value";
pub const USER_ID: &str = "5f0c1b2a3d4e5f6a7b8c9d0e";
pub const PROJECT_ID: &str = "64b7f0c2a1b2c3d4e5f60718";
pub const NEW_PROJECT_ID: &str = "64b7f0c2a1b2c3d4e5f60799";
pub const MONGO_ROOT: &str = "64b7f0c2a1b2c3d4e5f60700";
pub const JOIN_ROOT: &str = "64b7f0c2a1b2c3d4e5f607ff";
pub const WEB_API_USER: &str = "overleaf";
pub const WEB_API_PASSWORD: &str = "web-secret";

const SESSION_COOKIE: &str = "overleaf.sid=authed";

#[derive(Default)]
pub struct MockState {
    pub logins: AtomicUsize,
    pub downloads: AtomicUsize,
    pub joins: AtomicUsize,
    pub legacy_only: AtomicBool,
    /// Status served by `/download/zip`; zero means 404.
    pub zip_status: AtomicU16,
    /// Makes `/download` answer 404 too.
    pub download_missing: AtomicBool,
    pub uploads: Mutex<Vec<Upload>>,
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub project_id: String,
    pub folder_id: String,
    pub relative_path: String,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MockState {
    pub fn uploaded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.relative_path.clone())
            .collect();
        paths.sort();
        paths
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/login", get(login_page).post(login))
            .route("/user/personal_info", get(personal_info))
            .route("/user/projects", get(legacy_projects))
            .route("/api/project", post(api_projects))
            .route("/project/new", post(new_project))
            .route("/project/{id}/download/zip", get(download_zip))
            .route("/project/{id}/download", get(download))
            .route("/project/{id}/upload", post(upload))
            .route("/project/{id}/join", post(join))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

fn authed(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.split("; ").any(|pair| pair == SESSION_COOKIE))
}

fn csrf_ok(headers: &HeaderMap) -> bool {
    headers.get("x-csrf-token").and_then(|v| v.to_str().ok()) == Some(CSRF)
}

async fn login_page() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, "GCLB=edge; Path=/")],
        Html(format!(
            r#"<html><head><meta name="ol-csrfToken" content="{}"></head><body></body></html>"#,
            CSRF
        )),
    )
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let csrf_matches = csrf_ok(&headers) && form.get("_csrf").map(String::as_str) == Some(CSRF);
    if !csrf_matches {
        return (StatusCode::FORBIDDEN, "invalid csrf").into_response();
    }
    if form.get("email").map(String::as_str) == Some(EMAIL)
        && form.get("password").map(String::as_str) == Some(PASSWORD)
    {
        state.logins.fetch_add(1, Ordering::SeqCst);
        return (
            [(header::SET_COOKIE, format!("{}; Path=/; HttpOnly", SESSION_COOKIE))],
            Json(json!({"redir": "/project"})),
        )
            .into_response();
    }
    Json(json!({"message": {"type": "error", "text": "Your email or password is incorrect."}}))
        .into_response()
}

async fn personal_info(headers: HeaderMap) -> Response {
    if !authed(&headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    Json(json!({"id": USER_ID, "email": EMAIL})).into_response()
}

async fn legacy_projects(headers: HeaderMap) -> Response {
    if !authed(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"projects": [{"_id": "p1", "name": "Thesis", "accessLevel": "owner"}]})).into_response()
}

async fn api_projects(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if state.legacy_only.load(Ordering::SeqCst) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if !authed(&headers) || !csrf_ok(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if body.pointer("/page/lastId").is_some() {
        return Json(json!({"totalSize": 0, "projects": []})).into_response();
    }
    let filters = &body["filters"];
    let projects = if filters.get("sharedWithUser").is_some() {
        json!([{"id": "p3", "name": "Shared paper", "accessLevel": "readAndWrite"}])
    } else if filters.get("archived").is_some() {
        json!([{"id": "p2", "archived": true}])
    } else if filters.get("trashed").is_some() {
        json!([])
    } else {
        json!([
            {"id": "p1", "name": "Thesis", "accessLevel": "owner", "lastUpdated": "2024-05-01T10:00:00.000Z",
             "lastUpdatedBy": {"id": USER_ID, "email": EMAIL}},
            {"_id": "p2", "name": "Old notes", "accessLevel": "owner"}
        ])
    };
    let total = projects.as_array().map_or(0, Vec::len);
    Json(json!({"totalSize": total, "projects": projects})).into_response()
}

async fn new_project(headers: HeaderMap) -> Response {
    if !authed(&headers) || !csrf_ok(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(json!({"project_id": NEW_PROJECT_ID, "owner_ref": USER_ID})).into_response()
}

async fn download_zip(State(state): State<Arc<MockState>>) -> Response {
    let status = match state.zip_status.load(Ordering::SeqCst) {
        0 => StatusCode::NOT_FOUND,
        code => StatusCode::from_u16(code).unwrap(),
    };
    (status, "zip endpoint says no").into_response()
}

async fn download(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authed(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if state.download_missing.load(Ordering::SeqCst) {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.downloads.fetch_add(1, Ordering::SeqCst);
    (
        [(header::CONTENT_TYPE, "application/zip")],
        b"PK\x03\x04 fake archive".to_vec(),
    )
        .into_response()
}

async fn upload(
    State(state): State<Arc<MockState>>,
    Path(project_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authed(&headers) || !csrf_ok(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let mut upload = Upload {
        project_id,
        folder_id: query.get("folder_id").cloned().unwrap_or_default(),
        relative_path: String::new(),
        name: String::new(),
        bytes: Vec::new(),
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name().unwrap_or_default() {
            "name" => upload.name = field.text().await.unwrap(),
            "relativePath" => upload.relative_path = field.text().await.unwrap(),
            "qqfile" => upload.bytes = field.bytes().await.unwrap().to_vec(),
            _ => {}
        }
    }
    if upload.relative_path.ends_with("reject.tex") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"success": false, "error": "invalid_filename"})),
        )
            .into_response();
    }
    state.uploads.lock().unwrap().push(upload);
    Json(json!({"success": true, "entity_type": "doc"})).into_response()
}

async fn join(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let expected = basic_auth_header(WEB_API_USER, WEB_API_PASSWORD);
    let auth = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if auth != Some(expected.as_str()) || body["userId"] != USER_ID {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    state.joins.fetch_add(1, Ordering::SeqCst);
    Json(json!({"project": {"_id": PROJECT_ID, "rootFolder": [{"_id": JOIN_ROOT}]}})).into_response()
}

/// Plays `unzip` (writing a canned snapshot) and `docker exec`.
pub struct FakeRunner {
    snapshot: Mutex<Vec<(String, String)>>,
    mongo_root: Option<String>,
    web_api_creds: bool,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(Vec::new()),
            mongo_root: Some(MONGO_ROOT.to_string()),
            web_api_creds: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_mongo(mut self) -> Self {
        self.mongo_root = None;
        self
    }

    pub fn without_web_api_creds(mut self) -> Self {
        self.web_api_creds = false;
        self
    }

    pub fn set_snapshot(&self, files: &[(&str, &str)]) {
        *self.snapshot.lock().unwrap() = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
    }

    fn ok(stdout: impl Into<String>) -> CommandOutput {
        CommandOutput {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn fail(stderr: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        self.calls.lock().unwrap().push(call);

        match (program, args.get(2).map(String::as_str)) {
            ("unzip", _) => {
                let dest = PathBuf::from(&args[3]);
                for (rel, contents) in self.snapshot.lock().unwrap().iter() {
                    let path = dest.join(rel);
                    std::fs::create_dir_all(path.parent().unwrap())?;
                    std::fs::write(path, contents)?;
                }
                Ok(Self::ok(""))
            }
            ("docker", Some("mongosh")) => Ok(match &self.mongo_root {
                Some(root) => Self::ok(format!("{}\n", root)),
                None => Self::fail("Error response from daemon: No such container: mongo"),
            }),
            ("docker", Some("sh")) if self.web_api_creds => Ok(Self::ok(format!(
                "WEB_API_USER={}\nWEB_API_PASSWORD={}\n",
                WEB_API_USER, WEB_API_PASSWORD
            ))),
            ("docker", Some("sh")) => Ok(Self::ok("")),
            _ => Err(std::io::Error::new(std::io::ErrorKind::NotFound, program.to_string())),
        }
    }
}

pub struct Harness {
    pub server: MockServer,
    pub runner: Arc<FakeRunner>,
    pub progress: Arc<RecordingProgress>,
    pub data: tempfile::TempDir,
    pub engine: SyncEngine,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_runner(FakeRunner::new()).await
    }

    pub async fn with_runner(runner: FakeRunner) -> Self {
        Self::build(runner, Some(EMAIL), Some(PASSWORD)).await
    }

    pub async fn build(runner: FakeRunner, email: Option<&str>, password: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let data = tempfile::TempDir::new().unwrap();
        let runner = Arc::new(runner);
        let progress = Arc::new(RecordingProgress::default());
        let engine = make_engine(&server, data.path(), email, password)
            .with_runner(runner.clone())
            .with_progress(progress.clone());
        Self {
            server,
            runner,
            progress,
            data,
            engine,
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.data.path().join("session.json")
    }
}

pub fn make_engine(
    server: &MockServer,
    data_dir: &FsPath,
    email: Option<&str>,
    password: Option<&str>,
) -> SyncEngine {
    let auth = AuthOptions {
        email: email.map(str::to_string),
        password: password.map(str::to_string),
        no_session_cache: false,
        session_path: data_dir.join("session.json"),
    };
    let mut config = EngineConfig::new(data_dir, auth);
    config.base_url = server.base_url();
    SyncEngine::new(config)
}

pub fn write(root: &FsPath, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}
