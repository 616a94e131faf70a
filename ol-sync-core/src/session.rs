//! Session management: password login, cached sessions and CSRF refresh.
//!
//! Sessions are persisted per normalized base URL in a JSON store:
//!
//! ```text
//! {
//!   "version": 1,
//!   "sessions": {
//!     "http://localhost": { "cookies": {...}, "csrfToken": "...", "savedAt": "..." }
//!   }
//! }
//! ```
//!
//! A cached session is tried first; its CSRF token is always re-read from the
//! login page because the token is short-lived. Any failure on that path
//! falls through to a credential login.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{extract_csrf_token, normalize_base_url, OverleafClient};
use crate::cookie::CookieJar;
use crate::error::{Result, SyncError};

/// Environment variables consulted for credentials, in priority order.
pub const EMAIL_ENV_VARS: &[&str] = &["OVERLEAF_SYNC_EMAIL", "OVERLEAF_EMAIL"];
pub const PASSWORD_ENV_VARS: &[&str] = &["OVERLEAF_SYNC_PASSWORD", "OVERLEAF_PASSWORD"];

const STORE_VERSION: u32 = 1;

/// Authenticated session: cookie jar plus CSRF token.
///
/// The jar sits behind a mutex because concurrent uploads share one session
/// and each response may refresh cookies.
#[derive(Debug, Default)]
pub struct Session {
    jar: Mutex<CookieJar>,
    csrf_token: String,
}

impl Session {
    pub fn new(jar: CookieJar, csrf_token: impl Into<String>) -> Self {
        Self {
            jar: Mutex::new(jar),
            csrf_token: csrf_token.into(),
        }
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn set_csrf_token(&mut self, token: impl Into<String>) {
        self.csrf_token = token.into();
    }

    pub fn cookie_header(&self) -> String {
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .header_value()
    }

    pub fn absorb_cookies(&self, headers: &HeaderMap) {
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_from_headers(headers);
    }

    /// Snapshot of the current cookies.
    pub fn jar(&self) -> CookieJar {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// One persisted session entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub saved_at: String,
}

/// On-disk session store keyed by normalized base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStore {
    pub version: u32,
    #[serde(default)]
    pub sessions: BTreeMap<String, StoredSession>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            sessions: BTreeMap::new(),
        }
    }
}

impl SessionStore {
    /// Loads the store. A missing or unreadable file yields an empty store.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<SessionStore>(&raw) {
            Ok(mut store) => {
                store.version = STORE_VERSION;
                store
            }
            Err(e) => {
                tracing::warn!("ignoring corrupt session store {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Writes the store atomically (temp file + rename), readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        let mut json = serde_json::to_string_pretty(self).map_err(|e| SyncError::json(path, e))?;
        json.push('\n');

        let temp_path = PathBuf::from(format!(
            "{}.tmp-{}-{}",
            path.display(),
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        ));
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&temp_path)
            .map_err(|e| SyncError::io(&temp_path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| SyncError::io(&temp_path, e))?;
        file.sync_all().map_err(|e| SyncError::io(&temp_path, e))?;

        fs::rename(&temp_path, path).map_err(|e| SyncError::io(path, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
                tracing::debug!("could not chmod {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    pub fn get(&self, base_url: &str) -> Option<Session> {
        self.sessions
            .get(&normalize_base_url(base_url))
            .map(|entry| Session::new(CookieJar::from_map(entry.cookies.clone()), entry.csrf_token.clone()))
    }

    pub fn insert(&mut self, base_url: &str, session: &Session) {
        self.sessions.insert(
            normalize_base_url(base_url),
            StoredSession {
                cookies: session.jar().to_map(),
                csrf_token: session.csrf_token().to_string(),
                saved_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            },
        );
    }
}

/// How the caller wants to authenticate.
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    pub email: Option<String>,
    pub password: Option<String>,
    pub no_session_cache: bool,
    pub session_path: PathBuf,
}

impl AuthOptions {
    /// Explicit option, then the first non-empty credential env var.
    pub fn resolved_email(&self) -> Option<String> {
        self.resolve_email_with(|key| std::env::var(key).ok())
    }

    pub fn resolved_password(&self) -> Option<String> {
        self.resolve_password_with(|key| std::env::var(key).ok())
    }

    fn resolve_email_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        std::iter::once(self.email.clone())
            .chain(EMAIL_ENV_VARS.iter().map(|key| env(key)))
            .flatten()
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }

    fn resolve_password_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        std::iter::once(self.password.clone())
            .chain(PASSWORD_ENV_VARS.iter().map(|key| env(key)))
            .flatten()
            .find(|v| !v.is_empty())
    }
}

/// Source of interactively entered credentials.
pub trait CredentialPrompter: Send + Sync {
    /// True when a real terminal is attached.
    fn is_interactive(&self) -> bool;
    fn prompt_email(&self) -> std::io::Result<String>;
    /// Must not echo the typed characters.
    fn prompt_password(&self) -> std::io::Result<String>;
}

/// Prompter for embedders without a terminal; never prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl CredentialPrompter for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    fn prompt_email(&self) -> std::io::Result<String> {
        Err(std::io::Error::other("Cannot prompt for input: stdin is not a TTY."))
    }

    fn prompt_password(&self) -> std::io::Result<String> {
        Err(std::io::Error::other("Cannot prompt for input: stdin is not a TTY."))
    }
}

/// Account information from `/user/personal_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub email: Option<String>,
}

impl UserInfo {
    fn from_json(body: &Value) -> Option<Self> {
        let id = match body.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let email = body.get("email").and_then(Value::as_str).map(str::to_string);
        Some(Self { id, email })
    }
}

/// Result of [`SessionManager::ensure_authenticated`].
#[derive(Debug)]
pub struct AuthOutcome {
    pub session: Session,
    pub identity: Option<UserInfo>,
    pub reused_session: bool,
    pub session_path: PathBuf,
    /// True when a fresh login was written to the session store.
    pub newly_cached: bool,
}

/// Authenticates against one server.
pub struct SessionManager<'a> {
    client: &'a OverleafClient,
    options: &'a AuthOptions,
    prompter: &'a dyn CredentialPrompter,
}

impl<'a> SessionManager<'a> {
    pub fn new(
        client: &'a OverleafClient,
        options: &'a AuthOptions,
        prompter: &'a dyn CredentialPrompter,
    ) -> Self {
        Self {
            client,
            options,
            prompter,
        }
    }

    pub async fn ensure_authenticated(&self, require_user_info: bool) -> Result<AuthOutcome> {
        let base_url = self.client.base_url();
        let session_path = self.options.session_path.clone();

        if !self.options.no_session_cache {
            if let Some(cached) = SessionStore::load(&session_path).get(base_url) {
                match self.revalidate(cached, require_user_info).await {
                    Ok((session, identity)) => {
                        if let Err(e) = self.persist(&session) {
                            tracing::warn!(
                                "could not refresh session cache {}: {}",
                                session_path.display(),
                                e
                            );
                        }
                        return Ok(AuthOutcome {
                            session,
                            identity,
                            reused_session: true,
                            session_path,
                            newly_cached: false,
                        });
                    }
                    Err(e) => {
                        tracing::debug!("cached session for {} unusable ({}), logging in", base_url, e);
                    }
                }
            }
        }

        let (email, password) = self.credentials()?;
        let session = self.login(&email, &password).await?;
        let identity = if require_user_info {
            Some(self.personal_info(&session).await?)
        } else {
            None
        };

        let newly_cached = !self.options.no_session_cache;
        if newly_cached {
            self.persist(&session)?;
        }

        Ok(AuthOutcome {
            session,
            identity,
            reused_session: false,
            session_path,
            newly_cached,
        })
    }

    async fn revalidate(
        &self,
        mut session: Session,
        require_user_info: bool,
    ) -> Result<(Session, Option<UserInfo>)> {
        self.refresh_csrf_token(&mut session).await?;
        let identity = if require_user_info {
            Some(self.personal_info(&session).await?)
        } else {
            None
        };
        Ok((session, identity))
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let path = &self.options.session_path;
        let mut store = SessionStore::load(path);
        store.insert(self.client.base_url(), session);
        store.save(path)
    }

    fn credentials(&self) -> Result<(String, String)> {
        let interactive = self.prompter.is_interactive();

        let email = match self.options.resolved_email() {
            Some(email) => email,
            None if !interactive => {
                return Err(SyncError::Auth(
                    "Cannot prompt for Overleaf email (non-interactive). Provide --email or set OVERLEAF_SYNC_EMAIL.".to_string(),
                ))
            }
            None => self
                .prompter
                .prompt_email()
                .map_err(|e| SyncError::Auth(e.to_string()))?
                .trim()
                .to_string(),
        };
        if email.is_empty() {
            return Err(SyncError::Auth("Missing email for login.".to_string()));
        }

        let password = match self.options.resolved_password() {
            Some(password) => password,
            None if interactive => self
                .prompter
                .prompt_password()
                .map_err(|e| SyncError::Auth(e.to_string()))?
                .trim()
                .to_string(),
            None => String::new(),
        };
        if password.is_empty() {
            return Err(SyncError::Auth(
                "Cannot prompt for Overleaf password (non-interactive). Provide --password or set OVERLEAF_SYNC_PASSWORD.".to_string(),
            ));
        }

        Ok((email, password))
    }

    /// Re-reads the login page and stores its CSRF token on the session.
    pub async fn refresh_csrf_token(&self, session: &mut Session) -> Result<()> {
        let page = self.client.get_text("/login", session).await?;
        let token = extract_csrf_token(&page.text)
            .ok_or_else(|| SyncError::Network("Could not find CSRF token on /login".to_string()))?;
        session.set_csrf_token(token);
        Ok(())
    }

    /// Two-step login: fetch the CSRF token, then post the credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let mut session = Session::default();
        self.refresh_csrf_token(&mut session).await?;

        let csrf = session.csrf_token().to_string();
        let response = self
            .client
            .post_form(
                "/login",
                &session,
                &[("email", email), ("password", password), ("_csrf", &csrf)],
            )
            .await?;

        if !response.is_success() {
            return Err(SyncError::Auth(format!(
                "Login failed: HTTP {} {}",
                response.status.as_u16(),
                response.text
            )));
        }
        if response.str_field("redir").is_none() {
            let message = response
                .body
                .as_ref()
                .and_then(|b| b.get("message"))
                .and_then(|m| m.get("text").or_else(|| m.get("error")))
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|m| !m.is_empty())
                .or_else(|| Some(response.text.clone()).filter(|t| !t.is_empty()))
                .unwrap_or_else(|| "Unknown login error".to_string());
            return Err(SyncError::Auth(format!("Login failed: {}", message)));
        }

        tracing::debug!("logged in to {} as {}", self.client.base_url(), email);
        Ok(session)
    }

    /// Fetches the current account; fails when the session is not live.
    pub async fn personal_info(&self, session: &Session) -> Result<UserInfo> {
        let response = self.client.get_json("/user/personal_info", session).await?;
        let info = response
            .is_success()
            .then(|| response.body.as_ref().and_then(UserInfo::from_json))
            .flatten();
        info.ok_or_else(|| {
            SyncError::Network(format!(
                "Failed to fetch /user/personal_info: HTTP {} {}",
                response.status.as_u16(),
                response.text
            ))
        })
    }
}
