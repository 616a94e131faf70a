//! HTTP plumbing for talking to an Overleaf-compatible web app.
//!
//! Every authenticated request sends the session's cookies (and CSRF token
//! where the server expects one) and folds `Set-Cookie` headers from the
//! response back into the session.

use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION, COOKIE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::error::Result;
use crate::session::Session;

static META_CSRF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+name="ol-csrfToken"\s+content="([^"]+)""#).expect("valid regex")
});

static INPUT_CSRF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input\s+name="_csrf"[^>]*\svalue="([^"]+)""#).expect("valid regex")
});

/// Header carrying the anti-forgery token on state-changing requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Strips trailing slashes so session-store keys and URLs line up.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Pulls the CSRF token out of a login page.
///
/// Prefers the `ol-csrfToken` meta tag and falls back to a hidden `_csrf`
/// form field.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    META_CSRF
        .captures(html)
        .or_else(|| INPUT_CSRF.captures(html))
        .map(|c| c[1].to_string())
}

/// `Authorization` header value for HTTP Basic credentials.
pub fn basic_auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
}

/// Buffered response: status, raw text and (when it parses) the JSON body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub text: String,
    pub body: Option<Value>,
}

impl ApiResponse {
    async fn read(response: Response, session: Option<&Session>) -> Result<Self> {
        if let Some(session) = session {
            session.absorb_cookies(response.headers());
        }
        let status = response.status();
        let text = response.text().await?;
        let body = if text.is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };
        Ok(Self { status, text, body })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Looks up a top-level string (or numeric) field of the JSON body.
    pub fn str_field(&self, key: &str) -> Option<String> {
        match self.body.as_ref()?.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Client bound to one normalized base URL.
#[derive(Debug, Clone)]
pub struct OverleafClient {
    http: reqwest::Client,
    base_url: String,
}

impl OverleafClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a server-relative path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_session(&self, builder: RequestBuilder, session: &Session, csrf: bool) -> RequestBuilder {
        let mut builder = builder;
        let cookie = session.cookie_header();
        if !cookie.is_empty() {
            builder = builder.header(COOKIE, cookie);
        }
        if csrf && !session.csrf_token().is_empty() {
            builder = builder.header(CSRF_HEADER, session.csrf_token());
        }
        builder
    }

    /// GET returning the body as text (used for HTML pages).
    pub async fn get_text(&self, path: &str, session: &Session) -> Result<ApiResponse> {
        let builder = self.with_session(self.http.get(self.url(path)), session, false);
        ApiResponse::read(builder.send().await?, Some(session)).await
    }

    pub async fn get_json(&self, path: &str, session: &Session) -> Result<ApiResponse> {
        let builder = self
            .with_session(self.http.get(self.url(path)), session, false)
            .header(ACCEPT, "application/json");
        ApiResponse::read(builder.send().await?, Some(session)).await
    }

    /// Form-encoded POST with the session's CSRF token as a header.
    pub async fn post_form(
        &self,
        path: &str,
        session: &Session,
        form: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        let builder = self
            .with_session(self.http.post(self.url(path)), session, true)
            .header(ACCEPT, "application/json")
            .form(form);
        ApiResponse::read(builder.send().await?, Some(session)).await
    }

    /// JSON POST with cookies and CSRF token.
    pub async fn post_json(&self, path: &str, session: &Session, body: &Value) -> Result<ApiResponse> {
        let builder = self
            .with_session(self.http.post(self.url(path)), session, true)
            .header(ACCEPT, "application/json")
            .json(body);
        ApiResponse::read(builder.send().await?, Some(session)).await
    }

    /// JSON POST authenticated with HTTP Basic credentials instead of a session.
    pub async fn post_json_basic(
        &self,
        path: &str,
        authorization: &str,
        body: &Value,
    ) -> Result<ApiResponse> {
        let builder = self
            .http
            .post(self.url(path))
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, authorization)
            .json(body);
        ApiResponse::read(builder.send().await?, None).await
    }

    /// Multipart POST (file uploads).
    pub async fn post_multipart(
        &self,
        path: &str,
        session: &Session,
        form: reqwest::multipart::Form,
    ) -> Result<ApiResponse> {
        let builder = self
            .with_session(self.http.post(self.url(path)), session, true)
            .header(ACCEPT, "application/json")
            .multipart(form);
        ApiResponse::read(builder.send().await?, Some(session)).await
    }

    /// Raw GET for binary downloads. Cookies are absorbed; the body is left unread.
    pub async fn get_binary(&self, path: &str, session: &Session) -> Result<Response> {
        let response = self
            .with_session(self.http.get(self.url(path)), session, true)
            .header(ACCEPT, "application/zip,application/octet-stream")
            .send()
            .await?;
        session.absorb_cookies(response.headers());
        Ok(response)
    }
}
