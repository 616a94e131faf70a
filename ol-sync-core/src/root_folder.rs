//! Root folder id resolution.
//!
//! Uploads need the id of the project's top-level folder, which the public
//! API does not expose. Two strategies are tried in order:
//!
//! 1. [`Strategy::Mongo`]: read it straight from the database container with
//!    `docker exec <mongo> mongosh`.
//! 2. [`Strategy::PrivateJoin`]: auto-detect the web container's private API
//!    credentials, then call `POST /project/:id/join` and read
//!    `project.rootFolder[0]._id` from the response.
//!
//! The first success wins. When every strategy fails the error of the last
//! one is surfaced.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::client::{basic_auth_header, OverleafClient};
use crate::error::{Result, SyncError};
use crate::runner::CommandRunner;

pub const DEFAULT_MONGO_CONTAINER: &str = "mongo";
pub const DEFAULT_CONTAINER: &str = "sharelatex";

static OBJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-fA-F0-9]{24}$").expect("valid regex"));

/// True for a 24-hex-digit Mongo object id.
pub fn is_object_id(value: &str) -> bool {
    OBJECT_ID.is_match(value)
}

const CREDENTIALS_SCRIPT: &str = concat!(
    r#"if [ -n "${WEB_API_USER:-}" ]; then echo "WEB_API_USER=$WEB_API_USER"; "#,
    r#"elif [ -f /etc/container_environment/WEB_API_USER ]; then echo "WEB_API_USER=$(cat /etc/container_environment/WEB_API_USER)"; fi; "#,
    r#"if [ -n "${WEB_API_PASSWORD:-}" ]; then echo "WEB_API_PASSWORD=$WEB_API_PASSWORD"; "#,
    r#"elif [ -f /etc/container_environment/WEB_API_PASSWORD ]; then echo "WEB_API_PASSWORD=$(cat /etc/container_environment/WEB_API_PASSWORD)"; fi;"#,
);

/// Private web API credentials of a Community Edition container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebApiCredentials {
    pub user: String,
    pub pass: String,
}

impl WebApiCredentials {
    /// Parses `WEB_API_USER=...` / `WEB_API_PASSWORD=...` lines.
    pub fn parse(stdout: &str) -> Option<Self> {
        let find = |key: &str| {
            stdout
                .lines()
                .map(str::trim)
                .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            user: find("WEB_API_USER")?,
            pass: find("WEB_API_PASSWORD")?,
        })
    }
}

/// One way of finding a root folder id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Mongo { container: String },
    PrivateJoin { container: String, user_id: Option<String> },
}

impl Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Mongo { .. } => "mongo",
            Strategy::PrivateJoin { .. } => "private join",
        }
    }
}

pub struct RootFolderResolver<'a> {
    client: &'a OverleafClient,
    runner: &'a dyn CommandRunner,
    strategies: Vec<Strategy>,
}

impl<'a> RootFolderResolver<'a> {
    /// Resolver with the standard order: Mongo, then private join.
    pub fn new(
        client: &'a OverleafClient,
        runner: &'a dyn CommandRunner,
        mongo_container: &str,
        container: &str,
        user_id: Option<&str>,
    ) -> Self {
        Self::with_strategies(
            client,
            runner,
            vec![
                Strategy::Mongo {
                    container: mongo_container.to_string(),
                },
                Strategy::PrivateJoin {
                    container: container.to_string(),
                    user_id: user_id.map(str::to_string),
                },
            ],
        )
    }

    pub fn with_strategies(
        client: &'a OverleafClient,
        runner: &'a dyn CommandRunner,
        strategies: Vec<Strategy>,
    ) -> Self {
        Self {
            client,
            runner,
            strategies,
        }
    }

    pub async fn resolve(&self, project_id: &str) -> Result<String> {
        let mut last_error = None;
        for strategy in &self.strategies {
            match self.try_strategy(strategy, project_id).await {
                Ok(id) => {
                    tracing::debug!("rootFolderId resolved via {}: {}", strategy.name(), id);
                    return Ok(id);
                }
                Err(e) => {
                    tracing::debug!("rootFolderId {} lookup failed ({})", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(SyncError::Resolution(last_error.unwrap_or_else(|| {
            "No root folder strategy configured.".to_string()
        })))
    }

    async fn try_strategy(&self, strategy: &Strategy, project_id: &str) -> std::result::Result<String, String> {
        match strategy {
            Strategy::Mongo { container } => self
                .via_mongo(container, project_id)
                .await
                .map_err(|e| format!("Could not read root folder id from Mongo via docker exec ({}): {}", container, e)),
            Strategy::PrivateJoin { container, user_id } => {
                let user_id = user_id
                    .as_deref()
                    .ok_or_else(|| "Private join needs the current user id".to_string())?;
                let creds = self.detect_credentials(container).await?;
                self.via_private_join(project_id, user_id, &creds).await
            }
        }
    }

    async fn via_mongo(&self, container: &str, project_id: &str) -> std::result::Result<String, String> {
        if !is_object_id(project_id) {
            return Err(format!("invalid project id: {}", project_id));
        }
        let script = format!(
            "const p=db.projects.findOne({{_id:ObjectId(\"{}\")}},{{rootFolder:1}}); \
             if(!p||!p.rootFolder||!p.rootFolder[0]||!p.rootFolder[0]._id){{quit(2)}} \
             print(p.rootFolder[0]._id.toHexString())",
            project_id
        );
        let args: Vec<String> = ["exec", container, "mongosh", "sharelatex", "--quiet", "--eval", script.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = self.runner.run("docker", &args).await.map_err(|e| e.to_string())?;
        if !output.success {
            return Err(output.failure_detail());
        }
        let out = output.stdout.trim();
        if !is_object_id(out) {
            return Err(format!("unexpected output: {}", out));
        }
        Ok(out.to_string())
    }

    /// Reads `WEB_API_USER`/`WEB_API_PASSWORD` from the web container.
    pub async fn detect_credentials(&self, container: &str) -> std::result::Result<WebApiCredentials, String> {
        let args: Vec<String> = ["exec", container, "sh", "-lc", CREDENTIALS_SCRIPT]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let detected = match self.runner.run("docker", &args).await {
            Ok(output) if output.success => WebApiCredentials::parse(&output.stdout)
                .ok_or_else(|| "missing WEB_API_USER/WEB_API_PASSWORD in container env".to_string()),
            Ok(output) => Err(output.failure_detail()),
            Err(e) => Err(e.to_string()),
        };
        detected.map_err(|e| {
            format!(
                "Could not auto-detect WEB_API credentials via docker exec ({}): {}",
                container, e
            )
        })
    }

    async fn via_private_join(
        &self,
        project_id: &str,
        user_id: &str,
        creds: &WebApiCredentials,
    ) -> std::result::Result<String, String> {
        let response = self
            .client
            .post_json_basic(
                &format!("/project/{}/join", project_id),
                &basic_auth_header(&creds.user, &creds.pass),
                &json!({"userId": user_id}),
            )
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!(
                "Private join failed: HTTP {} {}",
                response.status.as_u16(),
                response.text
            )
            .trim()
            .to_string());
        }
        response
            .body
            .as_ref()
            .and_then(|b| b.pointer("/project/rootFolder/0/_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "Private join did not return project.rootFolder[0]._id".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_format() {
        assert!(is_object_id("0123456789abcdefABCDEF01"));
        assert!(!is_object_id("0123456789abcdef"));
        assert!(!is_object_id("0123456789abcdefABCDEF0g"));
        assert!(!is_object_id(" 0123456789abcdefABCDEF01"));
    }

    #[test]
    fn test_parse_credentials() {
        let creds = WebApiCredentials::parse("WEB_API_USER=overleaf\nWEB_API_PASSWORD=s3cr=t\n").unwrap();
        assert_eq!(creds.user, "overleaf");
        assert_eq!(creds.pass, "s3cr=t");
    }

    #[test]
    fn test_parse_credentials_requires_both() {
        assert!(WebApiCredentials::parse("WEB_API_USER=overleaf\n").is_none());
        assert!(WebApiCredentials::parse("WEB_API_USER=\nWEB_API_PASSWORD=x").is_none());
        assert!(WebApiCredentials::parse("").is_none());
    }
}
