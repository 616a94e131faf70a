//! Remote project discovery and creation.
//!
//! Project objects coming back from the server are loosely shaped (`id` vs
//! `_id`, optional flags, `lastUpdatedBy` as either an object or a string),
//! so every record is normalized into [`Project`] at the boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::OverleafClient;
use crate::error::{Result, SyncError};
use crate::session::Session;

const PAGE_SIZE: u64 = 500;
const MAX_PAGES: usize = 200;

/// Canonical project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: Option<String>,
    pub access_level: Option<String>,
    pub archived: bool,
    pub trashed: bool,
    pub last_updated: Option<String>,
    pub last_updated_by: Option<String>,
}

impl Project {
    /// Normalizes a raw API record. Returns `None` when it carries no id.
    pub fn from_json(raw: &Value) -> Option<Self> {
        let id = project_id_of(raw)?;
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        let flag = |key: &str| raw.get(key).and_then(Value::as_bool).unwrap_or(false);

        let last_updated_by = match raw.get("lastUpdatedBy") {
            Some(Value::Object(user)) => user
                .get("email")
                .and_then(Value::as_str)
                .or_else(|| user.get("id").and_then(Value::as_str))
                .or_else(|| user.get("_id").and_then(Value::as_str))
                .map(str::to_string),
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };

        Some(Self {
            id,
            name: text("name"),
            access_level: text("accessLevel"),
            archived: flag("archived"),
            trashed: flag("trashed"),
            last_updated: text("lastUpdated"),
            last_updated_by,
        })
    }

    /// Folds a later sighting of the same project into this one.
    ///
    /// Fields present on `incoming` win; the archived/trashed flags are OR-ed
    /// because each filter dimension only reports its own flag reliably.
    pub fn merge(&mut self, incoming: Project) {
        if incoming.name.is_some() {
            self.name = incoming.name;
        }
        if incoming.access_level.is_some() {
            self.access_level = incoming.access_level;
        }
        if incoming.last_updated.is_some() {
            self.last_updated = incoming.last_updated;
        }
        if incoming.last_updated_by.is_some() {
            self.last_updated_by = incoming.last_updated_by;
        }
        self.archived |= incoming.archived;
        self.trashed |= incoming.trashed;
    }

    pub fn is_active(&self) -> bool {
        !self.archived && !self.trashed
    }

    /// `accessLevel[, archived][, trashed]`, as shown in the project listing.
    pub fn flags_label(&self) -> String {
        let mut flags = Vec::new();
        if let Some(level) = self.access_level.as_deref().filter(|l| !l.is_empty()) {
            flags.push(level);
        }
        if self.archived {
            flags.push("archived");
        }
        if self.trashed {
            flags.push("trashed");
        }
        flags.join(", ")
    }
}

fn project_id_of(raw: &Value) -> Option<String> {
    match raw.get("id").filter(|v| !v.is_null()).or_else(|| raw.get("_id"))? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Insertion-ordered, id-deduplicated project collection.
#[derive(Debug, Default)]
struct ProjectSet {
    order: Vec<Project>,
    by_id: HashMap<String, usize>,
}

impl ProjectSet {
    fn add(&mut self, label: &str, items: Vec<Project>) {
        let (mut added, mut updated) = (0, 0);
        for project in items {
            match self.by_id.get(&project.id) {
                Some(&idx) => {
                    self.order[idx].merge(project);
                    updated += 1;
                }
                None => {
                    self.by_id.insert(project.id.clone(), self.order.len());
                    self.order.push(project);
                    added += 1;
                }
            }
        }
        tracing::debug!(
            "projects merge ({}): added={} updated={} total={}",
            label,
            added,
            updated,
            self.order.len()
        );
    }
}

/// Lists and creates projects for one authenticated session.
pub struct ProjectDirectory<'a> {
    client: &'a OverleafClient,
    session: &'a Session,
}

impl<'a> ProjectDirectory<'a> {
    pub fn new(client: &'a OverleafClient, session: &'a Session) -> Self {
        Self { client, session }
    }

    /// Every project visible to the user, merged across filter dimensions.
    ///
    /// Falls back to the legacy `/user/projects` endpoint (which omits
    /// archived and trashed projects) when `/api/project` is unavailable.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Project>> {
        let mut set = ProjectSet::default();

        let mut dimensions = vec![("all", json!({})), ("shared", json!({"sharedWithUser": true}))];
        if !active_only {
            dimensions.push(("archived", json!({"archived": true})));
            dimensions.push(("trashed", json!({"trashed": true})));
        }

        for (i, (label, filters)) in dimensions.into_iter().enumerate() {
            match self.fetch_paged(label, filters).await {
                Ok(items) => set.add(label, items),
                Err(e) if i == 0 => {
                    tracing::debug!("projects: /api/project {} failed ({}), falling back to /user/projects", label, e);
                    set.add("user-projects", self.legacy_list().await?);
                    break;
                }
                Err(e) => tracing::debug!("projects: /api/project {} failed ({})", label, e),
            }
        }

        let mut projects = set.order;
        if active_only {
            projects.retain(Project::is_active);
        }
        Ok(projects)
    }

    async fn fetch_paged(&self, label: &str, filters: Value) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut last_id: Option<String> = None;
        let mut total_size: Option<u64> = None;

        for page_number in 0..MAX_PAGES {
            let mut page = json!({"size": PAGE_SIZE, "number": page_number});
            if let Some(id) = &last_id {
                page["lastId"] = json!(id);
            }
            let payload = json!({
                "filters": filters,
                "sort": {"by": "lastUpdated", "order": "desc"},
                "page": page,
            });
            let response = self.client.post_json("/api/project", self.session, &payload).await?;

            let batch = match response.body.as_ref().and_then(|b| b.get("projects")).and_then(Value::as_array) {
                Some(batch) if response.is_success() => batch.clone(),
                _ => {
                    return Err(SyncError::Network(format!(
                        "HTTP {} {}",
                        response.status.as_u16(),
                        response.text
                    )))
                }
            };
            if let Some(body) = &response.body {
                total_size = body
                    .get("totalSize")
                    .or_else(|| body.get("total_size"))
                    .and_then(Value::as_u64)
                    .or(total_size);
            }

            let mut added = 0;
            for project in batch.iter().filter_map(Project::from_json) {
                if seen.insert(project.id.clone()) {
                    projects.push(project);
                    added += 1;
                }
            }
            tracing::debug!(
                "projects via /api/project ({}): page={} returned={} added={} totalSize={:?}",
                label,
                page_number,
                batch.len(),
                added,
                total_size
            );

            let next_last_id = batch.last().and_then(project_id_of);
            if batch.is_empty() || next_last_id.is_none() || next_last_id == last_id {
                break;
            }
            last_id = next_last_id;
            if total_size.is_some_and(|total| projects.len() as u64 >= total) || added == 0 {
                break;
            }
        }
        Ok(projects)
    }

    async fn legacy_list(&self) -> Result<Vec<Project>> {
        let response = self.client.get_json("/user/projects", self.session).await?;
        let items = response
            .body
            .as_ref()
            .and_then(|b| b.get("projects"))
            .and_then(Value::as_array)
            .filter(|_| response.is_success())
            .ok_or_else(|| {
                SyncError::Network(format!(
                    "Failed to fetch /user/projects: HTTP {} {}",
                    response.status.as_u16(),
                    response.text
                ))
            })?;
        Ok(items.iter().filter_map(Project::from_json).collect())
    }

    /// Creates a blank project and returns its id.
    ///
    /// Tries a JSON body first and falls back to form encoding.
    pub async fn create(&self, name: &str) -> Result<String> {
        let json_attempt = self
            .client
            .post_json("/project/new", self.session, &json!({"projectName": name}))
            .await?;
        if json_attempt.is_success() {
            if let Some(id) = json_attempt.str_field("project_id") {
                return Ok(id);
            }
        }

        let form_attempt = self
            .client
            .post_form("/project/new", self.session, &[("projectName", name)])
            .await?;
        if form_attempt.is_success() {
            if let Some(id) = form_attempt.str_field("project_id") {
                return Ok(id);
            }
        }

        let details = [&json_attempt.text, &form_attempt.text]
            .into_iter()
            .find(|t| !t.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("HTTP {}", json_attempt.status.as_u16()));
        Err(SyncError::Network(format!("Failed to create project: {}", details.trim())))
    }
}
