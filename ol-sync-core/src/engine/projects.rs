use crate::error::Result;
use crate::projects::{Project, ProjectDirectory};

use super::SyncEngine;

impl SyncEngine {
    /// Lists the projects visible to the logged-in user.
    pub async fn projects(&self, active_only: bool) -> Result<Vec<Project>> {
        let client = self.client(&self.config.base_url);
        let auth = self.authenticate(&client, true).await?;
        ProjectDirectory::new(&client, &auth.session)
            .list(active_only)
            .await
    }
}
