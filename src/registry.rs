use crate::api::{ApiError, ApiResult, Backend};
use crate::types::{NewProject, Project, ProjectId, ProjectListing, temporary_project_name};
use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

/// Client-side view of the project registry.
///
/// Holds the last listing the server returned. It never decides which project
/// is current for the app; that belongs to the controller.
pub struct ProjectRegistry {
    backend: Arc<dyn Backend>,
    known: Vec<Project>,
    server_current: Option<ProjectId>,
    local_offset: UtcOffset,
}

impl ProjectRegistry {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            known: Vec::new(),
            server_current: None,
            local_offset: UtcOffset::UTC,
        }
    }

    /// Offset used for generated temporary project names.
    pub fn set_local_offset(&mut self, offset: UtcOffset) {
        self.local_offset = offset;
    }

    pub async fn list_projects(&mut self) -> ApiResult<ProjectListing> {
        let listing = self.backend.list_projects().await?;
        debug!(
            count = listing.projects.len(),
            current = ?listing.current_project_id,
            "project listing refreshed"
        );
        self.known = listing.projects.clone();
        self.server_current = listing.current_project_id.clone();
        Ok(listing)
    }

    /// Temporary requests get a generated name and lose any path; named
    /// requests must carry a non-blank name.
    pub async fn create_project(&mut self, spec: NewProject) -> ApiResult<Project> {
        let spec = if spec.is_temporary {
            let now = OffsetDateTime::now_utc().to_offset(self.local_offset);
            NewProject {
                name: temporary_project_name(now),
                path: None,
                is_temporary: true,
            }
        } else {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(ApiError::validation("project name must not be empty"));
            }
            NewProject {
                name: name.to_string(),
                path: spec
                    .path
                    .map(|path| path.trim().to_string())
                    .filter(|path| !path.is_empty()),
                is_temporary: false,
            }
        };

        let project = self.backend.create_project(&spec).await?;
        info!(id = %project.id, name = %project.name, temporary = project.is_temporary, "project created");
        self.remember(project.clone());
        Ok(project)
    }

    pub async fn select_project(&mut self, id: &ProjectId) -> ApiResult<()> {
        self.backend.select_project(id).await?;
        self.server_current = Some(id.clone());
        Ok(())
    }

    /// Callers must only pass temporary projects.
    pub async fn convert_project(&mut self, id: &ProjectId, new_name: &str) -> ApiResult<Project> {
        let project = self.backend.convert_project(id, new_name).await?;
        info!(id = %project.id, name = %project.name, "project converted");
        self.remember(project.clone());
        Ok(project)
    }

    pub fn find(&self, id: &ProjectId) -> Option<&Project> {
        self.known.iter().find(|project| &project.id == id)
    }

    pub fn known_projects(&self) -> &[Project] {
        &self.known
    }

    pub fn server_current(&self) -> Option<&ProjectId> {
        self.server_current.as_ref()
    }

    fn remember(&mut self, project: Project) {
        match self.known.iter_mut().find(|known| known.id == project.id) {
            Some(slot) => *slot = project,
            None => self.known.insert(0, project),
        }
    }
}
