use super::client::{ApiError, ApiResult, Backend, HealthStatus};
use super::wire::{
    ConvertProjectRequest, CreateProjectRequest, ErrorResponse, HealthResponse,
    ProjectListResponse, QueryRequest, QueryResponse, SaveSessionRequest, SaveSessionResponse,
    SelectProjectResponse, SessionListResponse, WireProject,
};
use crate::config::Config;
use crate::types::{
    AssistantReply, NewProject, Project, ProjectId, ProjectListing, SessionDraft, SessionReceipt,
    SessionRecord, Timestamp,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// reqwest client for the project/session server.
///
/// The cookie store keeps the server session (current project, temporary
/// projects) across calls, so one `HttpBackend` should live as long as the
/// app.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &Config) -> ApiResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/api/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ApiError::validation(format!("backend url cannot be a base: {}", self.base_url))
            })?;
            path.pop_if_empty().push("api").extend(segments);
        }
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.error)
                .unwrap_or_else(|_| body.trim().to_string());
            return Err(ApiError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|err| ApiError::Backend {
            status: status.as_u16(),
            message: format!("invalid response body: {err}"),
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_projects(&self) -> ApiResult<ProjectListing> {
        let url = self.endpoint(&["projects"])?;
        debug!(%url, "listing projects");
        let listing: ProjectListResponse = self.execute(self.client.get(url)).await?;
        Ok(listing.into())
    }

    async fn create_project(&self, spec: &NewProject) -> ApiResult<Project> {
        let url = self.endpoint(&["projects"])?;
        debug!(%url, temporary = spec.is_temporary, "creating project");
        let project: WireProject = self
            .execute(self.client.post(url).json(&CreateProjectRequest::from(spec)))
            .await?;
        Ok(project.into())
    }

    async fn select_project(&self, id: &ProjectId) -> ApiResult<()> {
        let url = self.endpoint(&["projects", id.as_str(), "select"])?;
        debug!(%url, "selecting project");
        let reply: SelectProjectResponse = self.execute(self.client.post(url)).await?;
        if !reply.success {
            return Err(ApiError::Backend {
                status: 200,
                message: format!(
                    "server refused to select project {}",
                    reply.project_id.as_deref().unwrap_or(id.as_str())
                ),
            });
        }
        Ok(())
    }

    async fn convert_project(&self, id: &ProjectId, name: &str) -> ApiResult<Project> {
        let url = self.endpoint(&["projects", id.as_str(), "convert"])?;
        debug!(%url, "converting project");
        let project: WireProject = self
            .execute(self.client.post(url).json(&ConvertProjectRequest { name }))
            .await?;
        Ok(project.into())
    }

    async fn save_session(&self, draft: &SessionDraft) -> ApiResult<SessionReceipt> {
        let url = self.endpoint(&["sessions"])?;
        debug!(%url, messages = draft.messages.len(), "saving session");
        let receipt: SaveSessionResponse = self
            .execute(self.client.post(url).json(&SaveSessionRequest::from(draft)))
            .await?;
        Ok(receipt.into())
    }

    async fn list_sessions(&self, project_id: &ProjectId) -> ApiResult<Vec<SessionRecord>> {
        let url = self.endpoint(&["sessions", project_id.as_str()])?;
        debug!(%url, "listing sessions");
        let listing: SessionListResponse = self.execute(self.client.get(url)).await?;
        Ok(listing
            .sessions
            .into_iter()
            .map(SessionRecord::from)
            .collect())
    }

    async fn query(&self, prompt: &str, project_id: &ProjectId) -> ApiResult<AssistantReply> {
        let url = self.endpoint(&["claude", "query"])?;
        debug!(%url, %project_id, "querying assistant");
        let reply: QueryResponse = self
            .execute(self.client.post(url).json(&QueryRequest {
                prompt,
                project_id: project_id.as_str(),
            }))
            .await?;
        Ok(reply.into())
    }

    async fn health(&self) -> ApiResult<HealthStatus> {
        let url = self.endpoint(&["health"])?;
        let reply: HealthResponse = self.execute(self.client.get(url)).await?;
        Ok(HealthStatus {
            status: reply.status,
            timestamp: Timestamp::new(reply.timestamp),
        })
    }
}
