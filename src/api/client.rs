use crate::types::{
    AssistantReply, NewProject, Project, ProjectId, ProjectListing, SessionDraft, SessionReceipt,
    SessionRecord, Timestamp,
};
use async_trait::async_trait;

// ============================================
// Error Types
// ============================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Transport or connectivity failure; the request may never have arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Client-side precondition violated; no request was issued.
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-2xx reply, or a 2xx reply whose body could not be decoded.
    #[error("backend error {status}: {message}")]
    Backend { status: u16, message: String },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone, Debug, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: Timestamp,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

// ============================================
// Backend Contract
// ============================================

/// Operations the core needs from the project/session server.
///
/// Every mutating call changes server-side state; callers must not assume
/// success before the returned future resolves.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_projects(&self) -> ApiResult<ProjectListing>;

    /// `spec` is sent as given; name generation and validation happen in the
    /// registry.
    async fn create_project(&self, spec: &NewProject) -> ApiResult<Project>;

    async fn select_project(&self, id: &ProjectId) -> ApiResult<()>;

    async fn convert_project(&self, id: &ProjectId, name: &str) -> ApiResult<Project>;

    async fn save_session(&self, draft: &SessionDraft) -> ApiResult<SessionReceipt>;

    async fn list_sessions(&self, project_id: &ProjectId) -> ApiResult<Vec<SessionRecord>>;

    async fn query(&self, prompt: &str, project_id: &ProjectId) -> ApiResult<AssistantReply>;

    async fn health(&self) -> ApiResult<HealthStatus>;
}
