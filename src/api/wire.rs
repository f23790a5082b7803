//! Request and response bodies as they appear on the wire.
//!
//! The backend speaks snake_case (`is_temp`, `last_accessed`, `project_id`);
//! these types exist only to translate to and from the entity model in
//! [`crate::types`].

use crate::types::{
    AssistantReply, ChatMessage, NewProject, Project, ProjectId, ProjectListing, SessionDraft,
    SessionReceipt, SessionRecord, Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct WireProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub is_temp: bool,
    pub created_at: String,
    pub last_accessed: String,
    #[serde(default)]
    pub session_count: u32,
}

impl From<WireProject> for Project {
    fn from(wire: WireProject) -> Self {
        Project {
            id: ProjectId::new(wire.id),
            name: wire.name,
            path: wire.path.filter(|path| !path.is_empty()),
            is_temporary: wire.is_temp,
            created_at: Timestamp::new(wire.created_at),
            last_accessed_at: Timestamp::new(wire.last_accessed),
            session_count: wire.session_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectListResponse {
    #[serde(default)]
    pub projects: Vec<WireProject>,
    #[serde(default)]
    pub current_project_id: Option<String>,
}

impl From<ProjectListResponse> for ProjectListing {
    fn from(wire: ProjectListResponse) -> Self {
        ProjectListing {
            projects: wire.projects.into_iter().map(Project::from).collect(),
            current_project_id: wire.current_project_id.map(ProjectId::new),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateProjectRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'a str>,
    pub is_temp: bool,
}

impl<'a> From<&'a NewProject> for CreateProjectRequest<'a> {
    fn from(spec: &'a NewProject) -> Self {
        Self {
            name: &spec.name,
            path: spec.path.as_deref(),
            is_temp: spec.is_temporary,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectProjectResponse {
    pub success: bool,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConvertProjectRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SessionMetadata<'a> {
    pub saved_at: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SaveSessionRequest<'a> {
    pub project_id: &'a str,
    pub messages: &'a [ChatMessage],
    pub metadata: SessionMetadata<'a>,
}

impl<'a> From<&'a SessionDraft> for SaveSessionRequest<'a> {
    fn from(draft: &'a SessionDraft) -> Self {
        Self {
            project_id: draft.project_id.as_str(),
            messages: &draft.messages,
            metadata: SessionMetadata {
                saved_at: draft.saved_at.as_str(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveSessionResponse {
    pub session_id: String,
    pub project_id: String,
}

impl From<SaveSessionResponse> for SessionReceipt {
    fn from(wire: SaveSessionResponse) -> Self {
        SessionReceipt {
            session_id: wire.session_id,
            project_id: ProjectId::new(wire.project_id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireSession {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl From<WireSession> for SessionRecord {
    fn from(wire: WireSession) -> Self {
        SessionRecord {
            id: wire.id,
            project_id: ProjectId::new(wire.project_id),
            created_at: wire.created_at.map(Timestamp::new),
            messages: wire.messages,
            metadata: wire.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionListResponse {
    #[serde(default)]
    pub sessions: Vec<WireSession>,
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub prompt: &'a str,
    pub project_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub timestamp: String,
}

impl From<QueryResponse> for AssistantReply {
    fn from(wire: QueryResponse) -> Self {
        AssistantReply {
            content: wire.response,
            timestamp: Timestamp::new(wire.timestamp),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
