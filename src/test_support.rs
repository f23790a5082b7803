//! In-memory collaborators for unit tests.

use crate::api::{ApiError, ApiResult, Backend, HealthStatus};
use crate::session::Interaction;
use crate::types::{
    AssistantReply, NewProject, Project, ProjectId, ProjectListing, SessionDraft, SessionReceipt,
    SessionRecord, Timestamp,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    projects: Vec<Project>,
    current: Option<ProjectId>,
    next_id: u32,
    listing_failure: Option<ApiError>,
    select_failures: VecDeque<ApiError>,
    convert_failures: VecDeque<ApiError>,
    save_failures: VecDeque<ApiError>,
    replies: VecDeque<ApiResult<AssistantReply>>,
    created_specs: Vec<NewProject>,
    selected: Vec<ProjectId>,
    converted: Vec<(ProjectId, String)>,
    saved: Vec<SessionDraft>,
    prompts: Vec<(String, ProjectId)>,
}

/// Backend double that behaves like the reference server and records calls.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_project(&self, name: &str, is_temporary: bool) -> Project {
        let mut state = self.state.lock().unwrap();
        let project = build_project(&mut state, name, None, is_temporary);
        state.projects.push(project.clone());
        project
    }

    pub fn set_server_current(&self, id: Option<ProjectId>) {
        self.state.lock().unwrap().current = id;
    }

    pub fn fail_listing(&self, err: ApiError) {
        self.state.lock().unwrap().listing_failure = Some(err);
    }

    pub fn fail_next_select(&self, err: ApiError) {
        self.state.lock().unwrap().select_failures.push_back(err);
    }

    pub fn fail_next_convert(&self, err: ApiError) {
        self.state.lock().unwrap().convert_failures.push_back(err);
    }

    pub fn fail_next_save(&self, err: ApiError) {
        self.state.lock().unwrap().save_failures.push_back(err);
    }

    pub fn push_reply(&self, reply: ApiResult<AssistantReply>) {
        self.state.lock().unwrap().replies.push_back(reply);
    }

    pub fn created_specs(&self) -> Vec<NewProject> {
        self.state.lock().unwrap().created_specs.clone()
    }

    pub fn selected(&self) -> Vec<ProjectId> {
        self.state.lock().unwrap().selected.clone()
    }

    pub fn converted(&self) -> Vec<(ProjectId, String)> {
        self.state.lock().unwrap().converted.clone()
    }

    pub fn saved(&self) -> Vec<SessionDraft> {
        self.state.lock().unwrap().saved.clone()
    }

    pub fn prompts(&self) -> Vec<(String, ProjectId)> {
        self.state.lock().unwrap().prompts.clone()
    }
}

fn build_project(state: &mut FakeState, name: &str, path: Option<String>, temp: bool) -> Project {
    state.next_id += 1;
    let now = Timestamp::now();
    Project {
        id: ProjectId::new(format!("project-{}", state.next_id)),
        name: name.to_string(),
        path,
        is_temporary: temp,
        created_at: now.clone(),
        last_accessed_at: now,
        session_count: 0,
    }
}

fn not_found(id: &ProjectId) -> ApiError {
    ApiError::Backend {
        status: 404,
        message: format!("Project not found: {id}"),
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list_projects(&self) -> ApiResult<ProjectListing> {
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.listing_failure {
            return Err(err.clone());
        }
        Ok(ProjectListing {
            projects: state.projects.clone(),
            current_project_id: state.current.clone(),
        })
    }

    async fn create_project(&self, spec: &NewProject) -> ApiResult<Project> {
        let mut state = self.state.lock().unwrap();
        state.created_specs.push(spec.clone());
        let project = build_project(&mut state, &spec.name, spec.path.clone(), spec.is_temporary);
        state.projects.push(project.clone());
        state.current = Some(project.id.clone());
        Ok(project)
    }

    async fn select_project(&self, id: &ProjectId) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.select_failures.pop_front() {
            return Err(err);
        }
        if !state.projects.iter().any(|project| &project.id == id) {
            return Err(not_found(id));
        }
        state.selected.push(id.clone());
        state.current = Some(id.clone());
        Ok(())
    }

    async fn convert_project(&self, id: &ProjectId, name: &str) -> ApiResult<Project> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.convert_failures.pop_front() {
            return Err(err);
        }
        state.converted.push((id.clone(), name.to_string()));
        let Some(project) = state.projects.iter_mut().find(|project| &project.id == id) else {
            return Err(not_found(id));
        };
        if !project.is_temporary {
            return Err(ApiError::Backend {
                status: 400,
                message: "Temporary project not found".to_string(),
            });
        }
        project.is_temporary = false;
        project.name = name.to_string();
        Ok(project.clone())
    }

    async fn save_session(&self, draft: &SessionDraft) -> ApiResult<SessionReceipt> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.save_failures.pop_front() {
            return Err(err);
        }
        state.saved.push(draft.clone());
        let session_id = format!("session-{}", state.saved.len());
        if let Some(project) = state
            .projects
            .iter_mut()
            .find(|project| project.id == draft.project_id)
        {
            project.session_count += 1;
        }
        Ok(SessionReceipt {
            session_id,
            project_id: draft.project_id.clone(),
        })
    }

    async fn list_sessions(&self, project_id: &ProjectId) -> ApiResult<Vec<SessionRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .saved
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, draft)| &draft.project_id == project_id)
            .map(|(index, draft)| SessionRecord {
                id: format!("session-{}", index + 1),
                project_id: draft.project_id.clone(),
                created_at: Some(draft.saved_at.clone()),
                messages: draft.messages.clone(),
                metadata: serde_json::json!({ "saved_at": draft.saved_at.as_str() }),
            })
            .collect())
    }

    async fn query(&self, prompt: &str, project_id: &ProjectId) -> ApiResult<AssistantReply> {
        let mut state = self.state.lock().unwrap();
        state.prompts.push((prompt.to_string(), project_id.clone()));
        state.replies.pop_front().unwrap_or_else(|| {
            Ok(AssistantReply {
                content: format!("Mock response to: {prompt}"),
                timestamp: Timestamp::now(),
            })
        })
    }

    async fn health(&self) -> ApiResult<HealthStatus> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            timestamp: Timestamp::now(),
        })
    }
}

#[derive(Default)]
struct Script {
    confirms: VecDeque<bool>,
    texts: VecDeque<Option<String>>,
    questions: Vec<String>,
    notices: Vec<String>,
}

/// Interaction double answering from a script; unscripted confirms decline
/// and unscripted prompts cancel.
#[derive(Default)]
pub struct ScriptedInteraction {
    script: Mutex<Script>,
}

impl ScriptedInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_confirm(&self, answer: bool) -> &Self {
        self.script.lock().unwrap().confirms.push_back(answer);
        self
    }

    pub fn answer_prompt(&self, answer: Option<&str>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .texts
            .push_back(answer.map(str::to_string));
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.script.lock().unwrap().questions.clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.script.lock().unwrap().notices.clone()
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn confirm(&self, question: &str) -> bool {
        let mut script = self.script.lock().unwrap();
        script.questions.push(question.to_string());
        script.confirms.pop_front().unwrap_or(false)
    }

    async fn prompt_text(&self, question: &str, _default: &str) -> Option<String> {
        let mut script = self.script.lock().unwrap();
        script.questions.push(question.to_string());
        script.texts.pop_front().flatten()
    }

    async fn notify(&self, message: &str) {
        self.script.lock().unwrap().notices.push(message.to_string());
    }
}
