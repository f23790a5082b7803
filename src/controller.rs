use crate::api::{ApiError, ApiResult, Backend};
use crate::chat::{ChatOrchestrator, PendingTurn, RejectReason, ResolvedTurn, TurnOutcome};
use crate::registry::ProjectRegistry;
use crate::session::{Interaction, SaveOutcome, SessionTracker, SwitchDecision};
use crate::types::{Conversation, NewProject, Project, ProjectId, SessionRecord};
use std::sync::Arc;
use time::UtcOffset;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    SelectingProject,
    Chatting,
}

/// Composes the registry, tracker and orchestrator and owns the current
/// project and conversation. Nothing else mutates either.
pub struct AppController {
    registry: ProjectRegistry,
    tracker: SessionTracker,
    chat: ChatOrchestrator,
    screen: Screen,
    current: Option<Project>,
    conversation: Conversation,
}

impl AppController {
    pub fn new(registry: ProjectRegistry, tracker: SessionTracker, chat: ChatOrchestrator) -> Self {
        Self {
            registry,
            tracker,
            chat,
            screen: Screen::SelectingProject,
            current: None,
            conversation: Conversation::new(),
        }
    }

    pub fn with_backend(backend: Arc<dyn Backend>, interaction: Arc<dyn Interaction>) -> Self {
        Self::new(
            ProjectRegistry::new(backend.clone()),
            SessionTracker::new(backend.clone(), interaction),
            ChatOrchestrator::new(backend),
        )
    }

    /// Offset used for local-time labels such as temporary project names.
    pub fn with_local_offset(mut self, offset: UtcOffset) -> Self {
        self.registry.set_local_offset(offset);
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current.as_ref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.chat.is_awaiting_response()
    }

    pub fn known_projects(&self) -> &[Project] {
        self.registry.known_projects()
    }

    /// Restores the server's current project if there is one, otherwise
    /// starts at project selection.
    pub async fn initialize(&mut self) -> Screen {
        match self.registry.list_projects().await {
            Ok(listing) => {
                let restored = listing.current_project_id.as_ref().and_then(|id| {
                    listing
                        .projects
                        .iter()
                        .find(|project| &project.id == id)
                        .cloned()
                });
                match restored {
                    Some(project) => self.enter_project(project),
                    None => self.screen = Screen::SelectingProject,
                }
            }
            Err(err) => {
                warn!(error = %err, "could not load projects; starting with an empty list");
                self.screen = Screen::SelectingProject;
            }
        }
        self.screen
    }

    /// Fresh project list for the selection screen. Failures are logged and
    /// yield an empty list.
    pub async fn available_projects(&mut self) -> Vec<Project> {
        match self.registry.list_projects().await {
            Ok(listing) => listing.projects,
            Err(err) => {
                warn!(error = %err, "could not load projects");
                Vec::new()
            }
        }
    }

    pub async fn open_project(&mut self, id: &ProjectId) -> ApiResult<Project> {
        self.ensure_selecting()?;
        let Some(mut project) = self.registry.find(id).cloned() else {
            return Err(ApiError::validation(format!("unknown project {id}")));
        };

        if let Err(err) = self.registry.select_project(id).await {
            self.report("Failed to select project", &err).await;
            return Err(err);
        }

        project.touch();
        self.enter_project(project.clone());
        Ok(project)
    }

    /// Creates the project, selects it server-side, then switches to it.
    pub async fn create_project(&mut self, spec: NewProject) -> ApiResult<Project> {
        self.ensure_selecting()?;
        let project = match self.registry.create_project(spec).await {
            Ok(project) => project,
            Err(err) => {
                self.report("Failed to create project", &err).await;
                return Err(err);
            }
        };

        if let Err(err) = self.registry.select_project(&project.id).await {
            self.report("Failed to select project", &err).await;
            return Err(err);
        }

        self.enter_project(project.clone());
        Ok(project)
    }

    /// Leaves the chat for project selection, settling unsaved changes first.
    pub async fn change_project(&mut self) -> SwitchDecision {
        if self.screen == Screen::SelectingProject {
            return SwitchDecision::Clean;
        }

        let decision = self
            .tracker
            .request_project_switch(
                &mut self.registry,
                self.current.as_mut(),
                &mut self.conversation,
            )
            .await;
        info!(?decision, "leaving chat for project selection");
        self.screen = Screen::SelectingProject;
        decision
    }

    /// Back to the chat without switching, when a project is still current.
    pub fn cancel_project_switch(&mut self) -> Screen {
        if self.current.is_some() {
            self.screen = Screen::Chatting;
        }
        self.screen
    }

    pub async fn send_message(&mut self, text: &str) -> TurnOutcome {
        match self.begin_turn(text) {
            Ok(pending) => {
                let resolved = pending.resolve().await;
                self.finish_turn(resolved)
            }
            Err(reason) => TurnOutcome::Rejected(reason),
        }
    }

    /// First half of [`send_message`](Self::send_message); the returned turn
    /// can be resolved while other input is handled.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, RejectReason> {
        if self.screen != Screen::Chatting {
            return Err(RejectReason::NoProject);
        }
        self.chat
            .begin(text, self.current.as_ref(), &mut self.conversation)
    }

    pub fn finish_turn(&mut self, resolved: ResolvedTurn) -> TurnOutcome {
        self.chat.complete(resolved, &mut self.conversation)
    }

    pub async fn save_session(&mut self) -> ApiResult<SaveOutcome> {
        self.tracker
            .save(
                &mut self.registry,
                self.current.as_mut(),
                &mut self.conversation,
            )
            .await
    }

    pub async fn convert_project(&mut self, new_name: &str) -> ApiResult<()> {
        let Some(project) = self.current.as_mut() else {
            return Err(ApiError::validation("no project selected"));
        };
        self.tracker
            .convert(&mut self.registry, project, &self.conversation, new_name)
            .await
    }

    pub async fn list_sessions(&self) -> ApiResult<Vec<SessionRecord>> {
        let Some(project) = self.current.as_ref() else {
            return Err(ApiError::validation("no project selected"));
        };
        self.tracker.list_sessions(project).await
    }

    fn ensure_selecting(&self) -> ApiResult<()> {
        if self.screen == Screen::Chatting {
            return Err(ApiError::validation(
                "change project before opening another one",
            ));
        }
        Ok(())
    }

    fn enter_project(&mut self, project: Project) {
        info!(id = %project.id, name = %project.name, "entering project");
        self.chat.reset();
        self.conversation.reset();
        self.current = Some(project);
        self.screen = Screen::Chatting;
    }

    async fn report(&self, what: &str, err: &ApiError) {
        warn!(error = %err, "{what}");
        self.tracker
            .interaction()
            .notify(&format!("{what}: {err}"))
            .await;
    }
}
