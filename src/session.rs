use crate::api::{ApiError, ApiResult, Backend};
use crate::registry::ProjectRegistry;
use crate::types::{Conversation, Project, SessionDraft, SessionReceipt, SessionRecord, Timestamp};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub const SWITCH_SAVE_QUESTION: &str =
    "You have unsaved changes. Would you like to save before switching projects?";
pub const CONVERT_QUESTION: &str =
    "Would you like to convert this temporary project to a permanent one?";
pub const PROJECT_NAME_QUESTION: &str = "Enter a name for the project:";

/// User-facing questions and alerts, supplied by whatever front end drives
/// the app.
#[async_trait]
pub trait Interaction: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;

    /// `None` means the user cancelled.
    async fn prompt_text(&self, question: &str, default: &str) -> Option<String>;

    /// Blocking alert for outcomes the user must see (save failed, ...).
    async fn notify(&self, message: &str);
}

#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    /// Clean conversation or no current project; no request was made.
    NothingToSave,
    Saved {
        receipt: SessionReceipt,
        converted: bool,
    },
}

/// How a project switch left the abandoned conversation. Every variant lets
/// the switch proceed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchDecision {
    Clean,
    Saved,
    Discarded,
    SaveFailed,
}

/// Decides when a save is needed and runs the save → convert flow.
pub struct SessionTracker {
    backend: Arc<dyn Backend>,
    interaction: Arc<dyn Interaction>,
}

impl SessionTracker {
    pub fn new(backend: Arc<dyn Backend>, interaction: Arc<dyn Interaction>) -> Self {
        Self {
            backend,
            interaction,
        }
    }

    pub fn interaction(&self) -> &Arc<dyn Interaction> {
        &self.interaction
    }

    /// Saves the conversation when it has unsaved changes, then offers
    /// conversion if the project is temporary.
    ///
    /// A failed save leaves the conversation dirty and is not retried.
    pub async fn save(
        &self,
        registry: &mut ProjectRegistry,
        project: Option<&mut Project>,
        conversation: &mut Conversation,
    ) -> ApiResult<SaveOutcome> {
        let Some(project) = project else {
            return Ok(SaveOutcome::NothingToSave);
        };
        if !conversation.has_unsaved_changes() {
            return Ok(SaveOutcome::NothingToSave);
        }

        let receipt = self.persist(project, conversation).await?;
        let converted = if project.is_temporary {
            self.offer_conversion(registry, project).await
        } else {
            false
        };

        Ok(SaveOutcome::Saved { receipt, converted })
    }

    /// Explicit conversion of the current project to a permanent one.
    pub async fn convert(
        &self,
        registry: &mut ProjectRegistry,
        project: &mut Project,
        conversation: &Conversation,
        new_name: &str,
    ) -> ApiResult<()> {
        if !project.is_temporary {
            return Err(ApiError::validation(format!(
                "project '{}' is already permanent",
                project.name
            )));
        }
        if conversation.has_unsaved_changes() {
            return Err(ApiError::validation(
                "save the conversation before converting the project",
            ));
        }
        // a project opened with saved sessions already has a prior save
        if !conversation.has_been_saved() && project.session_count == 0 {
            return Err(ApiError::validation(
                "save a session before converting the project",
            ));
        }
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(ApiError::validation("project name must not be empty"));
        }

        self.apply_conversion(registry, project, new_name).await
    }

    /// Resolves unsaved changes before the controller shows project
    /// selection.
    pub async fn request_project_switch(
        &self,
        registry: &mut ProjectRegistry,
        project: Option<&mut Project>,
        conversation: &mut Conversation,
    ) -> SwitchDecision {
        if !conversation.has_unsaved_changes() {
            return SwitchDecision::Clean;
        }

        if !self.interaction.confirm(SWITCH_SAVE_QUESTION).await {
            warn!(
                messages = conversation.len(),
                "discarding unsaved conversation on project switch"
            );
            return SwitchDecision::Discarded;
        }

        match self.save(registry, project, conversation).await {
            Ok(SaveOutcome::Saved { .. }) => SwitchDecision::Saved,
            Ok(SaveOutcome::NothingToSave) => {
                warn!(
                    messages = conversation.len(),
                    "no current project; discarding unsaved conversation"
                );
                SwitchDecision::Discarded
            }
            Err(err) => {
                warn!(
                    messages = conversation.len(),
                    error = %err,
                    "save failed; discarding unsaved conversation on project switch"
                );
                SwitchDecision::SaveFailed
            }
        }
    }

    pub async fn list_sessions(&self, project: &Project) -> ApiResult<Vec<SessionRecord>> {
        self.backend.list_sessions(&project.id).await
    }

    async fn persist(
        &self,
        project: &Project,
        conversation: &mut Conversation,
    ) -> ApiResult<SessionReceipt> {
        let draft = SessionDraft {
            project_id: project.id.clone(),
            messages: conversation.messages().to_vec(),
            saved_at: Timestamp::now(),
        };

        match self.backend.save_session(&draft).await {
            Ok(receipt) => {
                conversation.mark_saved();
                info!(
                    project = %project.id,
                    session = %receipt.session_id,
                    messages = draft.messages.len(),
                    "session saved"
                );
                self.interaction.notify("Session saved successfully!").await;
                Ok(receipt)
            }
            Err(err) => {
                warn!(project = %project.id, error = %err, "session save failed");
                self.interaction
                    .notify(&format!("Failed to save session: {err}"))
                    .await;
                Err(err)
            }
        }
    }

    async fn offer_conversion(&self, registry: &mut ProjectRegistry, project: &mut Project) -> bool {
        if !self.interaction.confirm(CONVERT_QUESTION).await {
            info!(project = %project.id, "conversion declined");
            return false;
        }

        let Some(name) = self
            .interaction
            .prompt_text(PROJECT_NAME_QUESTION, &project.name)
            .await
        else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return false;
        }

        self.apply_conversion(registry, project, name).await.is_ok()
    }

    async fn apply_conversion(
        &self,
        registry: &mut ProjectRegistry,
        project: &mut Project,
        new_name: &str,
    ) -> ApiResult<()> {
        let result = registry
            .convert_project(&project.id, new_name)
            .await
            .and_then(|converted| {
                if converted.id != project.id {
                    return Err(ApiError::Backend {
                        status: 200,
                        message: format!(
                            "conversion returned project {} instead of {}",
                            converted.id, project.id
                        ),
                    });
                }
                Ok(converted)
            });

        match result {
            Ok(converted) => {
                *project = converted;
                Ok(())
            }
            Err(err) => {
                warn!(project = %project.id, error = %err, "project conversion failed");
                self.interaction
                    .notify(&format!("Failed to convert project: {err}"))
                    .await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBackend, ScriptedInteraction};
    use crate::types::{ChatMessage, NewProject};

    struct Harness {
        backend: Arc<FakeBackend>,
        interaction: Arc<ScriptedInteraction>,
        registry: ProjectRegistry,
        tracker: SessionTracker,
    }

    fn harness() -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let interaction = Arc::new(ScriptedInteraction::new());
        Harness {
            registry: ProjectRegistry::new(backend.clone()),
            tracker: SessionTracker::new(backend.clone(), interaction.clone()),
            backend,
            interaction,
        }
    }

    fn dirty_conversation() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::user("hello"));
        conversation.push(ChatMessage::assistant("hi", Timestamp::new("T1")));
        conversation
    }

    #[tokio::test]
    async fn test_save_clean_conversation_is_noop() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Notes", false);
        let mut conversation = Conversation::new();

        let outcome = h
            .tracker
            .save(&mut h.registry, Some(&mut project), &mut conversation)
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::NothingToSave);
        assert!(h.backend.saved().is_empty());
        assert!(h.interaction.notices().is_empty());
    }

    #[tokio::test]
    async fn test_save_without_project_is_noop() {
        let mut h = harness();
        let mut conversation = dirty_conversation();

        let outcome = h
            .tracker
            .save(&mut h.registry, None, &mut conversation)
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::NothingToSave);
        assert!(conversation.has_unsaved_changes());
        assert!(h.backend.saved().is_empty());
    }

    #[tokio::test]
    async fn test_save_sends_messages_and_clears_flag() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Notes", false);
        let mut conversation = dirty_conversation();

        let outcome = h
            .tracker
            .save(&mut h.registry, Some(&mut project), &mut conversation)
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Saved { converted: false, .. }));
        assert!(!conversation.has_unsaved_changes());
        let saved = h.backend.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].project_id, project.id);
        assert_eq!(saved[0].messages, conversation.messages());
        // permanent projects are never offered conversion
        assert!(h.interaction.questions().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_flag_until_retry() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Notes", false);
        let mut conversation = dirty_conversation();
        h.backend.fail_next_save(ApiError::Backend {
            status: 500,
            message: "disk full".into(),
        });

        let err = h
            .tracker
            .save(&mut h.registry, Some(&mut project), &mut conversation)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Backend { status: 500, .. }));
        assert!(conversation.has_unsaved_changes());
        assert!(h.interaction.notices()[0].starts_with("Failed to save session"));

        h.tracker
            .save(&mut h.registry, Some(&mut project), &mut conversation)
            .await
            .unwrap();
        assert!(!conversation.has_unsaved_changes());
        assert_eq!(h.backend.saved().len(), 1);
    }

    #[tokio::test]
    async fn test_save_temporary_then_convert() {
        let mut h = harness();
        let mut project = h
            .registry
            .create_project(NewProject::temporary())
            .await
            .unwrap();
        let original_id = project.id.clone();
        let mut conversation = dirty_conversation();
        h.interaction
            .answer_confirm(true)
            .answer_prompt(Some("  Research  "));

        let outcome = h
            .tracker
            .save(&mut h.registry, Some(&mut project), &mut conversation)
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Saved { converted: true, .. }));
        assert_eq!(project.id, original_id);
        assert!(!project.is_temporary);
        assert_eq!(project.name, "Research");
        assert_eq!(h.interaction.questions(), vec![CONVERT_QUESTION, PROJECT_NAME_QUESTION]);
    }

    #[tokio::test]
    async fn test_declined_conversion_keeps_project_temporary() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Temp Session", true);
        let mut conversation = dirty_conversation();
        h.interaction.answer_confirm(false);

        let outcome = h
            .tracker
            .save(&mut h.registry, Some(&mut project), &mut conversation)
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Saved { converted: false, .. }));
        assert!(project.is_temporary);
        assert!(h.backend.converted().is_empty());
        assert!(!conversation.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_cancelled_or_blank_name_skips_conversion() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Temp Session", true);

        for answer in [None, Some("   ")] {
            let mut conversation = dirty_conversation();
            h.interaction.answer_confirm(true).answer_prompt(answer);
            h.tracker
                .save(&mut h.registry, Some(&mut project), &mut conversation)
                .await
                .unwrap();
        }

        assert!(project.is_temporary);
        assert!(h.backend.converted().is_empty());
    }

    #[tokio::test]
    async fn test_failed_conversion_keeps_save() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Temp Session", true);
        let mut conversation = dirty_conversation();
        h.interaction.answer_confirm(true).answer_prompt(Some("Kept"));
        h.backend.fail_next_convert(ApiError::Network("reset by peer".into()));

        let outcome = h
            .tracker
            .save(&mut h.registry, Some(&mut project), &mut conversation)
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Saved { converted: false, .. }));
        assert!(project.is_temporary);
        assert!(!conversation.has_unsaved_changes());
        assert!(
            h.interaction
                .notices()
                .iter()
                .any(|notice| notice.starts_with("Failed to convert project"))
        );
    }

    #[tokio::test]
    async fn test_explicit_convert_guards() {
        let mut h = harness();
        let mut permanent = h.backend.seed_project("Notes", false);
        let mut temp = h.backend.seed_project("Temp Session", true);

        let err = h
            .tracker
            .convert(&mut h.registry, &mut permanent, &Conversation::new(), "New")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = h
            .tracker
            .convert(&mut h.registry, &mut temp, &dirty_conversation(), "New")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let mut saved = dirty_conversation();
        saved.mark_saved();
        let err = h
            .tracker
            .convert(&mut h.registry, &mut temp, &saved, " ")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(h.backend.converted().is_empty());

        h.tracker
            .convert(&mut h.registry, &mut temp, &saved, "Scratch")
            .await
            .unwrap();
        assert!(!temp.is_temporary);
        assert_eq!(temp.name, "Scratch");
    }

    #[tokio::test]
    async fn test_convert_without_any_save_is_rejected() {
        let mut h = harness();
        let mut temp = h.backend.seed_project("Temp Session", true);

        let err = h
            .tracker
            .convert(&mut h.registry, &mut temp, &Conversation::new(), "Permanent")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert!(temp.is_temporary);
        assert!(h.backend.converted().is_empty());
        assert!(h.backend.saved().is_empty());
    }

    #[tokio::test]
    async fn test_convert_allowed_for_project_with_saved_sessions() {
        let mut h = harness();
        let mut temp = h.backend.seed_project("Temp Session", true);
        temp.session_count = 2;

        h.tracker
            .convert(&mut h.registry, &mut temp, &Conversation::new(), "Archive")
            .await
            .unwrap();

        assert!(!temp.is_temporary);
        assert_eq!(h.backend.converted(), vec![(temp.id.clone(), "Archive".to_string())]);
    }

    #[tokio::test]
    async fn test_switch_decisions() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Notes", false);

        let mut clean = Conversation::new();
        let decision = h
            .tracker
            .request_project_switch(&mut h.registry, Some(&mut project), &mut clean)
            .await;
        assert_eq!(decision, SwitchDecision::Clean);
        assert!(h.interaction.questions().is_empty());

        h.interaction.answer_confirm(false);
        let mut discarded = dirty_conversation();
        let decision = h
            .tracker
            .request_project_switch(&mut h.registry, Some(&mut project), &mut discarded)
            .await;
        assert_eq!(decision, SwitchDecision::Discarded);
        assert!(h.backend.saved().is_empty());

        h.interaction.answer_confirm(true);
        let mut saved = dirty_conversation();
        let decision = h
            .tracker
            .request_project_switch(&mut h.registry, Some(&mut project), &mut saved)
            .await;
        assert_eq!(decision, SwitchDecision::Saved);
        assert_eq!(h.backend.saved().len(), 1);
    }

    #[tokio::test]
    async fn test_switch_after_failed_save_still_proceeds() {
        let mut h = harness();
        let mut project = h.backend.seed_project("Notes", false);
        let mut conversation = dirty_conversation();
        h.interaction.answer_confirm(true);
        h.backend.fail_next_save(ApiError::Network("offline".into()));

        let decision = h
            .tracker
            .request_project_switch(&mut h.registry, Some(&mut project), &mut conversation)
            .await;

        assert_eq!(decision, SwitchDecision::SaveFailed);
        assert!(conversation.has_unsaved_changes());
    }
}
