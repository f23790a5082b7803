use crate::api::{ApiError, ApiResult, Backend};
use crate::types::{AssistantReply, ChatMessage, Conversation, Project, ProjectId, Timestamp};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Assistant message appended when a chat query fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Identifies one in-flight chat request: the project it was sent for and the
/// conversation generation it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnTicket {
    project_id: ProjectId,
    generation: u64,
}

impl TurnTicket {
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ChatState {
    #[default]
    Idle,
    AwaitingResponse(TurnTicket),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("message is empty")]
    EmptyPrompt,
    #[error("no project selected")]
    NoProject,
    #[error("still waiting for the previous reply")]
    AwaitingResponse,
    #[error("an earlier request for this project is still in flight")]
    AbandonedRequestInFlight,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// Nothing was appended and no request was made.
    Rejected(RejectReason),
    Replied,
    /// The query failed; the fallback reply was appended instead.
    Fallback(ApiError),
    /// The reply arrived after the conversation it belonged to was abandoned.
    Discarded { project_id: ProjectId },
}

/// A chat request that has been recorded but not yet sent.
///
/// Owns everything it needs, so it can be resolved while the controller goes
/// on handling other input. Dropping it (or the [`ResolvedTurn`] it turns
/// into) abandons the turn and frees its project for new sends.
pub struct PendingTurn {
    ticket: TurnTicket,
    prompt: String,
    backend: Arc<dyn Backend>,
    slot: Arc<()>,
}

impl PendingTurn {
    pub fn ticket(&self) -> &TurnTicket {
        &self.ticket
    }

    pub async fn resolve(self) -> ResolvedTurn {
        let result = self
            .backend
            .query(&self.prompt, &self.ticket.project_id)
            .await;
        ResolvedTurn {
            ticket: self.ticket,
            result,
            _slot: self.slot,
        }
    }
}

pub struct ResolvedTurn {
    ticket: TurnTicket,
    result: ApiResult<AssistantReply>,
    _slot: Arc<()>,
}

/// Idle/AwaitingResponse machine for the active project's conversation.
///
/// Each turn's liveness is tracked through a `Weak` to the slot its
/// `PendingTurn` owns; a dead slot means the turn was dropped unfinished.
pub struct ChatOrchestrator {
    backend: Arc<dyn Backend>,
    state: ChatState,
    live: Weak<()>,
    generation: u64,
    orphaned: Vec<(TurnTicket, Weak<()>)>,
}

impl ChatOrchestrator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: ChatState::Idle,
            live: Weak::new(),
            generation: 0,
            orphaned: Vec::new(),
        }
    }

    pub fn state(&self) -> ChatState {
        if self.turn_dropped() {
            ChatState::Idle
        } else {
            self.state.clone()
        }
    }

    pub fn is_awaiting_response(&self) -> bool {
        matches!(self.state, ChatState::AwaitingResponse(_)) && !self.turn_dropped()
    }

    /// Full turn: append the user message, query, append the reply.
    pub async fn send_message(
        &mut self,
        text: &str,
        project: Option<&Project>,
        conversation: &mut Conversation,
    ) -> TurnOutcome {
        match self.begin(text, project, conversation) {
            Ok(pending) => {
                let resolved = pending.resolve().await;
                self.complete(resolved, conversation)
            }
            Err(reason) => TurnOutcome::Rejected(reason),
        }
    }

    /// Appends the user message and moves to `AwaitingResponse`.
    pub fn begin(
        &mut self,
        text: &str,
        project: Option<&Project>,
        conversation: &mut Conversation,
    ) -> Result<PendingTurn, RejectReason> {
        self.release_dropped();

        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(RejectReason::EmptyPrompt);
        }
        if self.is_awaiting_response() {
            return Err(RejectReason::AwaitingResponse);
        }
        let Some(project) = project else {
            return Err(RejectReason::NoProject);
        };
        if self
            .orphaned
            .iter()
            .any(|(ticket, _)| ticket.project_id == project.id)
        {
            return Err(RejectReason::AbandonedRequestInFlight);
        }

        conversation.push(ChatMessage::user(prompt));
        let ticket = TurnTicket {
            project_id: project.id.clone(),
            generation: self.generation,
        };
        let slot = Arc::new(());
        self.live = Arc::downgrade(&slot);
        self.state = ChatState::AwaitingResponse(ticket.clone());
        debug!(project = %project.id, "chat turn started");

        Ok(PendingTurn {
            ticket,
            prompt: prompt.to_string(),
            backend: self.backend.clone(),
            slot,
        })
    }

    /// Applies a resolved turn if it still belongs to the live conversation.
    pub fn complete(&mut self, resolved: ResolvedTurn, conversation: &mut Conversation) -> TurnOutcome {
        let ResolvedTurn { ticket, result, .. } = resolved;

        if self.state != ChatState::AwaitingResponse(ticket.clone()) {
            self.orphaned.retain(|(orphan, _)| orphan != &ticket);
            info!(project = %ticket.project_id, "discarding reply for abandoned conversation");
            return TurnOutcome::Discarded {
                project_id: ticket.project_id,
            };
        }

        self.state = ChatState::Idle;
        self.live = Weak::new();
        match result {
            Ok(reply) => {
                conversation.push(ChatMessage::assistant(reply.content, reply.timestamp));
                TurnOutcome::Replied
            }
            Err(err) => {
                warn!(project = %ticket.project_id, error = %err, "chat query failed");
                conversation.push(ChatMessage::assistant(FALLBACK_REPLY, Timestamp::now()));
                TurnOutcome::Fallback(err)
            }
        }
    }

    /// Forgets the live conversation. Any in-flight turn becomes orphaned and
    /// its reply will be discarded.
    pub fn reset(&mut self) {
        self.release_dropped();
        if let ChatState::AwaitingResponse(ticket) = std::mem::take(&mut self.state) {
            debug!(project = %ticket.project_id, "orphaning in-flight chat turn");
            self.orphaned.push((ticket, std::mem::take(&mut self.live)));
        }
        self.live = Weak::new();
        self.generation += 1;
    }

    fn turn_dropped(&self) -> bool {
        matches!(self.state, ChatState::AwaitingResponse(_)) && self.live.strong_count() == 0
    }

    /// Forgets turns whose `PendingTurn` was dropped without completing.
    fn release_dropped(&mut self) {
        if self.turn_dropped() {
            debug!("releasing chat turn dropped before completion");
            self.state = ChatState::Idle;
            self.live = Weak::new();
        }
        self.orphaned.retain(|(_, slot)| slot.strong_count() > 0);
    }
}
