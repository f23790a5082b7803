use serde::{Deserialize, Serialize};
use std::fmt;
use time::{
    OffsetDateTime, PrimitiveDateTime,
    format_description::{FormatItem, well_known::Rfc3339},
    macros::format_description,
};

const TEMP_LABEL_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// Backend timestamps usually carry no offset.
const NAIVE_ISO_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

/// Server-assigned, opaque project identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ISO-8601 instant, kept as the text it arrived as.
///
/// Backend replies are stored verbatim so that a saved session echoes exactly
/// what the server reported. Use [`Timestamp::parse`] when a real instant is
/// needed (display, ordering).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn now() -> Self {
        Self::from_datetime(OffsetDateTime::now_utc())
    }

    pub fn from_datetime(datetime: OffsetDateTime) -> Self {
        // Rfc3339 only fails for years outside 0..=9999.
        let raw = datetime
            .format(&Rfc3339)
            .unwrap_or_else(|_| datetime.unix_timestamp().to_string());
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts RFC 3339 and offset-less ISO-8601 (taken as UTC).
    pub fn parse(&self) -> Option<OffsetDateTime> {
        if let Ok(datetime) = OffsetDateTime::parse(&self.0, &Rfc3339) {
            return Some(datetime);
        }
        PrimitiveDateTime::parse(&self.0, NAIVE_ISO_FORMAT)
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub path: Option<String>,
    pub is_temporary: bool,
    pub created_at: Timestamp,
    pub last_accessed_at: Timestamp,
    pub session_count: u32,
}

impl Project {
    pub(crate) fn touch(&mut self) {
        self.last_accessed_at = Timestamp::now();
    }
}

/// Request to create a project.
#[derive(Clone, Debug, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub path: Option<String>,
    pub is_temporary: bool,
}

impl NewProject {
    pub fn named(name: impl Into<String>, path: Option<String>) -> Self {
        Self {
            name: name.into(),
            path,
            is_temporary: false,
        }
    }

    /// The name is generated when the request is resolved by the registry.
    pub fn temporary() -> Self {
        Self {
            name: String::new(),
            path: None,
            is_temporary: true,
        }
    }
}

/// Human-readable label for a new temporary project, rendered in the offset
/// `at` carries.
pub fn temporary_project_name(at: OffsetDateTime) -> String {
    match at.format(TEMP_LABEL_FORMAT) {
        Ok(label) => format!("Temp Session {label}"),
        Err(_) => format!("Temp Session {}", at.unix_timestamp()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

/// Messages of the active project plus the unsaved-changes flag.
///
/// Only the crate mutates a conversation; callers observe it through the
/// controller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    has_unsaved_changes: bool,
    saved_once: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// True once a save succeeded since the project was entered.
    pub fn has_been_saved(&self) -> bool {
        self.saved_once
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.has_unsaved_changes = true;
    }

    pub(crate) fn mark_saved(&mut self) {
        self.has_unsaved_changes = false;
        self.saved_once = true;
    }

    pub(crate) fn reset(&mut self) {
        self.messages.clear();
        self.has_unsaved_changes = false;
        self.saved_once = false;
    }
}

/// Projects known to the backend plus the one it considers current.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectListing {
    pub projects: Vec<Project>,
    pub current_project_id: Option<ProjectId>,
}

/// Body of a session save.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionDraft {
    pub project_id: ProjectId,
    pub messages: Vec<ChatMessage>,
    pub saved_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionReceipt {
    pub session_id: String,
    pub project_id: ProjectId,
}

/// A persisted session as listed by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub project_id: ProjectId,
    pub created_at: Option<Timestamp>,
    pub messages: Vec<ChatMessage>,
    pub metadata: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub timestamp: Timestamp,
}
