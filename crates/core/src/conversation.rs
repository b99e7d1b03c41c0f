use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Generic title shared by all thinking activities so they group visually.
pub const THINKING_TITLE: &str = "Thinking";

/// Who produced a reconstructed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Human,
    Ai,
}

/// A reconstructed conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub kind: MessageKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Originating agent (AI messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Message {
    pub fn human(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            kind: MessageKind::Human,
            text: text.into(),
            created_at,
            agent: None,
        }
    }

    /// Empty AI message, text is filled in as chunks arrive.
    pub fn ai(agent: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            kind: MessageKind::Ai,
            text: String::new(),
            created_at,
            agent: Some(agent.into()),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.kind == MessageKind::Ai
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Thinking,
    ToolCall,
    ToolResponse,
    Action,
}

/// A displayable side-channel event attached to one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineActivity {
    pub id: String,
    pub kind: ActivityKind,
    pub agent: String,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl TimelineActivity {
    pub fn new(
        kind: ActivityKind,
        agent: impl Into<String>,
        title: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: new_id(),
            kind,
            agent: agent.into(),
            title: title.into(),
            occurred_at,
            payload,
        }
    }
}

/// A fully reconstructed conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
    /// Activities keyed by the id of the AI message that owns them
    #[serde(default)]
    pub timeline: HashMap<String, Vec<TimelineActivity>>,
    /// Activities that could not be attached because no AI message exists
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unattached: Vec<TimelineActivity>,
}

impl Conversation {
    pub fn ai_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_ai())
    }

    pub fn activities_for(&self, message_id: &str) -> &[TimelineActivity] {
        self.timeline
            .get(message_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn activity_count(&self) -> usize {
        self.timeline.values().map(Vec::len).sum::<usize>() + self.unattached.len()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
