//! Normalized record fragments.
//!
//! A [`NormalizedRecord`] is the canonical, typed view of one backend record: the
//! originating agent, an optional role, the classified parts and whatever metadata
//! the record carried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversational role of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Map a raw role label onto a role. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Self::User),
            "model" | "assistant" | "agent" | "ai" => Some(Self::Model),
            _ => None,
        }
    }
}

/// One classified part. Exactly one kind per part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedPart {
    Text {
        text: String,
    },
    Thought {
        text: String,
    },
    ToolCall {
        name: String,
        args: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    ToolResponse {
        name: String,
        payload: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl NormalizedPart {
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thought { .. } => "thought",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResponse { .. } => "tool_response",
        }
    }
}

/// Record-level metadata that is not part of the content parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

impl RecordMetadata {
    pub fn is_empty(&self) -> bool {
        self.invocation_id.is_none()
            && self.usage.is_none()
            && self.actions.is_none()
            && self.is_final.is_none()
    }

    /// Side-effecting actions worth surfacing on the timeline.
    ///
    /// Empty deltas and `false` flags are dropped; `None` when nothing remains.
    pub fn meaningful_actions(&self) -> Option<serde_json::Map<String, Value>> {
        let actions = self.actions.as_ref()?.as_object()?;
        let kept: serde_json::Map<String, Value> = actions
            .iter()
            .filter(|(key, value)| {
                let key = key.as_str();
                let relevant = matches!(
                    key,
                    "state_delta"
                        | "stateDelta"
                        | "artifact_delta"
                        | "artifactDelta"
                        | "transfer_to_agent"
                        | "transferToAgent"
                        | "escalate"
                );
                relevant && !is_blank(value)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if kept.is_empty() { None } else { Some(kept) }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// The canonical form of one backend record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub parts: Vec<NormalizedPart>,
    #[serde(default)]
    pub metadata: RecordMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NormalizedRecord {
    /// Whether this record was written on behalf of the human.
    ///
    /// An explicit role wins; without one the `user` author identity decides.
    pub fn is_from_user(&self) -> bool {
        match self.role {
            Some(role) => role == Role::User,
            None => self.agent == crate::record::USER_AUTHOR,
        }
    }

    /// Concatenated plain text of all text parts, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                NormalizedPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_text(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, NormalizedPart::Text { .. }))
    }
}
