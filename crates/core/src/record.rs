//! Backend event record wire schema.
//!
//! One [`EventRecord`] is one JSON object emitted by the agent backend, either as a
//! live stream frame or as an entry of a persisted session history. Parsing is
//! permissive: unknown fields are ignored and both snake_case and camelCase keys are
//! accepted for the fields the backend has shipped under either spelling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author value the backend uses for records written on behalf of the human.
pub const USER_AUTHOR: &str = "user";

/// A single backend-emitted record, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Originating agent identity (`"user"` for human-authored records).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Top-level role; some payload shapes only carry `content.role`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<RecordContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Value>,
    #[serde(
        default,
        alias = "usageMetadata",
        skip_serializing_if = "Option::is_none"
    )]
    pub usage_metadata: Option<Value>,
    #[serde(
        default,
        alias = "invocationId",
        skip_serializing_if = "Option::is_none"
    )]
    pub invocation_id: Option<String>,
    #[serde(
        default,
        rename = "isFinal",
        alias = "is_final",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_final: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    /// Seconds since the Unix epoch, fractional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl EventRecord {
    /// Role label, preferring the top-level field over `content.role`.
    pub fn role_label(&self) -> Option<&str> {
        self.role
            .as_deref()
            .or_else(|| self.content.as_ref().and_then(|c| c.role.as_deref()))
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub fn parts(&self) -> &[RawPart] {
        self.content
            .as_ref()
            .and_then(|c| c.parts.as_deref())
            .unwrap_or_default()
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        let ts = self.timestamp.filter(|t| t.is_finite() && *t >= 0.0)?;
        let secs = ts.trunc() as i64;
        let nanos = ((ts - ts.trunc()) * 1_000_000_000.0) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<RawPart>>,
}

/// One entry of `content.parts[]` as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(
        default,
        alias = "functionCall",
        skip_serializing_if = "Option::is_none"
    )]
    pub function_call: Option<RawFunctionCall>,
    #[serde(
        default,
        alias = "functionResponse",
        skip_serializing_if = "Option::is_none"
    )]
    pub function_response: Option<RawFunctionResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "arguments", skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "result", skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}
