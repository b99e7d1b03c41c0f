//! Fragment normalization: one raw payload in, one [`NormalizedRecord`] out.

use agentstream_core::{
    EventRecord, NormalizedPart, NormalizedRecord, RawPart, RecordMetadata, Role,
};
use serde_json::Value;

/// Fallback name for tool calls/responses that arrive without one.
const UNKNOWN_TOOL: &str = "unknown";

/// Agent name used when neither the record nor the caller supplies one.
pub const DEFAULT_AGENT: &str = "assistant";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NormalizeError {
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event payload is not a JSON object")]
    NotAnObject,
}

/// Turns backend payloads into normalized records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_agent: String,
}

impl Normalizer {
    /// `default_agent` is used for records that carry no `author`.
    pub fn new(default_agent: impl Into<String>) -> Self {
        Self {
            default_agent: default_agent.into(),
        }
    }

    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    /// Parse and normalize one payload.
    ///
    /// `Ok(None)` means the record was well-formed but carried nothing: no
    /// classifiable part and no metadata.
    pub fn normalize_payload(&self, payload: &str) -> Result<Option<NormalizedRecord>, NormalizeError> {
        let value: Value = serde_json::from_str(payload)?;
        if !value.is_object() {
            return Err(NormalizeError::NotAnObject);
        }
        let record: EventRecord = serde_json::from_value(value)?;
        Ok(self.normalize_record(&record))
    }

    pub fn normalize_record(&self, record: &EventRecord) -> Option<NormalizedRecord> {
        let parts: Vec<NormalizedPart> = record.parts().iter().filter_map(classify_part).collect();
        let metadata = RecordMetadata {
            invocation_id: record.invocation_id.clone(),
            usage: record.usage_metadata.clone().filter(|v| !v.is_null()),
            actions: record.actions.clone().filter(|v| !v.is_null()),
            is_final: record.is_final,
        };
        if parts.is_empty() && metadata.is_empty() {
            return None;
        }

        let agent = record
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.default_agent)
            .to_string();

        Some(NormalizedRecord {
            agent,
            role: record.role_label().and_then(Role::from_label),
            parts,
            metadata,
            timestamp: record.occurred_at(),
        })
    }
}

/// Classify one wire part.
///
/// Tool calls and responses are recognised by their sub-objects regardless of the
/// thought flag; the flag only separates thought text from plain text.
pub fn classify_part(part: &RawPart) -> Option<NormalizedPart> {
    if let Some(call) = &part.function_call {
        return Some(NormalizedPart::ToolCall {
            name: call.name.clone().unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
            args: call.args.clone().unwrap_or(Value::Null),
            id: call.id.clone(),
        });
    }
    if let Some(response) = &part.function_response {
        return Some(NormalizedPart::ToolResponse {
            name: response
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
            payload: response.response.clone().unwrap_or(Value::Null),
            id: response.id.clone(),
        });
    }
    let text = part.text.clone()?;
    if part.thought == Some(true) {
        Some(NormalizedPart::Thought { text })
    } else {
        Some(NormalizedPart::Text { text })
    }
}
