//! Record builders for tests.

use crate::record::{EventRecord, RawFunctionCall, RawFunctionResponse, RawPart, RecordContent};
use serde_json::Value;

/// Record with the given author, role and parts.
pub fn record(author: &str, role: Option<&str>, parts: Vec<RawPart>) -> EventRecord {
    EventRecord {
        author: Some(author.to_string()),
        content: Some(RecordContent {
            role: role.map(str::to_string),
            parts: Some(parts),
        }),
        ..EventRecord::default()
    }
}

pub fn text_part(text: &str) -> RawPart {
    RawPart {
        text: Some(text.to_string()),
        ..RawPart::default()
    }
}

pub fn thought_part(text: &str) -> RawPart {
    RawPart {
        text: Some(text.to_string()),
        thought: Some(true),
        ..RawPart::default()
    }
}

/// Function call part; pair it with a [`response_part`] carrying the same `id`.
pub fn call_part(id: &str, name: &str, args: Value) -> RawPart {
    RawPart {
        function_call: Some(RawFunctionCall {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            args: Some(args),
        }),
        ..RawPart::default()
    }
}

pub fn response_part(id: &str, name: &str, response: Value) -> RawPart {
    RawPart {
        function_response: Some(RawFunctionResponse {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            response: Some(response),
        }),
        ..RawPart::default()
    }
}

/// Model-role text record from `agent`.
pub fn model_text(agent: &str, text: &str) -> EventRecord {
    record(agent, Some("model"), vec![text_part(text)])
}

/// Model-role thought record from `agent`.
pub fn model_thought(agent: &str, text: &str) -> EventRecord {
    record(agent, Some("model"), vec![thought_part(text)])
}

/// Model-role tool call record from `agent`.
pub fn tool_call(agent: &str, id: &str, name: &str, args: Value) -> EventRecord {
    record(agent, Some("model"), vec![call_part(id, name, args)])
}

/// User-role tool response record, as the backend writes them after a tool ran.
pub fn tool_response(agent: &str, id: &str, name: &str, response: Value) -> EventRecord {
    record(agent, Some("user"), vec![response_part(id, name, response)])
}

/// Human text record.
pub fn user_text(text: &str) -> EventRecord {
    record(crate::record::USER_AUTHOR, Some("user"), vec![text_part(text)])
}
