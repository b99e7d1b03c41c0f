//! Timeline activities for tool parts and record-level side effects.

use agentstream_core::{ActivityKind, NormalizedPart, RecordMetadata, TimelineActivity};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

/// Activity for a tool call or tool response part. Text and thought parts yield `None`.
pub fn tool_activity(
    part: &NormalizedPart,
    agent: &str,
    occurred_at: DateTime<Utc>,
) -> Option<TimelineActivity> {
    match part {
        NormalizedPart::ToolCall { name, args, id } => Some(TimelineActivity::new(
            ActivityKind::ToolCall,
            agent,
            format!("Function Call: {name}"),
            occurred_at,
            json!({ "name": name, "args": args, "id": id }),
        )),
        NormalizedPart::ToolResponse { name, payload, id } => Some(TimelineActivity::new(
            ActivityKind::ToolResponse,
            agent,
            format!("Function Response: {name}"),
            occurred_at,
            json!({ "name": name, "response": payload, "id": id }),
        )),
        NormalizedPart::Text { .. } | NormalizedPart::Thought { .. } => None,
    }
}

/// Activity for the meaningful actions a record carried, if any.
pub fn action_activity(
    metadata: &RecordMetadata,
    agent: &str,
    occurred_at: DateTime<Utc>,
) -> Option<TimelineActivity> {
    let actions = metadata.meaningful_actions()?;
    let transfer = actions
        .get("transfer_to_agent")
        .or_else(|| actions.get("transferToAgent"))
        .and_then(Value::as_str);
    let title = match transfer {
        Some(target) => format!("Transfer to {target}"),
        None if actions.contains_key("escalate") => "Escalate".to_string(),
        None => "State Update".to_string(),
    };
    Some(TimelineActivity::new(
        ActivityKind::Action,
        agent,
        title,
        occurred_at,
        Value::Object(actions),
    ))
}
