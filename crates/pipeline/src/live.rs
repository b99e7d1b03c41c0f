//! Client-side live reconstruction.
//!
//! Consumes decoded payloads of one stream in arrival order and produces
//! [`StreamUpdate`]s: message snapshots as text accumulates and timeline activities
//! keyed by the id of the AI message their record belongs to. One instance per stream.

use crate::activity::{action_activity, tool_activity};
use crate::normalize::Normalizer;
use crate::thought::ThoughtBuffer;
use crate::turn::{MessageChange, TurnAssembler};
use agentstream_core::{Message, NormalizedPart, NormalizedRecord, Role, TimelineActivity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One update delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamUpdate {
    /// New or extended message text. `finalized` marks the last snapshot.
    Message { message: Message, finalized: bool },
    Activity {
        message_id: String,
        activity: TimelineActivity,
    },
}

/// Counters for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub frames: u64,
    pub records: u64,
    pub empty_records: u64,
    pub parse_failures: u64,
    pub messages_finalized: u64,
    pub activities: u64,
}

#[derive(Debug)]
pub struct LiveReconstructor {
    normalizer: Normalizer,
    turns: TurnAssembler,
    thoughts: ThoughtBuffer,
    /// Message the buffered thoughts belong to
    thought_target: Option<String>,
    stats: StreamStats,
}

impl LiveReconstructor {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            turns: TurnAssembler::default(),
            thoughts: ThoughtBuffer::default(),
            thought_target: None,
            stats: StreamStats::default(),
        }
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Messages reconstructed so far, in order.
    pub fn messages(&self) -> &[Message] {
        self.turns.messages()
    }

    /// Apply one decoded frame. Malformed frames are logged and skipped.
    pub fn apply_payload(&mut self, payload: &str) -> Vec<StreamUpdate> {
        self.stats.frames += 1;
        match self.normalizer.normalize_payload(payload) {
            Ok(Some(record)) => self.apply_record(&record),
            Ok(None) => {
                self.stats.empty_records += 1;
                Vec::new()
            }
            Err(e) => {
                self.stats.parse_failures += 1;
                tracing::warn!(error = %e, bytes = payload.len(), "skipping unparseable frame");
                Vec::new()
            }
        }
    }

    pub fn apply_record(&mut self, record: &NormalizedRecord) -> Vec<StreamUpdate> {
        self.stats.records += 1;
        let mut out = Vec::new();
        let at = record.timestamp.unwrap_or_else(Utc::now);
        let agent = record.agent.as_str();
        let from_user = record.is_from_user();

        if from_user && record.has_text() {
            self.flush_thoughts(&mut out);
            let changes = self.turns.human_text(&record.text(), at);
            self.push_changes(&mut out, changes);
        }

        // Every activity of this record belongs to one message. A model record that
        // finds the last turn terminated starts the next one; other roles stay with it.
        let mut owner = match record.role {
            Some(Role::Model) => self.turns.active_id(),
            Some(Role::User) | None => self.turns.current_id(),
        }
        .map(str::to_string);

        for part in &record.parts {
            match part {
                NormalizedPart::Text { text } => {
                    if from_user {
                        continue;
                    }
                    self.flush_thoughts(&mut out);
                    let changes = self.turns.ai_text(agent, text, at);
                    self.push_changes(&mut out, changes);
                    if owner.is_none() {
                        owner = self.turns.current_id().map(str::to_string);
                    }
                }
                NormalizedPart::Thought { text } => {
                    if self.thoughts.agent().is_some_and(|a| a != agent) {
                        self.flush_thoughts(&mut out);
                    }
                    let message_id = self.owner_id(&mut owner, &mut out, agent, at);
                    if self.thought_target.as_deref() != Some(message_id.as_str()) {
                        self.flush_thoughts(&mut out);
                        self.thought_target = Some(message_id);
                    }
                    self.thoughts.push(agent, text, at);
                }
                NormalizedPart::ToolCall { .. } | NormalizedPart::ToolResponse { .. } => {
                    self.flush_thoughts(&mut out);
                    if let Some(activity) = tool_activity(part, agent, at) {
                        self.emit_activity(&mut out, &mut owner, activity, agent, at);
                    }
                }
            }
        }

        if let Some(activity) = action_activity(&record.metadata, agent, at) {
            self.flush_thoughts(&mut out);
            self.emit_activity(&mut out, &mut owner, activity, agent, at);
        }
        out
    }

    /// End of stream: flush pending thoughts and finalize the open turn.
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        let mut out = Vec::new();
        self.flush_thoughts(&mut out);
        let closed = self.turns.close();
        self.push_changes(&mut out, closed);
        out
    }

    /// Message id for the current record's activities, opening a turn on first use.
    fn owner_id(
        &mut self,
        owner: &mut Option<String>,
        out: &mut Vec<StreamUpdate>,
        agent: &str,
        at: DateTime<Utc>,
    ) -> String {
        if let Some(id) = owner.as_deref() {
            self.turns.mark_activity(id);
            return id.to_string();
        }
        let (id, changes) = self.turns.ai_activity(agent, at);
        self.push_changes(out, changes);
        *owner = Some(id.clone());
        id
    }

    fn emit_activity(
        &mut self,
        out: &mut Vec<StreamUpdate>,
        owner: &mut Option<String>,
        activity: TimelineActivity,
        agent: &str,
        at: DateTime<Utc>,
    ) {
        let message_id = self.owner_id(owner, out, agent, at);
        self.stats.activities += 1;
        out.push(StreamUpdate::Activity {
            message_id,
            activity,
        });
    }

    fn flush_thoughts(&mut self, out: &mut Vec<StreamUpdate>) {
        if self.thoughts.is_empty() {
            return;
        }
        let Some(message_id) = self.thought_target.clone() else {
            return;
        };
        for activity in self.thoughts.flush() {
            self.stats.activities += 1;
            out.push(StreamUpdate::Activity {
                message_id: message_id.clone(),
                activity,
            });
        }
    }

    fn push_changes(
        &mut self,
        out: &mut Vec<StreamUpdate>,
        changes: impl IntoIterator<Item = MessageChange>,
    ) {
        for change in changes {
            if change.finalized {
                self.stats.messages_finalized += 1;
            }
            out.push(StreamUpdate::Message {
                message: change.message,
                finalized: change.finalized,
            });
        }
    }
}
