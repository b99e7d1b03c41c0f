//! Batch reconstruction of a persisted conversation.
//!
//! A pure synchronous fold over the stored records: normalize, assemble messages
//! with the same accumulation rules the live path uses, segment thoughts, and
//! correlate every activity to its AI message.

use crate::activity::{action_activity, tool_activity};
use crate::correlate::Correlator;
use crate::normalize::Normalizer;
use crate::thought::ThoughtBuffer;
use crate::turn::TurnAssembler;
use agentstream_core::{Conversation, EventRecord, NormalizedPart, NormalizedRecord};
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct HistoryReconstructor {
    normalizer: Normalizer,
}

impl HistoryReconstructor {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn reconstruct(&self, records: &[EventRecord]) -> Conversation {
        self.reconstruct_normalized(
            records
                .iter()
                .filter_map(|r| self.normalizer.normalize_record(r)),
        )
    }

    /// Reconstruct from raw payload strings; malformed payloads are skipped.
    pub fn reconstruct_payloads<'a>(
        &self,
        payloads: impl IntoIterator<Item = &'a str>,
    ) -> Conversation {
        let records = payloads.into_iter().enumerate().filter_map(|(idx, payload)| {
            match self.normalizer.normalize_payload(payload) {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(index = idx, error = %e, "skipping malformed history record");
                    None
                }
            }
        });
        self.reconstruct_normalized(records)
    }

    pub fn reconstruct_normalized(
        &self,
        records: impl IntoIterator<Item = NormalizedRecord>,
    ) -> Conversation {
        let mut fold = Fold::default();
        for record in records {
            fold.apply(&record);
        }
        fold.finish()
    }
}

#[derive(Default)]
struct Fold {
    turns: TurnAssembler,
    correlator: Correlator,
    thoughts: ThoughtBuffer,
    thought_index: Option<usize>,
}

impl Fold {
    fn apply(&mut self, record: &NormalizedRecord) {
        let index = self.correlator.observe(record.role);
        self.turns.set_index(index);
        if index != self.thought_index {
            self.flush_thoughts();
        }
        let at = record.timestamp.unwrap_or_else(Utc::now);
        let agent = record.agent.as_str();
        let from_user = record.is_from_user();

        if from_user && record.has_text() {
            self.flush_thoughts();
            self.turns.human_text(&record.text(), at);
        }

        for part in &record.parts {
            match part {
                NormalizedPart::Text { text } => {
                    if !from_user {
                        self.flush_thoughts();
                        self.turns.ai_text(agent, text, at);
                    }
                }
                NormalizedPart::Thought { text } => {
                    if self.thoughts.agent().is_some_and(|a| a != agent) {
                        self.flush_thoughts();
                    }
                    self.thought_index = index;
                    self.thoughts.push(agent, text, at);
                }
                NormalizedPart::ToolCall { .. } | NormalizedPart::ToolResponse { .. } => {
                    self.flush_thoughts();
                    self.correlator.file(index, tool_activity(part, agent, at));
                }
            }
        }

        if let Some(activity) = action_activity(&record.metadata, agent, at) {
            self.flush_thoughts();
            self.correlator.file(index, [activity]);
        }
    }

    fn flush_thoughts(&mut self) {
        if self.thoughts.is_empty() {
            return;
        }
        let activities = self.thoughts.flush();
        self.correlator.file(self.thought_index, activities);
    }

    fn finish(mut self) -> Conversation {
        self.flush_thoughts();
        self.turns.close();
        let turns = self.turns;
        let correlation = self
            .correlator
            .assign(turns.messages(), |id| turns.reach_of(id));
        Conversation {
            messages: turns.into_messages(),
            timeline: correlation.timeline,
            unattached: correlation.unattached,
        }
    }
}
