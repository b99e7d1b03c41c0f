//! Message assembly shared by live and historical reconstruction.
//!
//! An AI turn opens on the first text chunk (or, in live mode, the first activity)
//! after the previous turn terminated or a human message arrived. Its message is
//! created when the first text chunk lands and is extended through the
//! [`Accumulator`] until the echo terminates it or the turn is closed from outside.
//!
//! Batch reconstruction also tells the assembler the logical index of each record;
//! the index current when a turn ends is kept as that message's reach.

use crate::accumulate::{Accumulator, TextOutcome};
use agentstream_core::{Message, MessageKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A message snapshot produced by a state change.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MessageChange {
    pub message: Message,
    pub finalized: bool,
}

#[derive(Debug)]
struct OpenTurn {
    /// Pre-allocated message id, used for activities before any text exists
    id: String,
    agent: String,
    opened_at: DateTime<Utc>,
    acc: Accumulator,
    /// Position in `messages` once the message exists
    slot: Option<usize>,
    has_activity: bool,
}

#[derive(Debug, Default)]
pub(crate) struct TurnAssembler {
    messages: Vec<Message>,
    open: Option<OpenTurn>,
    index: Option<usize>,
    reaches: HashMap<String, Option<usize>>,
}

impl TurnAssembler {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Logical index of the record being applied.
    pub fn set_index(&mut self, index: Option<usize>) {
        self.index = index;
    }

    /// Last logical index the AI message `id` was open for.
    pub fn reach_of(&self, id: &str) -> Option<usize> {
        self.reaches.get(id).copied().flatten()
    }

    /// Id of the turn still accepting text, if any.
    pub fn active_id(&self) -> Option<&str> {
        self.open
            .as_ref()
            .filter(|t| !t.acc.is_terminated())
            .map(|t| t.id.as_str())
    }

    /// Id of the most recently opened turn, terminated or not.
    pub fn current_id(&self) -> Option<&str> {
        self.open.as_ref().map(|t| t.id.as_str())
    }

    /// Record that an activity was keyed to `id`, so an activity-only turn still
    /// yields a message when it closes.
    pub fn mark_activity(&mut self, id: &str) {
        if let Some(turn) = self.open.as_mut().filter(|t| t.id == id) {
            turn.has_activity = true;
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Feed one AI text chunk.
    pub fn ai_text(
        &mut self,
        agent: &str,
        chunk: &str,
        at: DateTime<Utc>,
    ) -> Vec<MessageChange> {
        let mut changes = self.ensure_open(agent, at);
        let Some(turn) = self.open.as_mut() else {
            return changes;
        };
        let (text, finalized) = match turn.acc.push(chunk) {
            TextOutcome::Updated(text) => (text, false),
            TextOutcome::Terminated(text) => (text, true),
            TextOutcome::Ignored => return changes,
        };

        let idx = match turn.slot {
            Some(idx) => idx,
            None => {
                self.messages.push(Message {
                    id: turn.id.clone(),
                    kind: MessageKind::Ai,
                    text: String::new(),
                    created_at: turn.opened_at,
                    agent: Some(turn.agent.clone()),
                });
                let idx = self.messages.len() - 1;
                turn.slot = Some(idx);
                idx
            }
        };
        self.messages[idx].text = text;
        if finalized {
            self.reaches.insert(turn.id.clone(), self.index);
        }
        changes.push(MessageChange {
            message: self.messages[idx].clone(),
            finalized,
        });
        changes
    }

    /// Id of the AI message an activity belongs to, opening a turn if needed.
    pub fn ai_activity(
        &mut self,
        agent: &str,
        at: DateTime<Utc>,
    ) -> (String, Vec<MessageChange>) {
        let changes = self.ensure_open(agent, at);
        match self.open.as_mut() {
            Some(turn) => {
                turn.has_activity = true;
                (turn.id.clone(), changes)
            }
            None => (String::new(), changes),
        }
    }

    /// Close the AI turn in progress and append a human message.
    pub fn human_text(&mut self, text: &str, at: DateTime<Utc>) -> Vec<MessageChange> {
        let mut changes: Vec<MessageChange> = self.close().into_iter().collect();
        let text = text.trim();
        if text.is_empty() {
            return changes;
        }
        let message = Message::human(text, at);
        self.messages.push(message.clone());
        changes.push(MessageChange {
            message,
            finalized: true,
        });
        changes
    }

    /// Finalize the open turn from outside (stream end, human message).
    ///
    /// A turn that already terminated by echo produces nothing. A turn that only
    /// carried activities yields an empty message so those activities have an owner.
    pub fn close(&mut self) -> Option<MessageChange> {
        let turn = self.open.take()?;
        if turn.acc.is_terminated() {
            return None;
        }
        self.reaches.insert(turn.id.clone(), self.index);
        match turn.slot {
            Some(idx) => {
                self.messages[idx].text = turn.acc.snapshot();
                Some(MessageChange {
                    message: self.messages[idx].clone(),
                    finalized: true,
                })
            }
            None if turn.has_activity => {
                let message = Message {
                    id: turn.id.clone(),
                    kind: MessageKind::Ai,
                    text: String::new(),
                    created_at: turn.opened_at,
                    agent: Some(turn.agent),
                };
                self.messages.push(message.clone());
                Some(MessageChange {
                    message,
                    finalized: true,
                })
            }
            None => None,
        }
    }

    fn ensure_open(&mut self, agent: &str, at: DateTime<Utc>) -> Vec<MessageChange> {
        if self.open.as_ref().is_some_and(|t| !t.acc.is_terminated()) {
            return Vec::new();
        }
        let closed = self.close();
        let draft = Message::ai(agent, at);
        self.open = Some(OpenTurn {
            id: draft.id,
            agent: agent.to_string(),
            opened_at: at,
            acc: Accumulator::new(),
            slot: None,
            has_activity: false,
        });
        closed.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(assembler: &TurnAssembler) -> Vec<(MessageKind, String)> {
        assembler
            .messages()
            .iter()
            .map(|m| (m.kind, m.text.clone()))
            .collect()
    }

    #[test]
    fn test_echo_finalizes_and_next_text_opens_new_turn() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        turns.ai_text("a", "Hello", now);
        turns.ai_text("a", " world", now);
        let changes = turns.ai_text("a", "Hello world", now);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].finalized);
        assert_eq!(changes[0].message.text, "Hello world");

        turns.ai_text("b", "Second", now);
        assert_eq!(
            texts(&turns),
            vec![
                (MessageKind::Ai, "Hello world".to_string()),
                (MessageKind::Ai, "Second".to_string()),
            ]
        );
    }

    #[test]
    fn test_reach_is_the_index_at_turn_end() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        turns.set_index(Some(0));
        turns.ai_text("a", "one", now);
        turns.set_index(Some(1));
        turns.ai_text("a", "one", now);
        turns.set_index(Some(2));
        turns.ai_text("a", "two", now);
        turns.set_index(Some(4));
        turns.close();

        let ids: Vec<String> = turns.messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(turns.reach_of(&ids[0]), Some(1));
        assert_eq!(turns.reach_of(&ids[1]), Some(4));
    }

    #[test]
    fn test_active_id_ends_with_echo() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        assert!(turns.active_id().is_none());
        turns.ai_text("a", "done", now);
        let id = turns.active_id().map(str::to_string);
        assert!(id.is_some());
        turns.ai_text("a", "done", now);
        assert!(turns.active_id().is_none());
        assert_eq!(turns.current_id().map(str::to_string), id);
    }

    #[test]
    fn test_human_text_closes_open_turn() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        turns.ai_text("a", "partial ", now);
        let changes = turns.human_text("  next question ", now);
        assert_eq!(changes.len(), 2);
        assert!(changes[0].finalized);
        assert_eq!(changes[0].message.text, "partial");
        assert_eq!(changes[1].message.kind, MessageKind::Human);
        assert_eq!(changes[1].message.text, "next question");
    }

    #[test]
    fn test_activity_only_turn_gets_empty_message_on_close() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        let (id, changes) = turns.ai_activity("a", now);
        assert!(changes.is_empty());
        let closed = turns.close().unwrap();
        assert_eq!(closed.message.id, id);
        assert!(closed.message.text.is_empty());
        assert!(closed.finalized);
    }

    #[test]
    fn test_activity_then_text_share_message_id() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        let (id, _) = turns.ai_activity("a", now);
        let changes = turns.ai_text("a", "answer", now);
        assert_eq!(changes[0].message.id, id);
    }

    #[test]
    fn test_terminated_turn_closes_silently() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        turns.ai_text("a", "x", now);
        turns.ai_text("a", "x", now);
        assert!(turns.close().is_none());
        assert_eq!(turns.messages().len(), 1);
    }

    #[test]
    fn test_empty_turn_is_finalized_by_close() {
        let mut turns = TurnAssembler::default();
        let now = Utc::now();
        let changes = turns.ai_text("a", "", now);
        assert!(!changes[0].finalized);
        let closed = turns.close().unwrap();
        assert!(closed.finalized);
        assert_eq!(closed.message.text, "");
    }
}
