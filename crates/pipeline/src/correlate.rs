//! Timeline correlation for batch reconstruction.
//!
//! Records are walked in order while a logical message index is maintained: it
//! advances once for every record whose role is `model`. User-role records (tool
//! responses, human text) keep the index of the model record before them. Activities
//! derived from a record are filed under the index current at that point.
//!
//! After all records are processed, each filled index is matched to the first AI
//! message, in order, whose reach (the last index its turn was open for) is not
//! smaller. AI turns that produced no activity are skipped, and activities of a turn
//! that produced no text move on to the next AI message. Anything that cannot be
//! matched goes to the last AI message; nothing is dropped.

use agentstream_core::{Message, Role, TimelineActivity};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct Correlator {
    current: Option<usize>,
    /// Filing order, used to keep merged activity lists chronological
    seq: u64,
    slots: BTreeMap<usize, Vec<(u64, TimelineActivity)>>,
    unfiled: Vec<(u64, TimelineActivity)>,
}

/// Result of matching activities to messages.
#[derive(Debug, Default)]
pub struct Correlation {
    pub timeline: HashMap<String, Vec<TimelineActivity>>,
    /// Only non-empty when there is no AI message at all
    pub unattached: Vec<TimelineActivity>,
    /// Activities that needed the last-message fallback
    pub fallback_count: usize,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one record's role and return the current logical index.
    pub fn observe(&mut self, role: Option<Role>) -> Option<usize> {
        match role {
            Some(Role::Model) => self.current = Some(self.current.map_or(0, |idx| idx + 1)),
            Some(Role::User) | None => {}
        }
        self.current
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// File activities under `index`; `None` leaves them for the fallback.
    pub fn file(
        &mut self,
        index: Option<usize>,
        activities: impl IntoIterator<Item = TimelineActivity>,
    ) {
        for activity in activities {
            self.seq += 1;
            let entry = (self.seq, activity);
            match index {
                Some(idx) => self.slots.entry(idx).or_default().push(entry),
                None => self.unfiled.push(entry),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.unfiled.is_empty()
    }

    /// Match filed activities to `messages`.
    ///
    /// `reach_of` returns the last logical index an AI message's turn was open for.
    pub fn assign(
        self,
        messages: &[Message],
        reach_of: impl Fn(&str) -> Option<usize>,
    ) -> Correlation {
        let ai: Vec<(&str, Option<usize>)> = messages
            .iter()
            .filter(|m| m.is_ai())
            .map(|m| (m.id.as_str(), reach_of(&m.id)))
            .collect();

        let Some(&(last_id, _)) = ai.last() else {
            let mut all: Vec<(u64, TimelineActivity)> =
                self.slots.into_values().flatten().chain(self.unfiled).collect();
            if !all.is_empty() {
                tracing::warn!(
                    activities = all.len(),
                    "no AI message to attach timeline activities to"
                );
            }
            all.sort_by_key(|(seq, _)| *seq);
            return Correlation {
                unattached: all.into_iter().map(|(_, a)| a).collect(),
                ..Correlation::default()
            };
        };

        let mut owned: HashMap<&str, Vec<(u64, TimelineActivity)>> = HashMap::new();
        let mut leftovers = self.unfiled;
        let mut cursor = 0usize;
        for (index, activities) in self.slots {
            while cursor < ai.len() && ai[cursor].1.is_none_or(|reach| reach < index) {
                cursor += 1;
            }
            match ai.get(cursor) {
                Some(&(id, _)) => owned.entry(id).or_default().extend(activities),
                None => leftovers.extend(activities),
            }
        }

        let fallback_count = leftovers.len();
        if fallback_count > 0 {
            tracing::warn!(
                activities = fallback_count,
                message_id = last_id,
                "timeline activities without a matching turn attached to last AI message"
            );
            owned.entry(last_id).or_default().extend(leftovers);
        }

        let timeline = owned
            .into_iter()
            .map(|(id, mut entries)| {
                entries.sort_by_key(|(seq, _)| *seq);
                (
                    id.to_string(),
                    entries.into_iter().map(|(_, a)| a).collect(),
                )
            })
            .collect();

        Correlation {
            timeline,
            unattached: Vec::new(),
            fallback_count,
        }
    }
}
