//! Thought segmentation.
//!
//! Model reasoning arrives as free text where each sub-step opens a new paragraph
//! with a bold heading (`**Title**`). Every such block becomes its own thinking
//! activity so the timeline shows the steps separately.

use agentstream_core::{ActivityKind, THINKING_TITLE, TimelineActivity};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Blank-line paragraph separator.
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("valid paragraph regex"));

/// A bold marker opening a paragraph; captures the heading text.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*\*([^*\n]+?)\*\*").expect("valid heading regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

/// Split thought text into titled sections.
///
/// Whitespace-only input yields no sections. Input without any heading yields a
/// single untitled section holding the whole text.
pub fn segment(text: &str) -> Vec<ThoughtSection> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut sections: Vec<ThoughtSection> = Vec::new();
    for paragraph in PARAGRAPH_RE.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if let Some(caps) = HEADING_RE.captures(paragraph) {
            let title = caps[1].trim().to_string();
            let rest = paragraph[caps[0].len()..].trim();
            sections.push(ThoughtSection {
                title: Some(title).filter(|t| !t.is_empty()),
                content: rest.to_string(),
            });
            continue;
        }
        match sections.last_mut() {
            Some(section) => {
                if !section.content.is_empty() {
                    section.content.push_str("\n\n");
                }
                section.content.push_str(paragraph);
            }
            None => sections.push(ThoughtSection {
                title: None,
                content: paragraph.to_string(),
            }),
        }
    }

    if sections.is_empty() {
        sections.push(ThoughtSection {
            title: None,
            content: text.to_string(),
        });
    }
    sections
}

/// One thinking activity per section, all sharing the generic title.
pub fn thinking_activities(
    text: &str,
    agent: &str,
    occurred_at: DateTime<Utc>,
) -> Vec<TimelineActivity> {
    segment(text)
        .into_iter()
        .map(|section| {
            let payload = serde_json::json!({
                "heading": section.title,
                "content": section.content,
            });
            TimelineActivity::new(ActivityKind::Thinking, agent, THINKING_TITLE, occurred_at, payload)
        })
        .collect()
}

/// Thought text collected for the current turn, flushed into activities when the
/// turn moves on.
#[derive(Debug, Default)]
pub(crate) struct ThoughtBuffer {
    text: String,
    agent: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl ThoughtBuffer {
    /// Callers flush first when `agent` differs from [`Self::agent`].
    pub fn push(&mut self, agent: &str, text: &str, at: DateTime<Utc>) {
        self.agent.get_or_insert_with(|| agent.to_string());
        self.started_at.get_or_insert(at);
        self.text.push_str(text);
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    pub fn flush(&mut self) -> Vec<TimelineActivity> {
        let text = std::mem::take(&mut self.text);
        let agent = self.agent.take().unwrap_or_default();
        let at = self.started_at.take().unwrap_or_else(Utc::now);
        thinking_activities(&text, &agent, at)
    }
}
