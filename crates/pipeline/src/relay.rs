//! Server-side relay: forwards normalized fragments as a standardized event stream.
//!
//! Every part passes through a per-stream [`DedupCache`], so a part the backend
//! repeats reaches the downstream consumer once.

use crate::dedup::DedupCache;
use crate::normalize::Normalizer;
use agentstream_core::{NormalizedPart, NormalizedRecord, RecordMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    Text {
        agent: String,
        text: String,
    },
    Thought {
        agent: String,
        text: String,
    },
    ToolCall {
        agent: String,
        name: String,
        args: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    ToolResponse {
        agent: String,
        name: String,
        response: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Metadata {
        agent: String,
        metadata: RecordMetadata,
    },
    Done,
}

impl RelayEvent {
    fn from_part(agent: &str, part: &NormalizedPart) -> Self {
        let agent = agent.to_string();
        match part.clone() {
            NormalizedPart::Text { text } => Self::Text { agent, text },
            NormalizedPart::Thought { text } => Self::Thought { agent, text },
            NormalizedPart::ToolCall { name, args, id } => Self::ToolCall {
                agent,
                name,
                args,
                id,
            },
            NormalizedPart::ToolResponse { name, payload, id } => Self::ToolResponse {
                agent,
                name,
                response: payload,
                id,
            },
        }
    }
}

/// Output framing of the relayed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayFormat {
    #[default]
    Sse,
    Ndjson,
}

impl RelayFormat {
    pub fn encode(self, event: &RelayEvent) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(event)?;
        Ok(match self {
            Self::Sse => format!("data: {json}\n\n"),
            Self::Ndjson => format!("{json}\n"),
        })
    }
}

impl fmt::Display for RelayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sse => "sse",
            Self::Ndjson => "ndjson",
        })
    }
}

impl FromStr for RelayFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sse" => Ok(Self::Sse),
            "ndjson" | "jsonl" => Ok(Self::Ndjson),
            other => Err(format!("unknown relay format '{other}' (expected sse or ndjson)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub frames: u64,
    pub records: u64,
    pub parts_emitted: u64,
    pub duplicates: u64,
    pub parse_failures: u64,
}

/// One relay per upstream stream.
#[derive(Debug)]
pub struct Relay {
    normalizer: Normalizer,
    dedup: DedupCache,
    emit_done: bool,
    stats: RelayStats,
}

impl Relay {
    pub fn new(normalizer: Normalizer, emit_done: bool) -> Self {
        Self {
            normalizer,
            dedup: DedupCache::new(),
            emit_done,
            stats: RelayStats::default(),
        }
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    pub fn relay_payload(&mut self, payload: &str) -> Vec<RelayEvent> {
        self.stats.frames += 1;
        match self.normalizer.normalize_payload(payload) {
            Ok(Some(record)) => self.relay_record(&record),
            Ok(None) => Vec::new(),
            Err(e) => {
                self.stats.parse_failures += 1;
                tracing::debug!(error = %e, "relay skipping unparseable frame");
                Vec::new()
            }
        }
    }

    pub fn relay_record(&mut self, record: &NormalizedRecord) -> Vec<RelayEvent> {
        self.stats.records += 1;
        let mut out = Vec::new();
        for part in &record.parts {
            if !self.dedup.admit(part) {
                self.stats.duplicates += 1;
                tracing::debug!(kind = part.kind_label(), "duplicate part suppressed");
                continue;
            }
            self.stats.parts_emitted += 1;
            out.push(RelayEvent::from_part(&record.agent, part));
        }
        if !record.metadata.is_empty() {
            out.push(RelayEvent::Metadata {
                agent: record.agent.clone(),
                metadata: record.metadata.clone(),
            });
        }
        out
    }

    /// Closing events for the relayed stream.
    pub fn finish(&mut self) -> Vec<RelayEvent> {
        if self.emit_done {
            vec![RelayEvent::Done]
        } else {
            Vec::new()
        }
    }
}
