//! Wire framing shared by the stream decoder and the config file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire framing of a backend stream. Selected by the caller, never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Newline-delimited JSON, optionally `data:`-prefixed.
    #[serde(alias = "jsonl")]
    Ndjson,
    /// Server-Sent Events.
    #[default]
    Sse,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ndjson => write!(f, "ndjson"),
            Self::Sse => write!(f, "sse"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ndjson" | "jsonl" => Ok(Self::Ndjson),
            "sse" => Ok(Self::Sse),
            other => Err(format!("unknown framing `{other}` (expected ndjson or sse)")),
        }
    }
}
