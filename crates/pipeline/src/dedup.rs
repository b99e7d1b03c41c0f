//! Per-stream content-addressed deduplication of parts.

use agentstream_core::NormalizedPart;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Stable key for a part: SHA-256 over its canonical JSON.
///
/// `serde_json::Value` objects serialize with sorted keys, so two parts that differ
/// only in the field order of their tool arguments map to the same key.
pub fn part_key(part: &NormalizedPart) -> String {
    let canonical = serde_json::to_value(part)
        .map(|value| value.to_string())
        .unwrap_or_else(|_| format!("{part:?}"));
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Set of part keys already forwarded on one stream. Never shared across streams.
#[derive(Debug, Default)]
pub struct DedupCache {
    seen: HashSet<String>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn remember(&mut self, key: String) {
        self.seen.insert(key);
    }

    /// Record `part` and report whether it was new.
    pub fn admit(&mut self, part: &NormalizedPart) -> bool {
        self.seen.insert(part_key(part))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
