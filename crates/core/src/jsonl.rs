//! Persisted event record history: JSONL serialization/deserialization
//!
//! A history file holds one backend [`EventRecord`] per line, in emission order:
//! ```jsonl
//! {"author":"user","content":{"role":"user","parts":[{"text":"Plan a trip"}]}}
//! {"author":"planner","content":{"role":"model","parts":[{"text":"Sure","thought":true}]}}
//! ```
//!
//! A JSON array of records is accepted as well. Reading is lenient: a line that is
//! not a valid record is reported in [`RecordLog::skipped`] and the rest of the file
//! is still loaded. Only I/O failures are fatal.

use crate::record::EventRecord;
use std::io::{self, BufRead, Write};

/// Error types for JSONL operations
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
}

/// A line (or array entry) that could not be read as a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number, or 1-based array position for JSON array input
    pub line: usize,
    pub reason: String,
}

/// Records loaded from a history file.
#[derive(Debug, Clone, Default)]
pub struct RecordLog {
    pub records: Vec<EventRecord>,
    pub skipped: Vec<SkippedLine>,
}

/// Write records as JSONL, one record per line.
pub fn write_records<W: Write>(records: &[EventRecord], mut writer: W) -> Result<(), JsonlError> {
    for (i, record) in records.iter().enumerate() {
        serde_json::to_writer(&mut writer, record).map_err(|e| JsonlError::Json {
            line: i + 1,
            source: e,
        })?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Write records as a JSONL string.
pub fn to_jsonl_string(records: &[EventRecord]) -> Result<String, JsonlError> {
    let mut buf = Vec::new();
    write_records(records, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Read records from a JSONL reader. Blank lines are ignored.
pub fn read_records<R: BufRead>(reader: R) -> Result<RecordLog, JsonlError> {
    let mut log = RecordLog::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<EventRecord>(trimmed) {
            Ok(record) => log.records.push(record),
            Err(e) => log.skipped.push(SkippedLine {
                line: idx + 1,
                reason: e.to_string(),
            }),
        }
    }
    Ok(log)
}

/// Read records from a string holding either JSONL or a JSON array.
pub fn from_history_str(s: &str) -> Result<RecordLog, JsonlError> {
    if s.trim_start().starts_with('[') {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(s).map_err(|e| JsonlError::Json { line: 1, source: e })?;
        let mut log = RecordLog::default();
        for (idx, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<EventRecord>(value) {
                Ok(record) => log.records.push(record),
                Err(e) => log.skipped.push(SkippedLine {
                    line: idx + 1,
                    reason: e.to_string(),
                }),
            }
        }
        return Ok(log);
    }
    read_records(io::BufReader::new(s.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RawPart, RecordContent};

    fn record(author: &str, role: &str, text: &str) -> EventRecord {
        EventRecord {
            author: Some(author.to_string()),
            content: Some(RecordContent {
                role: Some(role.to_string()),
                parts: Some(vec![RawPart {
                    text: Some(text.to_string()),
                    ..RawPart::default()
                }]),
            }),
            ..EventRecord::default()
        }
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let records = vec![
            record("user", "user", "Plan a trip"),
            record("planner", "model", "Sure"),
        ];
        let jsonl = to_jsonl_string(&records).unwrap();
        assert_eq!(jsonl.lines().count(), 2);

        let log = from_history_str(&jsonl).unwrap();
        assert!(log.skipped.is_empty());
        assert_eq!(log.records, records);
    }

    #[test]
    fn test_bad_lines_are_skipped_not_fatal() {
        let input = concat!(
            "{\"author\":\"user\",\"content\":{\"parts\":[{\"text\":\"hi\"}]}}\n",
            "\n",
            "{not json\n",
            "{\"author\":\"planner\",\"content\":{\"parts\":[{\"text\":\"hello\"}]}}\n",
        );
        let log = from_history_str(input).unwrap();
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.skipped.len(), 1);
        assert_eq!(log.skipped[0].line, 3);
    }

    #[test]
    fn test_json_array_input() {
        let input = r#"[
            {"author":"user","content":{"parts":[{"text":"hi"}]}},
            {"author":"planner","content":{"parts":"not a list"}},
            {"author":"planner","content":{"parts":[{"text":"hello"}]}}
        ]"#;
        let log = from_history_str(input).unwrap();
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.skipped[0].line, 2);
    }

    #[test]
    fn test_malformed_array_is_an_error() {
        let err = from_history_str("[{\"author\":").unwrap_err();
        assert!(matches!(err, JsonlError::Json { line: 1, .. }));
    }
}
