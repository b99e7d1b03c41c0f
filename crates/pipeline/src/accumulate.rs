//! Incremental text accumulation with echo-based termination.
//!
//! The backend streams an AI turn as text chunks and marks completion by re-sending
//! the whole accumulated text once. No reliable end flag exists, so an incoming
//! chunk equal to everything accumulated so far is the termination signal.
//!
//! A genuine continuation that happens to repeat the accumulated text verbatim is
//! indistinguishable from the echo and will end the turn early.

/// Result of feeding one text chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    /// Text grew; carries the trimmed snapshot.
    Updated(String),
    /// Echo received; carries the final trimmed text.
    Terminated(String),
    /// The turn already terminated; the chunk was dropped.
    Ignored,
}

/// Accumulation state for one AI turn.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    text: String,
    terminated: bool,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> TextOutcome {
        if self.terminated {
            return TextOutcome::Ignored;
        }
        if !self.text.is_empty() && chunk == self.text {
            self.terminated = true;
            return TextOutcome::Terminated(self.snapshot());
        }
        match chunk.strip_prefix(self.text.as_str()) {
            // A cumulative snapshot of the turn so far: only the new tail is appended.
            Some(tail) if !self.text.is_empty() => self.text.push_str(tail),
            _ => self.text.push_str(chunk),
        }
        TextOutcome::Updated(self.snapshot())
    }

    /// Trimmed view of the accumulated text.
    pub fn snapshot(&self) -> String {
        self.text.trim().to_string()
    }

    pub fn raw(&self) -> &str {
        &self.text
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Start a new turn.
    pub fn reset(&mut self) {
        self.text.clear();
        self.terminated = false;
    }
}
