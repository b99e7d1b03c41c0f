//! Frame decoding for the two backend wire framings.
//!
//! The decoder is fed raw byte chunks in arrival order and yields complete event
//! payloads (one serialized record each). Chunk boundaries are irrelevant: bytes are
//! buffered until a full line is available, so a payload or even a multi-byte UTF-8
//! sequence may be split across any number of chunks.

pub use agentstream_core::Framing;

const DATA_PREFIX: &str = "data:";

/// Incremental decoder for one stream.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buf: Vec<u8>,
    /// SSE `data:` lines accumulated since the last blank line
    data_lines: Vec<String>,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buf: Vec::new(),
            data_lines: Vec::new(),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Whether bytes or SSE data lines are waiting for a delimiter.
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty() || !self.data_lines.is_empty()
    }

    /// Feed one chunk and return every payload it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(line) = self.take_line() {
            if let Some(payload) = self.decode_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush whatever is buffered at end of stream.
    ///
    /// Best effort: the remainder may be a truncated frame, in which case the
    /// returned payload will fail to parse downstream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let rest = String::from_utf8_lossy(&rest);
        let rest = rest.strip_suffix('\r').unwrap_or(&rest);
        match self.framing {
            Framing::Ndjson => ndjson_payload(rest),
            Framing::Sse => {
                if !rest.is_empty() {
                    self.sse_line(rest);
                }
                self.flush_event()
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn decode_line(&mut self, line: &str) -> Option<String> {
        match self.framing {
            Framing::Ndjson => ndjson_payload(line),
            Framing::Sse => {
                if line.is_empty() {
                    self.flush_event()
                } else {
                    self.sse_line(line);
                    None
                }
            }
        }
    }

    fn sse_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        if let Some(data) = line.strip_prefix(DATA_PREFIX) {
            let data = data.strip_prefix(' ').unwrap_or(data);
            self.data_lines.push(data.to_string());
        }
        // event:, id:, retry: and unprefixed lines carry nothing we use
    }

    fn flush_event(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(payload)
    }
}

fn ndjson_payload(line: &str) -> Option<String> {
    let line = line.trim();
    let line = line.strip_prefix(DATA_PREFIX).map_or(line, str::trim_start);
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Decode a complete in-memory stream.
pub fn decode_all(framing: Framing, bytes: &[u8]) -> Vec<String> {
    let mut decoder = FrameDecoder::new(framing);
    let mut payloads = decoder.push(bytes);
    payloads.extend(decoder.finish());
    payloads
}
