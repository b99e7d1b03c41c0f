//! Async drivers for one live stream.
//!
//! Reads transport chunks, decodes frames, and feeds either the
//! [`LiveReconstructor`] ([`pump`]) or the [`Relay`] ([`relay_pump`]), forwarding
//! every output over a channel in arrival order. Both share one loop; its only
//! suspension points are waiting for the next chunk and delivering outputs.

use crate::frame::{FrameDecoder, Framing};
use crate::live::{LiveReconstructor, StreamStats, StreamUpdate};
use crate::normalize::Normalizer;
use crate::relay::{Relay, RelayEvent, RelayStats};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct PumpOptions {
    pub framing: Framing,
    /// Wall-clock ceiling counted from stream start
    pub timeout: Duration,
    pub default_agent: String,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            timeout: DEFAULT_TIMEOUT,
            default_agent: crate::normalize::DEFAULT_AGENT.to_string(),
        }
    }
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamEnd {
    Completed,
    TimedOut,
    /// Aborted by the caller; the open turn was discarded, not finalized.
    Cancelled,
    /// The transport failed mid-stream. Whatever arrived before was flushed.
    UpstreamFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOutcome {
    pub end: StreamEnd,
    pub stats: StreamStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayOutcome {
    pub end: StreamEnd,
    pub stats: RelayStats,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("update receiver closed")]
    ReceiverClosed,
}

/// Per-stream consumer of decoded frames.
trait FrameSink {
    type Output;

    fn frame(&mut self, payload: &str) -> Vec<Self::Output>;
    /// Best-effort end of stream; not called on cancellation.
    fn finish(&mut self) -> Vec<Self::Output>;
    fn frames(&self) -> u64;
}

impl FrameSink for LiveReconstructor {
    type Output = StreamUpdate;

    fn frame(&mut self, payload: &str) -> Vec<StreamUpdate> {
        self.apply_payload(payload)
    }

    fn finish(&mut self) -> Vec<StreamUpdate> {
        LiveReconstructor::finish(self)
    }

    fn frames(&self) -> u64 {
        self.stats().frames
    }
}

impl FrameSink for Relay {
    type Output = RelayEvent;

    fn frame(&mut self, payload: &str) -> Vec<RelayEvent> {
        self.relay_payload(payload)
    }

    fn finish(&mut self) -> Vec<RelayEvent> {
        Relay::finish(self)
    }

    fn frames(&self) -> u64 {
        self.stats().frames
    }
}

/// Drive `source` to completion, cancellation or timeout.
pub async fn pump<S, B, E>(
    source: S,
    options: &PumpOptions,
    cancel: &CancellationToken,
    updates: &mpsc::Sender<StreamUpdate>,
) -> Result<StreamOutcome, StreamError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut live = LiveReconstructor::new(Normalizer::new(&options.default_agent));
    let end = drive(source, options, &mut live, cancel, updates).await?;

    let stats = live.stats().clone();
    tracing::info!(
        frames = stats.frames,
        messages = stats.messages_finalized,
        activities = stats.activities,
        "stream closed"
    );
    Ok(StreamOutcome { end, stats })
}

/// Relay `source` as deduplicated [`RelayEvent`]s under the same ending rules as
/// [`pump`]. The closing `Done` event is sent unless the stream was cancelled.
pub async fn relay_pump<S, B, E>(
    source: S,
    options: &PumpOptions,
    emit_done: bool,
    cancel: &CancellationToken,
    events: &mpsc::Sender<RelayEvent>,
) -> Result<RelayOutcome, StreamError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut relay = Relay::new(Normalizer::new(&options.default_agent), emit_done);
    let end = drive(source, options, &mut relay, cancel, events).await?;

    let stats = relay.stats().clone();
    tracing::info!(
        frames = stats.frames,
        parts = stats.parts_emitted,
        duplicates = stats.duplicates,
        "relay closed"
    );
    Ok(RelayOutcome { end, stats })
}

async fn drive<S, B, E, K>(
    mut source: S,
    options: &PumpOptions,
    sink: &mut K,
    cancel: &CancellationToken,
    out: &mpsc::Sender<K::Output>,
) -> Result<StreamEnd, StreamError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    K: FrameSink,
{
    let mut decoder = FrameDecoder::new(options.framing);
    let deadline = tokio::time::sleep(options.timeout);
    tokio::pin!(deadline);

    tracing::info!(framing = %options.framing, timeout_secs = options.timeout.as_secs(), "stream started");

    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(frames = sink.frames(), "stream cancelled");
                return Ok(StreamEnd::Cancelled);
            }
            _ = &mut deadline => {
                tracing::warn!(timeout_secs = options.timeout.as_secs(), "stream timed out");
                break StreamEnd::TimedOut;
            }
            chunk = source.next() => match chunk {
                Some(Ok(bytes)) => {
                    for payload in decoder.push(bytes.as_ref()) {
                        deliver(out, sink.frame(&payload)).await?;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "upstream transport failed");
                    break StreamEnd::UpstreamFailed { reason: e.to_string() };
                }
                None => break StreamEnd::Completed,
            }
        }
    };

    if let Some(payload) = decoder.finish() {
        deliver(out, sink.frame(&payload)).await?;
    }
    deliver(out, sink.finish()).await?;
    Ok(end)
}

async fn deliver<T>(out: &mpsc::Sender<T>, batch: Vec<T>) -> Result<(), StreamError> {
    for item in batch {
        out.send(item)
            .await
            .map_err(|_| StreamError::ReceiverClosed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn sse_text(text: &str) -> String {
        let record = serde_json::json!({
            "author": "planner",
            "content": {"role": "model", "parts": [{"text": text}]}
        });
        format!("data: {record}\n\n")
    }

    fn options(framing: Framing) -> PumpOptions {
        PumpOptions {
            framing,
            ..PumpOptions::default()
        }
    }

    async fn collect(mut rx: mpsc::Receiver<StreamUpdate>) -> Vec<StreamUpdate> {
        let mut out = Vec::new();
        while let Some(update) = rx.recv().await {
            out.push(update);
        }
        out
    }

    fn final_texts(updates: &[StreamUpdate]) -> Vec<String> {
        updates
            .iter()
            .filter_map(|u| match u {
                StreamUpdate::Message {
                    message,
                    finalized: true,
                } => Some(message.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_completed_stream_finalizes() {
        let body = format!("{}{}", sse_text("Hi "), sse_text("there"));
        let bytes = body.into_bytes();
        // Split mid-frame to exercise buffering.
        let (a, b) = bytes.split_at(7);
        let source = stream::iter(vec![Ok::<_, std::io::Error>(a.to_vec()), Ok(b.to_vec())]);

        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let outcome = pump(source, &options(Framing::Sse), &cancel, &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(outcome.end, StreamEnd::Completed);
        assert_eq!(outcome.stats.frames, 2);
        assert_eq!(final_texts(&collect(rx).await), vec!["Hi there"]);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_flushed_at_end() {
        let record = serde_json::json!({
            "author": "planner",
            "content": {"role": "model", "parts": [{"text": "tail"}]}
        });
        let source = stream::iter(vec![Ok::<_, std::io::Error>(record.to_string())]);
        let (tx, rx) = mpsc::channel(64);
        let outcome = pump(source, &options(Framing::Ndjson), &CancellationToken::new(), &tx)
            .await
            .unwrap();
        drop(tx);
        assert_eq!(outcome.stats.records, 1);
        assert_eq!(final_texts(&collect(rx).await), vec!["tail"]);
    }

    #[tokio::test]
    async fn test_cancel_discards_open_turn() {
        let source = stream::iter(vec![Ok::<_, std::io::Error>(sse_text("partial"))])
            .chain(stream::pending());
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let handle = tokio::spawn(async move {
            let out = pump(source, &options(Framing::Sse), &cancel, &tx).await;
            drop(tx);
            out
        });
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamUpdate::Message { finalized: false, .. }));
        trigger.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.end, StreamEnd::Cancelled);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_flushes_and_closes() {
        let source = stream::iter(vec![Ok::<_, std::io::Error>(sse_text("slow"))])
            .chain(stream::pending());
        let (tx, rx) = mpsc::channel(64);
        let opts = PumpOptions {
            timeout: Duration::from_secs(5),
            ..options(Framing::Sse)
        };
        let outcome = pump(source, &opts, &CancellationToken::new(), &tx)
            .await
            .unwrap();
        drop(tx);
        assert_eq!(outcome.end, StreamEnd::TimedOut);
        assert_eq!(final_texts(&collect(rx).await), vec!["slow"]);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_distinct() {
        let source = stream::iter(vec![
            Ok(sse_text("before")),
            Err("connection reset".to_string()),
        ]);
        let (tx, rx) = mpsc::channel(64);
        let outcome = pump(source, &options(Framing::Sse), &CancellationToken::new(), &tx)
            .await
            .unwrap();
        drop(tx);
        assert_eq!(
            outcome.end,
            StreamEnd::UpstreamFailed {
                reason: "connection reset".into()
            }
        );
        assert_eq!(final_texts(&collect(rx).await), vec!["before"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_relay_times_out_and_closes() {
        let source = stream::iter(vec![Ok::<_, std::io::Error>(sse_text("held"))])
            .chain(stream::pending());
        let (tx, mut rx) = mpsc::channel(64);
        let opts = PumpOptions {
            timeout: Duration::from_secs(5),
            ..options(Framing::Sse)
        };
        let outcome = relay_pump(source, &opts, true, &CancellationToken::new(), &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(outcome.end, StreamEnd::TimedOut);
        assert_eq!(outcome.stats.parts_emitted, 1);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(&events[0], RelayEvent::Text { text, .. } if text == "held"));
        assert_eq!(events.last(), Some(&RelayEvent::Done));
    }

    #[tokio::test]
    async fn test_cancelled_relay_skips_done() {
        let source = stream::iter(vec![Ok::<_, std::io::Error>(sse_text("x"))])
            .chain(stream::pending());
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let handle = tokio::spawn(async move {
            let out = relay_pump(source, &options(Framing::Sse), true, &cancel, &tx).await;
            drop(tx);
            out
        });
        assert!(matches!(rx.recv().await, Some(RelayEvent::Text { .. })));
        trigger.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.end, StreamEnd::Cancelled);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_an_error() {
        let source = stream::iter(vec![Ok::<_, std::io::Error>(sse_text("x"))]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = pump(source, &options(Framing::Sse), &CancellationToken::new(), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::ReceiverClosed));
    }
}
