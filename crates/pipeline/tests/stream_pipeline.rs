//! End-to-end checks over recorded backend traffic.

use agentstream_core::jsonl::from_history_str;
use agentstream_core::{ActivityKind, MessageKind};
use agentstream_pipeline::{
    FrameDecoder, Framing, HistoryReconstructor, LiveReconstructor, Normalizer, PumpOptions, Relay,
    RelayEvent, RelayFormat, StreamEnd, StreamUpdate, decode_all, pump,
};
use futures::stream;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("read {}", path.display()))
}

fn normalizer() -> Normalizer {
    Normalizer::new("assistant")
}

/// Run the live path over `bytes` delivered in `chunk`-sized pieces.
fn run_live(framing: Framing, bytes: &[u8], chunk: usize) -> (LiveReconstructor, Vec<StreamUpdate>) {
    let mut decoder = FrameDecoder::new(framing);
    let mut live = LiveReconstructor::new(normalizer());
    let mut updates = Vec::new();
    for piece in bytes.chunks(chunk.max(1)) {
        for payload in decoder.push(piece) {
            updates.extend(live.apply_payload(&payload));
        }
    }
    if let Some(payload) = decoder.finish() {
        updates.extend(live.apply_payload(&payload));
    }
    updates.extend(live.finish());
    (live, updates)
}

fn message_texts(live: &LiveReconstructor) -> Vec<String> {
    live.messages().iter().map(|m| m.text.clone()).collect()
}

#[test]
fn test_live_sse_fixture() {
    let body = fixture("weather_stream.sse");
    let (live, updates) = run_live(Framing::Sse, body.as_bytes(), 4096);

    assert_eq!(message_texts(&live), vec!["It is 21°C in Paris."]);
    let stats = live.stats();
    assert_eq!(stats.frames, 8);
    assert_eq!(stats.parse_failures, 1);
    assert_eq!(stats.messages_finalized, 1);

    let message_id = &live.messages()[0].id;
    let kinds: Vec<ActivityKind> = updates
        .iter()
        .filter_map(|u| match u {
            StreamUpdate::Activity {
                message_id: owner,
                activity,
            } => {
                assert_eq!(owner, message_id);
                Some(activity.kind)
            }
            StreamUpdate::Message { .. } => None,
        })
        .collect();
    // The client path does not dedup; the repeated call shows up twice.
    assert_eq!(
        kinds,
        vec![
            ActivityKind::Thinking,
            ActivityKind::ToolCall,
            ActivityKind::ToolCall,
            ActivityKind::ToolResponse,
        ]
    );
}

#[test]
fn test_chunk_boundaries_do_not_change_result() {
    let body = fixture("weather_stream.sse");
    let (whole, _) = run_live(Framing::Sse, body.as_bytes(), usize::MAX);
    for chunk in [1, 2, 3, 7, 64] {
        let (split, _) = run_live(Framing::Sse, body.as_bytes(), chunk);
        assert_eq!(message_texts(&split), message_texts(&whole), "chunk size {chunk}");
        assert_eq!(split.stats(), whole.stats(), "chunk size {chunk}");
    }
}

#[test]
fn test_ndjson_and_sse_framings_agree() {
    let sse = fixture("weather_stream.sse");
    let payloads = decode_all(Framing::Sse, sse.as_bytes());
    let ndjson: String = payloads.iter().map(|p| format!("{p}\n")).collect();

    let (from_sse, _) = run_live(Framing::Sse, sse.as_bytes(), 5);
    let (from_ndjson, _) = run_live(Framing::Ndjson, ndjson.as_bytes(), 5);
    assert_eq!(message_texts(&from_sse), message_texts(&from_ndjson));
    assert_eq!(from_sse.stats(), from_ndjson.stats());
}

#[test]
fn test_history_fixture_reconstruction() {
    let log = from_history_str(&fixture("weather_session.jsonl")).unwrap();
    assert_eq!(log.records.len(), 7);
    assert_eq!(log.skipped.len(), 1);
    assert_eq!(log.skipped[0].line, 4);

    let conversation = HistoryReconstructor::new(normalizer()).reconstruct(&log.records);
    let summary: Vec<(MessageKind, &str)> = conversation
        .messages
        .iter()
        .map(|m| (m.kind, m.text.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (MessageKind::Human, "What's the weather in Paris?"),
            (MessageKind::Ai, "It is 21°C and clear in Paris."),
            (MessageKind::Human, "Thanks!"),
            (MessageKind::Ai, "You're welcome."),
        ]
    );
    assert_eq!(
        conversation.messages[0].created_at.timestamp(),
        1_760_000_000
    );

    let first = conversation.activities_for(&conversation.messages[1].id);
    let titles: Vec<&str> = first.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Thinking",
            "Thinking",
            "Function Call: get_weather",
            "Function Response: get_weather",
        ]
    );
    assert_eq!(first[0].payload["heading"], "Locating the city");
    assert_eq!(first[1].payload["heading"], "Choosing a tool");

    let second = conversation.activities_for(&conversation.messages[3].id);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].kind, ActivityKind::Action);
    assert_eq!(second[0].title, "State Update");
    assert!(conversation.unattached.is_empty());
}

#[test]
fn test_live_and_history_agree_on_messages() {
    let log = from_history_str(&fixture("weather_session.jsonl")).unwrap();
    let batch = HistoryReconstructor::new(normalizer()).reconstruct(&log.records);

    let ndjson: String = log
        .records
        .iter()
        .map(|r| format!("{}\n", serde_json::to_string(r).unwrap()))
        .collect();
    let (live, _) = run_live(Framing::Ndjson, ndjson.as_bytes(), 11);

    let batch_texts: Vec<(MessageKind, String)> = batch
        .messages
        .iter()
        .map(|m| (m.kind, m.text.clone()))
        .collect();
    let live_texts: Vec<(MessageKind, String)> = live
        .messages()
        .iter()
        .map(|m| (m.kind, m.text.clone()))
        .collect();
    assert_eq!(live_texts, batch_texts);
    assert_eq!(live.stats().activities as usize, batch.activity_count());
}

#[test]
fn test_relay_dedups_and_encodes() {
    let body = fixture("weather_stream.sse");
    let mut relay = Relay::new(normalizer(), true);
    let mut events = Vec::new();
    for payload in decode_all(Framing::Sse, body.as_bytes()) {
        events.extend(relay.relay_payload(&payload));
    }
    events.extend(relay.finish());

    let calls = events
        .iter()
        .filter(|e| matches!(e, RelayEvent::ToolCall { .. }))
        .count();
    assert_eq!(calls, 1);
    assert_eq!(relay.stats().duplicates, 1);
    assert_eq!(events.last(), Some(&RelayEvent::Done));

    let encoded: String = events
        .iter()
        .map(|e| RelayFormat::Sse.encode(e).unwrap())
        .collect();
    // The relayed stream is itself valid SSE.
    let reparsed = decode_all(Framing::Sse, encoded.as_bytes());
    assert_eq!(reparsed.len(), events.len());
}

#[tokio::test]
async fn test_pump_over_fixture_chunks() {
    let body = fixture("weather_stream.sse").into_bytes();
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
        body.chunks(13).map(|c| Ok(c.to_vec())).collect();

    let (tx, mut rx) = mpsc::channel(256);
    let options = PumpOptions {
        framing: Framing::Sse,
        ..PumpOptions::default()
    };
    let outcome = pump(stream::iter(chunks), &options, &CancellationToken::new(), &tx)
        .await
        .unwrap();
    drop(tx);

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert_eq!(outcome.stats.parse_failures, 1);

    let mut finals = Vec::new();
    while let Some(update) = rx.recv().await {
        if let StreamUpdate::Message {
            message,
            finalized: true,
        } = update
        {
            finals.push(message.text);
        }
    }
    assert_eq!(finals, vec!["It is 21°C in Paris."]);
}
