use crate::{input, output};
use agentstream_core::jsonl::from_history_str;
use agentstream_pipeline::{HistoryReconstructor, Normalizer};
use agentstream_runtime_config::AgentStreamConfig;
use anyhow::{Context, Result};

pub async fn run_replay(input: &str, config: &AgentStreamConfig, pretty: bool) -> Result<()> {
    let text = input::read_to_string(input).await?;
    let log = from_history_str(&text).with_context(|| format!("Failed to parse history {input}"))?;
    for skipped in &log.skipped {
        tracing::warn!(line = skipped.line, reason = %skipped.reason, "skipping unreadable record");
    }

    let reconstructor = HistoryReconstructor::new(Normalizer::new(&config.stream.default_agent));
    let conversation = reconstructor.reconstruct(&log.records);
    tracing::info!(
        records = log.records.len(),
        messages = conversation.messages.len(),
        activities = conversation.activity_count(),
        "history reconstructed"
    );
    output::print_json(&conversation, pretty)
}
