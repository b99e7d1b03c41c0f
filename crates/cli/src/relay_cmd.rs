use crate::{input, live_cmd, output};
use agentstream_pipeline::{Framing, RelayEvent, RelayFormat, relay_pump};
use agentstream_runtime_config::AgentStreamConfig;
use anyhow::{Context, Result};
use tokio::sync::mpsc;

/// Relay a recorded stream (file or stdin) as deduplicated events on stdout.
///
/// Runs under the configured stream timeout and stops on Ctrl-C, like `decode`.
pub async fn run_relay(
    input: &str,
    framing: Option<Framing>,
    format: RelayFormat,
    config: &AgentStreamConfig,
) -> Result<()> {
    let source = input::open(input).await?;
    let options = live_cmd::pump_options(framing, config);
    let emit_done = config.relay.emit_done;

    let (tx, mut rx) = mpsc::channel::<RelayEvent>(live_cmd::UPDATE_BUFFER);
    let cancel = live_cmd::interrupt_token();
    let task =
        tokio::spawn(async move { relay_pump(source, &options, emit_done, &cancel, &tx).await });

    while let Some(event) = rx.recv().await {
        let frame = format
            .encode(&event)
            .context("Failed to encode relay event")?;
        output::print_raw(&frame)?;
    }
    let outcome = task.await.context("Relay task failed")??;
    output::report("relay", &outcome)?;
    live_cmd::check_end(outcome.end)
}
