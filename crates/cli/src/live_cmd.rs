use crate::{config_cmd, input, output};
use agentstream_api_client::{BackendClient, ContentPayload, RunRequest};
use agentstream_pipeline::{Framing, PumpOptions, StreamEnd, StreamUpdate, pump};
use agentstream_runtime_config::AgentStreamConfig;
use anyhow::{Context, Result, bail};
use futures::Stream;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const UPDATE_BUFFER: usize = 256;

pub(crate) fn pump_options(framing: Option<Framing>, config: &AgentStreamConfig) -> PumpOptions {
    PumpOptions {
        framing: config_cmd::framing(framing, config),
        timeout: config_cmd::timeout(config),
        default_agent: config.stream.default_agent.clone(),
    }
}

/// Live reconstruction over a recorded stream (file or stdin).
pub async fn run_decode(
    input: &str,
    framing: Option<Framing>,
    config: &AgentStreamConfig,
) -> Result<()> {
    let source = input::open(input).await?;
    follow(source, pump_options(framing, config)).await
}

/// Send `message` to the configured backend and follow the response stream.
pub async fn run_fetch(
    message: &str,
    session: Option<String>,
    framing: Option<Framing>,
    config: &AgentStreamConfig,
) -> Result<()> {
    let backend = &config.backend;
    let mut client = BackendClient::new(&backend.url, CONNECT_TIMEOUT)?;
    client.set_auth(backend.token.clone());

    let session_id = match session {
        Some(id) => id,
        None => client
            .create_session(&backend.app_name, &backend.user_id)
            .await
            .context("Failed to create backend session")?,
    };
    let request = RunRequest {
        app_name: backend.app_name.clone(),
        user_id: backend.user_id.clone(),
        session_id,
        new_message: ContentPayload::user_text(message),
        streaming: true,
    };
    let source = client
        .open_run(&backend.run_path, &request)
        .await
        .context("Failed to open run stream")?;
    follow(source, pump_options(framing, config)).await
}

/// Pump `source` on its own task, print updates as JSON lines, cancel on Ctrl-C.
async fn follow<S, B, E>(source: S, options: PumpOptions) -> Result<()>
where
    S: Stream<Item = Result<B, E>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<StreamUpdate>(UPDATE_BUFFER);
    let cancel = interrupt_token();
    let task = tokio::spawn(async move { pump(source, &options, &cancel, &tx).await });

    while let Some(update) = rx.recv().await {
        output::print_json_line(&update)?;
    }
    let outcome = task.await.context("Stream task failed")??;
    output::report("stream", &outcome)?;

    check_end(outcome.end)
}

/// Token cancelled on Ctrl-C.
pub(crate) fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling stream");
            interrupt.cancel();
        }
    });
    cancel
}

/// Only an upstream failure makes the command fail; timeouts and interrupts keep
/// what was already printed.
pub(crate) fn check_end(end: StreamEnd) -> Result<()> {
    match end {
        StreamEnd::UpstreamFailed { reason } => bail!("Upstream stream failed: {reason}"),
        StreamEnd::Completed | StreamEnd::TimedOut | StreamEnd::Cancelled => Ok(()),
    }
}
