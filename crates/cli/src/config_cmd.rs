use agentstream_pipeline::Framing;
use agentstream_runtime_config::AgentStreamConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// Load the effective config: explicit path, then `./agentstream.toml`, then defaults.
pub fn load(path: Option<&Path>) -> Result<AgentStreamConfig> {
    AgentStreamConfig::load_or_default(path).context("Failed to load configuration")
}

pub fn show_config(config: &AgentStreamConfig) -> Result<()> {
    let text = config.to_toml().context("Failed to render configuration")?;
    print!("{text}");
    Ok(())
}

/// Framing from the command line, falling back to the configured one.
pub fn framing(flag: Option<Framing>, config: &AgentStreamConfig) -> Framing {
    flag.unwrap_or(config.stream.framing)
}

pub fn timeout(config: &AgentStreamConfig) -> Duration {
    Duration::from_secs(config.stream.timeout_secs)
}
