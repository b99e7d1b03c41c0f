use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

/// Write one compact JSON value per line and flush, so consumers see updates as they happen.
pub fn print_json_line<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("Failed to serialize output")?;
    print_raw(&format!("{line}\n"))
}

pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    print_raw(&format!("{text}\n"))
}

pub fn print_raw(text: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .context("Failed to write to stdout")
}

/// Run summary on stderr, kept off stdout so piped output stays parseable.
pub fn report<T: Serialize>(label: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).context("Failed to serialize summary")?;
    eprintln!("{label}: {json}");
    Ok(())
}
