use anyhow::{Context, Result};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

/// Chunked byte stream over a file, or stdin for `-`.
pub async fn open(input: &str) -> Result<BoxStream<'static, std::io::Result<Bytes>>> {
    if input == "-" {
        return Ok(ReaderStream::new(tokio::io::stdin()).boxed());
    }
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open {input}"))?;
    Ok(ReaderStream::new(file).boxed())
}

/// Whole input as text.
pub async fn read_to_string(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {input}"))
}
