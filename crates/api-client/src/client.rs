use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest body excerpt carried in a status error.
const BODY_EXCERPT_LIMIT: usize = 512;

/// Upstream failures. Kept apart from decoding problems so callers can tell
/// "no data" from "garbled data".
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response body interrupted: {0}")]
    Body(#[source] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartPayload {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPayload {
    pub role: String,
    pub parts: Vec<PartPayload>,
}

impl ContentPayload {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![PartPayload { text: text.into() }],
        }
    }
}

/// Body of a streaming run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: ContentPayload,
    pub streaming: bool,
}

#[derive(Debug, Deserialize)]
struct SessionCreated {
    id: String,
}

/// HTTP transport to the agent backend.
///
/// Only opens streams; decoding and reconstruction happen in the pipeline crate.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl BackendClient {
    /// The total stream duration is bounded by the caller, so only connecting is timed here.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(TransportError::Build)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    /// Bearer token for every request. Empty tokens are ignored.
    pub fn set_auth(&mut self, token: String) {
        self.auth_token = Some(token).filter(|t| !t.trim().is_empty());
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Create a session for `user_id` in `app_name` and return its id.
    pub async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<String, TransportError> {
        let url = self.url(&format!("/apps/{app_name}/users/{user_id}/sessions"));
        let resp = self
            .authorize(self.client.post(&url).json(&serde_json::json!({})))
            .send()
            .await
            .map_err(|source| TransportError::Connect { url, source })?;
        let resp = check_status(resp).await?;
        let created: SessionCreated = resp.json().await.map_err(|e| {
            TransportError::Decode(format!("session response without an id: {e}"))
        })?;
        Ok(created.id)
    }

    /// POST a run request to `run_path` and return the response body as raw chunks.
    pub async fn open_run(
        &self,
        run_path: &str,
        request: &RunRequest,
    ) -> Result<BoxStream<'static, Result<Bytes, TransportError>>, TransportError> {
        let url = self.url(run_path);
        tracing::info!(url = %url, session = %request.session_id, "opening run stream");
        let resp = self
            .authorize(self.client.post(&url).json(request))
            .send()
            .await
            .map_err(|source| TransportError::Connect { url, source })?;
        let resp = check_status(resp).await?;
        Ok(resp.bytes_stream().map_err(TransportError::Body).boxed())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body: excerpt(&body),
    })
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request text.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn http_response(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn run_request() -> RunRequest {
        RunRequest {
            app_name: "weather".into(),
            user_id: "u1".into(),
            session_id: "s1".into(),
            new_message: ContentPayload::user_text("hi"),
            streaming: true,
        }
    }

    #[test]
    fn run_request_uses_camel_case() {
        let value = serde_json::to_value(run_request()).unwrap();
        assert_eq!(value["appName"], "weather");
        assert_eq!(value["newMessage"]["parts"][0]["text"], "hi");
        assert_eq!(value["streaming"], true);
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(BODY_EXCERPT_LIMIT + 10);
        assert!(excerpt(&long).ends_with("..."));
        assert_eq!(excerpt("  short "), "short");
    }

    #[tokio::test]
    async fn open_run_streams_body_with_bearer_auth() {
        let body = "data: {\"author\":\"a\"}\n\n";
        let (base, server) = serve_once(http_response("200 OK", "text/event-stream", body)).await;
        let mut client = BackendClient::new(&base, Duration::from_secs(5)).unwrap();
        client.set_auth("tok".into());

        let mut stream = client.open_run("/run_sse", &run_request()).await.unwrap();
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(String::from_utf8(received).unwrap(), body);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /run_sse"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok"));
        assert!(request.contains("\"sessionId\":\"s1\""));
    }

    #[tokio::test]
    async fn non_success_status_is_classified() {
        let (base, _server) =
            serve_once(http_response("404 Not Found", "text/plain", "no such app")).await;
        let client = BackendClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client
            .open_run("run_sse", &run_request())
            .await
            .err()
            .unwrap();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such app");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn create_session_returns_id() {
        let (base, server) = serve_once(http_response(
            "200 OK",
            "application/json",
            r#"{"id":"sess-42","appName":"weather"}"#,
        ))
        .await;
        let client = BackendClient::new(&base, Duration::from_secs(5)).unwrap();
        let id = client.create_session("weather", "u1").await.unwrap();
        assert_eq!(id, "sess-42");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /apps/weather/users/u1/sessions"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = BackendClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = client
            .open_run("/run_sse", &run_request())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
