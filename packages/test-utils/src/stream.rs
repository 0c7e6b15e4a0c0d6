//! Mock NDJSON sync stream server
//!
//! Provides a [`MockStreamServer`] that serves newline-delimited JSON sync
//! events over HTTP, for testing the stream transport without a backend.

use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the stream on
pub const STREAM_PATH: &str = "/api/sync/stream";

/// Mock sync stream endpoint
///
/// Each mounted session answers one request with a finite NDJSON body, so a
/// client sees the stream end after the last frame. Sessions are served in
/// the order they were mounted.
///
/// # Example
///
/// ```rust,ignore
/// use fintrack_test_utils::{MockStreamServer, SyncEventFixture};
///
/// #[tokio::test]
/// async fn test_stream() {
///     let server = MockStreamServer::start().await;
///     server
///         .mock_session(&[SyncEventFixture::wallet_progress("w1", 40.0, "syncing_assets")])
///         .await;
///
///     // Point the transport at server.stream_url()
/// }
/// ```
pub struct MockStreamServer {
    server: MockServer,
}

impl MockStreamServer {
    /// Start a new mock stream server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server base URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Full URL of the stream endpoint
    pub fn stream_url(&self) -> String {
        format!("{}{}", self.server.uri(), STREAM_PATH)
    }

    /// Mount a one-shot session that sends `frames` and then ends
    pub async fn mock_session(&self, frames: &[Value]) {
        self.mock_session_raw(ndjson(frames)).await;
    }

    /// Mount a one-shot session with a verbatim body
    pub async fn mock_session_raw(&self, body: impl Into<String>) {
        Mock::given(method("GET"))
            .and(path(STREAM_PATH))
            .respond_with(ndjson_response(body.into()))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Mount a one-shot session that only answers the given bearer token
    pub async fn mock_session_with_token(&self, token: &str, frames: &[Value]) {
        Mock::given(method("GET"))
            .and(path(STREAM_PATH))
            .and(header("Authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ndjson_response(ndjson(frames)))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Mount an error response for every stream request
    pub async fn mock_failure(&self, status_code: u16, message: &str) {
        Mock::given(method("GET"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(message))
            .mount(&self.server)
            .await;
    }

    /// Mount a 401 for requests that do not match a token-guarded session
    pub async fn mock_unauthorized(&self) {
        self.mock_failure(401, "invalid or missing token").await;
    }

    /// Number of stream requests received so far
    pub async fn stream_request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == STREAM_PATH)
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Encode frames as newline-delimited JSON
pub fn ndjson(frames: &[Value]) -> String {
    frames
        .iter()
        .map(|frame| format!("{}\n", frame))
        .collect()
}

fn ndjson_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/x-ndjson")
        .set_body_string(body)
}
