//! NDJSON-over-HTTP stream transport

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use fintrack_shared_config::StreamConfig;

use super::{Credentials, FrameStream, Transport, TransportError};

/// Maximum error body size to keep in a status error
const MAX_ERROR_BODY_SIZE: usize = 512;

/// One decoded NDJSON line
#[derive(Debug, PartialEq)]
enum Line {
    Frame(String),
    /// Longer than the limit; its bytes were discarded up to the next newline
    Oversized,
}

/// [`LinesCodec`] that reports oversized lines as items instead of errors.
///
/// `FramedRead` stops for good after a decoder error, so a single long line
/// would otherwise end the response.
struct FrameCodec {
    lines: LinesCodec,
}

impl FrameCodec {
    fn new(max_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_bytes),
        }
    }

    fn lift(decoded: Result<Option<String>, LinesCodecError>) -> std::io::Result<Option<Line>> {
        match decoded {
            Ok(line) => Ok(line.map(Line::Frame)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Line::Oversized)),
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Line;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, Self::Error> {
        Self::lift(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, Self::Error> {
        Self::lift(self.lines.decode_eof(buf))
    }
}

/// Opens a long-lived HTTP response and splits its body into JSON lines
#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    http_client: Client,
    max_frame_bytes: usize,
}

impl HttpStreamTransport {
    /// Create a transport from stream configuration
    pub fn new(config: &StreamConfig) -> Result<Self, TransportError> {
        // No overall request timeout: the response body is meant to stay open.
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            http_client,
            max_frame_bytes: config.max_frame_bytes,
        })
    }

    /// Create a transport with a custom HTTP client (for testing)
    pub fn with_client(http_client: Client, max_frame_bytes: usize) -> Self {
        Self {
            http_client,
            max_frame_bytes,
        }
    }

    fn truncate_error_body(mut body: String) -> String {
        if body.len() > MAX_ERROR_BODY_SIZE {
            let mut cut = MAX_ERROR_BODY_SIZE;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("... (truncated)");
        }
        body
    }
}

#[async_trait]
impl Transport for HttpStreamTransport {
    async fn open(
        &self,
        endpoint: &url::Url,
        credentials: &Credentials,
    ) -> Result<FrameStream, TransportError> {
        let mut request = self
            .http_client
            .get(endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/x-ndjson");
        if let Some(token) = &credentials.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::truncate_error_body(response.text().await.unwrap_or_default());
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        tracing::debug!(endpoint = %endpoint, "Sync stream response opened");

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let max_bytes = self.max_frame_bytes;

        let frames = FramedRead::new(StreamReader::new(body), FrameCodec::new(max_bytes))
            .map(move |line| match line {
                Ok(Line::Frame(line)) => Ok(line),
                Ok(Line::Oversized) => Err(TransportError::FrameTooLarge { max_bytes }),
                Err(e) => Err(TransportError::Read(e.to_string())),
            })
            .try_filter(|line| futures_util::future::ready(!line.trim().is_empty()));

        Ok(Box::pin(frames))
    }
}
