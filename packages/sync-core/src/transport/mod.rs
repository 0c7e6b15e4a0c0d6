//! Stream transports
//!
//! A transport opens one long-lived server-push connection and yields its
//! text frames in arrival order. The connection manager owns reconnection;
//! transports never retry on their own.

mod http;

pub use http::HttpStreamTransport;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use thiserror::Error;

/// Ordered stream of raw text frames from one physical connection
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Credentials presented when opening a stream
#[derive(Clone, Default)]
pub struct Credentials {
    /// Bearer token, if the endpoint requires one
    pub token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Errors raised by a transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not establish the connection
    #[error("connect failed: {0}")]
    Connect(String),

    /// Server rejected the request
    #[error("endpoint returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Reading from an open connection failed
    #[error("read failed: {0}")]
    Read(String),

    /// A single frame exceeded the maximum length
    #[error("frame exceeds {max_bytes} bytes")]
    FrameTooLarge { max_bytes: usize },

    /// Server closed the stream
    #[error("stream closed by server")]
    Closed,
}

impl TransportError {
    /// Check if reconnecting might help
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::FrameTooLarge { .. } => false,
            Self::Connect(_) | Self::Read(_) | Self::Closed => true,
        }
    }
}

/// Opens server-push connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `endpoint` and return its frame stream
    async fn open(
        &self,
        endpoint: &url::Url,
        credentials: &Credentials,
    ) -> Result<FrameStream, TransportError>;
}
