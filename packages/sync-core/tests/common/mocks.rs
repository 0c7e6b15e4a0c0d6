//! Mock collaborators for sync core integration tests
//!
//! Provides a scripted in-memory [`MockTransport`] plus recording cache
//! invalidator and notifier implementations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use fintrack_sync::transport::FrameStream;
use fintrack_sync::{
    CacheInvalidator, Credentials, Notification, Notifier, QueryKey, Transport, TransportError,
};

/// What the next `open` call does
pub enum Session {
    /// Fail to connect
    Refuse(String),
    /// Deliver frames, then stay open
    Frames(Vec<String>),
    /// Deliver frames, then end the stream
    FramesThenClose(Vec<String>),
    /// Deliver whatever is pushed through the paired sender
    Live(mpsc::UnboundedReceiver<String>),
}

/// Scripted transport; once the script runs out every open is refused
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Session>>,
    opens: AtomicUsize,
    live: Arc<AtomicUsize>,
    tokens: Mutex<Vec<Option<String>>>,
}

/// Decrements the live-stream counter when the stream is dropped
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(sessions: Vec<Session>) -> Arc<Self> {
        let transport = Self::new();
        transport.script.lock().extend(sessions);
        transport
    }

    pub fn push(&self, session: Session) {
        self.script.lock().push_back(session);
    }

    /// Queue a live session and return its frame sender
    pub fn push_live(&self) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Session::Live(rx));
        tx
    }

    /// Number of `open` calls so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet dropped
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        _endpoint: &url::Url,
        credentials: &Credentials,
    ) -> Result<FrameStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().push(credentials.token.clone());

        let session = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Session::Refuse("connection refused".into()));

        let frames: FrameStream = match session {
            Session::Refuse(reason) => return Err(TransportError::Connect(reason)),
            Session::Frames(frames) => Box::pin(
                stream::iter(frames.into_iter().map(Ok)).chain(stream::pending()),
            ),
            Session::FramesThenClose(frames) => Box::pin(stream::iter(frames.into_iter().map(Ok))),
            Session::Live(rx) => Box::pin(UnboundedReceiverStream::new(rx).map(Ok)),
        };

        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = OpenGuard(Arc::clone(&self.live));
        Ok(Box::pin(frames.map(move |frame| {
            let _open = &guard;
            frame
        })))
    }
}

/// Cache invalidator that records every key
#[derive(Default)]
pub struct RecordingInvalidator {
    keys: Mutex<Vec<QueryKey>>,
    calls: AtomicUsize,
}

impl RecordingInvalidator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.keys.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CacheInvalidator for RecordingInvalidator {
    fn invalidate(&self, keys: &[QueryKey]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().extend_from_slice(keys);
    }
}

/// Notifier that records every notification
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}
