//! Shared stream connection management
//!
//! [`ConnectionManager`] keeps at most one physical connection per endpoint.
//! Every [`StreamHandle`] and [`Subscription`] counts as a consumer of that
//! connection; the transport is torn down when the last consumer goes away.
//! A driver task per stream reads frames, feeds the router and applies the
//! bounded reconnect policy.

mod driver;
mod handle;
mod policy;

pub use handle::{StreamHandle, Subscription};
pub use policy::ReconnectPolicy;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::router::EventRouter;
use crate::transport::{Credentials, Transport};

use driver::Driver;
use handle::StreamShared;

type StreamRegistry = DashMap<String, Arc<StreamShared>>;

/// Connection status of one logical stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub connected: bool,
    /// Last transport error, cleared on a successful open
    pub error: Option<String>,
    /// Reconnect attempts since the last successful open
    pub reconnect_attempts: u32,
}

/// Commands from handles to a stream's driver task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Reset,
    Shutdown,
}

/// Owns the endpoint -> stream registry
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    streams: Arc<StreamRegistry>,
}

impl ConnectionManager {
    /// Create a manager with the default reconnect policy
    pub fn new(transport: impl Transport) -> Self {
        Self::with_shared_transport(Arc::new(transport))
    }

    pub fn with_shared_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: ReconnectPolicy::default(),
            streams: Arc::new(DashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Get a handle to the stream for `endpoint`, opening it if needed
    ///
    /// Endpoints are compared after URL normalization. Credentials are only
    /// used when this call opens the stream. Must be called from within a
    /// Tokio runtime.
    pub fn connect(&self, endpoint: &str, credentials: Credentials) -> SyncResult<StreamHandle> {
        let url = Url::parse(endpoint).map_err(|e| SyncError::invalid_endpoint(endpoint, e))?;
        if url.cannot_be_a_base() {
            return Err(SyncError::invalid_endpoint(endpoint, "not a hierarchical URL"));
        }
        let key = url.as_str().to_string();

        let shared = match self.streams.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let shared = Arc::clone(entry.get());
                shared.acquire();
                tracing::debug!(
                    endpoint = %key,
                    consumers = shared.consumer_count(),
                    "Reusing sync stream"
                );
                shared
            }
            Entry::Vacant(entry) => {
                let (control_tx, control_rx) = mpsc::unbounded_channel();
                let (state_tx, _) = watch::channel(ConnectionState::default());
                let shared = Arc::new(StreamShared {
                    key: key.clone(),
                    endpoint: url,
                    router: EventRouter::new(),
                    state: state_tx,
                    consumers: AtomicUsize::new(1),
                    control: control_tx,
                    registry: Arc::downgrade(&self.streams),
                });
                entry.insert(Arc::clone(&shared));

                tracing::info!(endpoint = %key, "Opening sync stream");
                let driver = Driver {
                    shared: Arc::clone(&shared),
                    transport: Arc::clone(&self.transport),
                    credentials,
                    policy: self.policy.clone(),
                    control: control_rx,
                };
                tokio::spawn(driver.run());
                shared
            }
        };

        Ok(StreamHandle::from_shared(shared))
    }

    /// Number of endpoints with an open stream
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    /// Whether a stream is open for `endpoint` (after normalization)
    pub fn is_open(&self, endpoint: &str) -> bool {
        Url::parse(endpoint)
            .map(|url| self.streams.contains_key(url.as_str()))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("policy", &self.policy)
            .field("open_streams", &self.streams.len())
            .finish()
    }
}
