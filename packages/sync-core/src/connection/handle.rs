//! Consumer handles for a shared stream

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch};
use url::Url;

use super::{ConnectionState, Control, StreamRegistry};
use crate::channel::Channel;
use crate::events::SyncEvent;
use crate::router::{ChannelHandler, EventRouter, HandlerId, RoutedEvent};
use crate::transport::TransportError;

/// State shared by every consumer of one stream and its driver task
pub(crate) struct StreamShared {
    pub(super) key: String,
    pub(super) endpoint: Url,
    pub(super) router: EventRouter,
    pub(super) state: watch::Sender<ConnectionState>,
    pub(super) consumers: AtomicUsize,
    pub(super) control: mpsc::UnboundedSender<Control>,
    pub(super) registry: Weak<StreamRegistry>,
}

impl StreamShared {
    pub(super) fn acquire(&self) {
        self.consumers.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn consumer_count(&self) -> usize {
        self.consumers.load(Ordering::SeqCst)
    }

    /// Drop one consumer; the last one closes the stream
    fn release(self: &Arc<Self>) {
        if self.consumers.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }

        // A concurrent connect() may have revived the stream before we got
        // the registry lock; only shut down if we actually removed it.
        let removed = match self.registry.upgrade() {
            Some(streams) => streams
                .remove_if(&self.key, |_, stream| {
                    Arc::ptr_eq(stream, self) && stream.consumer_count() == 0
                })
                .is_some(),
            None => true,
        };

        if removed {
            tracing::info!(endpoint = %self.key, "Last consumer released, closing sync stream");
            // Driver already gone if this fails
            let _ = self.control.send(Control::Shutdown);
        }
    }

    pub(super) fn on_open(&self) {
        self.state.send_modify(|state| {
            state.connected = true;
            state.error = None;
            state.reconnect_attempts = 0;
        });
        tracing::info!(endpoint = %self.key, "Sync stream connected");
        self.router.dispatch(&RoutedEvent::new(
            Channel::CONNECTION,
            SyncEvent::connection_established(),
        ));
    }

    pub(super) fn on_failure(&self, error: &TransportError) {
        let message = error.to_string();
        self.state.send_modify(|state| {
            state.connected = false;
            state.error = Some(message.clone());
        });
        self.router.dispatch(&RoutedEvent::new(
            Channel::CONNECTION,
            SyncEvent::connection_closed(message.clone()),
        ));
        self.router
            .dispatch(&RoutedEvent::new(Channel::ERROR, SyncEvent::error(message)));
    }

    /// Transport torn down on request rather than by failure
    pub(super) fn on_reset(&self) {
        self.state.send_modify(|state| {
            state.connected = false;
            state.error = None;
            state.reconnect_attempts = 0;
        });
        self.router.dispatch(&RoutedEvent::new(
            Channel::CONNECTION,
            SyncEvent::connection_closed("reset"),
        ));
    }

    pub(super) fn set_reconnect_attempts(&self, attempts: u32) {
        self.state.send_modify(|state| state.reconnect_attempts = attempts);
    }

    pub(super) fn on_stopped(&self) {
        self.state.send_modify(|state| state.connected = false);
    }
}

/// A consumer's handle to a shared stream
///
/// Cloning a handle adds a consumer; dropping it removes one.
pub struct StreamHandle {
    shared: Arc<StreamShared>,
}

impl StreamHandle {
    pub(super) fn from_shared(shared: Arc<StreamShared>) -> Self {
        Self { shared }
    }

    pub fn endpoint(&self) -> &Url {
        &self.shared.endpoint
    }

    /// Deliver events on `channel` to `handler` until the subscription drops
    pub fn subscribe(
        &self,
        channel: impl Into<Channel>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Subscription {
        let channel = channel.into();
        let id = self.shared.router.add_handler(channel.clone(), handler);
        Subscription {
            handle: self.clone(),
            channel,
            id,
        }
    }

    /// Tear the transport down and reconnect now with a fresh attempt count
    pub fn reset_connection(&self) {
        tracing::info!(endpoint = %self.shared.key, "Connection reset requested");
        if self.shared.control.send(Control::Reset).is_err() {
            tracing::warn!(endpoint = %self.shared.key, "Sync stream driver is not running");
        }
    }

    /// Snapshot of the current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Observe connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Handles plus subscriptions currently keeping the stream open
    pub fn consumer_count(&self) -> usize {
        self.shared.consumer_count()
    }

    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.shared.router.handler_count(channel)
    }
}

impl Clone for StreamHandle {
    fn clone(&self) -> Self {
        self.shared.acquire();
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shared.release();
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("endpoint", &self.shared.key)
            .field("consumers", &self.consumer_count())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

/// A channel subscription; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    handle: StreamHandle,
    channel: Channel,
    id: HandlerId,
}

impl Subscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Stream this subscription keeps open
    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle
            .shared
            .router
            .remove_handler(&self.channel, self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}
