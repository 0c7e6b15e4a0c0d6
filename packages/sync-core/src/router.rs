//! Event routing
//!
//! The router parses each inbound frame, resolves its channel and hands it
//! synchronously to every handler subscribed to that channel, in
//! subscription order. Frames for channels nobody subscribed to are dropped
//! without side effects.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::channel::Channel;
use crate::events::{Frame, SyncEvent};

/// Longest frame excerpt included in parse-failure logs
const LOG_PREVIEW_CHARS: usize = 120;

/// An event delivered to a channel handler
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvent {
    pub channel: Channel,
    /// Raw `type` tag, so handlers can filter on prefixes
    pub event_type: String,
    pub event: SyncEvent,
}

impl RoutedEvent {
    pub fn new(channel: Channel, event: SyncEvent) -> Self {
        Self {
            channel,
            event_type: event.type_name().to_string(),
            event,
        }
    }
}

/// Receives routed events for the channels it subscribed to
///
/// Handlers run on the stream's driver task and must not block.
pub trait ChannelHandler: Send + Sync + 'static {
    fn handle(&self, event: &RoutedEvent);
}

impl<F> ChannelHandler for F
where
    F: Fn(&RoutedEvent) + Send + Sync + 'static,
{
    fn handle(&self, event: &RoutedEvent) {
        self(event)
    }
}

/// Identifies one handler registration
pub type HandlerId = Uuid;

/// What happened to a routed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Delivered to this many handlers
    Dispatched(usize),
    /// No channel, or no handler on it
    Ignored,
    /// Frame could not be parsed and was dropped
    Malformed,
}

type HandlerList = Vec<(HandlerId, Arc<dyn ChannelHandler>)>;

/// Channel-keyed handler registry
#[derive(Default)]
pub struct EventRouter {
    handlers: RwLock<HashMap<Channel, HandlerList>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it receives events after every existing handler
    pub fn add_handler(&self, channel: Channel, handler: Arc<dyn ChannelHandler>) -> HandlerId {
        let id = Uuid::new_v4();
        tracing::debug!(channel = %channel, handler_id = %id, "Handler subscribed");
        self.handlers
            .write()
            .entry(channel)
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a handler, returning whether it was registered
    pub fn remove_handler(&self, channel: &Channel, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(channel) else {
            return false;
        };

        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(channel);
        }

        if removed {
            tracing::debug!(channel = %channel, handler_id = %id, "Handler unsubscribed");
        }
        removed
    }

    pub fn handler_count(&self, channel: &Channel) -> usize {
        self.handlers.read().get(channel).map_or(0, Vec::len)
    }

    /// Channels that currently have at least one handler
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.handlers.read().keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Parse one raw frame and dispatch it
    pub fn route(&self, raw: &str) -> RouteOutcome {
        let frame = match Frame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    frame = %preview(raw),
                    "Dropping malformed sync frame"
                );
                return RouteOutcome::Malformed;
            }
        };

        let Some(channel) = frame.channel else {
            tracing::trace!(event_type = %frame.event_type, "Frame has no channel, ignoring");
            return RouteOutcome::Ignored;
        };

        self.dispatch(&RoutedEvent {
            channel,
            event_type: frame.event_type,
            event: frame.event,
        })
    }

    /// Hand an already-decoded event to the handlers of its channel
    pub fn dispatch(&self, event: &RoutedEvent) -> RouteOutcome {
        // Snapshot so handlers may (un)subscribe while being called
        let handlers: HandlerList = match self.handlers.read().get(&event.channel) {
            Some(list) => list.clone(),
            None => {
                tracing::trace!(
                    channel = %event.channel,
                    event_type = %event.event_type,
                    "No subscribers for channel"
                );
                return RouteOutcome::Ignored;
            }
        };

        for (_, handler) in &handlers {
            handler.handle(event);
        }
        RouteOutcome::Dispatched(handlers.len())
    }
}

fn preview(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(LOG_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
