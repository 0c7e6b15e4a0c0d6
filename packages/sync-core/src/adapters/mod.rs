//! Domain sync adapters
//!
//! Each adapter owns one domain's [`SyncStateStore`], turns routed events
//! into store transitions and tells the data layer which read models went
//! stale through a [`CacheInvalidator`].

mod banking;
mod crypto;
mod integrations;

pub use banking::BankingSyncAdapter;
pub use crypto::CryptoSyncAdapter;
pub use integrations::IntegrationSyncAdapter;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::channel::Channel;
use crate::connection::{StreamHandle, Subscription};
use crate::events::SyncEvent;
use crate::router::ChannelHandler;
use crate::status::{normalize_status, SyncDomain, SyncStatus};
use crate::store::{EntitySyncState, SyncStateReader, SyncStateStore};

// =============================================================================
// Collaborators
// =============================================================================

/// Read-model cache entries that a sync can make stale
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum QueryKey {
    AllCrypto,
    WalletList,
    Wallet(String),
    Portfolio,
    NetWorth,
    AccountList,
    Account(String),
    Transactions(String),
    Budgets,
    IntegrationList,
    Integration(String),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllCrypto => write!(f, "crypto"),
            Self::WalletList => write!(f, "crypto/wallets"),
            Self::Wallet(id) => write!(f, "crypto/wallets/{}", id),
            Self::Portfolio => write!(f, "portfolio"),
            Self::NetWorth => write!(f, "net-worth"),
            Self::AccountList => write!(f, "accounts"),
            Self::Account(id) => write!(f, "accounts/{}", id),
            Self::Transactions(id) => write!(f, "accounts/{}/transactions", id),
            Self::Budgets => write!(f, "budgets"),
            Self::IntegrationList => write!(f, "integrations"),
            Self::Integration(id) => write!(f, "integrations/{}", id),
        }
    }
}

/// Data-fetching layer hook for dropping stale read models
pub trait CacheInvalidator: Send + Sync + 'static {
    fn invalidate(&self, keys: &[QueryKey]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A user-facing toast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Presents notifications to the user
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Channel subscriptions held for an adapter; dropping them detaches it
#[must_use = "dropping AdapterSubscriptions detaches the adapter"]
#[derive(Debug)]
pub struct AdapterSubscriptions {
    subscriptions: Vec<Subscription>,
}

impl AdapterSubscriptions {
    /// Subscribe `handler` to its data channel and the connection channel
    fn attach(handler: Arc<dyn ChannelHandler>, handle: &StreamHandle, data: Channel) -> Self {
        let subscriptions = vec![
            handle.subscribe(data, Arc::clone(&handler)),
            handle.subscribe(Channel::CONNECTION, handler),
        ];
        Self { subscriptions }
    }

    pub fn channels(&self) -> Vec<&Channel> {
        self.subscriptions.iter().map(Subscription::channel).collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn detach(self) {
        drop(self);
    }
}

// =============================================================================
// Shared adapter state
// =============================================================================

/// Store, connection flag and invalidator common to every adapter
struct AdapterCore {
    domain: SyncDomain,
    store: SyncStateStore,
    reader: SyncStateReader,
    invalidator: Arc<dyn CacheInvalidator>,
    connected: AtomicBool,
}

impl AdapterCore {
    fn new(domain: SyncDomain, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        let store = SyncStateStore::new();
        let reader = store.reader();
        Self {
            domain,
            store,
            reader,
            invalidator,
            connected: AtomicBool::new(false),
        }
    }

    /// Track connection events; returns true if `event` was one
    fn observe_connection(&self, event: &SyncEvent) -> bool {
        let connected = match event {
            SyncEvent::ConnectionEstablished { .. } => true,
            SyncEvent::ConnectionClosed { .. } => false,
            _ => return false,
        };
        let was = self.connected.swap(connected, Ordering::SeqCst);
        if was != connected {
            tracing::debug!(domain = %self.domain, connected, "Domain connection changed");
        }
        true
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Normalize a raw status, falling back to the event's implied status
    fn resolve_status(
        &self,
        entity_id: &str,
        raw: Option<&str>,
        fallback: Option<SyncStatus>,
    ) -> Option<SyncStatus> {
        let Some(raw) = raw else {
            return fallback;
        };
        match normalize_status(self.domain, raw) {
            Some(status) => Some(status),
            None => {
                tracing::warn!(
                    domain = %self.domain,
                    entity_id = %entity_id,
                    raw_status = %raw,
                    "Unmapped sync status, using event default"
                );
                fallback
            }
        }
    }

    fn current_status(&self, id: &str) -> Option<SyncStatus> {
        self.reader.get(id).map(|state| state.status)
    }

    fn invalidate(&self, keys: &[QueryKey]) {
        tracing::debug!(
            domain = %self.domain,
            keys = keys.len(),
            "Invalidating dependent read models"
        );
        self.invalidator.invalidate(keys);
    }

    fn clear(&self, id: &str) -> Option<EntitySyncState> {
        self.store.clear(id)
    }

    fn clear_terminal(&self) -> usize {
        self.store.clear_terminal()
    }
}

/// Error text for a failure event
fn failure_message(error: Option<&String>, message: Option<&String>) -> String {
    error
        .or(message)
        .cloned()
        .unwrap_or_else(|| crate::store::DEFAULT_FAILURE_MESSAGE.to_string())
}
