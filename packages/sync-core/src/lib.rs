//! Fintrack realtime sync core
//!
//! Maintains one shared server-push connection per endpoint, routes the
//! crypto, banking and integration sync events multiplexed over it, and
//! projects them into per-entity sync state that UI observers can read.
//!
//! # Data flow
//!
//! transport -> [`ConnectionManager`] -> [`EventRouter`] -> domain adapter
//! -> [`SyncStateStore`] -> observers and [`CacheInvalidator`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fintrack_sync::{ConnectionManager, CryptoSyncAdapter, Credentials, HttpStreamTransport};
//!
//! let transport = HttpStreamTransport::new(&config.stream)?;
//! let manager = ConnectionManager::new(transport);
//! let handle = manager.connect(&config.stream.url, Credentials::bearer(token))?;
//!
//! let crypto = Arc::new(CryptoSyncAdapter::new(invalidator));
//! let _subscriptions = crypto.attach(&handle);
//! let wallets = crypto.reader();
//! ```

pub mod adapters;
pub mod channel;
pub mod connection;
pub mod error;
pub mod events;
pub mod router;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod transport;

pub use adapters::{
    AdapterSubscriptions, BankingSyncAdapter, CacheInvalidator, CryptoSyncAdapter,
    IntegrationSyncAdapter, Notification, NotificationLevel, Notifier, QueryKey,
};
pub use channel::Channel;
pub use connection::{
    ConnectionManager, ConnectionState, ReconnectPolicy, StreamHandle, Subscription,
};
pub use error::{ErrorSeverity, SyncError, SyncResult};
pub use events::{Frame, SyncEvent};
pub use router::{ChannelHandler, EventRouter, RouteOutcome, RoutedEvent};
pub use scheduler::{
    AutoSyncPhase, AutoSyncScheduler, BulkSyncStarter, BulkSyncSummary, EntitySyncOutcome,
    StalenessSignal,
};
pub use status::{normalize_status, SyncDomain, SyncStatus};
pub use store::{
    EntitySyncState, ProgressUpdate, StoreUpdate, SyncStateReader, SyncStateStore, SyncSummary,
    UpdateOutcome,
};
pub use transport::{Credentials, HttpStreamTransport, Transport, TransportError};
