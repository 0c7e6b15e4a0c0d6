//! Crypto wallet sync adapter

use std::sync::Arc;

use super::{failure_message, AdapterCore, AdapterSubscriptions, CacheInvalidator, QueryKey};
use crate::channel::Channel;
use crate::connection::StreamHandle;
use crate::events::{SyncEvent, WalletSyncPayload, INTEGRATION_EVENT_PREFIX};
use crate::router::{ChannelHandler, RoutedEvent};
use crate::status::{SyncDomain, SyncStatus};
use crate::store::{EntitySyncState, ProgressUpdate, SyncStateReader};

/// Projects `wallet_sync_*` events from the crypto channel
pub struct CryptoSyncAdapter {
    core: AdapterCore,
}

impl CryptoSyncAdapter {
    pub fn new(invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self {
            core: AdapterCore::new(SyncDomain::Crypto, invalidator),
        }
    }

    /// Subscribe to the crypto and connection channels of `handle`
    pub fn attach(self: &Arc<Self>, handle: &StreamHandle) -> AdapterSubscriptions {
        AdapterSubscriptions::attach(Arc::clone(self) as _, handle, Channel::CRYPTO_SYNC)
    }

    pub fn reader(&self) -> SyncStateReader {
        self.core.reader.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Dismiss one wallet's sync state
    pub fn clear(&self, wallet_id: &str) -> Option<EntitySyncState> {
        self.core.clear(wallet_id)
    }

    pub fn clear_finished(&self) -> usize {
        self.core.clear_terminal()
    }

    fn on_progress(&self, payload: &WalletSyncPayload) {
        let status = self
            .core
            .resolve_status(&payload.wallet_id, payload.status.as_deref(), None);

        match status {
            Some(SyncStatus::Completed) => return self.on_completed(payload),
            Some(SyncStatus::Failed) => return self.on_failed(payload),
            _ => {}
        }

        let mut update = ProgressUpdate::new(payload.progress)
            .with_message(payload.message.clone())
            .with_started_at(payload.started_at);
        update.status = status;
        self.core.store.update_progress(&payload.wallet_id, update);
    }

    fn on_completed(&self, payload: &WalletSyncPayload) {
        tracing::info!(wallet_id = %payload.wallet_id, "Wallet sync completed");
        self.core
            .store
            .complete_at(
                &payload.wallet_id,
                payload.synced_data.clone(),
                payload.completed_at,
            );
        self.core.invalidate(&[
            QueryKey::AllCrypto,
            QueryKey::WalletList,
            QueryKey::Wallet(payload.wallet_id.clone()),
            QueryKey::Portfolio,
            QueryKey::NetWorth,
        ]);
    }

    fn on_failed(&self, payload: &WalletSyncPayload) {
        let error = failure_message(payload.error.as_ref(), payload.message.as_ref());
        tracing::warn!(wallet_id = %payload.wallet_id, error = %error, "Wallet sync failed");
        self.core.store.fail(&payload.wallet_id, error);
    }
}

impl ChannelHandler for CryptoSyncAdapter {
    fn handle(&self, event: &RoutedEvent) {
        if self.core.observe_connection(&event.event) {
            return;
        }
        // Integration events share this channel
        if event.event_type.starts_with(INTEGRATION_EVENT_PREFIX) {
            return;
        }

        match &event.event {
            SyncEvent::WalletSyncProgress(payload) => self.on_progress(payload),
            SyncEvent::WalletSyncCompleted(payload) => self.on_completed(payload),
            SyncEvent::WalletSyncFailed(payload) => self.on_failed(payload),
            _ => {
                tracing::trace!(event_type = %event.event_type, "Crypto adapter ignoring event");
            }
        }
    }
}
